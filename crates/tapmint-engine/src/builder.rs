//! Commit/reveal transaction builder.
//!
//! A mint is realized as two transactions. The commit transaction locks the
//! NFT content commitment and leaves its change output as the reveal's fee
//! funding. The reveal transaction spends the minter UTXO, the content
//! commitment, and the fee output, and produces the state commitment, the
//! successor minter output(s), the token output, and change.
//!
//! Fees are sized in two passes: witness size depends on the assembled
//! contract call, so the reveal is first built with a zero change amount,
//! fully signed, and measured; the final change is then computed from that
//! measured virtual size and the transaction is rebuilt and re-signed. All
//! signatures are fixed-length, so the measured size is exact.

use crate::allocation::{tree_out_of_sync, AllocationTree, SlotResource};
use crate::backtrace::{resolve_backtrace, BacktraceInfo};
use crate::minter::{plan_mint, resolve_premine_address, MintPlan};
use crate::spend::SpendLedger;
use crate::wallet::Wallet;
use crate::{
    BroadcastStage, Broadcaster, ChainSource, Error, MinterHandle, ProviderError,
};
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Arc;
use tapmint_primitives::{
    parse_outpoint, state_script, CollectionInfo, MinterKind, TokenAddress, TokenState, Utxo,
    CHANGE_MIN_POSTAGE, MINTER_POSTAGE, NFT_POSTAGE, TOKEN_POSTAGE,
};
use tapmint_script::{
    commit_script, minter_script, mint_witness, sign_script_spend, verify_input,
    MinterScriptParams, TaprootSpend,
};

/// Input positions of the reveal transaction.
const MINTER_INPUT_INDEX: usize = 0;
const NFT_INPUT_INDEX: usize = 1;

/// One mint attempt.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub collection: CollectionInfo,
    /// The minter UTXO to advance, with its tracker-claimed state.
    pub minter: MinterHandle,
    /// Fee funding for the commit transaction. Must be reserved by the
    /// caller before the attempt.
    pub fee_utxos: Vec<Utxo>,
    /// Content and metadata of the slot being minted.
    pub resource: SlotResource,
    /// Token recipient; defaults to the wallet's own token address.
    pub owner: Option<TokenAddress>,
}

/// The broadcast result of one successful mint.
#[derive(Debug, Clone)]
pub struct MintOutcome {
    pub commit_txid: Txid,
    pub reveal_txid: Txid,
    pub token: TokenState,
    /// Successor minter outputs created by the reveal, in output order.
    /// Empty when the minter became terminal.
    pub successors: Vec<MinterHandle>,
    /// The reveal's change output, usable as the next attempt's fee
    /// funding.
    pub new_fee_utxo: Utxo,
    /// Combined virtual size of the commit and reveal transactions.
    pub vsize_total: usize,
}

impl MintOutcome {
    /// The single successor of a linear (closed) minter chain.
    pub fn successor(&self) -> Option<&MinterHandle> {
        self.successors.first()
    }
}

/// The minting transaction engine.
pub struct MintEngine {
    wallet: Arc<Wallet>,
    chain: Arc<dyn ChainSource>,
    broadcaster: Arc<dyn Broadcaster>,
    spends: Arc<SpendLedger>,
    /// Fee rate in satoshis per virtual byte.
    fee_rate: u64,
    /// Run the local interpreter over assembled witnesses before
    /// broadcasting.
    verify: bool,
    /// Premine recipient, recovered at most once per session.
    premine_cache: Mutex<Option<TokenAddress>>,
}

impl MintEngine {
    pub fn new(
        wallet: Arc<Wallet>,
        chain: Arc<dyn ChainSource>,
        broadcaster: Arc<dyn Broadcaster>,
        spends: Arc<SpendLedger>,
        fee_rate: u64,
        verify: bool,
    ) -> Self {
        Self {
            wallet,
            chain,
            broadcaster,
            spends,
            fee_rate,
            verify,
            premine_cache: Mutex::new(None),
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn spends(&self) -> &Arc<SpendLedger> {
        &self.spends
    }

    pub fn chain(&self) -> &Arc<dyn ChainSource> {
        &self.chain
    }

    /// Performs one complete mint: slot allocation, commit and reveal
    /// construction, two-pass fee sizing, witness assembly, optional local
    /// verification, and sequential broadcast.
    ///
    /// Open-mint collections must pass their allocation `tree`, already
    /// synced to the minter's claimed slot.
    pub async fn mint(
        &self,
        request: MintRequest,
        mut tree: Option<&mut AllocationTree>,
    ) -> Result<MintOutcome, Error> {
        let MintRequest {
            collection,
            minter,
            fee_utxos,
            resource,
            owner,
        } = request;

        // The single place the recorded minter identity is resolved.
        let kind = collection
            .metadata
            .minter_kind()
            .ok_or_else(|| Error::UnknownMinterVariant(collection.metadata.minter_ident.clone()))?;
        if minter.state.kind() != kind {
            return Err(Error::DataUnavailable(ProviderError::Decode(format!(
                "tracker returned a {:?} state for a {kind:?} collection",
                minter.state.kind(),
            ))));
        }
        minter.verify()?;

        let genesis = parse_outpoint(&collection.collection_id).map_err(|err| {
            Error::DataUnavailable(ProviderError::Decode(format!(
                "bad collection id: {err}"
            )))
        })?;
        let max = collection.metadata.max;
        let premine = collection.metadata.premine;
        let slot = minter.state.next_local_id();

        let premine_addr = self
            .premine_address(&minter.utxo, slot, premine)
            .await?;
        let token_owner = match premine_addr {
            Some(addr) if slot == 0 => addr,
            _ => owner.unwrap_or_else(|| self.wallet.token_address()),
        };

        // Reconstruct the minter locking script and check it against the
        // output actually being spent.
        let params = match kind {
            MinterKind::Open => MinterScriptParams::Open {
                genesis,
                max,
                premine,
                premine_addr,
            },
            MinterKind::Closed => MinterScriptParams::Closed {
                issuer: self.wallet.token_address(),
                genesis,
                max,
            },
            MinterKind::ParallelClosed => MinterScriptParams::ParallelClosed {
                issuer: self.wallet.token_address(),
                genesis,
                max,
            },
        };
        let minter_spend = TaprootSpend::wrap(minter_script(&params))?;
        if minter_spend.output_script != minter.utxo.script_pubkey {
            return Err(Error::MinterScriptMismatch(minter.utxo.outpoint()));
        }

        // Content commitment for this slot.
        let nft_spend = TaprootSpend::wrap(commit_script(
            &self.wallet.xonly_public_key(),
            &resource.metadata,
            &resource.content_type,
            &resource.content_body,
        )?)?;

        // For open minting the content must be the very one committed into
        // the slot's leaf at deploy time.
        if let Some(tree) = tree.as_deref() {
            if tree.leaf(slot)?.commit_script != nft_spend.output_script {
                return Err(tree_out_of_sync(&format!(
                    "slot {slot} content does not match the committed leaf"
                )));
            }
        }

        let plan = plan_mint(&minter.state, max, token_owner, tree.as_deref_mut())?;

        let token_script =
            address_script(&collection.collection_addr, self.wallet.network())?;

        let commit = self.build_commit_tx(&fee_utxos, &nft_spend)?;
        let commit_txid_precomputed = commit.compute_txid();

        // Reveal skeleton; the change value is filled in per pass.
        let reveal_prevouts = vec![
            minter.utxo.to_txout(),
            commit.output[0].clone(),
            commit.output[1].clone(),
        ];
        let total_input = reveal_prevouts
            .iter()
            .map(|prevout| prevout.value)
            .sum::<Amount>();
        let build_reveal = |change: Amount| -> Transaction {
            let mut outputs = vec![TxOut {
                value: Amount::ZERO,
                script_pubkey: state_script(&plan.new_protocol_state),
            }];
            for _ in &plan.successors {
                outputs.push(TxOut {
                    value: MINTER_POSTAGE,
                    script_pubkey: minter.utxo.script_pubkey.clone(),
                });
            }
            outputs.push(TxOut {
                value: TOKEN_POSTAGE,
                script_pubkey: token_script.clone(),
            });
            outputs.push(TxOut {
                value: change,
                script_pubkey: self.wallet.change_script(),
            });
            Transaction {
                version: Version::TWO,
                lock_time: LockTime::ZERO,
                input: [
                    minter.utxo.outpoint(),
                    bitcoin::OutPoint::new(commit_txid_precomputed, 0),
                    bitcoin::OutPoint::new(commit_txid_precomputed, 1),
                ]
                .into_iter()
                .map(|previous_output| TxIn {
                    previous_output,
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
                output: outputs,
            }
        };

        // Lineage proof; ancestor data is stable across both passes.
        let backtrace =
            resolve_backtrace(self.chain.as_ref(), &minter.utxo, MINTER_INPUT_INDEX as u32)
                .await?;

        // Estimation pass: zero change, full witness assembly, then the
        // transaction is discarded.
        let mut probe = build_reveal(Amount::ZERO);
        self.assemble_witnesses(
            &mut probe,
            &reveal_prevouts,
            &plan,
            &minter_spend,
            &nft_spend,
            &backtrace,
            &minter.utxo,
        )?;
        let vsize = probe.vsize();
        drop(probe);

        let fee = Amount::from_sat(vsize as u64 * self.fee_rate);
        let postage = MINTER_POSTAGE * plan.successors.len() as u64 + TOKEN_POSTAGE;
        let change = total_input
            .checked_sub(fee + postage)
            .filter(|change| *change >= CHANGE_MIN_POSTAGE)
            .ok_or(Error::InsufficientFunds {
                required: fee + postage + CHANGE_MIN_POSTAGE,
                available: total_input,
            })?;

        // Final pass with the exact change amount.
        let mut reveal = build_reveal(change);
        self.assemble_witnesses(
            &mut reveal,
            &reveal_prevouts,
            &plan,
            &minter_spend,
            &nft_spend,
            &backtrace,
            &minter.utxo,
        )?;
        debug_assert_eq!(reveal.vsize(), vsize);

        if self.verify {
            for input_index in [MINTER_INPUT_INDEX, NFT_INPUT_INDEX] {
                verify_input(&reveal, input_index, &reveal_prevouts)
                    .map_err(|err| Error::ScriptVerificationFailed(err.to_string()))?;
            }
        }

        let commit_txid = self
            .broadcaster
            .broadcast(&commit)
            .await
            .map_err(|source| Error::Broadcast {
                stage: BroadcastStage::Commit,
                commit_txid: None,
                source,
            })?;
        tracing::info!(
            %commit_txid,
            symbol = %collection.metadata.symbol,
            slot,
            "Committed NFT content"
        );
        self.spends.mark_tx_spends(&commit);

        let reveal_txid = self
            .broadcaster
            .broadcast(&reveal)
            .await
            .map_err(|source| Error::Broadcast {
                stage: BroadcastStage::Reveal,
                commit_txid: Some(commit_txid),
                source,
            })?;
        tracing::info!(
            %reveal_txid,
            symbol = %collection.metadata.symbol,
            slot,
            "Minted NFT"
        );
        self.spends.mark_tx_spends(&reveal);

        let successors = plan
            .successors
            .iter()
            .enumerate()
            .map(|(position, state)| {
                let vout = 1 + position as u32;
                MinterHandle {
                    utxo: Utxo::from_txout(reveal_txid, vout, &reveal.output[vout as usize]),
                    protocol_state: plan.new_protocol_state.clone(),
                    state: *state,
                }
            })
            .collect();
        let change_vout = reveal.output.len() as u32 - 1;

        Ok(MintOutcome {
            commit_txid,
            reveal_txid,
            token: plan.token,
            successors,
            new_fee_utxo: Utxo::from_txout(
                reveal_txid,
                change_vout,
                &reveal.output[change_vout as usize],
            ),
            vsize_total: commit.vsize() + reveal.vsize(),
        })
    }

    /// Splits fee UTXOs into `count` equal outputs for lane assignment.
    pub async fn split_fee(
        &self,
        fee_utxos: &[Utxo],
        count: usize,
    ) -> Result<(Txid, Vec<Utxo>), Error> {
        crate::split::split_fee_utxos(
            &self.wallet,
            self.broadcaster.as_ref(),
            &self.spends,
            fee_utxos,
            self.fee_rate,
            count,
        )
        .await
    }

    /// Builds and signs the commit transaction, itself fee-sized in two
    /// passes. Output 0 is the content commitment; output 1 is change and
    /// doubles as the reveal's fee funding.
    fn build_commit_tx(
        &self,
        fee_utxos: &[Utxo],
        nft_spend: &TaprootSpend,
    ) -> Result<Transaction, Error> {
        let prevouts = fee_utxos.iter().map(Utxo::to_txout).collect::<Vec<_>>();
        let total_input = prevouts.iter().map(|prevout| prevout.value).sum::<Amount>();

        let build = |change: Amount| Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: fee_utxos
                .iter()
                .map(|utxo| TxIn {
                    previous_output: utxo.outpoint(),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: vec![
                TxOut {
                    value: NFT_POSTAGE,
                    script_pubkey: nft_spend.output_script.clone(),
                },
                TxOut {
                    value: change,
                    script_pubkey: self.wallet.change_script(),
                },
            ],
        };

        let mut probe = build(Amount::ZERO);
        self.wallet.sign_own_inputs(&mut probe, &prevouts)?;
        let fee = Amount::from_sat(probe.vsize() as u64 * self.fee_rate);

        let change = total_input
            .checked_sub(NFT_POSTAGE + fee + Amount::from_sat(1))
            .filter(|change| *change >= CHANGE_MIN_POSTAGE)
            .ok_or(Error::InsufficientFunds {
                required: NFT_POSTAGE + fee + CHANGE_MIN_POSTAGE,
                available: total_input,
            })?;

        let mut commit = build(change);
        self.wallet.sign_own_inputs(&mut commit, &prevouts)?;
        Ok(commit)
    }

    /// Assembles the full witness stacks of a reveal transaction: the fixed
    /// contract layout for the minter and commitment inputs, and the
    /// key-path signature for the fee input. The backtrace must already
    /// prove lineage; witness assembly never starts without it.
    #[allow(clippy::too_many_arguments)]
    fn assemble_witnesses(
        &self,
        reveal: &mut Transaction,
        prevouts: &[TxOut],
        plan: &MintPlan,
        minter_spend: &TaprootSpend,
        nft_spend: &TaprootSpend,
        backtrace: &BacktraceInfo,
        minter_utxo: &Utxo,
    ) -> Result<(), Error> {
        backtrace.verify_links(minter_utxo)?;

        let hashes = plan.new_protocol_state.hash_list();
        let secp = self.wallet.secp();

        let minter_sig = sign_script_spend(
            secp,
            reveal,
            MINTER_INPUT_INDEX,
            prevouts,
            &minter_spend.tapscript,
            self.wallet.keypair(),
        )?;
        reveal.input[MINTER_INPUT_INDEX].witness = mint_witness(
            hashes,
            &minter_sig,
            &minter_spend.tapscript,
            &minter_spend.control_block,
        );

        let nft_sig = sign_script_spend(
            secp,
            reveal,
            NFT_INPUT_INDEX,
            prevouts,
            &nft_spend.tapscript,
            self.wallet.keypair(),
        )?;
        reveal.input[NFT_INPUT_INDEX].witness = mint_witness(
            hashes,
            &nft_sig,
            &nft_spend.tapscript,
            &nft_spend.control_block,
        );

        self.wallet.sign_own_inputs(reveal, prevouts)
    }

    async fn premine_address(
        &self,
        minter_utxo: &Utxo,
        slot: u64,
        premine: u64,
    ) -> Result<Option<TokenAddress>, Error> {
        if premine == 0 {
            return Ok(None);
        }
        if let Some(cached) = *self.premine_cache.lock() {
            return Ok(Some(cached));
        }
        let resolved = resolve_premine_address(
            self.chain.as_ref(),
            minter_utxo,
            self.wallet.token_address(),
            slot,
            premine,
        )
        .await?;
        if let Some(addr) = resolved {
            *self.premine_cache.lock() = Some(addr);
        }
        Ok(resolved)
    }
}

fn address_script(address: &str, network: bitcoin::Network) -> Result<ScriptBuf, Error> {
    Address::from_str(address)
        .and_then(|addr| addr.require_network(network))
        .map(|addr| addr.script_pubkey())
        .map_err(|err| {
            Error::DataUnavailable(ProviderError::Decode(format!(
                "bad address {address:?}: {err}"
            )))
        })
}
