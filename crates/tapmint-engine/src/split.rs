//! Fee UTXO splitting.
//!
//! When more minting lanes are active than fee UTXOs exist, one transaction
//! splits the available funds into `count` equal-value outputs, one per
//! lane. Sized with the same two-pass protocol as every other transaction
//! the engine builds.

use crate::spend::SpendLedger;
use crate::wallet::Wallet;
use crate::{BroadcastStage, Broadcaster, Error};
use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use tapmint_primitives::{Utxo, CHANGE_MIN_POSTAGE};

/// Splits `fee_utxos` into `count` equal-value outputs paying the wallet's
/// own address, broadcasts the transaction, and returns the new UTXOs.
pub async fn split_fee_utxos(
    wallet: &Wallet,
    broadcaster: &dyn Broadcaster,
    spends: &SpendLedger,
    fee_utxos: &[Utxo],
    fee_rate: u64,
    count: usize,
) -> Result<(Txid, Vec<Utxo>), Error> {
    let prevouts = fee_utxos.iter().map(Utxo::to_txout).collect::<Vec<_>>();
    let total_input = prevouts.iter().map(|prevout| prevout.value).sum::<Amount>();

    let build = |value: Amount| Transaction {
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
        output: (0..count)
            .map(|_| TxOut {
                value,
                script_pubkey: wallet.change_script(),
            })
            .collect(),
    };

    let mut probe = build(Amount::ZERO);
    wallet.sign_own_inputs(&mut probe, &prevouts)?;
    let fee = Amount::from_sat(probe.vsize() as u64 * fee_rate);

    let per_output = total_input
        .checked_sub(fee)
        .map(|rest| rest / count as u64)
        .filter(|per_output| *per_output >= CHANGE_MIN_POSTAGE)
        .ok_or(Error::InsufficientFunds {
            required: fee + CHANGE_MIN_POSTAGE * count as u64,
            available: total_input,
        })?;

    let mut split = build(per_output);
    wallet.sign_own_inputs(&mut split, &prevouts)?;

    let txid = broadcaster
        .broadcast(&split)
        .await
        .map_err(|source| Error::Broadcast {
            stage: BroadcastStage::Split,
            commit_txid: None,
            source,
        })?;
    tracing::info!(%txid, count, %per_output, "Split fee UTXOs");
    spends.mark_tx_spends(&split);

    let new_utxos = split
        .output
        .iter()
        .enumerate()
        .map(|(vout, txout)| Utxo::from_txout(txid, vout as u32, txout))
        .collect();
    Ok((txid, new_utxos))
}
