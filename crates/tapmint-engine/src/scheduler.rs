//! Slot fan-out scheduler for the closed-minter variant.
//!
//! A closed minter forwards authority linearly, so independent minter UTXOs
//! can each advance their own chain. The scheduler runs one lane per live
//! minter UTXO; lanes are interleaved I/O-bound tasks, each minting
//! sequentially until its minter turns terminal, its iteration budget runs
//! out, or its accumulated transaction size exceeds the lane budget. After a
//! lane batch every lane waits for its final transaction to confirm before
//! the scheduler polls for minters again.
//!
//! The outer loop carries an explicit round budget and a cancellation flag;
//! the engine itself only ever performs single mint attempts.

use crate::allocation::SlotResource;
use crate::builder::{MintEngine, MintRequest};
use crate::{ChainSource, Error, MinterHandle, MinterProvider};
use bitcoin::Txid;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tapmint_primitives::{CollectionInfo, TokenAddress, Utxo, CHANGE_MIN_POSTAGE};

/// Minter UTXOs requested per poll.
const MINTER_PAGE_LIMIT: usize = 5;

/// Supplies the content backing each slot as lanes reach it.
pub trait ResourceLoader: Send + Sync {
    fn load(&self, local_id: u64) -> Result<SlotResource, Error>;
}

/// Scheduler tuning. The defaults are the protocol's operational limits.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sequential mint attempts per lane before handing back to the poll
    /// loop.
    pub max_lane_iterations: usize,
    /// Accumulated virtual size at which a lane stops advancing.
    pub lane_vsize_budget: usize,
    /// Fixed backoff between poll rounds.
    pub poll_backoff: Duration,
    /// Poll rounds before the scheduler gives up.
    pub max_rounds: usize,
    /// Consecutive empty polls treated as collection exhaustion.
    pub max_idle_rounds: usize,
    /// Fixed backoff between confirmation polls.
    pub confirmation_backoff: Duration,
    /// Confirmation polls before reporting a timeout.
    pub confirmation_attempts: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_lane_iterations: 12,
            lane_vsize_budget: 100_000,
            poll_backoff: Duration::from_secs(5),
            max_rounds: 1_000,
            max_idle_rounds: 2,
            confirmation_backoff: Duration::from_secs(5),
            confirmation_attempts: 120,
        }
    }
}

/// What a scheduler run achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintSummary {
    pub minted: u64,
    pub rounds: usize,
}

/// Polls `txid` until it has at least one confirmation, with fixed backoff
/// and a bounded attempt budget.
pub async fn wait_for_confirmation(
    chain: &dyn ChainSource,
    txid: Txid,
    config: &SchedulerConfig,
) -> Result<(), Error> {
    for _ in 0..config.confirmation_attempts {
        match chain.confirmations(txid).await {
            Ok(confirmations) if confirmations >= 1 => return Ok(()),
            Ok(_) => {}
            Err(err) => tracing::debug!(%txid, %err, "Confirmation poll failed"),
        }
        tokio::time::sleep(config.confirmation_backoff).await;
    }
    Err(Error::ConfirmationTimeout(txid))
}

/// Drives concurrent minting of a closed-minter collection until
/// exhaustion, cancellation, or the round budget.
pub async fn run_closed_mint(
    engine: &MintEngine,
    provider: &dyn MinterProvider,
    collection: &CollectionInfo,
    resources: &dyn ResourceLoader,
    owner: Option<TokenAddress>,
    config: &SchedulerConfig,
    cancel: Arc<AtomicBool>,
) -> Result<MintSummary, Error> {
    let mut total_minted = 0u64;
    let mut rounds = 0usize;
    let mut idle_rounds = 0usize;

    while rounds < config.max_rounds && !cancel.load(Ordering::Relaxed) {
        rounds += 1;

        let page = provider
            .minter_utxos(&collection.collection_id, MINTER_PAGE_LIMIT, 0)
            .await
            .map_err(Error::DataUnavailable)?;
        engine.spends().update_block_height(page.tracker_height);

        let minters = page
            .minters
            .into_iter()
            .filter(|minter| engine.spends().is_unspent(&minter.utxo.outpoint()))
            .collect::<Vec<_>>();

        if minters.is_empty() {
            idle_rounds += 1;
            if idle_rounds >= config.max_idle_rounds {
                tracing::info!(
                    symbol = %collection.metadata.symbol,
                    "No live minters left, stopping"
                );
                break;
            }
            tokio::time::sleep(config.poll_backoff).await;
            continue;
        }
        idle_rounds = 0;
        tracing::info!(
            count = minters.len(),
            symbol = %collection.metadata.symbol,
            "Found live minters"
        );

        let fee_utxos = fetch_fee_utxos(engine).await?;
        let fee_utxos = if fee_utxos.len() < minters.len() {
            tracing::info!(
                have = fee_utxos.len(),
                need = minters.len(),
                "Splitting fee UTXOs for the active lanes"
            );
            for utxo in &fee_utxos {
                engine.spends().reserve(utxo.outpoint());
            }
            let (split_txid, new_utxos) =
                engine.split_fee(&fee_utxos, minters.len()).await?;
            wait_for_confirmation(engine.chain().as_ref(), split_txid, config).await?;
            new_utxos
        } else {
            fee_utxos
        };

        // Assign one reserved fee UTXO per lane; a lost reservation means
        // another lane already claimed the output.
        let assignments = minters
            .into_iter()
            .zip(fee_utxos)
            .filter(|(_, utxo)| engine.spends().reserve(utxo.outpoint()))
            .collect::<Vec<_>>();

        let lanes = assignments
            .into_iter()
            .enumerate()
            .map(|(lane_index, (minter, fee_utxo))| {
                run_lane(
                    engine, collection, resources, owner, config, &cancel, lane_index, minter,
                    fee_utxo,
                )
            });
        let lane_results = join_all(lanes).await;
        total_minted += lane_results.into_iter().sum::<u64>();

        tokio::time::sleep(config.poll_backoff).await;
    }

    Ok(MintSummary {
        minted: total_minted,
        rounds,
    })
}

/// One lane: sequential mints from a single minter UTXO chain.
#[allow(clippy::too_many_arguments)]
async fn run_lane(
    engine: &MintEngine,
    collection: &CollectionInfo,
    resources: &dyn ResourceLoader,
    owner: Option<TokenAddress>,
    config: &SchedulerConfig,
    cancel: &AtomicBool,
    lane_index: usize,
    mut minter: MinterHandle,
    mut fee_utxo: Utxo,
) -> u64 {
    let mut minted = 0u64;
    let mut vsize_acc = 0usize;
    let mut last_txid = fee_utxo.txid;

    for _ in 0..config.max_lane_iterations {
        if cancel.load(Ordering::Relaxed) {
            break;
        }

        let local_id = minter.state.next_local_id();
        let resource = match resources.load(local_id) {
            Ok(resource) => resource,
            Err(err) => {
                tracing::warn!(lane_index, local_id, %err, "Cannot load slot resource");
                engine.spends().release(&fee_utxo.outpoint());
                break;
            }
        };

        let request = MintRequest {
            collection: collection.clone(),
            minter: minter.clone(),
            fee_utxos: vec![fee_utxo.clone()],
            resource,
            owner,
        };
        match engine.mint(request, None).await {
            Ok(outcome) => {
                tracing::info!(
                    lane_index,
                    %outcome.reveal_txid,
                    symbol = %collection.metadata.symbol,
                    local_id,
                    "Minted NFT"
                );
                minted += 1;
                vsize_acc += outcome.vsize_total;
                last_txid = outcome.new_fee_utxo.txid;
                fee_utxo = outcome.new_fee_utxo.clone();

                match outcome.successor() {
                    Some(successor) => minter = successor.clone(),
                    None => break,
                }
                if vsize_acc > config.lane_vsize_budget {
                    tracing::debug!(lane_index, vsize_acc, "Lane size budget reached");
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(lane_index, local_id, %err, "Mint attempt failed");
                engine.spends().release(&fee_utxo.outpoint());
                break;
            }
        }
    }

    if minted > 0 {
        if let Err(err) =
            wait_for_confirmation(engine.chain().as_ref(), last_txid, config).await
        {
            tracing::warn!(lane_index, %err, "Lane tail confirmation timed out");
        }
    }
    minted
}

async fn fetch_fee_utxos(engine: &MintEngine) -> Result<Vec<Utxo>, Error> {
    let address = engine.wallet().address().to_string();
    let utxos = engine
        .chain()
        .address_utxos(&address)
        .await
        .map_err(Error::DataUnavailable)?
        .into_iter()
        .filter(|utxo| engine.spends().is_unspent(&utxo.outpoint()))
        .collect::<Vec<_>>();

    if utxos.is_empty() {
        return Err(Error::InsufficientFunds {
            required: CHANGE_MIN_POSTAGE,
            available: bitcoin::Amount::ZERO,
        });
    }
    Ok(utxos)
}
