//! Lineage backtrace.
//!
//! The spending contract requires proof that the minter UTXO being spent
//! descends from the collection's genesis: the raw transaction that created
//! the minter output, plus the grandparent transaction funding that
//! parent's traced input. The resolver only fetches and packages; retry
//! policy belongs to the caller.

use crate::{ChainSource, Error, ProviderError};
use bitcoin::Transaction;
use tapmint_primitives::Utxo;

/// Proof artifact linking a minter UTXO to its immediate ancestors.
///
/// Consumed once per mint by the witness assembly; never persisted.
#[derive(Debug, Clone)]
pub struct BacktraceInfo {
    /// The transaction that created the minter UTXO.
    pub prev_tx: Transaction,
    /// The transaction funding `prev_tx`'s traced input.
    pub prev_prev_tx: Transaction,
    /// Index of the traced input within `prev_tx`.
    pub input_index: u32,
}

impl BacktraceInfo {
    /// Checks that the packaged transactions actually chain to the minter
    /// UTXO being spent.
    pub fn verify_links(&self, minter_utxo: &Utxo) -> Result<(), Error> {
        if self.prev_tx.compute_txid() != minter_utxo.txid {
            return Err(broken_link("parent does not create the minter output"));
        }
        let traced_input = self
            .prev_tx
            .input
            .get(self.input_index as usize)
            .ok_or_else(|| broken_link("traced input index out of bounds"))?;
        if self.prev_prev_tx.compute_txid() != traced_input.previous_output.txid {
            return Err(broken_link("grandparent does not fund the traced input"));
        }
        Ok(())
    }
}

fn broken_link(detail: &str) -> Error {
    Error::DataUnavailable(ProviderError::Decode(format!(
        "backtrace does not chain: {detail}"
    )))
}

/// Fetches the ancestor transactions of `minter_utxo` and packages the
/// lineage proof.
///
/// Fails with [`Error::DataUnavailable`] if either ancestor cannot be
/// retrieved; the failure is propagated, not retried here.
pub async fn resolve_backtrace(
    chain: &dyn ChainSource,
    minter_utxo: &Utxo,
    input_index: u32,
) -> Result<BacktraceInfo, Error> {
    let prev_tx = chain
        .raw_transaction(minter_utxo.txid)
        .await
        .map_err(Error::DataUnavailable)?;

    let traced_input = prev_tx
        .input
        .get(input_index as usize)
        .ok_or_else(|| broken_link("traced input index out of bounds"))?;

    let prev_prev_tx = chain
        .raw_transaction(traced_input.previous_output.txid)
        .await
        .map_err(Error::DataUnavailable)?;

    let backtrace = BacktraceInfo {
        prev_tx,
        prev_prev_tx,
        input_index,
    };
    backtrace.verify_links(minter_utxo)?;
    Ok(backtrace)
}
