//! Local spend bookkeeping.
//!
//! Tracker indexing lags broadcast, so the engine keeps its own append-only
//! record of outpoints it has consumed, and a reservation set that lets
//! interleaved minting lanes claim fee UTXOs without racing each other: a
//! lane must win the reservation before spending, and reservations are only
//! released explicitly on failure.

use bitcoin::{OutPoint, Transaction};
use indexmap::IndexSet;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Blocks the tracker may advance past the ledger's view before the spent
/// set is considered confirmed and reset.
const RESET_DEPTH: u64 = 100;

#[derive(Debug, Default)]
struct Inner {
    spent: HashSet<OutPoint>,
    /// Reserved-but-not-yet-spent outpoints, in reservation order.
    reserved: IndexSet<OutPoint>,
    block_height: u64,
}

/// Append-only spent set with per-UTXO reservations.
#[derive(Debug, Default)]
pub struct SpendLedger {
    inner: Mutex<Inner>,
}

impl SpendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the ledger has no record of `outpoint` being consumed.
    pub fn is_unspent(&self, outpoint: &OutPoint) -> bool {
        !self.inner.lock().spent.contains(outpoint)
    }

    /// Claims `outpoint` for the calling lane. Returns false if it is
    /// already spent or held by another lane.
    pub fn reserve(&self, outpoint: OutPoint) -> bool {
        let mut inner = self.inner.lock();
        if inner.spent.contains(&outpoint) {
            return false;
        }
        inner.reserved.insert(outpoint)
    }

    /// Releases a reservation that will not be spent after all.
    pub fn release(&self, outpoint: &OutPoint) {
        self.inner.lock().reserved.shift_remove(outpoint);
    }

    /// Records every input of a broadcast transaction as spent.
    pub fn mark_tx_spends(&self, tx: &Transaction) {
        let mut inner = self.inner.lock();
        for input in &tx.input {
            inner.reserved.shift_remove(&input.previous_output);
            inner.spent.insert(input.previous_output);
        }
    }

    pub fn block_height(&self) -> u64 {
        self.inner.lock().block_height
    }

    /// Updates the ledger's view of the tracker height. Once the tracker
    /// has advanced far enough past the last reset, every recorded spend
    /// has long been reflected by the tracker itself and the set is
    /// cleared.
    pub fn update_block_height(&self, height: u64) {
        let mut inner = self.inner.lock();
        if height > inner.block_height + RESET_DEPTH {
            inner.spent.clear();
            inner.reserved.clear();
        }
        if height > inner.block_height {
            inner.block_height = height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::Txid;

    fn outpoint(n: u8) -> OutPoint {
        OutPoint::new(Txid::from_byte_array([n; 32]), 0)
    }

    #[test]
    fn reservation_is_exclusive() {
        let ledger = SpendLedger::new();
        assert!(ledger.reserve(outpoint(1)));
        assert!(!ledger.reserve(outpoint(1)));

        ledger.release(&outpoint(1));
        assert!(ledger.reserve(outpoint(1)));
    }

    #[test]
    fn spent_outpoints_cannot_be_reserved() {
        let ledger = SpendLedger::new();
        let tx = Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: bitcoin::absolute::LockTime::ZERO,
            input: vec![bitcoin::TxIn {
                previous_output: outpoint(2),
                script_sig: bitcoin::ScriptBuf::new(),
                sequence: bitcoin::Sequence::MAX,
                witness: bitcoin::Witness::new(),
            }],
            output: vec![],
        };

        ledger.mark_tx_spends(&tx);
        assert!(!ledger.is_unspent(&outpoint(2)));
        assert!(!ledger.reserve(outpoint(2)));
    }

    #[test]
    fn deep_height_advance_resets_the_ledger() {
        let ledger = SpendLedger::new();
        ledger.update_block_height(1_000);
        assert!(ledger.reserve(outpoint(3)));

        // A shallow advance keeps the state.
        ledger.update_block_height(1_050);
        assert!(!ledger.reserve(outpoint(3)));

        // A deep advance clears it.
        ledger.update_block_height(1_151);
        assert!(ledger.reserve(outpoint(3)));
        assert_eq!(ledger.block_height(), 1_151);
    }
}
