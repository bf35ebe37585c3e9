use bitcoin::{Amount, OutPoint, ScriptBuf, TxOut, Txid};
use serde::{Deserialize, Serialize};

/// An unspent transaction output tracked by the minting engine.
///
/// Unlike a bare [`TxOut`], a `Utxo` remembers where it lives on chain so it
/// can be spent later. Once consumed by a transaction it is logically
/// destroyed and replaced by that transaction's own outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// The transaction that created this output.
    pub txid: Txid,
    /// The output index within the transaction.
    pub vout: u32,
    /// The locking script of the output.
    pub script_pubkey: ScriptBuf,
    /// The output value.
    pub value: Amount,
}

impl Utxo {
    /// Builds a `Utxo` record for output `vout` of transaction `txid`.
    pub fn from_txout(txid: Txid, vout: u32, txout: &TxOut) -> Self {
        Self {
            txid,
            vout,
            script_pubkey: txout.script_pubkey.clone(),
            value: txout.value,
        }
    }

    /// The outpoint referencing this output.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }

    /// The output as it appears on chain.
    pub fn to_txout(&self) -> TxOut {
        TxOut {
            value: self.value,
            script_pubkey: self.script_pubkey.clone(),
        }
    }
}
