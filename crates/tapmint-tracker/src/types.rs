//! Wire shapes of the tracker API.
//!
//! Every endpoint answers with the `{code, msg, data}` envelope; `code` 0 is
//! success, anything else is an application error carrying `msg`. Satoshi
//! amounts may arrive as JSON numbers or decimal strings depending on the
//! tracker build, so the UTXO shape accepts both.

use serde::{Deserialize, Deserializer};
use tapmint_primitives::{MinterState, TokenState};

/// The tracker response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

/// A UTXO as the tracker renders it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoDto {
    pub tx_id: String,
    pub output_index: u32,
    /// Locking script, hex.
    pub script: String,
    #[serde(deserialize_with = "number_or_string")]
    pub satoshis: u64,
}

/// A state-carrying contract output.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinterUtxoDto {
    pub utxo: UtxoDto,
    /// Committed per-output state hashes of the creating transaction, hex.
    pub txo_state_hashes: Vec<String>,
    /// The tracker's decoded minter state. Verified against the committed
    /// hash before the engine trusts it.
    pub state: MinterState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MinterUtxosData {
    pub utxos: Vec<MinterUtxoDto>,
    #[serde(default)]
    pub tracker_block_height: u64,
}

/// An NFT output with its token state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftUtxoDto {
    pub utxo: UtxoDto,
    pub txo_state_hashes: Vec<String>,
    pub state: TokenState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NftUtxoData {
    pub utxo: Option<NftUtxoDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddressUtxosData {
    pub utxos: Vec<UtxoDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OwnerUtxosData {
    pub utxos: Vec<NftUtxoDto>,
    #[serde(default)]
    pub tracker_block_height: u64,
}

/// Tracker/node sync status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStatus {
    pub tracker_block_height: u64,
    pub node_block_height: u64,
    pub latest_block_height: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OwnerCollectionsData {
    pub collections: Vec<OwnerCollectionEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OwnerCollectionEntry {
    pub collection_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTxData {
    /// Raw transaction, hex.
    pub hex: String,
    #[serde(default)]
    pub confirmations: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BroadcastData {
    pub txid: String,
}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::String(value) => value.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satoshis_accept_numbers_and_strings() {
        let number: UtxoDto = serde_json::from_str(
            r#"{"txId": "aa", "outputIndex": 1, "script": "51", "satoshis": 331}"#,
        )
        .unwrap();
        let string: UtxoDto = serde_json::from_str(
            r#"{"txId": "aa", "outputIndex": 1, "script": "51", "satoshis": "331"}"#,
        )
        .unwrap();
        assert_eq!(number.satoshis, 331);
        assert_eq!(string.satoshis, 331);
    }

    #[test]
    fn minter_utxo_decodes_with_tagged_state() {
        let dto: MinterUtxoDto = serde_json::from_str(
            r#"{
                "utxo": {"txId": "aa", "outputIndex": 1, "script": "51", "satoshis": "331"},
                "txoStateHashes": ["00", "11"],
                "state": {"kind": "closed", "quotaMaxLocalId": 5, "nextLocalId": 2}
            }"#,
        )
        .unwrap();
        assert_eq!(
            dto.state,
            MinterState::Closed {
                quota_max_local_id: 5,
                next_local_id: 2
            }
        );
        assert_eq!(dto.txo_state_hashes.len(), 2);
    }

    #[test]
    fn envelope_surfaces_application_errors() {
        let envelope: Envelope<TrackerStatus> =
            serde_json::from_str(r#"{"code": 7, "msg": "not synced", "data": null}"#).unwrap();
        assert_eq!(envelope.code, 7);
        assert_eq!(envelope.msg, "not synced");
        assert!(envelope.data.is_none());
    }
}
