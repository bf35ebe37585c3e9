//! # Tapmint Tracker Client
//!
//! Typed HTTP client for the tracker service that indexes collections,
//! minter UTXOs, and NFT ownership, and proxies raw-transaction fetch and
//! broadcast. Implements the engine's provider traits so the engine itself
//! never sees HTTP.

mod types;

pub use self::types::{MinterUtxoDto, NftUtxoDto, TrackerStatus, UtxoDto};

use self::types::{
    AddressUtxosData, BroadcastData, Envelope, MinterUtxosData, NftUtxoData,
    OwnerCollectionsData, OwnerUtxosData, RawTxData,
};
use bitcoin::consensus::encode::{deserialize, serialize};
use bitcoin::{Amount, ScriptBuf, Transaction, Txid};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tapmint_engine::{
    Broadcaster, ChainSource, MinterHandle, MinterPage, MinterProvider, ProviderError,
};
use tapmint_primitives::{CollectionInfo, ProtocolState, StateHash, Utxo};

/// Tracker client error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport failure: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Tracker error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("Failed to decode tracker response: {0}")]
    Decode(String),
}

impl From<Error> for ProviderError {
    fn from(err: Error) -> Self {
        match err {
            Error::Http(err) => ProviderError::Transport(err.to_string()),
            Error::Api { code, msg } => ProviderError::Api(format!("{code}: {msg}")),
            Error::Decode(msg) => ProviderError::Decode(msg),
        }
    }
}

/// HTTP client for one tracker instance.
#[derive(Debug, Clone)]
pub struct TrackerClient {
    client: reqwest::Client,
    base_url: String,
}

impl TrackerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// GETs `path` and unwraps the `{code, msg, data}` envelope. A null
    /// `data` on success maps to `None`.
    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, Error> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "Tracker request");
        let envelope: Envelope<T> = self.client.get(&url).send().await?.json().await?;
        if envelope.code != 0 {
            return Err(Error::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        Ok(envelope.data)
    }

    /// Same as [`Self::get_data`] but treats a null `data` as a decode
    /// failure.
    async fn get_required<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get_data(path)
            .await?
            .ok_or_else(|| Error::Decode(format!("empty response data for {path}")))
    }

    /// Tracker and node sync heights.
    pub async fn status(&self) -> Result<TrackerStatus, Error> {
        self.get_required("/api").await
    }

    /// Collection lookup by id; `None` if the tracker has not indexed it.
    pub async fn collection(&self, collection_id: &str) -> Result<Option<CollectionInfo>, Error> {
        self.get_data(&format!("/api/collections/{collection_id}"))
            .await
    }

    /// Paginated listing of a collection's live minter outputs.
    pub async fn minter_utxos(
        &self,
        collection_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<MinterUtxoDto>, u64), Error> {
        let data: MinterUtxosData = self
            .get_required(&format!(
                "/api/minters/{collection_id}/utxos?limit={limit}&offset={offset}"
            ))
            .await?;
        Ok((data.utxos, data.tracker_block_height))
    }

    /// The UTXO currently holding a specific token of a collection.
    pub async fn nft_utxo(
        &self,
        collection_id: &str,
        local_id: u64,
    ) -> Result<Option<NftUtxoDto>, Error> {
        let data: NftUtxoData = self
            .get_required(&format!(
                "/api/collections/{collection_id}/localId/{local_id}/utxo"
            ))
            .await?;
        Ok(data.utxo)
    }

    /// All NFTs of a collection held by `owner`.
    pub async fn owner_nft_utxos(
        &self,
        collection_id: &str,
        owner: &str,
    ) -> Result<(Vec<NftUtxoDto>, u64), Error> {
        let data: OwnerUtxosData = self
            .get_required(&format!(
                "/api/collections/{collection_id}/addresses/{owner}/utxos"
            ))
            .await?;
        Ok((data.utxos, data.tracker_block_height))
    }

    /// Ids of the collections `owner` holds tokens of.
    pub async fn collections_by_owner(&self, owner: &str) -> Result<Vec<String>, Error> {
        let data: OwnerCollectionsData = self
            .get_required(&format!("/api/addresses/{owner}/collections"))
            .await?;
        Ok(data
            .collections
            .into_iter()
            .map(|entry| entry.collection_id)
            .collect())
    }

    /// Raw transaction with its confirmation count.
    pub async fn raw_transaction(&self, txid: Txid) -> Result<(Transaction, u32), Error> {
        let data: RawTxData = self.get_required(&format!("/api/tx/{txid}")).await?;
        let bytes = hex::decode(&data.hex)
            .map_err(|err| Error::Decode(format!("bad raw tx hex: {err}")))?;
        let tx = deserialize(&bytes)
            .map_err(|err| Error::Decode(format!("bad raw tx encoding: {err}")))?;
        Ok((tx, data.confirmations))
    }

    /// Submits a raw transaction for broadcast.
    pub async fn broadcast_raw(&self, tx: &Transaction) -> Result<Txid, Error> {
        let url = format!("{}/api/tx/broadcast", self.base_url);
        let payload = serde_json::json!({ "rawtx": hex::encode(serialize(tx)) });
        let envelope: Envelope<BroadcastData> = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;
        if envelope.code != 0 {
            return Err(Error::Api {
                code: envelope.code,
                msg: envelope.msg,
            });
        }
        let data = envelope
            .data
            .ok_or_else(|| Error::Decode("empty broadcast response".to_string()))?;
        data.txid
            .parse()
            .map_err(|err| Error::Decode(format!("bad broadcast txid: {err}")))
    }
}

/// Converts a tracker UTXO record into the engine's shape.
pub fn utxo_from_dto(dto: &UtxoDto) -> Result<Utxo, Error> {
    let txid: Txid = dto
        .tx_id
        .parse()
        .map_err(|err| Error::Decode(format!("bad txid {:?}: {err}", dto.tx_id)))?;
    let script = hex::decode(&dto.script)
        .map_err(|err| Error::Decode(format!("bad script hex: {err}")))?;
    Ok(Utxo {
        txid,
        vout: dto.output_index,
        script_pubkey: ScriptBuf::from_bytes(script),
        value: Amount::from_sat(dto.satoshis),
    })
}

fn state_hashes(hashes: &[String]) -> Result<Vec<StateHash>, Error> {
    hashes
        .iter()
        .map(|hash| {
            hash.parse()
                .map_err(|err| Error::Decode(format!("bad state hash {hash:?}: {err}")))
        })
        .collect()
}

fn minter_handle(dto: MinterUtxoDto) -> Result<MinterHandle, Error> {
    Ok(MinterHandle {
        utxo: utxo_from_dto(&dto.utxo)?,
        protocol_state: ProtocolState::from_hash_list(state_hashes(&dto.txo_state_hashes)?),
        state: dto.state,
    })
}

#[async_trait::async_trait]
impl ChainSource for TrackerClient {
    async fn raw_transaction(&self, txid: Txid) -> Result<Transaction, ProviderError> {
        let (tx, _) = self.raw_transaction(txid).await?;
        Ok(tx)
    }

    async fn confirmations(&self, txid: Txid) -> Result<u32, ProviderError> {
        let (_, confirmations) = self.raw_transaction(txid).await?;
        Ok(confirmations)
    }

    async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>, ProviderError> {
        let data: AddressUtxosData = self
            .get_required(&format!("/api/addresses/{address}/utxos"))
            .await
            .map_err(ProviderError::from)?;
        data.utxos
            .iter()
            .map(|dto| utxo_from_dto(dto).map_err(ProviderError::from))
            .collect()
    }
}

#[async_trait::async_trait]
impl Broadcaster for TrackerClient {
    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, ProviderError> {
        self.broadcast_raw(tx).await.map_err(ProviderError::from)
    }
}

#[async_trait::async_trait]
impl MinterProvider for TrackerClient {
    async fn collection(
        &self,
        collection_id: &str,
    ) -> Result<Option<CollectionInfo>, ProviderError> {
        self.collection(collection_id)
            .await
            .map_err(ProviderError::from)
    }

    async fn minter_utxos(
        &self,
        collection_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<MinterPage, ProviderError> {
        let (dtos, tracker_height) = self
            .minter_utxos(collection_id, limit, offset)
            .await
            .map_err(ProviderError::from)?;
        let minters = dtos
            .into_iter()
            .map(|dto| minter_handle(dto).map_err(ProviderError::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MinterPage {
            minters,
            tracker_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapmint_primitives::MinterState;

    #[test]
    fn utxo_conversion_round_trips() {
        let dto = UtxoDto {
            tx_id: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
                .to_string(),
            output_index: 1,
            script: "51".to_string(),
            satoshis: 331,
        };
        let utxo = utxo_from_dto(&dto).unwrap();
        assert_eq!(utxo.vout, 1);
        assert_eq!(utxo.value.to_sat(), 331);
        assert_eq!(utxo.script_pubkey.as_bytes(), &[0x51]);
    }

    #[test]
    fn minter_handle_verifies_against_committed_hashes() {
        let state = MinterState::Closed {
            quota_max_local_id: 5,
            next_local_id: 0,
        };
        let protocol_state =
            ProtocolState::from_outputs(&[state.to_state_bytes()]).unwrap();
        let dto = MinterUtxoDto {
            utxo: UtxoDto {
                tx_id: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
                    .to_string(),
                output_index: 1,
                script: "51".to_string(),
                satoshis: 331,
            },
            txo_state_hashes: protocol_state
                .hash_list()
                .iter()
                .map(|hash| hash.to_string())
                .collect(),
            state,
        };

        let handle = minter_handle(dto).unwrap();
        handle.verify().unwrap();
    }

    #[test]
    fn bad_state_hash_is_a_decode_error() {
        assert!(state_hashes(&["zz".to_string()]).is_err());
    }
}
