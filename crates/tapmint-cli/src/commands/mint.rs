use crate::config::Config;
use crate::resource::DirResourceLoader;
use anyhow::{bail, Context, Result};
use bitcoin::hashes::{hash160, Hash};
use bitcoin::Address;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tapmint_engine::{
    build_collection_tree, run_closed_mint, CollectionStore, MintEngine, MintRequest,
    MinterHandle, MinterProvider, ResourceLoader, SchedulerConfig, SpendLedger, Wallet,
};
use tapmint_primitives::{MinterKind, TokenAddress};
use tapmint_tracker::TrackerClient;

/// Mint NFTs from a deployed collection.
#[derive(Debug, clap::Args)]
pub struct MintCommand {
    /// Collection id (`<txid>_<vout>` of the genesis outpoint).
    #[arg(short, long)]
    id: String,

    /// Directory holding per-slot content and metadata files.
    #[arg(short, long, default_value = "resource")]
    resource: PathBuf,

    /// Content type of the resource files.
    #[arg(short = 't', long, default_value = "image/png")]
    content_type: String,

    /// Mint into this owner (token address hex or a taproot address).
    #[arg(short, long)]
    owner: Option<String>,
}

impl MintCommand {
    pub async fn run(self, config: Config) -> Result<()> {
        let tracker = TrackerClient::new(&config.tracker)?;
        let wallet = Arc::new(Wallet::from_wif(&config.wif, config.network)?);
        let store = CollectionStore::new(&config.data_dir);

        let collection = store
            .find_or_fetch(&tracker, &self.id)
            .await?
            .with_context(|| format!("no collection info found for {}", self.id))?;
        let kind = collection
            .metadata
            .minter_kind()
            .with_context(|| {
                format!(
                    "unknown minter variant {:?} recorded for {}",
                    collection.metadata.minter_ident, self.id
                )
            })?;

        let owner = self.owner.as_deref().map(parse_owner).transpose()?;
        let loader = DirResourceLoader::new(self.resource.clone(), self.content_type.clone())?;

        let engine = MintEngine::new(
            wallet.clone(),
            Arc::new(tracker.clone()),
            Arc::new(tracker.clone()),
            Arc::new(SpendLedger::new()),
            config.fee_rate,
            config.verify,
        );

        match kind {
            MinterKind::Closed => {
                let cancel = Arc::new(AtomicBool::new(false));
                tokio::spawn({
                    let cancel = cancel.clone();
                    async move {
                        if tokio::signal::ctrl_c().await.is_ok() {
                            tracing::info!("Interrupted, finishing in-flight lanes");
                            cancel.store(true, Ordering::Relaxed);
                        }
                    }
                });

                let summary = run_closed_mint(
                    &engine,
                    &tracker,
                    &collection,
                    &loader,
                    owner,
                    &SchedulerConfig::default(),
                    cancel,
                )
                .await?;
                println!(
                    "Minted {} {} NFT(s) over {} round(s)",
                    summary.minted, collection.metadata.symbol, summary.rounds
                );
            }
            MinterKind::Open => {
                let minter = first_minter(&tracker, &self.id).await?;
                let slot = minter.state.next_local_id();

                let resources = loader.load_all(collection.metadata.max)?;
                let mut tree =
                    build_collection_tree(&wallet.xonly_public_key(), &resources)?;
                tree.sync_mined(slot);

                let outcome = engine
                    .mint(
                        MintRequest {
                            collection: collection.clone(),
                            minter,
                            fee_utxos: fee_utxos(&engine).await?,
                            resource: loader.load(slot)?,
                            owner,
                        },
                        Some(&mut tree),
                    )
                    .await?;
                println!(
                    "Minted {}:{} in txid {}",
                    collection.metadata.symbol, outcome.token.local_id, outcome.reveal_txid
                );
            }
            MinterKind::ParallelClosed => {
                let minter = first_minter(&tracker, &self.id).await?;
                let slot = minter.state.next_local_id();

                let outcome = engine
                    .mint(
                        MintRequest {
                            collection: collection.clone(),
                            minter,
                            fee_utxos: fee_utxos(&engine).await?,
                            resource: loader.load(slot)?,
                            owner,
                        },
                        None,
                    )
                    .await?;
                println!(
                    "Minted {}:{} in txid {}",
                    collection.metadata.symbol, outcome.token.local_id, outcome.reveal_txid
                );
            }
        }
        Ok(())
    }
}

async fn first_minter(tracker: &TrackerClient, collection_id: &str) -> Result<MinterHandle> {
    let page = MinterProvider::minter_utxos(tracker, collection_id, 100, 0).await?;
    page.minters
        .into_iter()
        .next()
        .with_context(|| format!("no live minter found for {collection_id}"))
}

async fn fee_utxos(engine: &MintEngine) -> Result<Vec<tapmint_primitives::Utxo>> {
    let address = engine.wallet().address().to_string();
    let utxos = engine.chain().address_utxos(&address).await?;
    let utxos = utxos
        .into_iter()
        .filter(|utxo| engine.spends().is_unspent(&utxo.outpoint()))
        .collect::<Vec<_>>();
    if utxos.is_empty() {
        bail!("insufficient satoshis balance");
    }
    Ok(utxos)
}

/// Accepts either a raw 20-byte token address in hex or a taproot address,
/// whose witness program hashes into the token address.
fn parse_owner(input: &str) -> Result<TokenAddress> {
    if let Ok(addr) = TokenAddress::from_str(input) {
        return Ok(addr);
    }

    let address = Address::from_str(input)
        .map(|address| address.assume_checked())
        .with_context(|| format!("invalid owner address {input:?}"))?;
    let script = address.script_pubkey();
    if !script.is_p2tr() {
        bail!("owner address must be taproot, got {input:?}");
    }
    let program = &script.as_bytes()[2..];
    Ok(TokenAddress::from_bytes(
        hash160::Hash::hash(program).to_byte_array(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_accepts_hex_token_addresses() {
        let addr = parse_owner(&"ab".repeat(20)).unwrap();
        assert_eq!(addr, TokenAddress::from_bytes([0xab; 20]));
    }

    #[test]
    fn owner_rejects_garbage() {
        assert!(parse_owner("not-an-address").is_err());
    }
}
