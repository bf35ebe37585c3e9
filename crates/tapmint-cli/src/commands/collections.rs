use crate::config::Config;
use anyhow::Result;
use tapmint_engine::Wallet;
use tapmint_tracker::TrackerClient;

/// List collections and holdings of an owner.
#[derive(Debug, clap::Args)]
pub struct CollectionsCommand {
    /// Owner token address to query; defaults to the wallet's own.
    #[arg(short, long)]
    owner: Option<String>,
}

impl CollectionsCommand {
    pub async fn run(self, config: Config) -> Result<()> {
        let tracker = TrackerClient::new(&config.tracker)?;
        let owner = match self.owner {
            Some(owner) => owner,
            None => Wallet::from_wif(&config.wif, config.network)?
                .token_address()
                .to_string(),
        };

        let collection_ids = tracker.collections_by_owner(&owner).await?;
        if collection_ids.is_empty() {
            println!("No collections held by {owner}");
            return Ok(());
        }

        for collection_id in collection_ids {
            let Some(info) = tracker.collection(&collection_id).await? else {
                tracing::warn!(collection_id, "Collection listed but not indexed");
                continue;
            };
            let (nfts, _) = tracker.owner_nft_utxos(&collection_id, &owner).await?;
            let local_ids = nfts
                .iter()
                .map(|nft| nft.state.local_id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "{} [{}] {}/{} minted slots held: {}",
                info.metadata.name,
                info.metadata.symbol,
                nfts.len(),
                info.metadata.max,
                local_ids
            );
        }
        Ok(())
    }
}
