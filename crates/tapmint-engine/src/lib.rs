//! # Tapmint Minting Engine
//!
//! The minting transaction engine: it allocates the next mintable slot under
//! one of three minter state-machine variants, builds and fee-sizes the
//! commit and reveal transactions through a two-pass estimation protocol,
//! assembles witness data including the lineage backtrace, and advances the
//! on-chain minter state deterministically.
//!
//! ## Collaborators
//!
//! The engine performs no network or key-storage work of its own. Chain
//! data, broadcasting, and minter discovery arrive through the provider
//! traits below; locking scripts, witness stacks, and signatures come from
//! the script layer. This keeps the whole engine testable against in-memory
//! fakes.
//!
//! ## Concurrency
//!
//! "Concurrent" minting lanes are interleaved I/O-bound tasks, not parallel
//! threads. The spend ledger is the only cross-lane mutable resource; every
//! fee UTXO is reserved through it before use so two lanes can never claim
//! the same output.

mod allocation;
mod backtrace;
mod builder;
mod minter;
mod scheduler;
mod spend;
mod split;
mod store;
mod wallet;

pub use self::allocation::{
    build_collection_tree, AllocationTree, Direction, MerkleLeaf, MerklePath, SlotResource,
};
pub use self::backtrace::{resolve_backtrace, BacktraceInfo};
pub use self::builder::{MintEngine, MintOutcome, MintRequest};
pub use self::minter::{plan_mint, MintPlan};
pub use self::scheduler::{
    run_closed_mint, wait_for_confirmation, MintSummary, ResourceLoader, SchedulerConfig,
};
pub use self::spend::SpendLedger;
pub use self::split::split_fee_utxos;
pub use self::store::CollectionStore;
pub use self::wallet::Wallet;

use bitcoin::{Transaction, Txid};
use tapmint_primitives::{CollectionInfo, MinterState, ProtocolState, Utxo};

/// Failure reported by an external data provider.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Tracker rejected the request: {0}")]
    Api(String),
    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

/// Which broadcast of the commit/reveal pair failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastStage {
    Commit,
    Reveal,
    Split,
}

impl std::fmt::Display for BroadcastStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commit => write!(f, "commit"),
            Self::Reveal => write!(f, "reveal"),
            Self::Split => write!(f, "split"),
        }
    }
}

/// Engine error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Fee or dust shortfall. Terminal for the attempt; never retried
    /// automatically.
    #[error("Insufficient funds: {required} required, {available} available")]
    InsufficientFunds {
        required: bitcoin::Amount,
        available: bitcoin::Amount,
    },
    /// An ancestor transaction or tracker record could not be retrieved.
    /// Propagated to the caller; retry policy belongs to outer loops.
    #[error("Data unavailable: {0}")]
    DataUnavailable(#[source] ProviderError),
    /// The collection's recorded minter identity names no known variant.
    #[error("Unknown minter variant: {0:?}")]
    UnknownMinterVariant(String),
    /// The local interpreter rejected an assembled witness. Fatal; the
    /// transaction must not be broadcast.
    #[error("Script verification failed: {0}")]
    ScriptVerificationFailed(String),
    /// Allocation tree misuse; a programming error at the call site.
    #[error("Slot index {index} out of range, the collection max is {max}")]
    IndexOutOfRange { index: u64, max: u64 },
    /// The reconstructed minter locking script does not match the on-chain
    /// minter output.
    #[error("Minter script mismatch for output {0}")]
    MinterScriptMismatch(bitcoin::OutPoint),
    /// Open-mint operations need the collection's slot allocation tree.
    #[error("Open-mint collections require the slot allocation tree")]
    MissingAllocationTree,
    #[error(transparent)]
    Encoding(#[from] tapmint_primitives::EncodingError),
    #[error("Script layer failure: {0}")]
    Script(#[from] tapmint_script::Error),
    /// A broadcast failed. `commit_txid` is set when the commit transaction
    /// was already accepted, so the operator can complete or abandon the
    /// pair manually; no automatic compensation exists.
    #[error("Broadcast of the {stage} transaction failed (commit already broadcast: {commit_txid:?}): {source}")]
    Broadcast {
        stage: BroadcastStage,
        commit_txid: Option<Txid>,
        #[source]
        source: ProviderError,
    },
    #[error("Collection store failure: {0}")]
    Store(String),
    #[error("Wallet failure: {0}")]
    Wallet(String),
    /// Confirmation polling exhausted its attempt budget.
    #[error("Transaction {0} not confirmed within the polling budget")]
    ConfirmationTimeout(Txid),
}

/// Read access to raw chain data.
#[async_trait::async_trait]
pub trait ChainSource: Send + Sync {
    /// Fetches a raw transaction by id.
    async fn raw_transaction(&self, txid: Txid) -> Result<Transaction, ProviderError>;

    /// Number of confirmations of `txid`; zero while unconfirmed.
    async fn confirmations(&self, txid: Txid) -> Result<u32, ProviderError>;

    /// Spendable fee UTXOs of an address.
    async fn address_utxos(&self, address: &str) -> Result<Vec<Utxo>, ProviderError>;
}

/// Submission of raw transactions to the network.
#[async_trait::async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, tx: &Transaction) -> Result<Txid, ProviderError>;
}

/// Discovery of collections and their live minter outputs.
#[async_trait::async_trait]
pub trait MinterProvider: Send + Sync {
    async fn collection(&self, collection_id: &str)
        -> Result<Option<CollectionInfo>, ProviderError>;

    async fn minter_utxos(
        &self,
        collection_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<MinterPage, ProviderError>;
}

/// One page of live minter outputs.
#[derive(Debug, Clone)]
pub struct MinterPage {
    pub minters: Vec<MinterHandle>,
    /// The tracker's indexed block height at response time.
    pub tracker_height: u64,
}

/// A live minter output together with its claimed state.
///
/// The state is tracker-indexed and untrusted until [`MinterHandle::verify`]
/// has checked it against the state hash committed for the output.
#[derive(Debug, Clone)]
pub struct MinterHandle {
    pub utxo: Utxo,
    pub protocol_state: ProtocolState,
    pub state: MinterState,
}

impl MinterHandle {
    /// Verifies the claimed minter state against the hash committed for
    /// this output in its creating transaction.
    ///
    /// Minter outputs always follow the leading state commitment output, so
    /// the carried-output index is `vout - 1`.
    pub fn verify(&self) -> Result<(), Error> {
        let index = self
            .utxo
            .vout
            .checked_sub(1)
            .ok_or_else(|| state_mismatch(&self.utxo))?;
        if !self
            .protocol_state
            .matches_output(index as usize, &self.state.to_state_bytes())
        {
            return Err(state_mismatch(&self.utxo));
        }
        Ok(())
    }
}

fn state_mismatch(utxo: &Utxo) -> Error {
    Error::DataUnavailable(ProviderError::Decode(format!(
        "minter state for {} does not match the committed state hash",
        utxo.outpoint()
    )))
}
