//! # Tapmint Primitives
//!
//! Shared data model for the tapmint minting engine: UTXO records, fixed
//! postage amounts, collection metadata, token and minter state types, and
//! the per-output protocol state codec.
//!
//! Everything in this crate is a pure data transform; nothing here performs
//! I/O or talks to the chain.

mod metadata;
mod minter;
mod outpoint;
mod postage;
mod state;
mod token;
mod utxo;

pub use self::metadata::{CollectionInfo, CollectionMetadata, MinterKind};
pub use self::minter::MinterState;
pub use self::outpoint::{format_outpoint, outpoint_bytes, parse_outpoint, OutpointParseError};
pub use self::postage::{
    CHANGE_MIN_POSTAGE, GUARD_POSTAGE, METADATA_POSTAGE, MINTER_POSTAGE, NFT_POSTAGE,
    TOKEN_POSTAGE,
};
pub use self::state::{
    hash_state, state_script, EncodingError, ProtocolState, StateHash, StateRoot,
    MAX_STATE_ELEMENT_SIZE,
};
pub use self::token::{TokenAddress, TokenState};
pub use self::utxo::Utxo;
