//! # Tapmint Script Layer
//!
//! Locking-script templates and low-level signing primitives consumed by the
//! minting engine: NFT content commit envelopes, parameterized minter
//! tapscripts, pay-to-taproot wrapping with control blocks, the fixed
//! witness stack layout, BIP-341 sighash computation and Schnorr signing,
//! and an optional local script verification hook.
//!
//! The engine treats this crate as a capability interface: it asks for
//! script bytes, witness stacks, and signatures, and never inspects how they
//! are produced.

mod envelope;
mod minter;
mod sign;
mod taproot;
mod verify;
mod witness;

pub use self::envelope::commit_script;
pub use self::minter::{minter_script, MinterScriptParams, ParsedMinterScript};
pub use self::sign::{sign_key_spend_input, sign_script_spend};
pub use self::taproot::{p2tr_address, TaprootSpend};
pub use self::verify::verify_input;
pub use self::witness::mint_witness;

/// Script layer error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to finalize the taproot tree")]
    TaprootFinalize,
    #[error("Taproot tree construction failed: {0}")]
    TaprootBuilder(#[from] bitcoin::taproot::TaprootBuilderError),
    #[error("No control block for the requested leaf")]
    MissingControlBlock,
    #[error("Sighash computation failed: {0}")]
    Sighash(#[from] bitcoin::sighash::TaprootError),
    #[error("Script element exceeds the push size limit: {0} bytes")]
    OversizedPush(usize),
    #[error("Script verification failed: {0}")]
    Verification(String),
    #[error("Invalid address: {0}")]
    Address(String),
}
