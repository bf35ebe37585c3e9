//! Fixed postage amounts for protocol-significant outputs.
//!
//! These are protocol parameters, not tunables: the spending contracts check
//! the exact satoshi value of each output kind and reject transactions that
//! deviate.

use bitcoin::Amount;

/// Value of the collection metadata commitment output.
pub const METADATA_POSTAGE: Amount = Amount::from_sat(546);

/// Value of a guard output.
pub const GUARD_POSTAGE: Amount = Amount::from_sat(332);

/// Value of a minter output.
pub const MINTER_POSTAGE: Amount = Amount::from_sat(331);

/// Value of a token output.
pub const TOKEN_POSTAGE: Amount = Amount::from_sat(330);

/// Value of an NFT content commitment output.
pub const NFT_POSTAGE: Amount = Amount::from_sat(333);

/// Smallest change output the engine will create.
pub const CHANGE_MIN_POSTAGE: Amount = Amount::from_sat(546);
