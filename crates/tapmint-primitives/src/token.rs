use bitcoin::hashes::{hash160, Hash};
use bitcoin::XOnlyPublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol-level owner identifier: the hash160 of the owner's x-only
/// public key. This is what token states record, independent of how the
/// owner's on-chain address is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenAddress([u8; 20]);

impl TokenAddress {
    /// Derives the token address of a public key.
    pub fn from_xonly(key: &XOnlyPublicKey) -> Self {
        Self(hash160::Hash::hash(&key.serialize()).to_byte_array())
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for TokenAddress {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for TokenAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The immutable state of one minted token.
///
/// `local_id` uniquely identifies the token within its collection; no two
/// tokens of a collection ever share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenState {
    /// The owner the token was minted to.
    pub owner: TokenAddress,
    /// The slot this token occupies within the collection.
    pub local_id: u64,
}

impl TokenState {
    /// Tag byte prefixing a serialized token state.
    const STATE_TAG: u8 = 0x01;

    /// Serializes the state for hashing into the protocol state commitment.
    pub fn to_state_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(29);
        bytes.push(Self::STATE_TAG);
        bytes.extend_from_slice(self.owner.as_bytes());
        bytes.extend_from_slice(&self.local_id.to_le_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_address_hex_round_trip() {
        let addr = TokenAddress::from_bytes([7u8; 20]);
        let parsed: TokenAddress = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn state_bytes_pin_owner_and_local_id() {
        let a = TokenState {
            owner: TokenAddress::from_bytes([1u8; 20]),
            local_id: 5,
        };
        let b = TokenState { local_id: 6, ..a };
        assert_ne!(a.to_state_bytes(), b.to_state_bytes());
        assert_eq!(a.to_state_bytes().len(), 29);
    }
}
