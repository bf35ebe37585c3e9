use serde::{Deserialize, Serialize};

/// The minter state-machine variant of a collection.
///
/// The on-chain record stores a free-form identity string; it is resolved
/// into this enum exactly once, at the deserialization boundary
/// ([`MinterKind::from_ident`]). Everything downstream dispatches on the
/// enum, never on the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinterKind {
    Open,
    Closed,
    ParallelClosed,
}

impl MinterKind {
    /// Resolves a recorded minter identity string, or `None` if it names no
    /// known variant.
    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "open_minter" => Some(Self::Open),
            "closed_minter" => Some(Self::Closed),
            "parallel_closed_minter" => Some(Self::ParallelClosed),
            _ => None,
        }
    }

    /// The canonical identity string recorded on deploy.
    pub fn ident(&self) -> &'static str {
        match self {
            Self::Open => "open_minter",
            Self::Closed => "closed_minter",
            Self::ParallelClosed => "parallel_closed_minter",
        }
    }
}

/// Immutable description of a collection, fixed at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    /// Total number of mintable slots. Serialized as a decimal string to
    /// preserve arbitrary precision across the store and tracker boundary.
    #[serde(with = "dec_string")]
    pub max: u64,
    /// Number of slots reserved for the deployer, minted first.
    #[serde(with = "dec_string", default)]
    pub premine: u64,
    /// Recorded minter identity, resolved via [`MinterKind::from_ident`].
    pub minter_ident: String,
}

impl CollectionMetadata {
    /// The resolved minter variant, if the recorded identity is known.
    pub fn minter_kind(&self) -> Option<MinterKind> {
        MinterKind::from_ident(&self.minter_ident)
    }
}

/// A deployed collection as persisted in the local store and indexed by the
/// tracker. Read-only after creation; identified by `collection_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    /// Genesis outpoint identifier, `<txid>_<vout>`.
    pub collection_id: String,
    /// P2TR address of the token contract.
    pub collection_addr: String,
    /// P2TR address of the minter contract.
    pub minter_addr: String,
    pub metadata: CollectionMetadata,
    pub genesis_txid: String,
    pub reveal_txid: String,
    /// Deploy time, milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Decimal-string (de)serialization for supply-sized integers.
mod dec_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> CollectionMetadata {
        CollectionMetadata {
            name: "Wombats".to_string(),
            symbol: "WMB".to_string(),
            description: "A test collection".to_string(),
            max: 10_000,
            premine: 100,
            minter_ident: "open_minter".to_string(),
        }
    }

    #[test]
    fn supply_fields_serialize_as_decimal_strings() {
        let json = serde_json::to_value(metadata()).unwrap();
        assert_eq!(json["max"], "10000");
        assert_eq!(json["premine"], "100");

        let back: CollectionMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back.max, 10_000);
        assert_eq!(back.premine, 100);
    }

    #[test]
    fn minter_ident_resolution() {
        assert_eq!(
            MinterKind::from_ident("parallel_closed_minter"),
            Some(MinterKind::ParallelClosed)
        );
        assert_eq!(MinterKind::from_ident("d41d8cd98f00b204"), None);
        assert_eq!(metadata().minter_kind(), Some(MinterKind::Open));
    }
}
