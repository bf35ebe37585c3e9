use crate::metadata::MinterKind;
use crate::state::StateRoot;
use bitcoin::hashes::Hash;
use serde::{Deserialize, Serialize};

/// The on-chain state of a minter output.
///
/// Exactly one variant is active per collection; the variant never changes
/// over the collection's lifetime. The state is forwarded UTXO-to-UTXO: each
/// mint consumes one minter output and produces the successor states
/// computed by the engine's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum MinterState {
    /// Open mint: anyone can claim the next slot, proven against the
    /// allocation tree root.
    Open {
        /// Root of the slot allocation tree after all mined leaves so far.
        merkle_root: StateRoot,
        /// The next slot to be minted. Strictly increases by one per mint.
        next_local_id: u64,
    },
    /// Closed mint: a single linear chain bounded by a quota.
    Closed {
        /// First local id outside this minter's quota.
        quota_max_local_id: u64,
        /// The next slot to be minted, always below the quota while active.
        next_local_id: u64,
    },
    /// Closed mint that fans out: slot `n` spawns minters for slots
    /// `2n + 1` and `2n + 2`, bounded by the collection max.
    ParallelClosed {
        /// The slot this minter will mint.
        next_local_id: u64,
    },
}

impl MinterState {
    const OPEN_STATE_TAG: u8 = 0x11;
    const CLOSED_STATE_TAG: u8 = 0x12;
    const PARALLEL_CLOSED_STATE_TAG: u8 = 0x13;

    /// The variant this state belongs to.
    pub fn kind(&self) -> MinterKind {
        match self {
            Self::Open { .. } => MinterKind::Open,
            Self::Closed { .. } => MinterKind::Closed,
            Self::ParallelClosed { .. } => MinterKind::ParallelClosed,
        }
    }

    /// The slot the next mint from this minter will claim.
    pub fn next_local_id(&self) -> u64 {
        match *self {
            Self::Open { next_local_id, .. }
            | Self::Closed { next_local_id, .. }
            | Self::ParallelClosed { next_local_id } => next_local_id,
        }
    }

    /// Serializes the state for hashing into the protocol state commitment.
    pub fn to_state_bytes(&self) -> Vec<u8> {
        match *self {
            Self::Open {
                merkle_root,
                next_local_id,
            } => {
                let mut bytes = Vec::with_capacity(41);
                bytes.push(Self::OPEN_STATE_TAG);
                bytes.extend_from_slice(merkle_root.as_byte_array());
                bytes.extend_from_slice(&next_local_id.to_le_bytes());
                bytes
            }
            Self::Closed {
                quota_max_local_id,
                next_local_id,
            } => {
                let mut bytes = Vec::with_capacity(17);
                bytes.push(Self::CLOSED_STATE_TAG);
                bytes.extend_from_slice(&quota_max_local_id.to_le_bytes());
                bytes.extend_from_slice(&next_local_id.to_le_bytes());
                bytes
            }
            Self::ParallelClosed { next_local_id } => {
                let mut bytes = Vec::with_capacity(9);
                bytes.push(Self::PARALLEL_CLOSED_STATE_TAG);
                bytes.extend_from_slice(&next_local_id.to_le_bytes());
                bytes
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::sha256;

    #[test]
    fn state_bytes_are_tagged_per_variant() {
        let open = MinterState::Open {
            merkle_root: sha256::Hash::all_zeros(),
            next_local_id: 0,
        };
        let closed = MinterState::Closed {
            quota_max_local_id: 2,
            next_local_id: 0,
        };
        let parallel = MinterState::ParallelClosed { next_local_id: 0 };

        assert_eq!(open.to_state_bytes()[0], 0x11);
        assert_eq!(closed.to_state_bytes()[0], 0x12);
        assert_eq!(parallel.to_state_bytes()[0], 0x13);
    }

    #[test]
    fn kind_follows_variant() {
        let closed = MinterState::Closed {
            quota_max_local_id: 10,
            next_local_id: 3,
        };
        assert_eq!(closed.kind(), MinterKind::Closed);
        assert_eq!(closed.next_local_id(), 3);
    }

    #[test]
    fn serde_tags_by_kind() {
        let parallel = MinterState::ParallelClosed { next_local_id: 4 };
        let json = serde_json::to_string(&parallel).unwrap();
        assert!(json.contains("\"parallel_closed\""));
        let back: MinterState = serde_json::from_str(&json).unwrap();
        assert_eq!(parallel, back);
    }
}
