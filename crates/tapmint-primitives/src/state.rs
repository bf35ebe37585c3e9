//! Protocol state codec.
//!
//! Every state-carrying transaction commits to the states of its meaningful
//! outputs: each output's serialized state is hashed individually, the
//! ordered hash list is folded into a single root, and the root is embedded
//! in the transaction's leading OP_RETURN output. Independent verifiers can
//! recompute the root byte-for-byte from the hash list alone.

use bitcoin::hashes::{hash160, sha256, Hash, HashEngine};
use bitcoin::opcodes::all::OP_RETURN;
use bitcoin::script::Builder;
use bitcoin::ScriptBuf;

/// Hash of a single output's serialized state.
pub type StateHash = hash160::Hash;

/// Commitment over the ordered state hash list.
pub type StateRoot = sha256::Hash;

/// Maximum serialized size of a single output state, matching the script
/// element size limit the witness pushes are subject to.
pub const MAX_STATE_ELEMENT_SIZE: usize = 520;

/// Tag prefixing the state commitment output.
const STATE_SCRIPT_TAG: [u8; 2] = *b"tm";

/// State codec failure.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("Serialized output state is {len} bytes, the protocol limit is {MAX_STATE_ELEMENT_SIZE}")]
    OversizedStateElement { len: usize },
}

/// Hashes one output's serialized state.
pub fn hash_state(state: &[u8]) -> Result<StateHash, EncodingError> {
    if state.len() > MAX_STATE_ELEMENT_SIZE {
        return Err(EncodingError::OversizedStateElement { len: state.len() });
    }
    Ok(hash160::Hash::hash(state))
}

/// The ordered per-output state hashes of one transaction and their root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolState {
    hash_list: Vec<StateHash>,
    root: StateRoot,
}

impl ProtocolState {
    /// Computes the hash list and root for the given serialized output
    /// states, in output order.
    pub fn from_outputs<S: AsRef<[u8]>>(outputs: &[S]) -> Result<Self, EncodingError> {
        let hash_list = outputs
            .iter()
            .map(|state| hash_state(state.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_hash_list(hash_list))
    }

    /// Reconstructs the state from an already-computed hash list, e.g. one
    /// returned by the tracker. The root is recomputed, never trusted.
    pub fn from_hash_list(hash_list: Vec<StateHash>) -> Self {
        let root = compute_root(&hash_list);
        Self { hash_list, root }
    }

    /// The per-output state hashes, in output order.
    pub fn hash_list(&self) -> &[StateHash] {
        &self.hash_list
    }

    /// The root committed on chain.
    pub fn root(&self) -> StateRoot {
        self.root
    }

    /// Checks a claimed serialized state against the hash committed for the
    /// carried output at `index`.
    pub fn matches_output(&self, index: usize, state: &[u8]) -> bool {
        match (self.hash_list.get(index), hash_state(state)) {
            (Some(committed), Ok(claimed)) => *committed == claimed,
            _ => false,
        }
    }
}

/// Folds the ordered hash list into the root commitment.
fn compute_root(hash_list: &[StateHash]) -> StateRoot {
    let mut engine = sha256::Hash::engine();
    for hash in hash_list {
        engine.input(hash.as_byte_array());
    }
    sha256::Hash::from_engine(engine)
}

/// Builds the OP_RETURN output script carrying the state commitment.
pub fn state_script(state: &ProtocolState) -> ScriptBuf {
    Builder::new()
        .push_opcode(OP_RETURN)
        .push_slice(STATE_SCRIPT_TAG)
        .push_slice(state.root().to_byte_array())
        .into_script()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_deterministic_over_hash_list() {
        let states = [b"alpha".to_vec(), b"beta".to_vec()];
        let state = ProtocolState::from_outputs(&states).unwrap();
        let rebuilt = ProtocolState::from_hash_list(state.hash_list().to_vec());
        assert_eq!(state.root(), rebuilt.root());
    }

    #[test]
    fn root_changes_with_output_order() {
        let a = ProtocolState::from_outputs(&[b"alpha".to_vec(), b"beta".to_vec()]).unwrap();
        let b = ProtocolState::from_outputs(&[b"beta".to_vec(), b"alpha".to_vec()]).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn oversized_state_is_rejected() {
        let oversized = vec![0u8; MAX_STATE_ELEMENT_SIZE + 1];
        assert_eq!(
            ProtocolState::from_outputs(&[oversized]),
            Err(EncodingError::OversizedStateElement {
                len: MAX_STATE_ELEMENT_SIZE + 1
            })
        );
    }

    #[test]
    fn claimed_state_must_match_committed_hash() {
        let state = ProtocolState::from_outputs(&[b"alpha".to_vec()]).unwrap();
        assert!(state.matches_output(0, b"alpha"));
        assert!(!state.matches_output(0, b"beta"));
        assert!(!state.matches_output(1, b"alpha"));
    }

    #[test]
    fn state_script_is_an_op_return() {
        let state = ProtocolState::from_outputs(&[b"alpha".to_vec()]).unwrap();
        let script = state_script(&state);
        assert!(script.is_op_return());
    }
}
