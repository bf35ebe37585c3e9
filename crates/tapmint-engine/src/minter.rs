//! Minter state machine.
//!
//! Computes everything one mint changes: the token state for the claimed
//! slot, the successor minter state(s), the ordered output states feeding
//! the protocol state commitment, and (for open minting) the allocation
//! tree mutation plus inclusion proof.

use crate::allocation::{tree_out_of_sync, AllocationTree, MerklePath};
use crate::{ChainSource, Error, ProviderError};
use tapmint_primitives::{MinterState, ProtocolState, TokenAddress, TokenState, Utxo};
use tapmint_script::ParsedMinterScript;

/// The deterministic consequences of minting the next slot from a minter.
#[derive(Debug, Clone)]
pub struct MintPlan {
    /// The token emitted by this mint.
    pub token: TokenState,
    /// Successor minter states, in output order. Empty when the minter
    /// becomes terminal.
    pub successors: Vec<MinterState>,
    /// Serialized states of the carried outputs: successors first, then the
    /// token.
    pub output_states: Vec<Vec<u8>>,
    /// Protocol state committed by the reveal transaction.
    pub new_protocol_state: ProtocolState,
    /// Inclusion proof of the mined slot (open variant only).
    pub merkle_path: Option<MerklePath>,
}

/// Computes the post-mint state for the slot `state.next_local_id()`.
///
/// Open minting requires the collection's allocation `tree`; the mined
/// slot's leaf is flipped in place and the proof is generated against the
/// updated root, which becomes the successor's committed root.
pub fn plan_mint(
    state: &MinterState,
    max: u64,
    owner: TokenAddress,
    tree: Option<&mut AllocationTree>,
) -> Result<MintPlan, Error> {
    let local_id = state.next_local_id();
    let token = TokenState { owner, local_id };

    let (successors, merkle_path) = match *state {
        MinterState::Open {
            merkle_root,
            next_local_id,
        } => {
            let tree = tree.ok_or(Error::MissingAllocationTree)?;
            if next_local_id >= max {
                return Err(Error::IndexOutOfRange {
                    index: next_local_id,
                    max,
                });
            }
            if tree.root() != merkle_root {
                return Err(tree_out_of_sync(&format!(
                    "local root {} differs from the minter's committed root {}",
                    tree.root(),
                    merkle_root
                )));
            }

            tree.mark_mined(next_local_id)?;
            let path = tree.merkle_path(next_local_id)?;

            let new_next = next_local_id + 1;
            let successors = if new_next < max {
                vec![MinterState::Open {
                    merkle_root: tree.root(),
                    next_local_id: new_next,
                }]
            } else {
                Vec::new()
            };
            (successors, Some(path))
        }
        MinterState::Closed {
            quota_max_local_id,
            next_local_id,
        } => {
            if next_local_id >= quota_max_local_id {
                return Err(Error::IndexOutOfRange {
                    index: next_local_id,
                    max: quota_max_local_id,
                });
            }
            let new_next = next_local_id + 1;
            let successors = if new_next < quota_max_local_id {
                vec![MinterState::Closed {
                    quota_max_local_id,
                    next_local_id: new_next,
                }]
            } else {
                Vec::new()
            };
            (successors, None)
        }
        MinterState::ParallelClosed { next_local_id } => {
            if next_local_id >= max {
                return Err(Error::IndexOutOfRange {
                    index: next_local_id,
                    max,
                });
            }
            let successors = [2 * next_local_id + 1, 2 * next_local_id + 2]
                .into_iter()
                .filter(|slot| *slot < max)
                .map(|slot| MinterState::ParallelClosed {
                    next_local_id: slot,
                })
                .collect();
            (successors, None)
        }
    };

    let output_states = successors
        .iter()
        .map(MinterState::to_state_bytes)
        .chain(std::iter::once(token.to_state_bytes()))
        .collect::<Vec<_>>();
    let new_protocol_state = ProtocolState::from_outputs(&output_states)?;

    Ok(MintPlan {
        token,
        successors,
        output_states,
        new_protocol_state,
        merkle_path,
    })
}

/// Recovers the premine recipient of a premined collection.
///
/// For slot 0 the caller itself is the recipient. For later slots the
/// address is read back from the minter leaf script revealed in the witness
/// of the transaction that created the minter UTXO; the result is cached by
/// the engine for the session.
pub(crate) async fn resolve_premine_address(
    chain: &dyn ChainSource,
    minter_utxo: &Utxo,
    caller: TokenAddress,
    next_local_id: u64,
    premine: u64,
) -> Result<Option<TokenAddress>, Error> {
    if premine == 0 {
        return Ok(None);
    }
    if next_local_id == 0 {
        return Ok(Some(caller));
    }

    let creating_tx = chain
        .raw_transaction(minter_utxo.txid)
        .await
        .map_err(Error::DataUnavailable)?;

    let witness = creating_tx
        .input
        .first()
        .map(|input| &input.witness)
        .filter(|witness| witness.len() >= 2)
        .ok_or_else(|| missing_premine(minter_utxo))?;

    // The revealed leaf script sits below the control block.
    let script_bytes = witness
        .nth(witness.len() - 2)
        .ok_or_else(|| missing_premine(minter_utxo))?;
    let parsed = ParsedMinterScript::parse(bitcoin::Script::from_bytes(script_bytes))
        .map_err(|_| missing_premine(minter_utxo))?;

    parsed
        .premine_addr
        .map(Some)
        .ok_or_else(|| missing_premine(minter_utxo))
}

fn missing_premine(utxo: &Utxo) -> Error {
    Error::DataUnavailable(ProviderError::Decode(format!(
        "cannot recover the premine address from the transaction creating {}",
        utxo.outpoint()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::MerkleLeaf;
    use bitcoin::hashes::Hash;
    use bitcoin::ScriptBuf;

    fn owner() -> TokenAddress {
        TokenAddress::from_bytes([5u8; 20])
    }

    fn tree(max: u64) -> AllocationTree {
        AllocationTree::new(
            (0..max)
                .map(|local_id| MerkleLeaf {
                    commit_script: ScriptBuf::from_bytes(vec![0x51, local_id as u8]),
                    local_id,
                    is_mined: false,
                })
                .collect(),
        )
    }

    #[test]
    fn open_mint_advances_slot_and_root() {
        let mut tree = tree(3);
        let state = MinterState::Open {
            merkle_root: tree.root(),
            next_local_id: 0,
        };

        let plan = plan_mint(&state, 3, owner(), Some(&mut tree)).unwrap();

        assert_eq!(plan.token.local_id, 0);
        assert!(tree.leaf(0).unwrap().is_mined);
        assert_eq!(plan.successors.len(), 1);
        match plan.successors[0] {
            MinterState::Open {
                merkle_root,
                next_local_id,
            } => {
                assert_eq!(next_local_id, 1);
                assert_eq!(merkle_root, tree.root());
            }
            _ => panic!("open minter must spawn an open successor"),
        }
        assert!(plan.merkle_path.is_some());
        assert_eq!(plan.output_states.len(), 2);
    }

    #[test]
    fn open_mint_of_the_last_slot_is_terminal() {
        let mut tree = tree(3);
        tree.sync_mined(2);
        let state = MinterState::Open {
            merkle_root: tree.root(),
            next_local_id: 2,
        };

        let plan = plan_mint(&state, 3, owner(), Some(&mut tree)).unwrap();

        assert!(plan.successors.is_empty());
        assert_eq!(plan.output_states.len(), 1);
    }

    #[test]
    fn open_mint_requires_a_synced_tree() {
        let mut tree = tree(3);
        let state = MinterState::Open {
            merkle_root: bitcoin::hashes::sha256::Hash::all_zeros(),
            next_local_id: 1,
        };
        assert!(matches!(
            plan_mint(&state, 3, owner(), Some(&mut tree)),
            Err(Error::DataUnavailable(_))
        ));
    }

    #[test]
    fn open_mint_without_a_tree_is_rejected() {
        let state = MinterState::Open {
            merkle_root: bitcoin::hashes::sha256::Hash::all_zeros(),
            next_local_id: 0,
        };
        assert!(matches!(
            plan_mint(&state, 3, owner(), None),
            Err(Error::MissingAllocationTree)
        ));
    }

    #[test]
    fn closed_mint_respects_the_quota() {
        let state = MinterState::Closed {
            quota_max_local_id: 2,
            next_local_id: 0,
        };
        let plan = plan_mint(&state, 10, owner(), None).unwrap();
        assert_eq!(
            plan.successors,
            vec![MinterState::Closed {
                quota_max_local_id: 2,
                next_local_id: 1
            }]
        );

        let last = MinterState::Closed {
            quota_max_local_id: 2,
            next_local_id: 1,
        };
        let plan = plan_mint(&last, 10, owner(), None).unwrap();
        assert!(plan.successors.is_empty());
    }

    #[test]
    fn parallel_mint_spawns_bounded_successors() {
        let cases = [
            // (slot, max, expected successor slots)
            (0, 31, vec![1, 2]),
            (14, 31, vec![29, 30]),
            (15, 31, vec![]),
            (7, 16, vec![15]),
        ];
        for (slot, max, expected) in cases {
            let state = MinterState::ParallelClosed {
                next_local_id: slot,
            };
            let plan = plan_mint(&state, max, owner(), None).unwrap();
            let slots = plan
                .successors
                .iter()
                .map(MinterState::next_local_id)
                .collect::<Vec<_>>();
            assert_eq!(slots, expected, "slot {slot} max {max}");
        }
    }

    #[test]
    fn protocol_state_commits_successors_then_token() {
        let state = MinterState::ParallelClosed { next_local_id: 0 };
        let plan = plan_mint(&state, 31, owner(), None).unwrap();

        assert_eq!(plan.output_states.len(), 3);
        assert_eq!(plan.new_protocol_state.hash_list().len(), 3);
        assert!(plan
            .new_protocol_state
            .matches_output(2, &plan.token.to_state_bytes()));
    }

    #[test]
    fn exhausted_minters_are_rejected() {
        let state = MinterState::Closed {
            quota_max_local_id: 2,
            next_local_id: 2,
        };
        assert!(matches!(
            plan_mint(&state, 10, owner(), None),
            Err(Error::IndexOutOfRange { .. })
        ));
    }
}
