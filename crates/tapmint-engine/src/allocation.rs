//! Slot allocation tree for open-style minting.
//!
//! The tree is fixed at deploy time with exactly `max` leaves, one per
//! mintable slot, padded to a power of two with the zero hash. Every future
//! mint proves slot uniqueness against the root embedded in the minter's
//! on-chain state, without any central allocator: the mint flips the slot's
//! mined bit, recomputes the root bottom-up, and carries an inclusion path
//! the spending contract checks against the committed root.

use crate::{Error, ProviderError};
use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::{ScriptBuf, XOnlyPublicKey};
use tapmint_primitives::StateRoot;
use tapmint_script::{commit_script, TaprootSpend};

/// One slot of the allocation table.
///
/// `commit_script` and `local_id` are fixed at construction; only the
/// `is_mined` bit ever changes, false to true, exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleLeaf {
    /// P2TR output script committing to the slot's content.
    pub commit_script: ScriptBuf,
    pub local_id: u64,
    pub is_mined: bool,
}

impl MerkleLeaf {
    fn hash(&self) -> sha256::Hash {
        let mut engine = sha256::Hash::engine();
        engine.input(self.commit_script.as_bytes());
        engine.input(&self.local_id.to_le_bytes());
        engine.input(&[self.is_mined as u8]);
        sha256::Hash::from_engine(engine)
    }
}

/// Position of a path neighbor relative to the node being proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Sibling hashes from leaf to root, each tagged with its side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub neighbors: Vec<sha256::Hash>,
    pub directions: Vec<Direction>,
}

impl MerklePath {
    /// Folds a leaf hash up the path, reconstructing the root the path was
    /// generated against.
    pub fn compute_root(&self, leaf_hash: sha256::Hash) -> sha256::Hash {
        self.neighbors
            .iter()
            .zip(&self.directions)
            .fold(leaf_hash, |acc, (neighbor, direction)| match direction {
                Direction::Left => node_hash(*neighbor, acc),
                Direction::Right => node_hash(acc, *neighbor),
            })
    }
}

fn node_hash(left: sha256::Hash, right: sha256::Hash) -> sha256::Hash {
    let mut engine = sha256::Hash::engine();
    engine.input(left.as_byte_array());
    engine.input(right.as_byte_array());
    sha256::Hash::from_engine(engine)
}

fn zero_hash() -> sha256::Hash {
    sha256::Hash::all_zeros()
}

/// The fixed-capacity slot allocation table.
#[derive(Debug, Clone)]
pub struct AllocationTree {
    leaves: Vec<MerkleLeaf>,
    /// Hash levels bottom-up: `levels[0]` is the padded leaf layer,
    /// `levels.last()` is the single-element root layer.
    levels: Vec<Vec<sha256::Hash>>,
}

impl AllocationTree {
    /// Builds the tree over the given leaves, padding the leaf layer to the
    /// next power of two with the zero hash.
    pub fn new(leaves: Vec<MerkleLeaf>) -> Self {
        let padded = leaves.len().next_power_of_two().max(1);
        let mut leaf_level = leaves.iter().map(MerkleLeaf::hash).collect::<Vec<_>>();
        leaf_level.resize(padded, zero_hash());

        let mut levels = vec![leaf_level];
        while levels.last().expect("at least one level").len() > 1 {
            let below = levels.last().expect("at least one level");
            let above = below
                .chunks(2)
                .map(|pair| node_hash(pair[0], pair[1]))
                .collect();
            levels.push(above);
        }

        Self { leaves, levels }
    }

    /// Number of real (unpadded) slots.
    pub fn max(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn root(&self) -> StateRoot {
        self.levels.last().expect("at least one level")[0]
    }

    pub fn leaf(&self, index: u64) -> Result<&MerkleLeaf, Error> {
        self.leaves
            .get(index as usize)
            .ok_or(Error::IndexOutOfRange {
                index,
                max: self.max(),
            })
    }

    /// Replaces the leaf at `index` and recomputes the affected hashes
    /// bottom-up. Only the mined bit of a leaf may legitimately change;
    /// its commit script and local id are fixed at construction.
    pub fn update_leaf(&mut self, leaf: MerkleLeaf, index: u64) -> Result<(), Error> {
        let current = self.leaf(index)?;
        debug_assert_eq!(current.commit_script, leaf.commit_script);
        debug_assert_eq!(current.local_id, leaf.local_id);

        self.leaves[index as usize] = leaf;
        let mut position = index as usize;
        self.levels[0][position] = self.leaves[position].hash();
        for level in 0..self.levels.len() - 1 {
            position /= 2;
            let below = &self.levels[level];
            let parent = node_hash(below[2 * position], below[2 * position + 1]);
            self.levels[level + 1][position] = parent;
        }
        Ok(())
    }

    /// Marks the slot at `index` as mined.
    pub fn mark_mined(&mut self, index: u64) -> Result<(), Error> {
        let mut leaf = self.leaf(index)?.clone();
        leaf.is_mined = true;
        self.update_leaf(leaf, index)
    }

    /// Marks every slot below `next_local_id` as mined, catching the tree
    /// up with an in-flight collection recovered from the tracker.
    pub fn sync_mined(&mut self, next_local_id: u64) {
        for index in 0..next_local_id.min(self.max()) {
            // Indices are bounded by max, so this never fails.
            let _ = self.mark_mined(index);
        }
    }

    /// The inclusion path of the leaf at `index`, ordered leaf-to-root.
    pub fn merkle_path(&self, index: u64) -> Result<MerklePath, Error> {
        self.leaf(index)?;

        let mut neighbors = Vec::with_capacity(self.levels.len() - 1);
        let mut directions = Vec::with_capacity(self.levels.len() - 1);
        let mut position = index as usize;
        for level in &self.levels[..self.levels.len() - 1] {
            let (neighbor, direction) = if position % 2 == 0 {
                (level[position + 1], Direction::Right)
            } else {
                (level[position - 1], Direction::Left)
            };
            neighbors.push(neighbor);
            directions.push(direction);
            position /= 2;
        }

        Ok(MerklePath {
            neighbors,
            directions,
        })
    }

    fn leaf_hash(&self, index: u64) -> Result<sha256::Hash, Error> {
        self.leaf(index).map(MerkleLeaf::hash)
    }
}

/// Content and metadata backing one mintable slot.
#[derive(Debug, Clone)]
pub struct SlotResource {
    pub content_type: String,
    pub content_body: Vec<u8>,
    pub metadata: serde_json::Value,
}

/// Derives the full allocation tree of a collection from its per-slot
/// resources, one leaf per intended NFT in slot order.
pub fn build_collection_tree(
    owner: &XOnlyPublicKey,
    resources: &[SlotResource],
) -> Result<AllocationTree, Error> {
    let leaves = resources
        .iter()
        .enumerate()
        .map(|(local_id, resource)| {
            let script = commit_script(
                owner,
                &resource.metadata,
                &resource.content_type,
                &resource.content_body,
            )?;
            let spend = TaprootSpend::wrap(script)?;
            Ok(MerkleLeaf {
                commit_script: spend.output_script,
                local_id: local_id as u64,
                is_mined: false,
            })
        })
        .collect::<Result<Vec<_>, tapmint_script::Error>>()?;

    Ok(AllocationTree::new(leaves))
}

/// Treats an allocation-tree/tracker disagreement as unavailable data.
pub(crate) fn tree_out_of_sync(detail: &str) -> Error {
    Error::DataUnavailable(ProviderError::Decode(format!(
        "allocation tree out of sync: {detail}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(local_id: u64) -> MerkleLeaf {
        MerkleLeaf {
            commit_script: ScriptBuf::from_bytes(vec![0x51, local_id as u8]),
            local_id,
            is_mined: false,
        }
    }

    fn tree(max: u64) -> AllocationTree {
        AllocationTree::new((0..max).map(leaf).collect())
    }

    #[test]
    fn mined_bit_is_monotonic_and_moves_the_root() {
        let mut tree = tree(3);
        let genesis_root = tree.root();

        tree.mark_mined(0).unwrap();
        assert!(tree.leaf(0).unwrap().is_mined);
        let root_after_first = tree.root();
        assert_ne!(genesis_root, root_after_first);

        // Re-marking an already-mined leaf leaves the root unchanged.
        tree.mark_mined(0).unwrap();
        assert_eq!(tree.root(), root_after_first);
    }

    #[test]
    fn paths_reconstruct_the_current_root() {
        let mut tree = tree(5);
        tree.mark_mined(0).unwrap();
        tree.mark_mined(1).unwrap();

        for index in 0..5 {
            let path = tree.merkle_path(index).unwrap();
            let leaf_hash = tree.leaf_hash(index).unwrap();
            assert_eq!(path.compute_root(leaf_hash), tree.root());
        }
    }

    #[test]
    fn out_of_range_access_fails() {
        let tree = tree(4);
        assert!(matches!(
            tree.leaf(4),
            Err(Error::IndexOutOfRange { index: 4, max: 4 })
        ));
        assert!(tree.merkle_path(7).is_err());
    }

    #[test]
    fn sync_mined_marks_the_prefix() {
        let mut tree = tree(6);
        tree.sync_mined(4);
        for index in 0..4 {
            assert!(tree.leaf(index).unwrap().is_mined);
        }
        assert!(!tree.leaf(4).unwrap().is_mined);
        assert!(!tree.leaf(5).unwrap().is_mined);
    }

    #[test]
    fn single_slot_tree_has_an_empty_path() {
        let tree = tree(1);
        let path = tree.merkle_path(0).unwrap();
        assert!(path.neighbors.is_empty());
        assert_eq!(path.compute_root(tree.leaf_hash(0).unwrap()), tree.root());
    }
}
