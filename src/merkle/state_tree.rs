// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Sparse Merkle tree over the full machine address space
//!
//! The tree covers all 2^[`LOG2_ROOT_SIZE`] bytes at word granularity.
//! Only nodes that differ from the pristine digest of their height are
//! materialised; everything else is synthesised from the pristine table on
//! demand. The machine populates the tree from its backed regions (shadow
//! scalars, PMA descriptors and memory ranges) before producing proofs, and
//! the recording back-end keeps it in sync while a logged step mutates the
//! state.
//!
//! [`LOG2_ROOT_SIZE`]: super::LOG2_ROOT_SIZE

use std::collections::HashMap;

use super::hash::Digest;
use super::pristine::PristineHashes;
use super::proof::MerkleProof;
use super::{MerkleError, LOG2_ROOT_SIZE, LOG2_WORD_SIZE, SIBLINGS_PER_WORD, WORD_SIZE};

/// Tree level of the root node
const ROOT_LEVEL: u8 = (LOG2_ROOT_SIZE - LOG2_WORD_SIZE) as u8;

/// Word-granular Merkle tree over the 64-bit machine address space
#[derive(Clone, Debug)]
pub struct StateTree {
    /// Non-pristine nodes, keyed by `(level, index)` where level 0 holds the
    /// word leaves and the index at level `l` is `address >> (3 + l)`.
    nodes: HashMap<(u8, u64), Digest>,
    pristine: PristineHashes,
}

impl StateTree {
    /// Build the tree from the machine's backed regions.
    ///
    /// Every region must start at a word-aligned address and span a whole
    /// number of words; regions must not overlap. Unbacked address space is
    /// pristine.
    pub fn new<'a>(
        regions: impl IntoIterator<Item = (u64, &'a [u8])>,
    ) -> Result<Self, MerkleError> {
        let pristine = PristineHashes::new(LOG2_ROOT_SIZE, LOG2_WORD_SIZE)?;
        let mut nodes = HashMap::new();
        let mut level_indices: Vec<u64> = Vec::new();

        for (start, data) in regions {
            if start % WORD_SIZE != 0 || data.len() as u64 % WORD_SIZE != 0 {
                return Err(MerkleError::MisalignedAddress);
            }

            for (i, word) in data.chunks_exact(WORD_SIZE as usize).enumerate() {
                // Zero words are pristine already.
                if word.iter().all(|b| *b == 0) {
                    continue;
                }
                let index = (start / WORD_SIZE) + i as u64;
                nodes.insert((0, index), Digest::of(word));
                level_indices.push(index);
            }
        }

        let mut tree = StateTree { nodes, pristine };
        tree.hash_up(level_indices);
        Ok(tree)
    }

    /// Recompute all ancestors of the level-0 `indices`.
    fn hash_up(&mut self, mut indices: Vec<u64>) {
        for level in 1..=ROOT_LEVEL {
            indices.sort_unstable();
            indices.dedup();
            let parents: Vec<u64> = {
                let mut p: Vec<u64> = indices.iter().map(|i| i >> 1).collect();
                p.dedup();
                p
            };

            for &parent in &parents {
                let left = self.node(level - 1, parent << 1);
                let right = self.node(level - 1, (parent << 1) | 1);
                self.nodes.insert((level, parent), Digest::concat(&left, &right));
            }
            indices = parents;
        }
    }

    /// Digest of the node at `level` and `index`, synthesising pristine
    /// subtrees on demand.
    fn node(&self, level: u8, index: u64) -> Digest {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or_else(|| self.pristine.get(LOG2_WORD_SIZE + level))
    }

    /// Root hash of the whole address space
    pub fn root(&self) -> Digest {
        self.node(ROOT_LEVEL, 0)
    }

    /// Sibling path of the word at `address`, ordered from the word's own
    /// sibling up to the child of the root.
    pub fn sibling_path(&self, address: u64) -> Vec<Digest> {
        debug_assert!(address % WORD_SIZE == 0);
        let mut index = address / WORD_SIZE;
        let mut siblings = Vec::with_capacity(SIBLINGS_PER_WORD);
        for level in 0..ROOT_LEVEL {
            siblings.push(self.node(level, index ^ 1));
            index >>= 1;
        }
        siblings
    }

    /// Replace the word at `address` and recompute the path to the root.
    pub fn update_word(&mut self, address: u64, value: u64) {
        debug_assert!(address % WORD_SIZE == 0);
        let mut index = address / WORD_SIZE;

        let leaf = Digest::of(&value.to_le_bytes());
        if value == 0 {
            // Drop back to the pristine representation.
            self.nodes.remove(&(0, index));
        } else {
            self.nodes.insert((0, index), leaf);
        }

        for level in 1..=ROOT_LEVEL {
            index >>= 1;
            let left = self.node(level - 1, index << 1);
            let right = self.node(level - 1, (index << 1) | 1);
            self.nodes.insert((level, index), Digest::concat(&left, &right));
        }
    }

    /// Proof for the subtree of 2^`log2_size` bytes at `address`
    pub fn proof(&self, address: u64, log2_size: u8) -> Result<MerkleProof, MerkleError> {
        if !(LOG2_WORD_SIZE..=LOG2_ROOT_SIZE).contains(&log2_size) {
            return Err(MerkleError::OutOfRange("log2_size"));
        }
        if log2_size < 64 && address % (1u64 << log2_size) != 0 {
            return Err(MerkleError::MisalignedAddress);
        }

        let target_level = log2_size - LOG2_WORD_SIZE;
        let mut index = if log2_size < 64 { address >> log2_size } else { 0 };
        let target_hash = self.node(target_level, index);

        let mut sibling_hashes = Vec::with_capacity((ROOT_LEVEL - target_level) as usize);
        for level in target_level..ROOT_LEVEL {
            sibling_hashes.push(self.node(level, index ^ 1));
            index >>= 1;
        }

        Ok(MerkleProof {
            target_address: address,
            log2_target_size: log2_size,
            target_hash,
            log2_root_size: LOG2_ROOT_SIZE,
            sibling_hashes,
            root_hash: self.root(),
        })
    }
}
