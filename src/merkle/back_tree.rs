// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Append-only Merkle commitment in O(depth) space
//!
//! The tree tracks the root hash of a leaf vector while leaves are still
//! being produced. Only the "frontier" is stored: `context[i]` holds the
//! digest of the most recently completed subtree of height `i` that has not
//! yet been absorbed into a larger subtree, and is populated exactly when
//! bit `i` of the leaf count is set. Missing positions stand for pristine
//! subtrees.

use super::hash::Digest;
use super::pristine::PristineHashes;
use super::proof::MerkleProof;
use super::MerkleError;

/// Append-only Merkle tree over `2^(log2_root_size - log2_leaf_size)` leaves
#[derive(Clone, Debug)]
pub struct BackMerkleTree {
    log2_root_size: u8,
    log2_leaf_size: u8,
    leaf_count: u64,
    max_leaves: u64,
    context: Vec<Option<Digest>>,
    pristine: PristineHashes,
}

impl BackMerkleTree {
    /// Create an empty tree.
    ///
    /// Parameters must satisfy `log2_word_size <= log2_leaf_size <=
    /// log2_root_size`, and `log2_root_size` must leave the 64-bit address
    /// type one bit to spare so that leaf addresses cannot overflow.
    pub fn new(
        log2_root_size: u8,
        log2_leaf_size: u8,
        log2_word_size: u8,
    ) -> Result<Self, MerkleError> {
        if log2_root_size >= u64::BITS as u8 {
            return Err(MerkleError::OutOfRange("log2_root_size"));
        }
        if log2_leaf_size > log2_root_size {
            return Err(MerkleError::OutOfRange("log2_leaf_size"));
        }
        if log2_word_size > log2_leaf_size {
            return Err(MerkleError::OutOfRange("log2_word_size"));
        }

        let depth = (log2_root_size - log2_leaf_size) as usize;
        Ok(BackMerkleTree {
            log2_root_size,
            log2_leaf_size,
            leaf_count: 0,
            max_leaves: 1u64 << depth,
            context: vec![None; depth + 1],
            pristine: PristineHashes::new(log2_root_size, log2_word_size)?,
        })
    }

    /// Number of leaves pushed so far
    pub fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    /// Whether the tree holds its maximum number of leaves
    pub fn is_full(&self) -> bool {
        self.leaf_count == self.max_leaves
    }

    fn depth(&self) -> usize {
        (self.log2_root_size - self.log2_leaf_size) as usize
    }

    /// Frontier entry `i`, falling back to the pristine digest of the same
    /// height when the position is vacant.
    fn context_hash(&self, i: usize) -> Digest {
        self.context[i].unwrap_or_else(|| self.pristine.get(self.log2_leaf_size + i as u8))
    }

    /// Append one leaf digest.
    ///
    /// Amortised O(1), worst-case O(depth) hashes. Fails with
    /// [`MerkleError::TreeFull`] once `2^(log2_root_size - log2_leaf_size)`
    /// leaves have been pushed.
    pub fn push_back(&mut self, leaf_hash: Digest) -> Result<(), MerkleError> {
        if self.is_full() {
            return Err(MerkleError::TreeFull);
        }

        let mut carry = leaf_hash;
        for i in 0..=self.depth() {
            if self.leaf_count & (1u64 << i) != 0 {
                let left = self.context_hash(i);
                carry = Digest::concat(&left, &carry);
                self.context[i] = None;
            } else {
                self.context[i] = Some(carry);
                break;
            }
        }
        self.leaf_count += 1;
        Ok(())
    }

    /// Root hash of the tree as if the remaining leaves were pristine
    pub fn get_root_hash(&self) -> Digest {
        let depth = self.depth();
        if self.is_full() {
            return self.context_hash(depth);
        }

        let mut root = self.pristine.get(self.log2_leaf_size);
        for i in 0..depth {
            if self.leaf_count & (1u64 << i) != 0 {
                let left = self.context_hash(i);
                root = Digest::concat(&left, &root);
            } else {
                let right = self.pristine.get(self.log2_leaf_size + i as u8);
                root = Digest::concat(&root, &right);
            }
        }
        root
    }

    /// Proof that the next leaf to be pushed is currently pristine
    ///
    /// Fails with [`MerkleError::TreeFull`] when no leaf remains.
    pub fn get_next_leaf_proof(&self) -> Result<MerkleProof, MerkleError> {
        if self.is_full() {
            return Err(MerkleError::TreeFull);
        }

        let depth = self.depth();
        let target_hash = self.pristine.get(self.log2_leaf_size);
        let mut sibling_hashes = Vec::with_capacity(depth);
        let mut hash = target_hash;
        for i in 0..depth {
            let sibling = if self.leaf_count & (1u64 << i) != 0 {
                let left = self.context_hash(i);
                hash = Digest::concat(&left, &hash);
                left
            } else {
                let right = self.pristine.get(self.log2_leaf_size + i as u8);
                hash = Digest::concat(&hash, &right);
                right
            };
            sibling_hashes.push(sibling);
        }

        Ok(MerkleProof {
            target_address: self.leaf_count << self.log2_leaf_size,
            log2_target_size: self.log2_leaf_size,
            target_hash,
            log2_root_size: self.log2_root_size,
            sibling_hashes,
            root_hash: hash,
        })
    }
}
