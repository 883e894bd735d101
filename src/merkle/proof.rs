// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Merkle proofs for a target range of the committed address space

use serde::{Deserialize, Serialize};

use super::hash::Digest;

/// Recompute the root implied by a target digest and its sibling path.
///
/// `siblings` is ordered from the sibling of the target itself up to the
/// child of the root. Bit `h` of `target_address` (for `h` starting at
/// `log2_target_size`) selects whether the running node is the right or the
/// left child at that level.
pub fn path_root(
    target: Digest,
    target_address: u64,
    log2_target_size: u8,
    siblings: &[Digest],
) -> Digest {
    let mut hash = target;
    for (i, sibling) in siblings.iter().enumerate() {
        let height = log2_target_size as usize + i;
        if (target_address >> height) & 1 == 1 {
            hash = Digest::concat(sibling, &hash);
        } else {
            hash = Digest::concat(&hash, sibling);
        }
    }
    hash
}

/// Proof that a target subtree lies at a given address of a tree with a
/// given root hash
///
/// Sibling hashes are ordered from the target upward; the path has
/// `log2_root_size - log2_target_size` entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Address of the first byte covered by the target subtree
    pub target_address: u64,
    /// Log2 of the size in bytes of the target subtree
    pub log2_target_size: u8,
    /// Hash of the target subtree
    pub target_hash: Digest,
    /// Log2 of the size in bytes of the tree
    pub log2_root_size: u8,
    /// Sibling hashes from the target to the root
    pub sibling_hashes: Vec<Digest>,
    /// Root hash of the tree
    pub root_hash: Digest,
}

impl MerkleProof {
    /// Check the proof against itself: the sibling path must have the right
    /// length and chain the target hash up to the claimed root.
    pub fn verify(&self) -> bool {
        let expected_len = (self.log2_root_size - self.log2_target_size) as usize;
        if self.sibling_hashes.len() != expected_len {
            return false;
        }
        path_root(
            self.target_hash,
            self.target_address,
            self.log2_target_size,
            &self.sibling_hashes,
        ) == self.root_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_root_two_leaves() {
        let left = Digest::of(b"left leaf");
        let right = Digest::of(b"right leaf");
        let root = Digest::concat(&left, &right);

        // The left leaf sits at address 0, the right one at address 8.
        assert_eq!(path_root(left, 0, 3, &[right]), root);
        assert_eq!(path_root(right, 8, 3, &[left]), root);
        assert_ne!(path_root(right, 0, 3, &[left]), root);
    }

    #[test]
    fn test_verify_rejects_wrong_path_length() {
        let target = Digest::of(b"target");
        let sibling = Digest::of(b"sibling");
        let proof = MerkleProof {
            target_address: 0,
            log2_target_size: 3,
            target_hash: target,
            log2_root_size: 5,
            sibling_hashes: vec![sibling],
            root_hash: Digest::concat(&target, &sibling),
        };
        assert!(!proof.verify());
    }
}
