// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Properties of the Merkle commitment structures

use proptest::prelude::*;
use riscv_pvm::merkle::{
    BackMerkleTree, Digest, MerkleError, PristineHashes, StateTree, LOG2_ROOT_SIZE,
    LOG2_WORD_SIZE,
};

/// Naive bottom-up Merkle root over `leaves` padded with pristine leaves
fn naive_root(leaves: &[Digest], log2_root_size: u8, log2_leaf_size: u8) -> Digest {
    let pristine = PristineHashes::new(log2_root_size, log2_leaf_size).unwrap();
    let max_leaves = 1usize << (log2_root_size - log2_leaf_size);

    let mut level: Vec<Digest> = leaves.to_vec();
    level.resize(max_leaves, pristine.get(log2_leaf_size));
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| Digest::concat(&pair[0], &pair[1]))
            .collect();
    }
    level[0]
}

#[test]
fn test_pristine_table_invariant() {
    let pristine = PristineHashes::new(LOG2_ROOT_SIZE, LOG2_WORD_SIZE).unwrap();
    for h in LOG2_WORD_SIZE..LOG2_ROOT_SIZE {
        let child = pristine.get(h);
        assert_eq!(pristine.get(h + 1), Digest::concat(&child, &child));
    }
}

proptest! {
    #[test]
    fn test_push_root_consistency(leaf_count in 0usize..64, seed in any::<u64>()) {
        let mut tree = BackMerkleTree::new(9, 3, 3).unwrap();
        let mut leaves = Vec::new();
        for i in 0..leaf_count {
            let leaf = Digest::of(&(seed ^ i as u64).to_le_bytes());
            tree.push_back(leaf).unwrap();
            leaves.push(leaf);
        }
        prop_assert_eq!(tree.get_root_hash(), naive_root(&leaves, 9, 3));
    }

    #[test]
    fn test_next_leaf_proof_always_verifies(leaf_count in 0usize..32, seed in any::<u64>()) {
        let mut tree = BackMerkleTree::new(8, 3, 3).unwrap();
        for i in 0..leaf_count {
            tree.push_back(Digest::of(&(seed ^ i as u64).to_le_bytes())).unwrap();
        }
        let proof = tree.get_next_leaf_proof().unwrap();
        prop_assert!(proof.verify());
        prop_assert_eq!(proof.root_hash, tree.get_root_hash());
        prop_assert_eq!(proof.target_address, (leaf_count as u64) << 3);
    }
}

#[test]
fn test_worked_scenario() {
    // log2_root_size = 3, log2_leaf_size = 0, log2_word_size = 0: push
    // h("a"), h("b"), h("c"). The root must be
    // H(H(H(a,b), H(c, Z0)), H(Z1, Z1)).
    let mut tree = BackMerkleTree::new(3, 0, 0).unwrap();
    let a = Digest::of(b"a");
    let b = Digest::of(b"b");
    let c = Digest::of(b"c");
    tree.push_back(a).unwrap();
    tree.push_back(b).unwrap();
    tree.push_back(c).unwrap();

    let pristine = PristineHashes::new(3, 0).unwrap();
    let z0 = pristine.get(0);
    let z1 = pristine.get(1);
    assert_eq!(z1, Digest::concat(&z0, &z0));

    let expected = Digest::concat(
        &Digest::concat(&Digest::concat(&a, &b), &Digest::concat(&c, &z0)),
        &Digest::concat(&z1, &z1),
    );
    assert_eq!(tree.get_root_hash(), expected);
}

#[test]
fn test_tree_full_semantics() {
    let mut tree = BackMerkleTree::new(6, 3, 3).unwrap();
    let leaves: Vec<Digest> = (0..8u64).map(|i| Digest::of(&i.to_le_bytes())).collect();
    for leaf in &leaves {
        tree.push_back(*leaf).unwrap();
    }

    assert_eq!(tree.push_back(leaves[0]), Err(MerkleError::TreeFull));
    assert_eq!(tree.get_next_leaf_proof().err(), Some(MerkleError::TreeFull));
    assert_eq!(tree.get_root_hash(), naive_root(&leaves, 6, 3));
}

#[test]
fn test_root_size_needs_spare_address_bit() {
    // A 64-bit address type cannot host a 2^64-byte back Merkle tree.
    assert_eq!(
        BackMerkleTree::new(64, 3, 3).err(),
        Some(MerkleError::OutOfRange("log2_root_size"))
    );
    assert!(BackMerkleTree::new(63, 3, 3).is_ok());
}

#[test]
fn test_state_tree_matches_back_tree_over_same_leaves() {
    // Fill the bottom of the address space with 16 words and compare the
    // state tree against folding the same leaves through a back tree padded
    // to the full address space.
    let data: Vec<u8> = (0u8..128).collect();
    let state_tree = StateTree::new([(0u64, data.as_slice())]).unwrap();

    let mut back = BackMerkleTree::new(7, 3, 3).unwrap();
    for word in data.chunks(8) {
        back.push_back(Digest::of(word)).unwrap();
    }
    let mut root = back.get_root_hash();
    let pristine = PristineHashes::new(LOG2_ROOT_SIZE, LOG2_WORD_SIZE).unwrap();
    for log2_size in 7..LOG2_ROOT_SIZE {
        root = Digest::concat(&root, &pristine.get(log2_size));
    }

    assert_eq!(state_tree.root(), root);
}
