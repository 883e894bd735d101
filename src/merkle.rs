// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Merkle commitment machinery
//!
//! Everything the machine commits to is addressed in one 2^64-byte space and
//! hashed at word granularity (2^[`LOG2_WORD_SIZE`]-byte leaves). The
//! submodules provide the digest type, the table of pristine (all-zero)
//! subtree hashes, the append-only back Merkle tree, Merkle proofs and the
//! sparse tree over the full machine state.

pub mod back_tree;
pub mod hash;
pub mod pristine;
pub mod proof;
pub mod state_tree;

pub use back_tree::BackMerkleTree;
pub use hash::{Digest, DIGEST_SIZE};
pub use pristine::PristineHashes;
pub use proof::MerkleProof;
pub use state_tree::StateTree;

use thiserror::Error;

/// Log2 of the size in bytes of the machine address space covered by the
/// state Merkle tree.
pub const LOG2_ROOT_SIZE: u8 = 64;

/// Log2 of the size in bytes of a Merkle tree word, the unit of state access.
pub const LOG2_WORD_SIZE: u8 = 3;

/// Size in bytes of a Merkle tree word
pub const WORD_SIZE: u64 = 1 << LOG2_WORD_SIZE;

/// Number of tree levels between a word and the root, which is also the
/// length of the sibling path carried by every state access.
pub const SIBLINGS_PER_WORD: usize = (LOG2_ROOT_SIZE - LOG2_WORD_SIZE) as usize;

/// Errors raised by the Merkle tree structures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// A size parameter violates `log2_word_size <= log2_leaf_size <=
    /// log2_root_size`, or the root size does not leave the address type one
    /// bit to spare.
    #[error("{0} is out of range")]
    OutOfRange(&'static str),

    /// The tree already holds the maximum number of leaves.
    #[error("tree is full")]
    TreeFull,

    /// The target address is not aligned to the target size.
    #[error("address is not aligned to the proof target size")]
    MisalignedAddress,
}
