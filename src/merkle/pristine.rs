// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Precomputed hashes of all-zero subtrees

use super::hash::Digest;
use super::{MerkleError, LOG2_ROOT_SIZE};

/// Table of pristine subtree hashes
///
/// Entry `h` is the hash of an all-zero subtree spanning 2^h bytes, for every
/// `h` between `log2_word_size` and `log2_root_size` inclusive. The table
/// satisfies `pristine[h + 1] = H(pristine[h] ‖ pristine[h])`.
#[derive(Clone, Debug)]
pub struct PristineHashes {
    log2_root_size: u8,
    log2_word_size: u8,
    hashes: Vec<Digest>,
}

impl PristineHashes {
    /// Precompute the pristine hashes for all subtree sizes between
    /// `log2_word_size` and `log2_root_size`. Runs in O(depth) hashes.
    pub fn new(log2_root_size: u8, log2_word_size: u8) -> Result<Self, MerkleError> {
        if log2_root_size > LOG2_ROOT_SIZE {
            return Err(MerkleError::OutOfRange("log2_root_size"));
        }
        if log2_word_size > log2_root_size {
            return Err(MerkleError::OutOfRange("log2_word_size"));
        }

        let depth = (log2_root_size - log2_word_size) as usize;
        let mut hashes = Vec::with_capacity(depth + 1);

        let zero_word = vec![0u8; 1usize << log2_word_size];
        hashes.push(Digest::of(&zero_word));
        for h in 0..depth {
            let child = hashes[h];
            hashes.push(Digest::concat(&child, &child));
        }

        Ok(PristineHashes {
            log2_root_size,
            log2_word_size,
            hashes,
        })
    }

    /// Hash of the pristine subtree spanning 2^`log2_size` bytes.
    ///
    /// `log2_size` must lie between `log2_word_size` and `log2_root_size`
    /// passed at construction.
    pub fn get(&self, log2_size: u8) -> Digest {
        debug_assert!(log2_size >= self.log2_word_size && log2_size <= self.log2_root_size);
        self.hashes[(log2_size - self.log2_word_size) as usize]
    }
}
