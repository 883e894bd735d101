// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Common type for hashes

use std::fmt;

use sha3::{Digest as _, Keccak256};

/// Size of digest produced by the underlying hash function
pub const DIGEST_SIZE: usize = 32;

/// A value of type [`Digest`] indicates that the enclosed array was produced
/// by the preset hash function, Keccak-256. It can be obtained by hashing
/// data directly or by combining two sibling digests into their parent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Hash a slice of bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(bytes);
        Digest(hasher.finalize().into())
    }

    /// Hash the concatenation of two sibling digests, producing their parent.
    pub fn concat(left: &Digest, right: &Digest) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Digest(hasher.finalize().into())
    }

    /// Borrow the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(digest: [u8; DIGEST_SIZE]) -> Self {
        Digest(digest)
    }
}

impl From<Digest> for [u8; DIGEST_SIZE] {
    fn from(value: Digest) -> Self {
        value.0
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(self.0))
    }
}
