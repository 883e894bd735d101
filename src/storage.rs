// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Machine snapshots on disk
//!
//! A snapshot is one version-tagged bincode file carrying the machine
//! configuration, the scalar state, the memory images and the root hash the
//! state committed to when it was written. Loading recomputes the root and
//! compares unless the caller opts out.

use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MachineConfig;
use crate::machine_state::registers::XREG_COUNT;
use crate::machine_state::shadow::ScalarField;
use crate::machine_state::MachineState;
use crate::merkle::{Digest, MerkleError};

/// Version tag of the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot does not match the machine layout")]
    LayoutMismatch,

    #[error("root hash mismatch: stored {stored}, computed {computed}")]
    RootHashMismatch { stored: Digest, computed: Digest },

    #[error(transparent)]
    Merkle(#[from] MerkleError),
}

/// On-disk representation of a stored machine
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    version: u32,
    /// Root hash of the state when the snapshot was written
    pub root_hash: Digest,
    /// Configuration the machine was created from
    pub config: MachineConfig,
    /// General register file, all 32 slots
    pub xregisters: Vec<u64>,
    /// Named scalars in [`ScalarField::ALL`] order
    pub scalars: Vec<u64>,
    /// Backing bytes of the memory PMA ranges, in entry order
    pub memories: Vec<Vec<u8>>,
}

impl Snapshot {
    /// Capture `state` (created from `config`) into a snapshot.
    pub fn capture(config: &MachineConfig, state: &MachineState) -> Result<Self, StorageError> {
        let root_hash = state.build_merkle_tree()?.root();

        let xregisters = (0..XREG_COUNT)
            .map(|i| state.xregisters.read_index(i))
            .collect();
        let scalars = ScalarField::ALL
            .iter()
            .map(|&field| state.read_field(field))
            .collect();
        let memories = state
            .pmas()
            .iter()
            .filter_map(|entry| entry.memory_bytes().map(<[u8]>::to_vec))
            .collect();

        Ok(Snapshot {
            version: SNAPSHOT_VERSION,
            root_hash,
            config: config.clone(),
            xregisters,
            scalars,
            memories,
        })
    }

    /// Restore the captured scalars and memories into `state`, which must
    /// have been created from the snapshot's configuration.
    pub fn restore(&self, state: &mut MachineState) -> Result<(), StorageError> {
        if self.xregisters.len() != XREG_COUNT || self.scalars.len() != ScalarField::ALL.len() {
            return Err(StorageError::LayoutMismatch);
        }

        for (i, &value) in self.xregisters.iter().enumerate() {
            state.xregisters.write_index(i, value);
        }
        for (&field, &value) in ScalarField::ALL.iter().zip(&self.scalars) {
            state.write_field(field, value);
        }

        let memory_indices: Vec<usize> = state
            .pmas()
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.memory_bytes().is_some())
            .map(|(i, _)| i)
            .collect();
        if memory_indices.len() != self.memories.len() {
            return Err(StorageError::LayoutMismatch);
        }
        for (&pma_index, bytes) in memory_indices.iter().zip(&self.memories) {
            let restored = state
                .pma_mut(pma_index)
                .map(|entry| entry.restore_memory(bytes.clone()))
                .unwrap_or(false);
            if !restored {
                return Err(StorageError::LayoutMismatch);
            }
        }
        Ok(())
    }

    /// Write the snapshot to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let bytes = bincode::serialize(self)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Read a snapshot from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let bytes = std::fs::read(path)?;
        let snapshot: Snapshot = bincode::deserialize(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine_state::pma::{PmaEntry, PmaFlags, PMA_PAGE_SIZE, RAM_START};
    use crate::machine_state::registers::a4;

    fn state_and_config() -> (MachineConfig, MachineState) {
        let config = MachineConfig::default();
        let state = MachineState::new(vec![PmaEntry::memory(
            RAM_START,
            PMA_PAGE_SIZE,
            PmaFlags::READ.union(PmaFlags::WRITE),
            vec![],
        )]);
        (config, state)
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (config, mut state) = state_and_config();
        state.xregisters.write(a4, 0x1234);
        state.mepc = 0x5678;
        state
            .find_pma_mut(RAM_START)
            .unwrap()
            .write_word(RAM_START + 64, 0x4242)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.bin");
        Snapshot::capture(&config, &state).unwrap().save(&path).unwrap();

        let snapshot = Snapshot::load(&path).unwrap();
        let (_, mut restored) = state_and_config();
        snapshot.restore(&mut restored).unwrap();

        assert_eq!(restored.xregisters.read(a4), 0x1234);
        assert_eq!(restored.mepc, 0x5678);
        let (_, ram) = restored.find_pma(RAM_START).unwrap();
        assert_eq!(ram.read_word(RAM_START + 64).unwrap(), 0x4242);

        // The recomputed root matches the stored one.
        let computed = restored.build_merkle_tree().unwrap().root();
        assert_eq!(computed, snapshot.root_hash);
    }

    #[test]
    fn test_rejects_wrong_version() {
        let (config, state) = state_and_config();
        let mut snapshot = Snapshot::capture(&config, &state).unwrap();
        snapshot.version = 99;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.bin");
        let bytes = bincode::serialize(&snapshot).unwrap();
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            Snapshot::load(&path),
            Err(StorageError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_restore_rejects_layout_mismatch() {
        let (config, state) = state_and_config();
        let mut snapshot = Snapshot::capture(&config, &state).unwrap();
        snapshot.memories.push(vec![0u8; 8]);

        let (_, mut restored) = state_and_config();
        assert!(matches!(
            snapshot.restore(&mut restored),
            Err(StorageError::LayoutMismatch)
        ));
    }
}
