// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Recording access back-end
//!
//! Wraps the machine state together with a mirror of its Merkle tree. Every
//! access is appended to the log exactly once, in engine order, with the
//! sibling path taken at the moment of access; writes update the mirror so
//! later paths reflect them. Coalescing is forbidden by construction: each
//! trait call appends.

use super::StateAccess;
use crate::access_log::{Access, AccessLog, AccessType, LogType};
use crate::machine_state::pma::{PmaBody, PmaView};
use crate::machine_state::registers::XRegister;
use crate::machine_state::shadow::{self, ScalarField};
use crate::machine_state::MachineState;
use crate::merkle::{Digest, MerkleError, StateTree, LOG2_WORD_SIZE};
use crate::traps::Exception;

/// Access back-end used by `log_step`
pub struct RecordAccess<'a> {
    state: &'a mut MachineState,
    tree: StateTree,
    log: AccessLog,
    initial_root: Digest,
}

impl<'a> RecordAccess<'a> {
    /// Seal the current state into a Merkle tree and start an empty log.
    pub fn new(state: &'a mut MachineState, log_type: LogType) -> Result<Self, MerkleError> {
        let tree = state.build_merkle_tree()?;
        let initial_root = tree.root();
        Ok(RecordAccess {
            state,
            tree,
            log: AccessLog::new(log_type),
            initial_root,
        })
    }

    /// Root hash the log chains from
    pub fn initial_root(&self) -> Digest {
        self.initial_root
    }

    /// Root hash after all recorded writes
    pub fn current_root(&self) -> Digest {
        self.tree.root()
    }

    /// Finish recording and hand out the log.
    pub fn into_log(self) -> AccessLog {
        self.log
    }

    fn record_read(&mut self, address: u64, value: u64) {
        self.log.push(Access {
            access_type: AccessType::Read,
            address,
            log2_size: LOG2_WORD_SIZE,
            value_read: value.to_le_bytes().to_vec(),
            value_written: None,
            sibling_hashes: self.tree.sibling_path(address),
        });
    }

    fn record_write(&mut self, address: u64, old: u64, new: u64) {
        self.log.push(Access {
            access_type: AccessType::Write,
            address,
            log2_size: LOG2_WORD_SIZE,
            value_read: old.to_le_bytes().to_vec(),
            value_written: Some(new.to_le_bytes().to_vec()),
            sibling_hashes: self.tree.sibling_path(address),
        });
        self.tree.update_word(address, new);
    }
}

impl StateAccess for RecordAccess<'_> {
    fn read_field(&mut self, field: ScalarField) -> u64 {
        let value = self.state.read_field(field);
        self.record_read(field.address(), value);
        value
    }

    fn write_field(&mut self, field: ScalarField, value: u64) {
        let old = self.state.read_field(field);
        self.record_write(field.address(), old, value);
        self.state.write_field(field, value);
    }

    fn read_xregister(&mut self, reg: XRegister) -> u64 {
        let value = self.state.xregisters.read(reg);
        self.record_read(shadow::xregister_address(reg), value);
        value
    }

    fn write_xregister(&mut self, reg: XRegister, value: u64) {
        let old = self.state.xregisters.read(reg);
        self.record_write(shadow::xregister_address(reg), old, value);
        self.state.xregisters.write(reg, value);
    }

    fn read_pma_istart(&mut self, index: usize) -> u64 {
        let (istart, _) = self.state.pma_descriptor(index);
        self.record_read(shadow::pma_istart_address(index), istart);
        istart
    }

    fn read_pma_ilength(&mut self, index: usize) -> u64 {
        let (_, ilength) = self.state.pma_descriptor(index);
        self.record_read(shadow::pma_ilength_address(index), ilength);
        ilength
    }

    fn read_memory_word(&mut self, pma: &PmaView, paddr: u64) -> Result<u64, Exception> {
        let value = match self.state.pma_ref(pma.index) {
            // Device contents are not committed to the Merkle tree, so they
            // cannot appear in a proof-carrying log.
            Some(entry) if matches!(entry.body(), PmaBody::Device(_)) => {
                return Err(Exception::LoadAccessFault(paddr))
            }
            Some(entry) => entry.read_word(paddr)?,
            None => return Err(Exception::LoadAccessFault(paddr)),
        };
        self.record_read(paddr, value);
        Ok(value)
    }

    fn write_memory_word(
        &mut self,
        pma: &PmaView,
        paddr: u64,
        value: u64,
    ) -> Result<(), Exception> {
        let old = match self.state.pma_ref(pma.index) {
            Some(entry) if matches!(entry.body(), PmaBody::Device(_)) => {
                return Err(Exception::StoreAccessFault(paddr))
            }
            Some(entry) => entry.read_word(paddr)?,
            None => return Err(Exception::StoreAccessFault(paddr)),
        };
        self.record_write(paddr, old, value);
        match self.state.pma_mut(pma.index) {
            Some(entry) => entry.write_word(paddr, value),
            None => Err(Exception::StoreAccessFault(paddr)),
        }
    }

    fn fetch_word(&mut self, paddr: u64) -> u64 {
        let value = self.state.fetch_word(paddr);
        self.record_read(paddr, value);
        value
    }
}
