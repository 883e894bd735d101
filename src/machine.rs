// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Machine handle
//!
//! Owns a [`MachineState`] and exposes the public operations: silent
//! execution (`run`), the logged operations (`log_step_uarch`,
//! `log_reset_uarch`, `log_send_cmio_response`) and state commitments
//! (`get_root_hash`, `get_proof`). A step is atomic with respect to the
//! outside world; external readers wait until it returns.

use std::path::Path;

use thiserror::Error;

use crate::access_log::{AccessLog, LogType};
use crate::cmio::{send_cmio_response, CmioError};
use crate::config::{MachineConfig, RuntimeConfig};
use crate::interpreter::step_uarch;
use crate::log;
use crate::machine_state::pma::{
    PmaEntry, PmaFlags, CMIO_RX_LENGTH, CMIO_RX_START, PMA_PAGE_SIZE, RAM_MAX_LENGTH, RAM_START,
    ROM_MAX_LENGTH, ROM_START,
};
use crate::machine_state::MachineState;
use crate::merkle::{Digest, MerkleError, MerkleProof};
use crate::reset::reset_state;
use crate::state_access::{DirectAccess, RecordAccess};
use crate::storage::{Snapshot, StorageError};

/// Why `run` stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    /// The machine halted
    Halted,
    /// The machine is idle, waiting for a host response
    Idle,
    /// `mcycle` reached the requested target
    ReachedTargetMcycle,
}

/// Errors surfaced by the machine handle
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("machine is halted")]
    Halted,

    #[error("machine is waiting for a response")]
    Idle,

    #[error("machine state is inconsistent: {0}")]
    StateInvariantViolated(&'static str),

    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Cmio(#[from] CmioError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A machine instance
pub struct Machine {
    config: MachineConfig,
    state: MachineState,
}

impl Machine {
    /// Create a machine from its configuration.
    pub fn create(
        config: MachineConfig,
        _runtime: RuntimeConfig,
    ) -> Result<Self, MachineError> {
        let rom_image = config.rom.resolve_image()?;
        if rom_image.len() as u64 > ROM_MAX_LENGTH {
            return Err(MachineError::InvalidArgument("rom image is too large"));
        }

        if config.ram.length == 0 || config.ram.length % PMA_PAGE_SIZE != 0 {
            return Err(MachineError::InvalidArgument(
                "ram length must be a non-zero multiple of the page size",
            ));
        }
        if config.ram.length > RAM_MAX_LENGTH {
            return Err(MachineError::InvalidArgument("ram length is too large"));
        }
        let ram_image = config.ram.resolve_image()?;
        if ram_image.len() as u64 > config.ram.length {
            return Err(MachineError::InvalidArgument("ram image exceeds ram length"));
        }

        let pmas = vec![
            PmaEntry::memory(
                ROM_START,
                ROM_MAX_LENGTH,
                PmaFlags::READ.union(PmaFlags::EXECUTE),
                rom_image,
            ),
            PmaEntry::memory(
                CMIO_RX_START,
                CMIO_RX_LENGTH,
                PmaFlags::READ.union(PmaFlags::WRITE),
                vec![],
            ),
            PmaEntry::memory(
                RAM_START,
                config.ram.length,
                PmaFlags::READ.union(PmaFlags::WRITE).union(PmaFlags::EXECUTE),
                ram_image,
            ),
        ];

        let state = MachineState::new(pmas);
        if !state.pmas_are_coherent() {
            return Err(MachineError::StateInvariantViolated("overlapping PMA ranges"));
        }

        log::debug!(ram_length = config.ram.length, "created machine");
        Ok(Machine { config, state })
    }

    /// Load a machine previously written with [`Machine::store`].
    pub fn load(path: impl AsRef<Path>, runtime: RuntimeConfig) -> Result<Self, MachineError> {
        let snapshot = Snapshot::load(&path)?;
        let mut machine = Machine::create(snapshot.config.clone(), runtime)?;
        snapshot.restore(&mut machine.state)?;

        if !runtime.skip_root_hash_check {
            let computed = machine.get_root_hash()?;
            if computed != snapshot.root_hash {
                return Err(StorageError::RootHashMismatch {
                    stored: snapshot.root_hash,
                    computed,
                }
                .into());
            }
        }

        log::info!("loaded machine from snapshot");
        Ok(machine)
    }

    /// Write the machine to `path`.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<(), MachineError> {
        Snapshot::capture(&self.config, &self.state)?.save(path)?;
        Ok(())
    }

    /// The machine state
    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// Mutable access to the machine state, for test setups and boot
    /// loaders
    pub fn state_mut(&mut self) -> &mut MachineState {
        &mut self.state
    }

    /// The configuration the machine was created from
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Run silently until the machine halts, idles, or `mcycle` reaches
    /// `mcycle_end`.
    pub fn run(&mut self, mcycle_end: u64) -> BreakReason {
        loop {
            if self.state.iflags_h {
                log::debug!(mcycle = self.state.mcycle, "break: halted");
                return BreakReason::Halted;
            }
            if self.state.iflags_i {
                log::debug!(mcycle = self.state.mcycle, "break: idle");
                return BreakReason::Idle;
            }
            if self.state.mcycle >= mcycle_end {
                return BreakReason::ReachedTargetMcycle;
            }

            let mut access = DirectAccess::new(&mut self.state);
            step_uarch(&mut access);
        }
    }

    fn check_steppable(&self) -> Result<(), MachineError> {
        if self.state.iflags_h {
            return Err(MachineError::Halted);
        }
        if self.state.iflags_i {
            return Err(MachineError::Idle);
        }
        Ok(())
    }

    /// Advance the machine by one silent step.
    pub fn step_uarch(&mut self) -> Result<(), MachineError> {
        self.check_steppable()?;
        let mut access = DirectAccess::new(&mut self.state);
        step_uarch(&mut access);
        Ok(())
    }

    /// Advance the machine by one step, recording every state access.
    pub fn log_step_uarch(&mut self) -> Result<AccessLog, MachineError> {
        self.check_steppable()?;
        let mut access = RecordAccess::new(&mut self.state, LogType::StepUarch)?;
        step_uarch(&mut access);
        Ok(access.into_log())
    }

    /// Reset the machine's architectural state, leaving memory untouched.
    pub fn reset_uarch(&mut self) {
        let mut access = DirectAccess::new(&mut self.state);
        reset_state(&mut access);
    }

    /// Reset the machine's architectural state, recording every access.
    pub fn log_reset_uarch(&mut self) -> Result<AccessLog, MachineError> {
        let mut access = RecordAccess::new(&mut self.state, LogType::ResetUarch)?;
        reset_state(&mut access);
        Ok(access.into_log())
    }

    /// Deliver a host response to an idle machine.
    pub fn send_cmio_response(&mut self, reason: u16, data: &[u8]) -> Result<(), MachineError> {
        let mut access = DirectAccess::new(&mut self.state);
        send_cmio_response(&mut access, reason, data)?;
        Ok(())
    }

    /// Deliver a host response, recording every access.
    pub fn log_send_cmio_response(
        &mut self,
        reason: u16,
        data: &[u8],
    ) -> Result<AccessLog, MachineError> {
        let mut access = RecordAccess::new(&mut self.state, LogType::SendCmioResponse)?;
        send_cmio_response(&mut access, reason, data)?;
        Ok(access.into_log())
    }

    /// Root hash committing to the whole machine state
    pub fn get_root_hash(&self) -> Result<Digest, MachineError> {
        Ok(self.state.build_merkle_tree()?.root())
    }

    /// Merkle proof for the `2^log2_size` bytes at `address`
    pub fn get_proof(&self, address: u64, log2_size: u8) -> Result<MerkleProof, MachineError> {
        Ok(self.state.build_merkle_tree()?.proof(address, log2_size)?)
    }
}
