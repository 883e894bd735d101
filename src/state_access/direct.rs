// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Plain access back-end
//!
//! Structured field access on the state and direct array access on the
//! PMAs. No allocation, no log.

use super::StateAccess;
use crate::machine_state::pma::{PmaBody, PmaView};
use crate::machine_state::registers::XRegister;
use crate::machine_state::shadow::ScalarField;
use crate::machine_state::MachineState;
use crate::traps::Exception;

/// Access back-end used by `run`
pub struct DirectAccess<'a> {
    state: &'a mut MachineState,
}

impl<'a> DirectAccess<'a> {
    pub fn new(state: &'a mut MachineState) -> Self {
        DirectAccess { state }
    }
}

impl StateAccess for DirectAccess<'_> {
    #[inline(always)]
    fn read_field(&mut self, field: ScalarField) -> u64 {
        self.state.read_field(field)
    }

    #[inline(always)]
    fn write_field(&mut self, field: ScalarField, value: u64) {
        self.state.write_field(field, value)
    }

    #[inline(always)]
    fn read_xregister(&mut self, reg: XRegister) -> u64 {
        self.state.xregisters.read(reg)
    }

    #[inline(always)]
    fn write_xregister(&mut self, reg: XRegister, value: u64) {
        self.state.xregisters.write(reg, value)
    }

    #[inline(always)]
    fn read_pma_istart(&mut self, index: usize) -> u64 {
        self.state.pma_descriptor(index).0
    }

    #[inline(always)]
    fn read_pma_ilength(&mut self, index: usize) -> u64 {
        self.state.pma_descriptor(index).1
    }

    #[inline(always)]
    fn read_memory_word(&mut self, pma: &PmaView, paddr: u64) -> Result<u64, Exception> {
        match self.state.pma_ref(pma.index) {
            Some(entry) => entry.read_word(paddr),
            None => Err(Exception::LoadAccessFault(paddr)),
        }
    }

    #[inline(always)]
    fn write_memory_word(
        &mut self,
        pma: &PmaView,
        paddr: u64,
        value: u64,
    ) -> Result<(), Exception> {
        match self.state.pma_mut(pma.index) {
            Some(entry) if !matches!(entry.body(), PmaBody::Empty) => {
                entry.write_word(paddr, value)
            }
            _ => Err(Exception::StoreAccessFault(paddr)),
        }
    }

    #[inline(always)]
    fn fetch_word(&mut self, paddr: u64) -> u64 {
        self.state.fetch_word(paddr)
    }
}
