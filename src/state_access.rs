// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! State access abstraction
//!
//! Every read and write the step engine performs goes through the
//! [`StateAccess`] capability set. Three monomorphised implementations
//! exist:
//!
//! - [`DirectAccess`] mutates the machine state with no further effects
//!   (`run` mode);
//! - [`RecordAccess`] mirrors the state's Merkle tree and appends every
//!   access to an [`AccessLog`](crate::access_log::AccessLog) (`log_step`
//!   mode);
//! - [`ReplayAccess`] serves every access from a log alone, chaining the
//!   recorded proofs between root hashes (verification).
//!
//! The step engine is generic over the trait, so one engine implementation
//! serves all three with zero-overhead dispatch.
//!
//! The required methods are word-granular; the provided methods implement
//! the shared semantics on top of them — `x0` elision, PMA descriptor
//! decoding and lookup, sub-word access widening and the access checks that
//! turn bad addresses into bus errors. Keeping those in provided methods
//! guarantees the back-ends cannot diverge on them.

mod direct;
mod record;
mod replay;

pub use direct::DirectAccess;
pub use record::RecordAccess;
pub use replay::{ReplayAccess, ReplayFault, ReplayFaultCause};

use crate::machine_state::in_fetch_envelope;
use crate::machine_state::mode::Mode;
use crate::machine_state::pma::{PmaFlags, PmaView};
use crate::machine_state::registers::XRegister;
use crate::machine_state::shadow::{ScalarField, PMA_MAX};
use crate::traps::Exception;

macro_rules! scalar_accessors {
    ($($field:ident),* $(,)?) => {
        paste::paste! {
            $(
                #[inline]
                fn [<read_ $field>](&mut self) -> u64 {
                    self.read_field(ScalarField::[<$field:camel>])
                }

                #[inline]
                fn [<write_ $field>](&mut self, value: u64) {
                    self.write_field(ScalarField::[<$field:camel>], value)
                }
            )*
        }
    };
}

/// Typed access to the machine state
pub trait StateAccess {
    /// Read a named scalar.
    fn read_field(&mut self, field: ScalarField) -> u64;

    /// Write a named scalar.
    fn write_field(&mut self, field: ScalarField, value: u64);

    /// Read a general register other than `x0`.
    fn read_xregister(&mut self, reg: XRegister) -> u64;

    /// Write a general register other than `x0`.
    fn write_xregister(&mut self, reg: XRegister, value: u64);

    /// Read the `istart` descriptor word of PMA entry `index`.
    fn read_pma_istart(&mut self, index: usize) -> u64;

    /// Read the `ilength` descriptor word of PMA entry `index`.
    fn read_pma_ilength(&mut self, index: usize) -> u64;

    /// Read the naturally-aligned word at `paddr` within `pma`. The caller
    /// has validated alignment, bounds and permissions.
    fn read_memory_word(&mut self, pma: &PmaView, paddr: u64) -> Result<u64, Exception>;

    /// Write the naturally-aligned word at `paddr` within `pma`. The caller
    /// has validated alignment, bounds and permissions.
    fn write_memory_word(&mut self, pma: &PmaView, paddr: u64, value: u64)
        -> Result<(), Exception>;

    /// Read the word at word-aligned `paddr` for an instruction fetch. The
    /// caller has checked the fetch envelope; unbacked words read as zero.
    fn fetch_word(&mut self, paddr: u64) -> u64;

    // ---------------------------------------------------------------------
    // Shared semantics on top of the required methods
    // ---------------------------------------------------------------------

    scalar_accessors! {
        pc, mcycle, minstret, mstatus, mtvec, mscratch, mepc, mcause, mtval,
        misa, mie, mip, medeleg, mideleg, mcounteren, stvec, sscratch, sepc,
        scause, stval, satp, scounteren, ilrsc, mtimecmp, fromhost, tohost,
    }

    /// Read a general register. `x0` reads as zero without touching the
    /// backing state.
    #[inline]
    fn read_x(&mut self, reg: XRegister) -> u64 {
        if reg.is_zero() {
            return 0;
        }
        self.read_xregister(reg)
    }

    /// Write a general register. Writes to `x0` are discarded without
    /// touching the backing state.
    #[inline]
    fn write_x(&mut self, reg: XRegister, value: u64) {
        if !reg.is_zero() {
            self.write_xregister(reg, value);
        }
    }

    #[inline]
    fn read_iflags_h(&mut self) -> bool {
        self.read_field(ScalarField::IflagsH) != 0
    }

    #[inline]
    fn set_iflags_h(&mut self) {
        self.write_field(ScalarField::IflagsH, 1)
    }

    #[inline]
    fn read_iflags_i(&mut self) -> bool {
        self.read_field(ScalarField::IflagsI) != 0
    }

    #[inline]
    fn set_iflags_i(&mut self) {
        self.write_field(ScalarField::IflagsI, 1)
    }

    #[inline]
    fn reset_iflags_i(&mut self) {
        self.write_field(ScalarField::IflagsI, 0)
    }

    #[inline]
    fn read_iflags_prv(&mut self) -> Mode {
        Mode::from_bits(self.read_field(ScalarField::IflagsPrv))
    }

    #[inline]
    fn write_iflags_prv(&mut self, mode: Mode) {
        self.write_field(ScalarField::IflagsPrv, mode as u64)
    }

    /// Read PMA descriptor `index` into a decoded view. Vacant entries are
    /// recognised from `istart` alone; their `ilength` word is not read.
    fn read_pma(&mut self, index: usize) -> PmaView {
        debug_assert!(index < PMA_MAX);
        let istart = self.read_pma_istart(index);
        if PmaFlags::from_bits(istart).contains(PmaFlags::EMPTY) {
            return PmaView::empty(index);
        }
        let ilength = self.read_pma_ilength(index);
        PmaView::from_descriptor(index, istart, ilength)
    }

    /// Walk the descriptor list for the entry backing `paddr`. Returns the
    /// sentinel empty view when no entry matches.
    fn find_pma(&mut self, paddr: u64) -> PmaView {
        for index in 0..PMA_MAX {
            let view = self.read_pma(index);
            if view.is_empty() || view.contains(paddr) {
                return view;
            }
        }
        PmaView::empty(PMA_MAX)
    }

    /// Read `2^size_log2` bytes at `paddr` from `pma`, zero-extended.
    ///
    /// `size_log2` selects 1/2/4/8-byte accesses. Misaligned addresses and
    /// accesses outside the entry or without read permission are bus errors.
    fn read_memory(
        &mut self,
        pma: &PmaView,
        paddr: u64,
        size_log2: u8,
    ) -> Result<u64, Exception> {
        debug_assert!(size_log2 <= 3);
        let size = 1u64 << size_log2;
        if paddr & (size - 1) != 0
            || !pma.contains_range(paddr, size)
            || !pma.flags.contains(PmaFlags::READ)
        {
            return Err(Exception::LoadAccessFault(paddr));
        }

        let word = self.read_memory_word(pma, paddr & !7)?;
        let shift = (paddr & 7) * 8;
        Ok(match size_log2 {
            3 => word,
            _ => (word >> shift) & ((1u64 << (size * 8)) - 1),
        })
    }

    /// Write `2^size_log2` bytes at `paddr` to `pma`.
    ///
    /// Sub-word writes widen to a read-modify-write of the containing word,
    /// recorded as two distinct accesses by the logging back-end.
    fn write_memory(
        &mut self,
        pma: &PmaView,
        paddr: u64,
        value: u64,
        size_log2: u8,
    ) -> Result<(), Exception> {
        debug_assert!(size_log2 <= 3);
        let size = 1u64 << size_log2;
        if paddr & (size - 1) != 0
            || !pma.contains_range(paddr, size)
            || !pma.flags.contains(PmaFlags::WRITE)
        {
            return Err(Exception::StoreAccessFault(paddr));
        }

        let word_addr = paddr & !7;
        if size_log2 == 3 {
            return self.write_memory_word(pma, word_addr, value);
        }

        let old = self.read_memory_word(pma, word_addr)?;
        let shift = (paddr & 7) * 8;
        let mask = ((1u64 << (size * 8)) - 1) << shift;
        let merged = (old & !mask) | ((value << shift) & mask);
        self.write_memory_word(pma, word_addr, merged)
    }

    /// Fetch the word containing an instruction. Addresses outside the
    /// executable envelopes are instruction access faults.
    fn fetch_insn_word(&mut self, word_addr: u64) -> Result<u64, Exception> {
        debug_assert!(word_addr & 7 == 0);
        if !in_fetch_envelope(word_addr) {
            return Err(Exception::InstructionAccessFault(word_addr));
        }
        Ok(self.fetch_word(word_addr))
    }
}
