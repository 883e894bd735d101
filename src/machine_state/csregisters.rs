// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

#![allow(non_upper_case_globals)]

//! Control and state registers
//!
//! Only the CSRs the machine models are listed; accessing any other CSR
//! address raises an illegal instruction exception. Most CSRs are plain
//! 64-bit shadow scalars; `sstatus`, `sie` and `sip` are masked views of
//! their machine-level counterparts, and the unprivileged counters shadow
//! `mcycle`/`minstret` read-only.

use num_enum::TryFromPrimitive;

use crate::machine_state::mode::Mode;
use crate::machine_state::shadow::ScalarField;
use crate::traps::Exception;

/// CSR index
#[expect(non_camel_case_types, reason = "Consistent with RISC-V spec")]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::EnumIter,
    strum::Display,
    TryFromPrimitive,
)]
#[repr(u16)]
pub enum CSRegister {
    // Supervisor Trap Setup
    sstatus = 0x100,
    sie = 0x104,
    stvec = 0x105,
    scounteren = 0x106,

    // Supervisor Trap Handling
    sscratch = 0x140,
    sepc = 0x141,
    scause = 0x142,
    stval = 0x143,
    sip = 0x144,

    // Supervisor Protection and Translation
    satp = 0x180,

    // Machine Information
    mvendorid = 0xF11,
    marchid = 0xF12,
    mimpid = 0xF13,
    mhartid = 0xF14,

    // Machine Trap Setup
    mstatus = 0x300,
    misa = 0x301,
    medeleg = 0x302,
    mideleg = 0x303,
    mie = 0x304,
    mtvec = 0x305,
    mcounteren = 0x306,

    // Machine Trap Handling
    mscratch = 0x340,
    mepc = 0x341,
    mcause = 0x342,
    mtval = 0x343,
    mip = 0x344,

    // Machine Counters
    mcycle = 0xB00,
    minstret = 0xB02,

    // Unprivileged Counters
    cycle = 0xC00,
    time = 0xC01,
    instret = 0xC02,
}

impl CSRegister {
    /// Parse a CSR address from the instruction immediate.
    pub fn try_parse(address: u16) -> Result<Self, Exception> {
        CSRegister::try_from(address).map_err(|_| Exception::IllegalInstruction)
    }

    /// Check that `mode` may access this CSR.
    ///
    /// Bits 9:8 of the CSR address encode the lowest privilege level that
    /// may access it.
    pub fn check_privilege(self, mode: Mode) -> Result<(), Exception> {
        let required = (self as u16 >> 8) & 0b11;
        if (mode as u16) < required {
            return Err(Exception::IllegalInstruction);
        }
        Ok(())
    }

    /// Check that this CSR may be written at all.
    ///
    /// Bits 11:10 of the CSR address encode read-only registers as `0b11`.
    pub fn check_write(self) -> Result<(), Exception> {
        if (self as u16 >> 10) & 0b11 == 0b11 {
            return Err(Exception::IllegalInstruction);
        }
        Ok(())
    }

    /// The shadow scalar directly backing this CSR, if any. Views
    /// (`sstatus`, `sie`, `sip`, the unprivileged counters) and the
    /// constant machine-information registers have no backing field of
    /// their own.
    pub fn backing_field(self) -> Option<ScalarField> {
        use CSRegister::*;
        let field = match self {
            stvec => ScalarField::Stvec,
            scounteren => ScalarField::Scounteren,
            sscratch => ScalarField::Sscratch,
            sepc => ScalarField::Sepc,
            scause => ScalarField::Scause,
            stval => ScalarField::Stval,
            satp => ScalarField::Satp,
            mstatus => ScalarField::Mstatus,
            misa => ScalarField::Misa,
            medeleg => ScalarField::Medeleg,
            mideleg => ScalarField::Mideleg,
            mie => ScalarField::Mie,
            mtvec => ScalarField::Mtvec,
            mcounteren => ScalarField::Mcounteren,
            mscratch => ScalarField::Mscratch,
            mepc => ScalarField::Mepc,
            mcause => ScalarField::Mcause,
            mtval => ScalarField::Mtval,
            mip => ScalarField::Mip,
            mcycle => ScalarField::Mcycle,
            minstret => ScalarField::Minstret,
            sstatus | sie | sip | mvendorid | marchid | mimpid | mhartid | cycle | time
            | instret => return None,
        };
        Some(field)
    }
}

/// `misa` after reset: RV64 with the I and A base/extensions and S and U
/// modes implemented. `misa` is WARL and writes to it are discarded.
pub const MISA_RESET: u64 =
    (2 << 62) | (1 << 0) | (1 << 8) | (1 << 18) | (1 << 20);

// mstatus fields
pub const MSTATUS_SIE: u64 = 1 << 1;
pub const MSTATUS_MIE: u64 = 1 << 3;
pub const MSTATUS_SPIE: u64 = 1 << 5;
pub const MSTATUS_MPIE: u64 = 1 << 7;
pub const MSTATUS_SPP: u64 = 1 << 8;
pub const MSTATUS_MPP_SHIFT: usize = 11;
pub const MSTATUS_MPP: u64 = 0b11 << MSTATUS_MPP_SHIFT;
pub const MSTATUS_MPRV: u64 = 1 << 17;
pub const MSTATUS_SUM: u64 = 1 << 18;
pub const MSTATUS_MXR: u64 = 1 << 19;

/// Portion of `mstatus` visible through the `sstatus` view
pub const SSTATUS_MASK: u64 =
    MSTATUS_SIE | MSTATUS_SPIE | MSTATUS_SPP | MSTATUS_SUM | MSTATUS_MXR;

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!(CSRegister::try_parse(0x300), Ok(CSRegister::mstatus));
        assert_eq!(CSRegister::try_parse(0x105), Ok(CSRegister::stvec));
        assert_eq!(
            CSRegister::try_parse(0x7C0),
            Err(Exception::IllegalInstruction)
        );
    }

    #[test]
    fn test_privilege_checks() {
        assert!(CSRegister::mstatus.check_privilege(Mode::Machine).is_ok());
        assert_eq!(
            CSRegister::mstatus.check_privilege(Mode::Supervisor),
            Err(Exception::IllegalInstruction)
        );
        assert!(CSRegister::sstatus.check_privilege(Mode::Supervisor).is_ok());
        assert_eq!(
            CSRegister::sstatus.check_privilege(Mode::User),
            Err(Exception::IllegalInstruction)
        );
        assert!(CSRegister::cycle.check_privilege(Mode::User).is_ok());
    }

    #[test]
    fn test_write_checks() {
        assert!(CSRegister::mstatus.check_write().is_ok());
        assert_eq!(
            CSRegister::cycle.check_write(),
            Err(Exception::IllegalInstruction)
        );
        assert_eq!(
            CSRegister::mvendorid.check_write(),
            Err(Exception::IllegalInstruction)
        );
    }

    #[test]
    fn test_every_backed_csr_maps_to_a_distinct_field() {
        let mut fields: Vec<ScalarField> =
            CSRegister::iter().filter_map(|csr| csr.backing_field()).collect();
        let len = fields.len();
        fields.sort_by_key(|f| f.address());
        fields.dedup();
        assert_eq!(fields.len(), len);
    }
}
