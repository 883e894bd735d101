// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Zicsr extension
//!
//! CSR reads and writes go through the access back-end like any other state.
//! `sstatus`, `sie` and `sip` are masked views of `mstatus`, `mie` and
//! `mip`; the unprivileged counters shadow `mcycle`/`minstret` read-only,
//! gated by `mcounteren`/`scounteren` below machine mode. `misa` is WARL
//! and discards writes.

use super::PcUpdate;
use crate::bits::bit;
use crate::machine_state::csregisters::{CSRegister, SSTATUS_MASK};
use crate::machine_state::mode::Mode;
use crate::parser::instruction::{CsrArgs, CsriArgs};
use crate::state_access::StateAccess;
use crate::traps::Exception;

/// Bit of `mcounteren`/`scounteren` gating a counter CSR
fn counter_bit(csr: CSRegister) -> usize {
    match csr {
        CSRegister::cycle => 0,
        CSRegister::time => 1,
        CSRegister::instret => 2,
        _ => unreachable!("not a gated counter"),
    }
}

/// Check the counter-enable chain for an unprivileged counter read.
fn check_counter<A: StateAccess>(a: &mut A, csr: CSRegister, mode: Mode) -> Result<(), Exception> {
    if mode < Mode::Machine {
        let mcounteren = a.read_mcounteren();
        if !bit(mcounteren, counter_bit(csr)) {
            return Err(Exception::IllegalInstruction);
        }
    }
    if mode < Mode::Supervisor {
        let scounteren = a.read_scounteren();
        if !bit(scounteren, counter_bit(csr)) {
            return Err(Exception::IllegalInstruction);
        }
    }
    Ok(())
}

/// Read a CSR. Privilege has already been checked.
fn csr_read<A: StateAccess>(a: &mut A, csr: CSRegister, mode: Mode) -> Result<u64, Exception> {
    let value = match csr {
        CSRegister::sstatus => a.read_mstatus() & SSTATUS_MASK,
        CSRegister::sie => {
            let mideleg = a.read_mideleg();
            a.read_mie() & mideleg
        }
        CSRegister::sip => {
            let mideleg = a.read_mideleg();
            a.read_mip() & mideleg
        }
        CSRegister::cycle | CSRegister::time => {
            check_counter(a, csr, mode)?;
            a.read_mcycle()
        }
        CSRegister::instret => {
            check_counter(a, csr, mode)?;
            a.read_minstret()
        }
        CSRegister::mvendorid | CSRegister::marchid | CSRegister::mimpid | CSRegister::mhartid => 0,
        _ => match csr.backing_field() {
            Some(field) => a.read_field(field),
            None => return Err(Exception::IllegalInstruction),
        },
    };
    Ok(value)
}

/// Write a CSR. Privilege and writability have already been checked.
fn csr_write<A: StateAccess>(a: &mut A, csr: CSRegister, value: u64) -> Result<(), Exception> {
    match csr {
        CSRegister::sstatus => {
            let mstatus = a.read_mstatus();
            a.write_mstatus((mstatus & !SSTATUS_MASK) | (value & SSTATUS_MASK));
        }
        CSRegister::sie => {
            let mideleg = a.read_mideleg();
            let mie = a.read_mie();
            a.write_mie((mie & !mideleg) | (value & mideleg));
        }
        CSRegister::sip => {
            let mideleg = a.read_mideleg();
            let mip = a.read_mip();
            a.write_mip((mip & !mideleg) | (value & mideleg));
        }
        // WARL; this implementation discards writes
        CSRegister::misa => {}
        _ => match csr.backing_field() {
            Some(field) => a.write_field(field, value),
            None => return Err(Exception::IllegalInstruction),
        },
    }
    Ok(())
}

/// `CSRRW` and the shared replace path
pub fn run_csrrw<A: StateAccess>(a: &mut A, args: &CsrArgs) -> Result<PcUpdate, Exception> {
    let value = |a: &mut A| a.read_x(args.rs1);
    csr_replace(a, args.csr, args.rd, value)
}

/// `CSRRWI`
pub fn run_csrrwi<A: StateAccess>(a: &mut A, args: &CsriArgs) -> Result<PcUpdate, Exception> {
    csr_replace(a, args.csr, args.rd, |_| args.imm)
}

fn csr_replace<A: StateAccess>(
    a: &mut A,
    csr: CSRegister,
    rd: crate::machine_state::registers::XRegister,
    value: impl FnOnce(&mut A) -> u64,
) -> Result<PcUpdate, Exception> {
    let mode = a.read_iflags_prv();
    csr.check_privilege(mode)?;
    csr.check_write()?;

    let value = value(a);
    // When `rd = x0`, the CSR read and its side effects are suppressed.
    if rd.is_zero() {
        csr_write(a, csr, value)?;
    } else {
        let old = csr_read(a, csr, mode)?;
        csr_write(a, csr, value)?;
        a.write_x(rd, old);
    }
    Ok(PcUpdate::Next)
}

/// `CSRRS`
pub fn run_csrrs<A: StateAccess>(a: &mut A, args: &CsrArgs) -> Result<PcUpdate, Exception> {
    csr_set_clear(a, args.csr, args.rd, args.rs1.is_zero(), |a| a.read_x(args.rs1), false)
}

/// `CSRRC`
pub fn run_csrrc<A: StateAccess>(a: &mut A, args: &CsrArgs) -> Result<PcUpdate, Exception> {
    csr_set_clear(a, args.csr, args.rd, args.rs1.is_zero(), |a| a.read_x(args.rs1), true)
}

/// `CSRRSI`
pub fn run_csrrsi<A: StateAccess>(a: &mut A, args: &CsriArgs) -> Result<PcUpdate, Exception> {
    csr_set_clear(a, args.csr, args.rd, args.imm == 0, |_| args.imm, false)
}

/// `CSRRCI`
pub fn run_csrrci<A: StateAccess>(a: &mut A, args: &CsriArgs) -> Result<PcUpdate, Exception> {
    csr_set_clear(a, args.csr, args.rd, args.imm == 0, |_| args.imm, true)
}

fn csr_set_clear<A: StateAccess>(
    a: &mut A,
    csr: CSRegister,
    rd: crate::machine_state::registers::XRegister,
    no_write: bool,
    value: impl FnOnce(&mut A) -> u64,
    clear: bool,
) -> Result<PcUpdate, Exception> {
    let mode = a.read_iflags_prv();
    csr.check_privilege(mode)?;

    // When the source is `x0` (or a zero immediate), no write side effects
    // are triggered, and the CSR may be read-only.
    let old = if no_write {
        csr_read(a, csr, mode)?
    } else {
        csr.check_write()?;
        let bits = value(a);
        let old = csr_read(a, csr, mode)?;
        let updated = if clear { old & !bits } else { old | bits };
        csr_write(a, csr, updated)?;
        old
    };

    a.write_x(rd, old);
    Ok(PcUpdate::Next)
}

#[cfg(test)]
mod tests {
    use crate::interpreter::step_uarch;
    use crate::machine_state::csregisters::MISA_RESET;
    use crate::machine_state::pma::{PmaEntry, PmaFlags, PMA_PAGE_SIZE, RAM_START, ROM_START};
    use crate::machine_state::registers::{t0, t1};
    use crate::machine_state::MachineState;
    use crate::state_access::DirectAccess;

    fn boot_state(program: &[u32]) -> MachineState {
        let image: Vec<u8> = program.iter().flat_map(|w| w.to_le_bytes()).collect();
        MachineState::new(vec![
            PmaEntry::memory(
                ROM_START,
                PMA_PAGE_SIZE,
                PmaFlags::READ.union(PmaFlags::EXECUTE),
                image,
            ),
            PmaEntry::memory(RAM_START, PMA_PAGE_SIZE, PmaFlags::READ, vec![]),
        ])
    }

    fn step(state: &mut MachineState) {
        let mut access = DirectAccess::new(state);
        step_uarch(&mut access);
    }

    #[test]
    fn test_csrrw_replaces_and_reads_old() {
        // csrrw t0, mscratch, t1
        let mut state = boot_state(&[0x3403_12F3]);
        state.mscratch = 0xAAAA;
        state.xregisters.write(t1, 0xBBBB);
        step(&mut state);
        assert_eq!(state.mscratch, 0xBBBB);
        assert_eq!(state.xregisters.read(t0), 0xAAAA);
    }

    #[test]
    fn test_csrrs_reads_misa() {
        // csrrs t0, misa, x0
        let mut state = boot_state(&[0x3010_22F3]);
        step(&mut state);
        assert_eq!(state.xregisters.read(t0), MISA_RESET);
    }

    #[test]
    fn test_misa_writes_are_discarded() {
        // csrrw x0, misa, t1
        let mut state = boot_state(&[0x3013_1073]);
        state.xregisters.write(t1, 0);
        step(&mut state);
        assert_eq!(state.misa, MISA_RESET);
        // No trap happened
        assert_eq!(state.pc, ROM_START + 4);
    }

    #[test]
    fn test_csr_privilege_violation_traps() {
        // csrrw t0, mscratch, t1 from user mode
        let mut state = boot_state(&[0x3403_12F3]);
        state.iflags_prv = crate::machine_state::mode::Mode::User;
        state.mtvec = RAM_START;
        step(&mut state);
        assert_eq!(state.pc, RAM_START);
        assert_eq!(state.mcause, 2);
    }

    #[test]
    fn test_read_only_counter_write_traps() {
        // csrrw t0, cycle, t1
        let mut state = boot_state(&[0xC003_12F3]);
        state.mtvec = RAM_START;
        step(&mut state);
        assert_eq!(state.mcause, 2);
    }

    #[test]
    fn test_cycle_read_in_machine_mode() {
        // csrrs t0, cycle, x0
        let mut state = boot_state(&[0xC000_22F3]);
        state.mcycle = 123;
        step(&mut state);
        assert_eq!(state.xregisters.read(t0), 123);
    }
}
