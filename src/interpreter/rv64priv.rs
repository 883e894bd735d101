// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Privileged instructions
//!
//! `ECALL` in machine mode doubles as the environment interface: `a7 = 1`
//! halts the machine, `a7 = 2` latches the low byte of `a0` into `tohost`
//! (console output). Every other environment call traps with the cause for
//! the calling privilege level.

use super::PcUpdate;
use crate::bits::bits_subset;
use crate::machine_state::csregisters::{
    MSTATUS_MIE, MSTATUS_MPIE, MSTATUS_MPP, MSTATUS_MPP_SHIFT, MSTATUS_SIE, MSTATUS_SPIE,
    MSTATUS_SPP,
};
use crate::machine_state::mode::Mode;
use crate::machine_state::registers::{a0, a7};
use crate::state_access::StateAccess;
use crate::traps::Exception;

/// Environment call function selector that halts the machine
pub const ECALL_HALT: u64 = 1;

/// Environment call function selector that writes a console byte
pub const ECALL_PUTCHAR: u64 = 2;

/// `ECALL`
pub fn run_ecall<A: StateAccess>(a: &mut A) -> Result<PcUpdate, Exception> {
    let mode = a.read_iflags_prv();
    if mode == Mode::Machine {
        let function = a.read_x(a7);
        match function {
            ECALL_HALT => {
                a.set_iflags_h();
                return Ok(PcUpdate::Next);
            }
            ECALL_PUTCHAR => {
                let byte = a.read_x(a0) & 0xFF;
                a.write_tohost(byte);
                return Ok(PcUpdate::Next);
            }
            _ => {}
        }
    }
    Err(Exception::EnvCall(mode))
}

/// `EBREAK`
pub fn run_ebreak() -> Result<PcUpdate, Exception> {
    Err(Exception::Breakpoint)
}

/// `MRET`
pub fn run_mret<A: StateAccess>(a: &mut A) -> Result<PcUpdate, Exception> {
    let mode = a.read_iflags_prv();
    if mode != Mode::Machine {
        return Err(Exception::IllegalInstruction);
    }

    let mstatus = a.read_mstatus();
    let previous = Mode::from_bits(bits_subset(mstatus, MSTATUS_MPP_SHIFT + 1, MSTATUS_MPP_SHIFT));

    // MIE = MPIE; MPIE = 1; MPP = U
    let mut updated = mstatus & !(MSTATUS_MIE | MSTATUS_MPIE | MSTATUS_MPP);
    if mstatus & MSTATUS_MPIE != 0 {
        updated |= MSTATUS_MIE;
    }
    updated |= MSTATUS_MPIE;
    a.write_mstatus(updated);
    a.write_iflags_prv(previous);

    let target = a.read_mepc();
    Ok(PcUpdate::Set(target))
}

/// `SRET`
pub fn run_sret<A: StateAccess>(a: &mut A) -> Result<PcUpdate, Exception> {
    let mode = a.read_iflags_prv();
    if mode < Mode::Supervisor {
        return Err(Exception::IllegalInstruction);
    }

    let mstatus = a.read_mstatus();
    let previous = if mstatus & MSTATUS_SPP != 0 {
        Mode::Supervisor
    } else {
        Mode::User
    };

    // SIE = SPIE; SPIE = 1; SPP = U
    let mut updated = mstatus & !(MSTATUS_SIE | MSTATUS_SPIE | MSTATUS_SPP);
    if mstatus & MSTATUS_SPIE != 0 {
        updated |= MSTATUS_SIE;
    }
    updated |= MSTATUS_SPIE;
    a.write_mstatus(updated);
    a.write_iflags_prv(previous);

    let target = a.read_sepc();
    Ok(PcUpdate::Set(target))
}

/// `WFI`
///
/// The machine has no asynchronous interrupt sources; waiting for an
/// interrupt means waiting for the host to deliver a response, so the idle
/// flag is raised and `run` breaks until `send_cmio_response` clears it.
pub fn run_wfi<A: StateAccess>(a: &mut A) -> Result<PcUpdate, Exception> {
    a.set_iflags_i();
    Ok(PcUpdate::Next)
}
