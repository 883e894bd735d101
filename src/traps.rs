// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! RISC-V exceptions as modelled by the machine
//!
//! Only synchronous exceptions exist in this machine: there is no
//! asynchronous interrupt injection, so every trap is raised by the
//! instruction being executed (or its fetch) and handled in the same step.
//! Misaligned data accesses are folded into the access-fault (bus error)
//! causes.

use std::fmt::Formatter;

use crate::machine_state::mode::Mode;

/// RISC-V exceptions (also known as synchronous exceptions)
#[derive(PartialEq, Eq, thiserror::Error, strum::Display, Clone, Copy)]
pub enum Exception {
    /// `InstructionAddressMisaligned(addr)` where `addr` is the misaligned target
    InstructionAddressMisaligned(u64),
    /// `InstructionAccessFault(addr)` where `addr` is the faulting instruction address
    InstructionAccessFault(u64),
    IllegalInstruction,
    Breakpoint,
    /// `LoadAccessFault(addr)` where `addr` is the faulting load address
    LoadAccessFault(u64),
    /// `StoreAccessFault(addr)` where `addr` is the faulting store address
    StoreAccessFault(u64),
    /// Environment call from the given privilege mode
    EnvCall(Mode),
}

impl Exception {
    /// Cause code stored in `mcause`/`scause` when the exception traps
    pub fn cause(&self) -> u64 {
        match self {
            Exception::InstructionAddressMisaligned(_) => 0,
            Exception::InstructionAccessFault(_) => 1,
            Exception::IllegalInstruction => 2,
            Exception::Breakpoint => 3,
            Exception::LoadAccessFault(_) => 5,
            Exception::StoreAccessFault(_) => 7,
            Exception::EnvCall(mode) => 8 + *mode as u64,
        }
    }

    /// Value stored in `mtval`/`stval` when the exception traps
    pub fn trap_value(&self) -> u64 {
        match self {
            Exception::InstructionAddressMisaligned(addr)
            | Exception::InstructionAccessFault(addr)
            | Exception::LoadAccessFault(addr)
            | Exception::StoreAccessFault(addr) => *addr,
            Exception::IllegalInstruction
            | Exception::Breakpoint
            | Exception::EnvCall(_) => 0,
        }
    }
}

impl core::fmt::Debug for Exception {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::InstructionAddressMisaligned(addr) => {
                write!(f, "InstructionAddressMisaligned({addr:#X})")
            }
            Self::InstructionAccessFault(addr) => write!(f, "InstructionAccessFault({addr:#X})"),
            Self::LoadAccessFault(addr) => write!(f, "LoadAccessFault({addr:#X})"),
            Self::StoreAccessFault(addr) => write!(f, "StoreAccessFault({addr:#X})"),
            other => write!(f, "{other}"),
        }
    }
}
