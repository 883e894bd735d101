// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Implementation of the RV64I base extension
//!
//! Chapters 4 & 5 - Unprivileged spec

use super::PcUpdate;
use crate::bits::sign_extend;
use crate::parser::instruction::{ITypeArgs, RTypeArgs, SBTypeArgs, UJTypeArgs};
use crate::state_access::StateAccess;
use crate::traps::Exception;

macro_rules! run_r_type {
    ($(#[$m:meta])* $name:ident, |$lhs:ident, $rhs:ident| $result:expr) => {
        $(#[$m])*
        pub fn $name<A: StateAccess>(a: &mut A, args: &RTypeArgs) -> Result<PcUpdate, Exception> {
            let $lhs = a.read_x(args.rs1);
            let $rhs = a.read_x(args.rs2);
            a.write_x(args.rd, $result);
            Ok(PcUpdate::Next)
        }
    };
}

macro_rules! run_i_type {
    ($(#[$m:meta])* $name:ident, |$val:ident, $imm:ident| $result:expr) => {
        $(#[$m])*
        pub fn $name<A: StateAccess>(a: &mut A, args: &ITypeArgs) -> Result<PcUpdate, Exception> {
            let $val = a.read_x(args.rs1);
            let $imm = args.imm;
            a.write_x(args.rd, $result);
            Ok(PcUpdate::Next)
        }
    };
}

run_r_type!(run_add, |lhs, rhs| lhs.wrapping_add(rhs));
run_r_type!(run_sub, |lhs, rhs| lhs.wrapping_sub(rhs));
run_r_type!(run_xor, |lhs, rhs| lhs ^ rhs);
run_r_type!(run_or, |lhs, rhs| lhs | rhs);
run_r_type!(run_and, |lhs, rhs| lhs & rhs);
run_r_type!(
    /// Shift amount is the lowest 6 bits of `rs2` on RV64
    run_sll,
    |lhs, rhs| lhs << (rhs & 0b11_1111)
);
run_r_type!(run_srl, |lhs, rhs| lhs >> (rhs & 0b11_1111));
run_r_type!(run_sra, |lhs, rhs| ((lhs as i64) >> (rhs & 0b11_1111)) as u64);
run_r_type!(run_slt, |lhs, rhs| ((lhs as i64) < (rhs as i64)) as u64);
run_r_type!(run_sltu, |lhs, rhs| (lhs < rhs) as u64);

run_r_type!(
    /// Operates on the lowest 32 bits; the result is sign-extended
    run_addw,
    |lhs, rhs| lhs.wrapping_add(rhs) as i32 as u64
);
run_r_type!(run_subw, |lhs, rhs| lhs.wrapping_sub(rhs) as i32 as u64);
run_r_type!(run_sllw, |lhs, rhs| ((lhs as u32) << (rhs & 0b1_1111)) as i32 as u64);
run_r_type!(run_srlw, |lhs, rhs| ((lhs as u32) >> (rhs & 0b1_1111)) as i32 as u64);
run_r_type!(run_sraw, |lhs, rhs| ((lhs as i32) >> (rhs & 0b1_1111)) as u64);

run_i_type!(run_addi, |val, imm| val.wrapping_add(imm as u64));
run_i_type!(run_xori, |val, imm| val ^ imm as u64);
run_i_type!(run_ori, |val, imm| val | imm as u64);
run_i_type!(run_andi, |val, imm| val & imm as u64);
run_i_type!(run_slti, |val, imm| ((val as i64) < imm) as u64);
run_i_type!(run_sltiu, |val, imm| (val < imm as u64) as u64);
run_i_type!(
    /// The parser has already narrowed the immediate to the shift amount
    run_slli,
    |val, imm| val << imm
);
run_i_type!(run_srli, |val, imm| val >> imm);
run_i_type!(run_srai, |val, imm| ((val as i64) >> imm) as u64);
run_i_type!(run_addiw, |val, imm| val.wrapping_add(imm as u64) as i32 as u64);
run_i_type!(run_slliw, |val, imm| ((val as u32) << imm) as i32 as u64);
run_i_type!(run_srliw, |val, imm| ((val as u32) >> imm) as i32 as u64);
run_i_type!(run_sraiw, |val, imm| ((val as i32) >> imm) as u64);

/// `LUI` U-type instruction
pub fn run_lui<A: StateAccess>(a: &mut A, args: &UJTypeArgs) -> Result<PcUpdate, Exception> {
    a.write_x(args.rd, args.imm as u64);
    Ok(PcUpdate::Next)
}

/// `AUIPC` U-type instruction
pub fn run_auipc<A: StateAccess>(
    a: &mut A,
    args: &UJTypeArgs,
    pc: u64,
) -> Result<PcUpdate, Exception> {
    a.write_x(args.rd, pc.wrapping_add(args.imm as u64));
    Ok(PcUpdate::Next)
}

/// Branch targets must stay 4-byte aligned; taking a misaligned one raises
/// an exception with the target as trap value.
fn checked_target(target: u64) -> Result<PcUpdate, Exception> {
    if target & 3 != 0 {
        return Err(Exception::InstructionAddressMisaligned(target));
    }
    Ok(PcUpdate::Set(target))
}

/// `JAL` J-type instruction
pub fn run_jal<A: StateAccess>(
    a: &mut A,
    args: &UJTypeArgs,
    pc: u64,
) -> Result<PcUpdate, Exception> {
    let target = pc.wrapping_add(args.imm as u64);
    let update = checked_target(target)?;
    a.write_x(args.rd, pc.wrapping_add(4));
    Ok(update)
}

/// `JALR` I-type instruction
pub fn run_jalr<A: StateAccess>(
    a: &mut A,
    args: &ITypeArgs,
    pc: u64,
) -> Result<PcUpdate, Exception> {
    // The lowest bit of the computed target is cleared before the jump.
    let target = a.read_x(args.rs1).wrapping_add(args.imm as u64) & !1;
    let update = checked_target(target)?;
    a.write_x(args.rd, pc.wrapping_add(4));
    Ok(update)
}

macro_rules! run_branch {
    ($name:ident, |$lhs:ident, $rhs:ident| $taken:expr) => {
        pub fn $name<A: StateAccess>(
            a: &mut A,
            args: &SBTypeArgs,
            pc: u64,
        ) -> Result<PcUpdate, Exception> {
            let $lhs = a.read_x(args.rs1);
            let $rhs = a.read_x(args.rs2);
            if $taken {
                checked_target(pc.wrapping_add(args.imm as u64))
            } else {
                Ok(PcUpdate::Next)
            }
        }
    };
}

run_branch!(run_beq, |lhs, rhs| lhs == rhs);
run_branch!(run_bne, |lhs, rhs| lhs != rhs);
run_branch!(run_blt, |lhs, rhs| (lhs as i64) < (rhs as i64));
run_branch!(run_bge, |lhs, rhs| (lhs as i64) >= (rhs as i64));
run_branch!(run_bltu, |lhs, rhs| lhs < rhs);
run_branch!(run_bgeu, |lhs, rhs| lhs >= rhs);

/// Shared load path: compute the address, locate its PMA through the
/// descriptor list and read `2^size_log2` bytes.
fn load<A: StateAccess>(a: &mut A, args: &ITypeArgs, size_log2: u8) -> Result<u64, Exception> {
    let addr = a.read_x(args.rs1).wrapping_add(args.imm as u64);
    let pma = a.find_pma(addr);
    a.read_memory(&pma, addr, size_log2)
}

/// Shared store path
fn store<A: StateAccess>(a: &mut A, args: &SBTypeArgs, size_log2: u8) -> Result<(), Exception> {
    let addr = a.read_x(args.rs1).wrapping_add(args.imm as u64);
    let value = a.read_x(args.rs2);
    let pma = a.find_pma(addr);
    a.write_memory(&pma, addr, value, size_log2)
}

macro_rules! run_load {
    ($name:ident, $size_log2:expr, |$value:ident| $extend:expr) => {
        pub fn $name<A: StateAccess>(a: &mut A, args: &ITypeArgs) -> Result<PcUpdate, Exception> {
            let $value = load(a, args, $size_log2)?;
            a.write_x(args.rd, $extend);
            Ok(PcUpdate::Next)
        }
    };
}

run_load!(run_lb, 0, |value| sign_extend(value, 8));
run_load!(run_lh, 1, |value| sign_extend(value, 16));
run_load!(run_lw, 2, |value| sign_extend(value, 32));
run_load!(run_lbu, 0, |value| value);
run_load!(run_lhu, 1, |value| value);
run_load!(run_lwu, 2, |value| value);
run_load!(run_ld, 3, |value| value);

macro_rules! run_store {
    ($name:ident, $size_log2:expr) => {
        pub fn $name<A: StateAccess>(a: &mut A, args: &SBTypeArgs) -> Result<PcUpdate, Exception> {
            store(a, args, $size_log2)?;
            Ok(PcUpdate::Next)
        }
    };
}

run_store!(run_sb, 0);
run_store!(run_sh, 1);
run_store!(run_sw, 2);
run_store!(run_sd, 3);
