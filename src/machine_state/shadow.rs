// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Shadow region layout
//!
//! Every named scalar of the machine state occupies a fixed 8-byte slot in
//! the shadow region at the bottom of the physical address space, so that
//! registers and CSRs are Merkle-addressed exactly like memory words. The
//! PMA descriptor region follows, with one 32-byte descriptor per entry.
//! Slot addresses are part of the commitment scheme and stable across
//! versions.

use crate::machine_state::csregisters::MISA_RESET;
use crate::machine_state::mode::Mode;
use crate::machine_state::pma::RESET_PC;
use crate::machine_state::registers::XRegister;

/// Start of the shadow region holding the named scalars
pub const SHADOW_STATE_START: u64 = 0x0;

/// Length of the shadow scalar region
pub const SHADOW_STATE_LENGTH: u64 = 0x1000;

/// Start of the PMA descriptor region
pub const SHADOW_PMAS_START: u64 = 0x1000;

/// Length of the PMA descriptor region
pub const SHADOW_PMAS_LENGTH: u64 = 0x400;

/// Maximum number of PMA descriptor slots
pub const PMA_MAX: usize = (SHADOW_PMAS_LENGTH / 32) as usize;

/// Shadow address of the 8-byte slot holding general register `reg`
#[inline]
pub const fn xregister_address(reg: XRegister) -> u64 {
    SHADOW_STATE_START + 8 * reg as u64
}

/// Shadow address of the `istart` word of PMA descriptor `index`
#[inline]
pub const fn pma_istart_address(index: usize) -> u64 {
    SHADOW_PMAS_START + 32 * index as u64
}

/// Shadow address of the `ilength` word of PMA descriptor `index`
#[inline]
pub const fn pma_ilength_address(index: usize) -> u64 {
    pma_istart_address(index) + 8
}

macro_rules! scalar_fields {
    ($( $variant:ident = $offset:literal => $reset:expr; )*) => {
        /// Named scalar of the machine state, excluding the general
        /// registers which are addressed through [`xregister_address`]
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            Hash,
            strum::EnumIter,
            strum::Display,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub enum ScalarField {
            $($variant),*
        }

        impl ScalarField {
            /// All fields in canonical order; this order is the one the
            /// machine reset writes fields in.
            pub const ALL: &'static [ScalarField] = &[$(ScalarField::$variant),*];

            /// Offset of the field's slot within the shadow region
            pub const fn offset(self) -> u64 {
                match self {
                    $(ScalarField::$variant => $offset),*
                }
            }

            /// Shadow address of the field's 8-byte slot
            pub const fn address(self) -> u64 {
                SHADOW_STATE_START + self.offset()
            }

            /// Value of the field after machine reset
            pub fn reset_value(self) -> u64 {
                match self {
                    $(ScalarField::$variant => $reset),*
                }
            }
        }
    };
}

// The general registers occupy offsets 0x000..0x100; scalars follow.
scalar_fields! {
    Pc         = 0x100 => RESET_PC;
    Mcycle     = 0x108 => 0;
    Minstret   = 0x110 => 0;
    Mstatus    = 0x118 => 0;
    Mtvec      = 0x120 => 0;
    Mscratch   = 0x128 => 0;
    Mepc       = 0x130 => 0;
    Mcause     = 0x138 => 0;
    Mtval      = 0x140 => 0;
    Misa       = 0x148 => MISA_RESET;
    Mie        = 0x150 => 0;
    Mip        = 0x158 => 0;
    Medeleg    = 0x160 => 0;
    Mideleg    = 0x168 => 0;
    Mcounteren = 0x170 => 0;
    Stvec      = 0x178 => 0;
    Sscratch   = 0x180 => 0;
    Sepc       = 0x188 => 0;
    Scause     = 0x190 => 0;
    Stval      = 0x198 => 0;
    Satp       = 0x1A0 => 0;
    Scounteren = 0x1A8 => 0;
    Ilrsc      = 0x1B0 => u64::MAX;
    IflagsH    = 0x1B8 => 0;
    IflagsI    = 0x1C0 => 0;
    IflagsPrv  = 0x1C8 => Mode::Machine as u64;
    Mtimecmp   = 0x1D0 => 0;
    Fromhost   = 0x1D8 => 0;
    Tohost     = 0x1E0 => 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine_state::registers;
    use strum::IntoEnumIterator;

    #[test]
    fn test_slots_do_not_collide() {
        let mut addresses: Vec<u64> = ScalarField::iter().map(|f| f.address()).collect();
        addresses.extend((0..registers::XREG_COUNT).map(|i| 8 * i as u64));
        addresses.sort_unstable();
        let len = addresses.len();
        addresses.dedup();
        assert_eq!(addresses.len(), len);
    }

    #[test]
    fn test_slots_stay_within_shadow_region() {
        for field in ScalarField::iter() {
            assert!(field.address() + 8 <= SHADOW_STATE_START + SHADOW_STATE_LENGTH);
            assert_eq!(field.address() % 8, 0);
        }
    }

    #[test]
    fn test_scalars_follow_register_file() {
        // The register file ends at 0x100; no scalar may overlap it.
        for field in ScalarField::iter() {
            assert!(field.offset() >= 0x100);
        }
    }

    #[test]
    fn test_pma_descriptor_addresses() {
        assert_eq!(pma_istart_address(0), 0x1000);
        assert_eq!(pma_ilength_address(0), 0x1008);
        assert_eq!(pma_istart_address(2), 0x1040);
        assert!(pma_ilength_address(PMA_MAX - 1) + 8 <= SHADOW_PMAS_START + SHADOW_PMAS_LENGTH);
    }
}
