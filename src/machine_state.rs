// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Machine state
//!
//! The state is a flat record of named 64-bit scalars (general registers,
//! program counter, counters, CSRs, internal flags and device latches) plus
//! the ordered list of physical memory attribute entries. Every scalar has a
//! fixed slot in the shadow region ([`shadow`]) so the whole state is
//! Merkle-addressed uniformly with memory.
//!
//! The state is only ever mutated by the step engine through an access
//! back-end ([`crate::state_access`]); nothing else touches it during a
//! step.

pub mod csregisters;
pub mod mode;
pub mod pma;
pub mod registers;
pub mod shadow;

use mode::Mode;
use pma::{PmaEntry, RAM_MAX_LENGTH, RAM_START, ROM_MAX_LENGTH, ROM_START};
use registers::XRegisters;
use shadow::{ScalarField, SHADOW_PMAS_LENGTH, SHADOW_PMAS_START, SHADOW_STATE_LENGTH,
             SHADOW_STATE_START, PMA_MAX};

use crate::merkle::{MerkleError, StateTree};

/// Whether a word at `paddr` may be fetched as an instruction.
///
/// The executable envelopes are fixed by the memory map: the boot ROM and
/// main RAM windows at their maximum extents. Backed words read their
/// memory, unbacked words within an envelope read as zero; this makes the
/// fetch path independent of the configured range lengths and identical
/// across the access back-ends.
pub fn in_fetch_envelope(paddr: u64) -> bool {
    (ROM_START..ROM_START + ROM_MAX_LENGTH).contains(&paddr)
        || (RAM_START..RAM_START + RAM_MAX_LENGTH).contains(&paddr)
}

/// The machine state record
#[derive(Clone, Debug)]
pub struct MachineState {
    /// General registers
    pub xregisters: XRegisters,

    /// Program counter
    pub pc: u64,

    /// Cycle counter, advanced by every step
    pub mcycle: u64,
    /// Retired-instruction counter; ordinary state, not advanced by steps
    pub minstret: u64,

    // Machine-mode CSRs
    pub mstatus: u64,
    pub mtvec: u64,
    pub mscratch: u64,
    pub mepc: u64,
    pub mcause: u64,
    pub mtval: u64,
    pub misa: u64,
    pub mie: u64,
    pub mip: u64,
    pub medeleg: u64,
    pub mideleg: u64,
    pub mcounteren: u64,

    // Supervisor-mode CSRs
    pub stvec: u64,
    pub sscratch: u64,
    pub sepc: u64,
    pub scause: u64,
    pub stval: u64,
    pub satp: u64,
    pub scounteren: u64,

    /// Load-reserved address tracker; `u64::MAX` means no reservation
    pub ilrsc: u64,

    /// Machine is halted
    pub iflags_h: bool,
    /// Machine is idle, waiting for a host response
    pub iflags_i: bool,
    /// Current privilege level
    pub iflags_prv: Mode,

    // Device latches
    pub mtimecmp: u64,
    pub fromhost: u64,
    pub tohost: u64,

    /// Physical memory attribute entries, ordered by start address
    pmas: Vec<PmaEntry>,
}

macro_rules! scalar_field_access {
    ($( $variant:ident => $field:ident ),* $(,)?) => {
        /// Read a named scalar.
        pub fn read_field(&self, field: ScalarField) -> u64 {
            match field {
                $(ScalarField::$variant => self.$field),*,
                ScalarField::IflagsH => self.iflags_h as u64,
                ScalarField::IflagsI => self.iflags_i as u64,
                ScalarField::IflagsPrv => self.iflags_prv as u64,
            }
        }

        /// Write a named scalar.
        pub fn write_field(&mut self, field: ScalarField, value: u64) {
            match field {
                $(ScalarField::$variant => self.$field = value),*,
                ScalarField::IflagsH => self.iflags_h = value != 0,
                ScalarField::IflagsI => self.iflags_i = value != 0,
                ScalarField::IflagsPrv => self.iflags_prv = Mode::from_bits(value),
            }
        }
    };
}

impl MachineState {
    /// Create a machine state with reset scalar values and the given PMA
    /// entries.
    pub fn new(pmas: Vec<PmaEntry>) -> Self {
        debug_assert!(pmas.len() <= PMA_MAX);
        let mut state = MachineState {
            xregisters: XRegisters::default(),
            pc: 0,
            mcycle: 0,
            minstret: 0,
            mstatus: 0,
            mtvec: 0,
            mscratch: 0,
            mepc: 0,
            mcause: 0,
            mtval: 0,
            misa: 0,
            mie: 0,
            mip: 0,
            medeleg: 0,
            mideleg: 0,
            mcounteren: 0,
            stvec: 0,
            sscratch: 0,
            sepc: 0,
            scause: 0,
            stval: 0,
            satp: 0,
            scounteren: 0,
            ilrsc: 0,
            iflags_h: false,
            iflags_i: false,
            iflags_prv: Mode::Machine,
            mtimecmp: 0,
            fromhost: 0,
            tohost: 0,
            pmas,
        };
        state.reset_scalars();
        state
    }

    scalar_field_access! {
        Pc => pc,
        Mcycle => mcycle,
        Minstret => minstret,
        Mstatus => mstatus,
        Mtvec => mtvec,
        Mscratch => mscratch,
        Mepc => mepc,
        Mcause => mcause,
        Mtval => mtval,
        Misa => misa,
        Mie => mie,
        Mip => mip,
        Medeleg => medeleg,
        Mideleg => mideleg,
        Mcounteren => mcounteren,
        Stvec => stvec,
        Sscratch => sscratch,
        Sepc => sepc,
        Scause => scause,
        Stval => stval,
        Satp => satp,
        Scounteren => scounteren,
        Ilrsc => ilrsc,
        Mtimecmp => mtimecmp,
        Fromhost => fromhost,
        Tohost => tohost,
    }

    /// Reset every scalar (and the register file) to its reset value,
    /// leaving memory untouched.
    pub fn reset_scalars(&mut self) {
        self.xregisters.reset();
        for &field in ScalarField::ALL {
            self.write_field(field, field.reset_value());
        }
    }

    /// The `index`-th PMA entry, if populated
    pub fn pma_ref(&self, index: usize) -> Option<&PmaEntry> {
        self.pmas.get(index)
    }

    /// Packed descriptor words of the `index`-th PMA entry. Vacant slots
    /// read as all-zero descriptors, matching their committed (pristine)
    /// shadow words; a zero length is what terminates the list.
    pub fn pma_descriptor(&self, index: usize) -> (u64, u64) {
        match self.pmas.get(index) {
            Some(entry) => (entry.istart(), entry.ilength()),
            None => (0, 0),
        }
    }

    /// The populated PMA entries
    pub fn pmas(&self) -> &[PmaEntry] {
        &self.pmas
    }

    /// Mutable access to the `index`-th PMA entry
    pub fn pma_mut(&mut self, index: usize) -> Option<&mut PmaEntry> {
        self.pmas.get_mut(index)
    }

    /// Find the PMA entry backing `paddr`.
    pub fn find_pma(&self, paddr: u64) -> Option<(usize, &PmaEntry)> {
        self.pmas
            .iter()
            .enumerate()
            .find(|(_, entry)| {
                !entry.is_empty()
                    && paddr >= entry.start()
                    && paddr - entry.start() < entry.length()
            })
    }

    /// Mutable variant of [`Self::find_pma`]
    pub fn find_pma_mut(&mut self, paddr: u64) -> Option<&mut PmaEntry> {
        self.pmas.iter_mut().find(|entry| {
            !entry.is_empty() && paddr >= entry.start() && paddr - entry.start() < entry.length()
        })
    }

    /// Read the word fetched from `paddr`, which must be word-aligned and
    /// within the fetch envelope. Unbacked words read as zero.
    pub fn fetch_word(&self, paddr: u64) -> u64 {
        debug_assert!(in_fetch_envelope(paddr));
        match self.find_pma(paddr) {
            Some((_, entry)) => entry.read_word(paddr).unwrap_or(0),
            None => 0,
        }
    }

    /// Serialise the shadow scalar region.
    pub fn shadow_image(&self) -> Vec<u8> {
        let mut image = vec![0u8; SHADOW_STATE_LENGTH as usize];
        for i in 0..registers::XREG_COUNT {
            let reg_value = self.xregisters.read_index(i);
            image[8 * i..8 * i + 8].copy_from_slice(&reg_value.to_le_bytes());
        }
        for &field in ScalarField::ALL {
            let offset = field.offset() as usize;
            image[offset..offset + 8].copy_from_slice(&self.read_field(field).to_le_bytes());
        }
        image
    }

    /// Serialise the PMA descriptor region.
    pub fn pma_shadow_image(&self) -> Vec<u8> {
        let mut image = vec![0u8; SHADOW_PMAS_LENGTH as usize];
        for (i, entry) in self.pmas.iter().enumerate() {
            let offset = 32 * i;
            image[offset..offset + 8].copy_from_slice(&entry.istart().to_le_bytes());
            image[offset + 8..offset + 16].copy_from_slice(&entry.ilength().to_le_bytes());
        }
        image
    }

    /// Build the Merkle tree committing to the whole state.
    ///
    /// Device ranges have no committed contents; their latches live in the
    /// shadow scalars.
    pub fn build_merkle_tree(&self) -> Result<StateTree, MerkleError> {
        let shadow = self.shadow_image();
        let pma_shadow = self.pma_shadow_image();

        let mut regions: Vec<(u64, &[u8])> = vec![
            (SHADOW_STATE_START, shadow.as_slice()),
            (SHADOW_PMAS_START, pma_shadow.as_slice()),
        ];
        for entry in &self.pmas {
            if let Some(bytes) = entry.memory_bytes() {
                regions.push((entry.start(), bytes));
            }
        }
        StateTree::new(regions)
    }

    /// Whether any PMA range overlaps another or violates the reserved
    /// shadow space. Used as a state invariant check at construction.
    pub fn pmas_are_coherent(&self) -> bool {
        let mut ranges: Vec<(u64, u64)> = self
            .pmas
            .iter()
            .filter(|entry| !entry.is_empty())
            .map(|entry| (entry.start(), entry.length()))
            .collect();
        ranges.sort_unstable();
        ranges
            .windows(2)
            .all(|pair| pair[0].0 + pair[0].1 <= pair[1].0)
            && ranges
                .first()
                .map(|&(start, _)| start >= SHADOW_PMAS_START + SHADOW_PMAS_LENGTH)
                .unwrap_or(true)
    }
}
