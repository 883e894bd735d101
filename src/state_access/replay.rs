// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Replaying access back-end
//!
//! Serves every access of the step engine from an access log alone. Each
//! consumed entry must match the replayed operation in kind, address and
//! size, and its sibling path must chain the recorded value to the current
//! root; writes additionally pin the written value and advance the root.
//! The machine state itself is never loaded.
//!
//! Violations unwind with a typed [`ReplayFault`] payload which the
//! verifier entry points catch; the step engine in between stays oblivious.

use std::panic::resume_unwind;

use super::StateAccess;
use crate::access_log::{Access, AccessLog, AccessType};
use crate::machine_state::pma::{PmaFlags, PmaView};
use crate::machine_state::registers::XRegister;
use crate::machine_state::shadow::{self, ScalarField};
use crate::merkle::proof::path_root;
use crate::merkle::{Digest, LOG2_WORD_SIZE, SIBLINGS_PER_WORD};
use crate::traps::Exception;

/// Why the replay rejected the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayFaultCause {
    /// The engine performed an access but the log has no more entries.
    MissingAccess,
    /// Entry kind does not match the replayed operation.
    KindMismatch,
    /// Entry address does not match the replayed operation.
    AddressMismatch,
    /// Entry size is not one word.
    SizeMismatch,
    /// Entry value is not `2^log2_size` bytes long.
    ValueSizeMismatch,
    /// Sibling path does not reach from a word to the root.
    SiblingCountMismatch,
    /// A write entry is missing its written value.
    MissingWrittenValue,
    /// The reconstructed path root disagrees with the current root.
    ProofMismatch,
    /// The logged written value disagrees with the replayed operation.
    WrittenValueMismatch,
}

impl std::fmt::Display for ReplayFaultCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ReplayFaultCause::MissingAccess => "log has no entry for this access",
            ReplayFaultCause::KindMismatch => "access kind does not match the operation",
            ReplayFaultCause::AddressMismatch => "access address does not match the operation",
            ReplayFaultCause::SizeMismatch => "access size is not one word",
            ReplayFaultCause::ValueSizeMismatch => "value length does not match the access size",
            ReplayFaultCause::SiblingCountMismatch => "sibling path does not span word to root",
            ReplayFaultCause::MissingWrittenValue => "write entry is missing its written value",
            ReplayFaultCause::ProofMismatch => "reconstructed root does not match",
            ReplayFaultCause::WrittenValueMismatch => {
                "written value does not match the operation"
            }
        };
        f.write_str(text)
    }
}

/// Typed unwind payload raised by [`ReplayAccess`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayFault {
    /// Index of the offending entry (the log length when entries ran out)
    pub index: usize,
    pub cause: ReplayFaultCause,
}

/// Access back-end used by the verifier
pub struct ReplayAccess<'a> {
    log: &'a AccessLog,
    next: usize,
    current_root: Digest,
}

impl<'a> ReplayAccess<'a> {
    /// Replay `log` starting from the claimed `initial_root`.
    pub fn new(log: &'a AccessLog, initial_root: Digest) -> Self {
        ReplayAccess {
            log,
            next: 0,
            current_root: initial_root,
        }
    }

    /// Root hash after all consumed writes
    pub fn current_root(&self) -> Digest {
        self.current_root
    }

    /// Number of log entries consumed so far
    pub fn consumed(&self) -> usize {
        self.next
    }

    /// Number of log entries not consumed by the replayed operation
    pub fn leftover(&self) -> usize {
        self.log.len() - self.next
    }

    fn fault(&self, index: usize, cause: ReplayFaultCause) -> ! {
        // [`resume_unwind`] avoids the panic hook; the verifier catches the
        // payload and turns it into an error.
        resume_unwind(Box::new(ReplayFault { index, cause }))
    }

    /// Consume the next entry, which must be an access of `expected` kind to
    /// the word at `address`, and check its proof against the current root.
    fn expect(&mut self, expected: AccessType, address: u64) -> &'a Access {
        let index = self.next;
        let Some(access) = self.log.accesses().get(index) else {
            self.fault(index, ReplayFaultCause::MissingAccess);
        };
        self.next += 1;

        if access.access_type != expected {
            self.fault(index, ReplayFaultCause::KindMismatch);
        }
        if access.address != address {
            self.fault(index, ReplayFaultCause::AddressMismatch);
        }
        if access.log2_size != LOG2_WORD_SIZE {
            self.fault(index, ReplayFaultCause::SizeMismatch);
        }
        if access.value_read.len() != 8 {
            self.fault(index, ReplayFaultCause::ValueSizeMismatch);
        }
        if access.sibling_hashes.len() != SIBLINGS_PER_WORD {
            self.fault(index, ReplayFaultCause::SiblingCountMismatch);
        }

        let leaf = Digest::of(&access.value_read);
        let root = path_root(leaf, address, LOG2_WORD_SIZE, &access.sibling_hashes);
        if root != self.current_root {
            self.fault(index, ReplayFaultCause::ProofMismatch);
        }

        access
    }

    /// Consume a read of the word at `address` and return its value.
    fn expect_read(&mut self, address: u64) -> u64 {
        let access = self.expect(AccessType::Read, address);
        u64::from_le_bytes(access.value_read.as_slice().try_into().unwrap_or([0; 8]))
    }

    /// Consume a write of `value` to the word at `address` and advance the
    /// current root past it.
    fn expect_write(&mut self, address: u64, value: u64) {
        let index = self.next;
        let access = self.expect(AccessType::Write, address);

        let Some(written) = &access.value_written else {
            self.fault(index, ReplayFaultCause::MissingWrittenValue);
        };
        if written.len() != 8 {
            self.fault(index, ReplayFaultCause::ValueSizeMismatch);
        }
        if written.as_slice() != value.to_le_bytes() {
            self.fault(index, ReplayFaultCause::WrittenValueMismatch);
        }

        let leaf = Digest::of(written);
        self.current_root = path_root(leaf, address, LOG2_WORD_SIZE, &access.sibling_hashes);
    }
}

impl StateAccess for ReplayAccess<'_> {
    fn read_field(&mut self, field: ScalarField) -> u64 {
        self.expect_read(field.address())
    }

    fn write_field(&mut self, field: ScalarField, value: u64) {
        self.expect_write(field.address(), value)
    }

    fn read_xregister(&mut self, reg: XRegister) -> u64 {
        self.expect_read(shadow::xregister_address(reg))
    }

    fn write_xregister(&mut self, reg: XRegister, value: u64) {
        self.expect_write(shadow::xregister_address(reg), value)
    }

    fn read_pma_istart(&mut self, index: usize) -> u64 {
        self.expect_read(shadow::pma_istart_address(index))
    }

    fn read_pma_ilength(&mut self, index: usize) -> u64 {
        self.expect_read(shadow::pma_ilength_address(index))
    }

    fn read_memory_word(&mut self, pma: &PmaView, paddr: u64) -> Result<u64, Exception> {
        // Device contents are not committed; a proof-carrying log cannot
        // contain them.
        if pma.flags.contains(PmaFlags::DEVICE) {
            return Err(Exception::LoadAccessFault(paddr));
        }
        Ok(self.expect_read(paddr))
    }

    fn write_memory_word(
        &mut self,
        pma: &PmaView,
        paddr: u64,
        value: u64,
    ) -> Result<(), Exception> {
        if pma.flags.contains(PmaFlags::DEVICE) {
            return Err(Exception::StoreAccessFault(paddr));
        }
        self.expect_write(paddr, value);
        Ok(())
    }

    fn fetch_word(&mut self, paddr: u64) -> u64 {
        self.expect_read(paddr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_log::LogType;
    use crate::machine_state::pma::{PmaEntry, PmaFlags, PMA_PAGE_SIZE, RAM_START};
    use crate::machine_state::MachineState;
    use crate::state_access::RecordAccess;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn recorded_session() -> (AccessLog, Digest, Digest) {
        let mut state = MachineState::new(vec![PmaEntry::memory(
            RAM_START,
            PMA_PAGE_SIZE,
            PmaFlags::READ.union(PmaFlags::WRITE),
            vec![],
        )]);
        let mut access = RecordAccess::new(&mut state, LogType::StepUarch).unwrap();
        let _ = access.read_pc();
        access.write_mcycle(5);
        let initial = access.initial_root();
        let final_root = access.current_root();
        (access.into_log(), initial, final_root)
    }

    #[test]
    fn test_replay_accepts_honest_log() {
        let (log, initial, final_root) = recorded_session();
        let mut replay = ReplayAccess::new(&log, initial);
        assert_eq!(replay.read_pc(), crate::machine_state::pma::RESET_PC);
        replay.write_mcycle(5);
        assert_eq!(replay.leftover(), 0);
        assert_eq!(replay.current_root(), final_root);
    }

    #[test]
    fn test_replay_rejects_wrong_initial_root() {
        let (log, _, _) = recorded_session();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut replay = ReplayAccess::new(&log, Digest::of(b"bogus"));
            replay.read_pc()
        }));
        let fault = *result.unwrap_err().downcast::<ReplayFault>().unwrap();
        assert_eq!(fault.index, 0);
        assert_eq!(fault.cause, ReplayFaultCause::ProofMismatch);
    }

    #[test]
    fn test_replay_rejects_wrong_kind_and_address() {
        let (log, initial, _) = recorded_session();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut replay = ReplayAccess::new(&log, initial);
            replay.write_pc(0)
        }));
        let fault = *result.unwrap_err().downcast::<ReplayFault>().unwrap();
        assert_eq!(fault.cause, ReplayFaultCause::KindMismatch);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut replay = ReplayAccess::new(&log, initial);
            replay.read_mepc()
        }));
        let fault = *result.unwrap_err().downcast::<ReplayFault>().unwrap();
        assert_eq!(fault.cause, ReplayFaultCause::AddressMismatch);
    }

    #[test]
    fn test_replay_rejects_wrong_written_value() {
        let (log, initial, _) = recorded_session();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut replay = ReplayAccess::new(&log, initial);
            let _ = replay.read_pc();
            replay.write_mcycle(6)
        }));
        let fault = *result.unwrap_err().downcast::<ReplayFault>().unwrap();
        assert_eq!(fault.index, 1);
        assert_eq!(fault.cause, ReplayFaultCause::WrittenValueMismatch);
    }

    #[test]
    fn test_replay_rejects_exhausted_log() {
        let (log, initial, _) = recorded_session();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut replay = ReplayAccess::new(&log, initial);
            let _ = replay.read_pc();
            replay.write_mcycle(5);
            replay.read_mcycle()
        }));
        let fault = *result.unwrap_err().downcast::<ReplayFault>().unwrap();
        assert_eq!(fault.index, 2);
        assert_eq!(fault.cause, ReplayFaultCause::MissingAccess);
    }
}
