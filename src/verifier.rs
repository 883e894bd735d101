// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Pure verification of access logs
//!
//! The verifier replays the logged operation with the
//! [`ReplayAccess`](crate::state_access::ReplayAccess) back-end: the very
//! step engine that produced the log runs again, but every access is served
//! from — and checked against — the log. A log is accepted iff every sibling
//! path chains correctly from the current root, every access matches the
//! replayed semantics, no entries are left over, and (for the
//! state-transition variants) the final root equals the claim.
//!
//! Each operation has a log-only verifier, which derives the roots and
//! checks internal consistency, and a state-transition verifier, which
//! additionally pins the initial and final root hashes. All of them are
//! side-effect-free; the machine state is never loaded.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use thiserror::Error;

use crate::access_log::{AccessLog, LogType};
use crate::cmio::{send_cmio_response, CmioError};
use crate::interpreter::step_uarch;
use crate::merkle::proof::path_root;
use crate::merkle::{Digest, LOG2_WORD_SIZE, SIBLINGS_PER_WORD};
use crate::reset::reset_state;
use crate::state_access::{ReplayAccess, ReplayFault, ReplayFaultCause};

/// Rejection reasons
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The reconstructed path root of an entry disagrees with the current
    /// root.
    #[error("access {index}: reconstructed root does not match the current root")]
    ProofMismatch { index: usize },

    /// The derived final root disagrees with the claimed one.
    #[error("final root hash does not match the claim")]
    RootMismatch,

    /// The log is structurally unusable for this operation.
    #[error("malformed access log: {0}")]
    LogMalformed(&'static str),

    /// The log kind does not match the requested operation.
    #[error("log records a {0:?} operation")]
    WrongLogType(LogType),

    /// An entry does not match the access the replayed operation performs.
    #[error("access {index}: {cause}")]
    AccessMismatch {
        index: usize,
        cause: ReplayFaultCause,
    },

    /// The operation finished without consuming the whole log.
    #[error("access log has {0} unconsumed accesses")]
    UnconsumedAccesses(usize),

    /// The replayed operation itself rejected its inputs.
    #[error(transparent)]
    Cmio(#[from] CmioError),
}

impl From<ReplayFault> for VerificationError {
    fn from(fault: ReplayFault) -> Self {
        match fault.cause {
            ReplayFaultCause::ProofMismatch => VerificationError::ProofMismatch {
                index: fault.index,
            },
            cause => VerificationError::AccessMismatch {
                index: fault.index,
                cause,
            },
        }
    }
}

/// Derive the root hash the log chains from, using its first entry.
fn initial_root(log: &AccessLog) -> Result<Digest, VerificationError> {
    let first = log
        .accesses()
        .first()
        .ok_or(VerificationError::LogMalformed("log is empty"))?;
    if first.log2_size != LOG2_WORD_SIZE || first.sibling_hashes.len() != SIBLINGS_PER_WORD {
        return Err(VerificationError::LogMalformed(
            "first access is not a word access with a full sibling path",
        ));
    }
    Ok(path_root(
        Digest::of(&first.value_read),
        first.address,
        LOG2_WORD_SIZE,
        &first.sibling_hashes,
    ))
}

/// Replay `operation` against `log` starting from `root`, returning the
/// derived final root.
fn replay<F>(log: &AccessLog, root: Digest, operation: F) -> Result<Digest, VerificationError>
where
    F: FnOnce(&mut ReplayAccess) -> Result<(), VerificationError>,
{
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut access = ReplayAccess::new(log, root);
        operation(&mut access)?;
        if access.leftover() != 0 {
            return Err(VerificationError::UnconsumedAccesses(access.leftover()));
        }
        Ok(access.current_root())
    }));

    match outcome {
        Ok(result) => result,
        Err(payload) => match payload.downcast::<ReplayFault>() {
            Ok(fault) => Err(VerificationError::from(*fault)),
            Err(other) => resume_unwind(other),
        },
    }
}

fn check_log_type(log: &AccessLog, expected: LogType) -> Result<(), VerificationError> {
    if log.log_type() != expected {
        return Err(VerificationError::WrongLogType(log.log_type()));
    }
    Ok(())
}

/// Check the internal consistency of a `step_uarch` log and derive the
/// `(initial_root, final_root)` pair it transitions between.
pub fn verify_step_uarch_log(log: &AccessLog) -> Result<(Digest, Digest), VerificationError> {
    check_log_type(log, LogType::StepUarch)?;
    let root = initial_root(log)?;
    let final_root = replay(log, root, |a| {
        step_uarch(a);
        Ok(())
    })?;
    Ok((root, final_root))
}

/// Check that `log` is a legal `step_uarch` transition from `root_before`
/// to `root_after`.
pub fn verify_step_uarch_state_transition(
    root_before: &Digest,
    log: &AccessLog,
    root_after: &Digest,
) -> Result<(), VerificationError> {
    check_log_type(log, LogType::StepUarch)?;
    let final_root = replay(log, *root_before, |a| {
        step_uarch(a);
        Ok(())
    })?;
    if final_root != *root_after {
        return Err(VerificationError::RootMismatch);
    }
    Ok(())
}

/// Check the internal consistency of a `reset_uarch` log and derive its
/// root pair.
pub fn verify_reset_uarch_log(log: &AccessLog) -> Result<(Digest, Digest), VerificationError> {
    check_log_type(log, LogType::ResetUarch)?;
    let root = initial_root(log)?;
    let final_root = replay(log, root, |a| {
        reset_state(a);
        Ok(())
    })?;
    Ok((root, final_root))
}

/// Check that `log` is a legal `reset_uarch` transition from `root_before`
/// to `root_after`.
pub fn verify_reset_uarch_state_transition(
    root_before: &Digest,
    log: &AccessLog,
    root_after: &Digest,
) -> Result<(), VerificationError> {
    check_log_type(log, LogType::ResetUarch)?;
    let final_root = replay(log, *root_before, |a| {
        reset_state(a);
        Ok(())
    })?;
    if final_root != *root_after {
        return Err(VerificationError::RootMismatch);
    }
    Ok(())
}

/// Check the internal consistency of a `send_cmio_response` log for the
/// given `(reason, data)` payload and derive its root pair.
pub fn verify_send_cmio_response_log(
    reason: u16,
    data: &[u8],
    log: &AccessLog,
) -> Result<(Digest, Digest), VerificationError> {
    check_log_type(log, LogType::SendCmioResponse)?;
    let root = initial_root(log)?;
    let final_root = replay(log, root, |a| {
        send_cmio_response(a, reason, data)?;
        Ok(())
    })?;
    Ok((root, final_root))
}

/// Check that `log` is a legal `send_cmio_response` transition for
/// `(reason, data)` from `root_before` to `root_after`.
pub fn verify_send_cmio_response_state_transition(
    reason: u16,
    data: &[u8],
    root_before: &Digest,
    log: &AccessLog,
    root_after: &Digest,
) -> Result<(), VerificationError> {
    check_log_type(log, LogType::SendCmioResponse)?;
    let final_root = replay(log, *root_before, |a| {
        send_cmio_response(a, reason, data)?;
        Ok(())
    })?;
    if final_root != *root_after {
        return Err(VerificationError::RootMismatch);
    }
    Ok(())
}
