// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Host-to-machine response delivery
//!
//! A machine that executed `WFI` is idle, waiting for the host. The host
//! answers with `send_cmio_response`: the payload lands word-by-word
//! (zero-padded) at the bottom of the CMIO response buffer, the length and
//! reason are latched into `fromhost`, and the idle flag is cleared so the
//! next step resumes after the `WFI`.
//!
//! The function runs through the access back-end, so the same code produces
//! the machine transition, the `send_cmio_response` access log and its
//! verification.

use thiserror::Error;

use crate::machine_state::pma::{CMIO_RX_LENGTH, CMIO_RX_START};
use crate::state_access::StateAccess;

/// Rejections of a response delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CmioError {
    #[error("machine is not waiting for a response")]
    NotIdle,

    #[error("response data of {length} bytes exceeds the buffer of {limit} bytes")]
    TooLarge { length: usize, limit: u64 },

    #[error("response buffer is not writable")]
    BufferInaccessible,
}

/// Deliver a host response to the machine behind `a`.
pub fn send_cmio_response<A: StateAccess>(
    a: &mut A,
    reason: u16,
    data: &[u8],
) -> Result<(), CmioError> {
    if !a.read_iflags_i() {
        return Err(CmioError::NotIdle);
    }
    if data.len() as u64 > CMIO_RX_LENGTH {
        return Err(CmioError::TooLarge {
            length: data.len(),
            limit: CMIO_RX_LENGTH,
        });
    }

    let pma = a.find_pma(CMIO_RX_START);
    for (i, chunk) in data.chunks(8).enumerate() {
        let mut word = [0u8; 8];
        word[..chunk.len()].copy_from_slice(chunk);
        a.write_memory(&pma, CMIO_RX_START + 8 * i as u64, u64::from_le_bytes(word), 3)
            .map_err(|_| CmioError::BufferInaccessible)?;
    }

    let yield_data = ((reason as u64) << 32) | data.len() as u64;
    a.write_fromhost(yield_data);
    a.reset_iflags_i();
    Ok(())
}
