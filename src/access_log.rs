// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! State access log
//!
//! The recording back-end appends one entry per state read or write, in
//! exactly the order the step engine performed them. Writes carry both the
//! replaced and the written value, which makes the log self-describing: the
//! verifier can recompute the post-access subtree hash without the backing
//! state. Sibling paths are taken against the Merkle state at the moment of
//! access, reflecting all earlier writes of the same step.
//!
//! The wire format is little-endian throughout, version-tagged and
//! length-prefixed; hashes are raw 32-byte digests.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::merkle::{Digest, DIGEST_SIZE};

/// Version tag of the wire format
pub const LOG_FORMAT_VERSION: u8 = 1;

/// Largest meaningful `log2_size` of a single access
const MAX_ACCESS_LOG2_SIZE: u8 = 12;

/// Type of state access
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccessType {
    Read = 0,
    Write = 1,
}

/// Operation a log records
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LogType {
    StepUarch = 0,
    ResetUarch = 1,
    SendCmioResponse = 2,
}

/// Records one access to the machine state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    /// Whether the access read or wrote the state
    pub access_type: AccessType,
    /// Word-aligned byte address of the accessed leaf
    pub address: u64,
    /// Log2 of the size of the access in bytes
    pub log2_size: u8,
    /// Data at the address before the access
    pub value_read: Vec<u8>,
    /// Data at the address after the access, for writes
    pub value_written: Option<Vec<u8>>,
    /// Sibling hashes from the accessed leaf up to the root, taken against
    /// the Merkle state at the moment of access
    pub sibling_hashes: Vec<Digest>,
}

/// Ordered record of the accesses performed by one logged operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLog {
    log_type: LogType,
    accesses: Vec<Access>,
}

/// Wire-format violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("unsupported access log version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown log type {0}")]
    UnknownLogType(u8),

    #[error("access {index}: unknown access kind {kind}")]
    UnknownAccessType { index: usize, kind: u8 },

    #[error("access {index}: access size out of range")]
    AccessSizeOutOfRange { index: usize },

    #[error("truncated access log")]
    Truncated,

    #[error("access log carries {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("access log body length does not match its prefix")]
    LengthMismatch,
}

impl AccessLog {
    /// Start an empty log for the given operation.
    pub fn new(log_type: LogType) -> Self {
        AccessLog {
            log_type,
            accesses: Vec::new(),
        }
    }

    /// Operation this log records
    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    /// The recorded accesses, in execution order
    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    /// Append an access. Entries are immutable once appended.
    pub fn push(&mut self, access: Access) {
        self.accesses.push(access);
    }

    /// Number of recorded accesses
    pub fn len(&self) -> usize {
        self.accesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }

    /// Serialise to the versioned wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(self.accesses.len() as u32).to_le_bytes());
        for access in &self.accesses {
            body.push(access.access_type as u8);
            body.extend_from_slice(&access.address.to_le_bytes());
            body.push(access.log2_size);
            body.extend_from_slice(&access.value_read);
            if let Some(written) = &access.value_written {
                body.extend_from_slice(written);
            }
            body.extend_from_slice(&(access.sibling_hashes.len() as u16).to_le_bytes());
            for sibling in &access.sibling_hashes {
                body.extend_from_slice(sibling.as_bytes());
            }
        }

        let mut bytes = Vec::with_capacity(body.len() + 6);
        bytes.push(LOG_FORMAT_VERSION);
        bytes.push(self.log_type as u8);
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }

    /// Parse the versioned wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LogError> {
        let mut reader = Reader { bytes, pos: 0 };

        let version = reader.u8()?;
        if version != LOG_FORMAT_VERSION {
            return Err(LogError::UnsupportedVersion(version));
        }
        let log_type = match reader.u8()? {
            0 => LogType::StepUarch,
            1 => LogType::ResetUarch,
            2 => LogType::SendCmioResponse,
            other => return Err(LogError::UnknownLogType(other)),
        };
        let body_len = reader.u32()? as usize;
        if reader.remaining() != body_len {
            // Either truncated or trailing garbage; tell them apart.
            if reader.remaining() < body_len {
                return Err(LogError::Truncated);
            }
            return Err(LogError::TrailingBytes(reader.remaining() - body_len));
        }

        let count = reader.u32()? as usize;
        let mut accesses = Vec::new();
        for index in 0..count {
            let access_type = match reader.u8()? {
                0 => AccessType::Read,
                1 => AccessType::Write,
                kind => return Err(LogError::UnknownAccessType { index, kind }),
            };
            let address = reader.u64()?;
            let log2_size = reader.u8()?;
            if log2_size > MAX_ACCESS_LOG2_SIZE {
                return Err(LogError::AccessSizeOutOfRange { index });
            }
            let value_len = 1usize << log2_size;
            let value_read = reader.take(value_len)?.to_vec();
            let value_written = match access_type {
                AccessType::Read => None,
                AccessType::Write => Some(reader.take(value_len)?.to_vec()),
            };
            let sibling_count = reader.u16()? as usize;
            let mut sibling_hashes = Vec::with_capacity(sibling_count);
            for _ in 0..sibling_count {
                let raw: [u8; DIGEST_SIZE] = reader
                    .take(DIGEST_SIZE)?
                    .try_into()
                    .map_err(|_| LogError::Truncated)?;
                sibling_hashes.push(Digest::from(raw));
            }
            accesses.push(Access {
                access_type,
                address,
                log2_size,
                value_read,
                value_written,
                sibling_hashes,
            });
        }

        if reader.remaining() != 0 {
            return Err(LogError::LengthMismatch);
        }

        Ok(AccessLog { log_type, accesses })
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LogError> {
        if self.remaining() < len {
            return Err(LogError::Truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, LogError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, LogError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().map_err(|_| LogError::Truncated)?))
    }

    fn u32(&mut self) -> Result<u32, LogError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().map_err(|_| LogError::Truncated)?))
    }

    fn u64(&mut self) -> Result<u64, LogError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().map_err(|_| LogError::Truncated)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> AccessLog {
        let mut log = AccessLog::new(LogType::StepUarch);
        log.push(Access {
            access_type: AccessType::Read,
            address: 0x100,
            log2_size: 3,
            value_read: 0x42u64.to_le_bytes().to_vec(),
            value_written: None,
            sibling_hashes: vec![Digest::of(b"sibling 0"), Digest::of(b"sibling 1")],
        });
        log.push(Access {
            access_type: AccessType::Write,
            address: 0x108,
            log2_size: 3,
            value_read: 0u64.to_le_bytes().to_vec(),
            value_written: Some(1u64.to_le_bytes().to_vec()),
            sibling_hashes: vec![Digest::of(b"sibling 2")],
        });
        log
    }

    #[test]
    fn test_wire_roundtrip() {
        let log = sample_log();
        let bytes = log.to_bytes();
        assert_eq!(AccessLog::from_bytes(&bytes).unwrap(), log);
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let mut bytes = sample_log().to_bytes();
        bytes[0] = 99;
        assert_eq!(
            AccessLog::from_bytes(&bytes),
            Err(LogError::UnsupportedVersion(99))
        );
    }

    #[test]
    fn test_rejects_unknown_log_type() {
        let mut bytes = sample_log().to_bytes();
        bytes[1] = 7;
        assert_eq!(AccessLog::from_bytes(&bytes), Err(LogError::UnknownLogType(7)));
    }

    #[test]
    fn test_rejects_truncation() {
        let bytes = sample_log().to_bytes();
        for cut in [bytes.len() - 1, bytes.len() / 2, 3] {
            assert!(AccessLog::from_bytes(&bytes[..cut]).is_err());
        }
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = sample_log().to_bytes();
        bytes.push(0);
        assert_eq!(AccessLog::from_bytes(&bytes), Err(LogError::TrailingBytes(1)));
    }

    #[test]
    fn test_rejects_unknown_access_kind() {
        let log = sample_log();
        let bytes = log.to_bytes();
        // First entry's kind byte follows the 6-byte header and 4-byte count.
        let mut corrupted = bytes.clone();
        corrupted[10] = 2;
        assert_eq!(
            AccessLog::from_bytes(&corrupted),
            Err(LogError::UnknownAccessType { index: 0, kind: 2 })
        );
    }
}
