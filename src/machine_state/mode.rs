// SPDX-FileCopyrightText: 2025 TriliTech <contact@trili.tech>
//
// SPDX-License-Identifier: MIT

//! Privilege modes

/// Modes the hart can be in when running code
#[derive(
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Copy,
    Clone,
    strum::EnumIter,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(u8)]
pub enum Mode {
    User = 0b00,
    Supervisor = 0b01,
    Machine = 0b11,
}

impl Mode {
    /// Decode a two-bit privilege code, mapping the reserved encoding to
    /// machine mode.
    pub fn from_bits(value: u64) -> Self {
        match value & 0b11 {
            0 => Mode::User,
            1 => Mode::Supervisor,
            _ => Mode::Machine,
        }
    }
}

impl Default for Mode {
    #[inline]
    fn default() -> Self {
        Self::Machine
    }
}

impl From<Mode> for u64 {
    #[inline]
    fn from(value: Mode) -> Self {
        value as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mode_roundtrip() {
        for mode in Mode::iter() {
            assert_eq!(Mode::from_bits(mode as u64), mode);
        }
        assert_eq!(Mode::from_bits(0b10), Mode::Machine);
    }

    #[test]
    fn test_mode_ordering() {
        assert!(Mode::User < Mode::Supervisor);
        assert!(Mode::Supervisor < Mode::Machine);
    }
}
