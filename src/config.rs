// SPDX-FileCopyrightText: 2025 Nomadic Labs <contact@nomadic-labs.com>
//
// SPDX-License-Identifier: MIT

//! Machine configuration

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default main RAM length
pub const DEFAULT_RAM_LENGTH: u64 = 0x20_0000;

/// Boot ROM configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RomConfig {
    /// Initial ROM contents
    #[serde(default)]
    pub image: Vec<u8>,

    /// File to load the ROM contents from, when `image` is empty
    #[serde(default)]
    pub image_filename: Option<PathBuf>,
}

/// Main RAM configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamConfig {
    /// Length of the RAM range in bytes; must be a non-zero multiple of the
    /// PMA page size
    pub length: u64,

    /// Initial RAM contents
    #[serde(default)]
    pub image: Vec<u8>,

    /// File to load the RAM contents from, when `image` is empty
    #[serde(default)]
    pub image_filename: Option<PathBuf>,
}

impl Default for RamConfig {
    fn default() -> Self {
        RamConfig {
            length: DEFAULT_RAM_LENGTH,
            image: Vec::new(),
            image_filename: None,
        }
    }
}

/// Machine configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub rom: RomConfig,

    #[serde(default)]
    pub ram: RamConfig,
}

/// Settings that affect how a machine handle behaves, without being part of
/// the committed state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Skip recomputing and checking the root hash when loading a stored
    /// machine
    #[serde(default)]
    pub skip_root_hash_check: bool,
}

fn resolve_image(image: &[u8], filename: &Option<PathBuf>) -> io::Result<Vec<u8>> {
    match filename {
        Some(path) if image.is_empty() => std::fs::read(path),
        _ => Ok(image.to_vec()),
    }
}

impl RomConfig {
    /// The configured ROM contents, reading the image file if necessary.
    pub fn resolve_image(&self) -> io::Result<Vec<u8>> {
        resolve_image(&self.image, &self.image_filename)
    }
}

impl RamConfig {
    /// The configured RAM contents, reading the image file if necessary.
    pub fn resolve_image(&self) -> io::Result<Vec<u8>> {
        resolve_image(&self.image, &self.image_filename)
    }
}
