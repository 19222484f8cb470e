// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the emulator core
//!
//! The steady-state hardware paths (bus dispatch, DMA, GIF, GS) never fail:
//! unmapped accesses are logged and ignored the way the real bus ignores them.
//! [`EmulatorError`] covers construction, configuration and file I/O.

use thiserror::Error;

/// Errors produced by the emulator core
#[derive(Error, Debug)]
pub enum EmulatorError {
    /// BIOS image could not be opened
    #[error("BIOS file not found: {0}")]
    BiosNotFound(String),

    /// BIOS image has the wrong size
    #[error("Invalid BIOS size: expected {expected} bytes, got {got} bytes")]
    InvalidBiosSize { expected: usize, got: usize },

    /// Two address map entries claim the same address for the same access width
    #[error("Overlapping address ranges: {first} and {second}")]
    OverlappingRanges { first: String, second: String },

    /// Configuration value outside of its accepted domain
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;
