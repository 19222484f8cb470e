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

//! Emulator configuration
//!
//! Settings are stored as TOML. Two environment variables override the file:
//!
//! - `PS2RX_BIOS`: path to the BIOS image
//! - `PS2RX_RENDERER`: `software` or `null`
//!
//! ```toml
//! bios_path = "bios/SCPH-39001.bin"
//! renderer = "software"
//! cycles_per_frame = 4915200
//! vblank_cycles = 368640
//! tty_echo = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};

/// Rasterizer behind the GS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    /// CPU rasterizer writing into emulated VRAM
    #[default]
    Software,
    /// Discards all drawing
    Null,
}

impl FromStr for RendererKind {
    type Err = EmulatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software" | "sw" => Ok(Self::Software),
            "null" | "none" => Ok(Self::Null),
            other => Err(EmulatorError::InvalidConfig(format!(
                "unknown renderer '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for RendererKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Software => write!(f, "software"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// Emulator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// BIOS image loaded at startup
    pub bios_path: Option<PathBuf>,

    pub renderer: RendererKind,

    /// EE cycles per video frame (294.912 MHz / 60 Hz)
    pub cycles_per_frame: u64,

    /// Length of the vertical blank at the end of each frame
    pub vblank_cycles: u64,

    /// Copy EE TTY output to stdout
    pub tty_echo: bool,
}

impl Config {
    pub const DEFAULT_CYCLES_PER_FRAME: u64 = 4_915_200;
    pub const DEFAULT_VBLANK_CYCLES: u64 = 368_640;

    pub const ENV_BIOS: &'static str = "PS2RX_BIOS";
    pub const ENV_RENDERER: &'static str = "PS2RX_RENDERER";

    /// Load a configuration file
    ///
    /// Missing keys take their default values.
    ///
    /// # Errors
    ///
    /// I/O and TOML errors, or [`EmulatorError::InvalidConfig`] when the
    /// frame timing is inconsistent.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    /// Apply `PS2RX_BIOS` and `PS2RX_RENDERER` from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bios) = lookup(Self::ENV_BIOS).filter(|s| !s.is_empty()) {
            log::debug!("{} overrides bios_path", Self::ENV_BIOS);
            self.bios_path = Some(PathBuf::from(bios));
        }

        if let Some(renderer) = lookup(Self::ENV_RENDERER).filter(|s| !s.is_empty()) {
            self.renderer = renderer.parse()?;
        }

        Ok(())
    }

    /// Check the frame timing
    pub fn validate(&self) -> Result<()> {
        if self.cycles_per_frame == 0 {
            return Err(EmulatorError::InvalidConfig(
                "cycles_per_frame must be non-zero".to_string(),
            ));
        }

        if self.vblank_cycles >= self.cycles_per_frame {
            return Err(EmulatorError::InvalidConfig(format!(
                "vblank_cycles ({}) must be shorter than cycles_per_frame ({})",
                self.vblank_cycles, self.cycles_per_frame
            )));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bios_path: None,
            renderer: RendererKind::Software,
            cycles_per_frame: Self::DEFAULT_CYCLES_PER_FRAME,
            vblank_cycles: Self::DEFAULT_VBLANK_CYCLES,
            tty_echo: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn create_test_config() -> Config {
        Config {
            bios_path: Some(PathBuf::from("/opt/ps2/bios.bin")),
            renderer: RendererKind::Null,
            cycles_per_frame: 1000,
            vblank_cycles: 100,
            tty_echo: true,
        }
    }

    #[test]
    fn test_default_timing_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.renderer, RendererKind::Software);
        assert!(config.bios_path.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ps2rx.toml");

        let config = create_test_config();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config, "saved configuration should load back unchanged");
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "renderer = \"null\"\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.renderer, RendererKind::Null);
        assert_eq!(loaded.cycles_per_frame, Config::DEFAULT_CYCLES_PER_FRAME);
        assert!(!loaded.tty_echo);
    }

    #[test]
    fn test_load_rejects_bad_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "cycles_per_frame = 10\nvblank_cycles = 10\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, EmulatorError::InvalidConfig(_)), "got {:?}", err);
    }

    #[test]
    fn test_load_rejects_unknown_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "renderer = \"vulkan\"\n").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(EmulatorError::TomlDeserialize(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/ps2rx.toml").unwrap_err();
        assert!(matches!(err, EmulatorError::Io(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (Config::ENV_BIOS, "/tmp/override.bin"),
            (Config::ENV_RENDERER, "NULL"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_vars(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.bios_path, Some(PathBuf::from("/tmp/override.bin")));
        assert_eq!(config.renderer, RendererKind::Null);
    }

    #[test]
    fn test_env_ignores_empty_values() {
        let mut config = create_test_config();
        config.apply_vars(|_| Some(String::new())).unwrap();
        assert_eq!(config, create_test_config());
    }

    #[test]
    fn test_env_rejects_unknown_renderer() {
        let mut config = Config::default();
        let result = config.apply_vars(|key| {
            (key == Config::ENV_RENDERER).then(|| "opengl".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_renderer_display_parses_back() {
        for kind in [RendererKind::Software, RendererKind::Null] {
            assert_eq!(kind.to_string().parse::<RendererKind>().unwrap(), kind);
        }
    }
}
