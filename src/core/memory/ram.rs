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

//! Byte-backed memories: EE/IOP RAM, scratchpad and BIOS ROM
//!
//! All accessors are little-endian. Offsets wrap at the memory size, which is
//! always a power of two.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::core::error::{EmulatorError, Result};

/// Random access memory block
pub struct Ram {
    data: Vec<u8>,
}

impl Ram {
    /// EE main RAM size (32 MiB)
    pub const EE_SIZE: usize = 32 * 1024 * 1024;

    /// IOP RAM size (2 MiB)
    pub const IOP_SIZE: usize = 2 * 1024 * 1024;

    /// EE scratchpad size (16 KiB)
    pub const SCRATCHPAD_SIZE: usize = 16 * 1024;

    /// Create a zero-filled memory
    ///
    /// `size` must be a power of two.
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            data: vec![0u8; size],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn read8(&self, offset: u32) -> u8 {
        self.data[self.index(offset)]
    }

    pub fn read16(&self, offset: u32) -> u16 {
        u16::from_le_bytes(self.load(offset))
    }

    pub fn read32(&self, offset: u32) -> u32 {
        u32::from_le_bytes(self.load(offset))
    }

    pub fn read64(&self, offset: u32) -> u64 {
        u64::from_le_bytes(self.load(offset))
    }

    pub fn read128(&self, offset: u32) -> u128 {
        u128::from_le_bytes(self.load(offset))
    }

    pub fn write8(&mut self, offset: u32, value: u8) {
        let index = self.index(offset);
        self.data[index] = value;
    }

    pub fn write16(&mut self, offset: u32, value: u16) {
        self.store(offset, value.to_le_bytes());
    }

    pub fn write32(&mut self, offset: u32, value: u32) {
        self.store(offset, value.to_le_bytes());
    }

    pub fn write64(&mut self, offset: u32, value: u64) {
        self.store(offset, value.to_le_bytes());
    }

    pub fn write128(&mut self, offset: u32, value: u128) {
        self.store(offset, value.to_le_bytes());
    }

    /// Copy a byte slice into memory starting at `offset`
    ///
    /// Bytes that would land past the end are dropped.
    pub fn write_slice(&mut self, offset: u32, bytes: &[u8]) {
        let start = self.index(offset);
        let len = bytes.len().min(self.data.len() - start);
        self.data[start..start + len].copy_from_slice(&bytes[..len]);

        if len < bytes.len() {
            log::warn!(
                "Dropped {} bytes past the end of a {} byte memory",
                bytes.len() - len,
                self.data.len()
            );
        }
    }

    #[inline(always)]
    fn index(&self, offset: u32) -> usize {
        offset as usize & (self.data.len() - 1)
    }

    #[inline(always)]
    fn load<const N: usize>(&self, offset: u32) -> [u8; N] {
        let start = self.index(offset);
        let mut bytes = [0u8; N];
        if let Some(src) = self.data.get(start..start + N) {
            bytes.copy_from_slice(src);
        }
        bytes
    }

    #[inline(always)]
    fn store<const N: usize>(&mut self, offset: u32, bytes: [u8; N]) {
        let start = self.index(offset);
        if let Some(dst) = self.data.get_mut(start..start + N) {
            dst.copy_from_slice(&bytes);
        }
    }
}

/// BIOS ROM (4 MiB, read-only to both CPUs)
pub struct Bios {
    rom: Ram,
}

impl Bios {
    /// BIOS image size (4 MiB)
    pub const SIZE: usize = 4 * 1024 * 1024;

    /// Create an empty (zero-filled) BIOS
    pub fn new() -> Self {
        Self {
            rom: Ram::new(Self::SIZE),
        }
    }

    /// Load a BIOS image from disk
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a 4 MiB BIOS dump
    ///
    /// # Errors
    ///
    /// - [`EmulatorError::BiosNotFound`] if the file cannot be opened
    /// - [`EmulatorError::InvalidBiosSize`] if the file is not exactly 4 MiB
    /// - [`EmulatorError::Io`] if reading fails
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::open(path)
            .map_err(|_| EmulatorError::BiosNotFound(path.display().to_string()))?;

        let metadata = file.metadata()?;

        if metadata.len() != Self::SIZE as u64 {
            return Err(EmulatorError::InvalidBiosSize {
                expected: Self::SIZE,
                got: metadata.len() as usize,
            });
        }

        let mut image = vec![0u8; Self::SIZE];
        file.read_exact(&mut image)?;
        self.rom.write_slice(0, &image);

        log::info!("Loaded BIOS from {}", path.display());

        Ok(())
    }

    /// Install an in-memory image (shorter images are zero-padded)
    pub fn load_bytes(&mut self, image: &[u8]) {
        self.rom.write_slice(0, image);
    }

    pub fn read8(&self, offset: u32) -> u8 {
        self.rom.read8(offset)
    }

    pub fn read16(&self, offset: u32) -> u16 {
        self.rom.read16(offset)
    }

    pub fn read32(&self, offset: u32) -> u32 {
        self.rom.read32(offset)
    }

    pub fn read64(&self, offset: u32) -> u64 {
        self.rom.read64(offset)
    }

    pub fn read128(&self, offset: u32) -> u128 {
        self.rom.read128(offset)
    }
}

impl Default for Bios {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_ram_little_endian_layout() {
        let mut ram = Ram::new(0x100);
        ram.write32(0x10, 0x1122_3344);

        assert_eq!(ram.read8(0x10), 0x44);
        assert_eq!(ram.read8(0x13), 0x11);
        assert_eq!(ram.read16(0x12), 0x1122);
    }

    #[test]
    fn test_ram_128bit_access() {
        let mut ram = Ram::new(0x100);
        let value = 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210u128;
        ram.write128(0x20, value);

        assert_eq!(ram.read128(0x20), value);
        assert_eq!(ram.read64(0x20), 0xFEDC_BA98_7654_3210);
        assert_eq!(ram.read64(0x28), 0x0123_4567_89AB_CDEF);
    }

    #[test]
    fn test_ram_offset_wraps_at_size() {
        let mut ram = Ram::new(0x100);
        ram.write8(0x105, 0xAB);
        assert_eq!(ram.read8(0x05), 0xAB, "offset should wrap at the memory size");
    }

    #[test]
    fn test_ram_access_straddling_end_is_ignored() {
        let mut ram = Ram::new(0x100);
        ram.write32(0xFE, 0xFFFF_FFFF);
        assert_eq!(ram.read32(0xFE), 0);
        assert_eq!(ram.read8(0xFF), 0);
    }

    #[test]
    fn test_bios_load_rejects_wrong_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 1024]).unwrap();

        let mut bios = Bios::new();
        let err = bios.load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            EmulatorError::InvalidBiosSize {
                expected: Bios::SIZE,
                got: 1024
            }
        ));
    }

    #[test]
    fn test_bios_load_missing_file() {
        let mut bios = Bios::new();
        let err = bios.load("/nonexistent/ps2rx/bios.bin").unwrap_err();
        assert!(matches!(err, EmulatorError::BiosNotFound(_)));
    }

    #[test]
    fn test_bios_load_valid_image() {
        let mut image = vec![0u8; Bios::SIZE];
        image[0..4].copy_from_slice(&0x3C08_0001u32.to_le_bytes());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&image).unwrap();

        let mut bios = Bios::new();
        bios.load(file.path()).unwrap();
        assert_eq!(bios.read32(0), 0x3C08_0001);
    }
}
