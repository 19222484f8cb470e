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

//! Address map: ordered range tables for the EE and IOP buses
//!
//! Each bus owns an [`AddressMap`] describing which target claims which
//! physical range for which access widths. Lookups walk the table in order
//! and stop at the first hit, so exact-address special cases are handled by
//! the bus before the table is consulted.
//!
//! ```text
//! EE physical map
//! 0x0000_0000 ┬ RAM (32 MiB)            aliases at 0x2000_0000, 0x3000_0000
//! 0x1000_3000 ┼ GIF registers
//! 0x1000_6000 ┼ GIF FIFO (128-bit)
//! 0x1000_8000 ┼ DMAC channels + globals
//! 0x1000_F000 ┼ INTC
//! 0x1000_F200 ┼ SIF
//! 0x1200_0000 ┼ GS privileged registers
//! 0x1C00_0000 ┼ IOP RAM mirror (2 MiB)
//! 0x1FC0_0000 ┴ BIOS (4 MiB)
//! ```

use bitflags::bitflags;

use crate::core::error::{EmulatorError, Result};

bitflags! {
    /// Access widths a map entry responds to
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessWidth: u8 {
        const BYTE = 1 << 0;
        const HALF = 1 << 1;
        const WORD = 1 << 2;
        const DOUBLE = 1 << 3;
        const QUAD = 1 << 4;
    }
}

impl AccessWidth {
    /// Every width from 8 to 128 bits
    pub const ANY: Self = Self::all();
}

/// How a hit address is presented to the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Translation {
    /// Target receives `addr - low` (memories)
    Offset,
    /// Target receives the untouched address (register windows)
    Absolute,
}

/// One entry of an address map
#[derive(Debug, Clone, Copy)]
pub struct MapEntry<T> {
    /// First address of the range (inclusive)
    pub low: u32,
    /// Last address of the range (inclusive)
    pub high: u32,
    /// Widths this entry answers to
    pub widths: AccessWidth,
    pub target: T,
    pub translation: Translation,
}

impl<T> MapEntry<T> {
    pub const fn new(
        low: u32,
        high: u32,
        widths: AccessWidth,
        target: T,
        translation: Translation,
    ) -> Self {
        Self {
            low,
            high,
            widths,
            target,
            translation,
        }
    }

    #[inline(always)]
    fn contains(&self, addr: u32) -> bool {
        addr >= self.low && addr <= self.high
    }

    fn overlaps(&self, other: &MapEntry<T>) -> bool {
        self.widths.intersects(other.widths) && self.low <= other.high && other.low <= self.high
    }
}

/// Ordered table of address ranges
///
/// # Example
///
/// ```
/// use ps2rx::core::memory::{AccessWidth, AddressMap, MapEntry, Translation};
///
/// let map = AddressMap::new(vec![
///     MapEntry::new(0x0000, 0x0FFF, AccessWidth::ANY, "ram", Translation::Offset),
///     MapEntry::new(0x2000, 0x200F, AccessWidth::WORD, "regs", Translation::Absolute),
/// ])
/// .unwrap();
///
/// assert_eq!(map.lookup(0x0010, AccessWidth::BYTE), Some(("ram", 0x0010)));
/// assert_eq!(map.lookup(0x2004, AccessWidth::WORD), Some(("regs", 0x2004)));
/// assert_eq!(map.lookup(0x2004, AccessWidth::BYTE), None);
/// ```
#[derive(Debug, Clone)]
pub struct AddressMap<T> {
    entries: Vec<MapEntry<T>>,
}

impl<T: Copy + std::fmt::Debug> AddressMap<T> {
    /// Build a map, rejecting entries that overlap for a shared width
    ///
    /// # Errors
    ///
    /// Returns [`EmulatorError::OverlappingRanges`] naming the first pair of
    /// conflicting entries.
    pub fn new(entries: Vec<MapEntry<T>>) -> Result<Self> {
        for (i, a) in entries.iter().enumerate() {
            if let Some(b) = entries[i + 1..].iter().find(|b| a.overlaps(b)) {
                return Err(EmulatorError::OverlappingRanges {
                    first: format!("{:?} 0x{:08X}-0x{:08X}", a.target, a.low, a.high),
                    second: format!("{:?} 0x{:08X}-0x{:08X}", b.target, b.low, b.high),
                });
            }
        }

        Ok(Self { entries })
    }

    /// Find the target for an access
    ///
    /// # Returns
    ///
    /// The target and the translated address (offset or absolute), or `None`
    /// when nothing claims the address at this width.
    #[inline]
    pub fn lookup(&self, addr: u32, width: AccessWidth) -> Option<(T, u32)> {
        self.entries
            .iter()
            .find(|e| e.widths.contains(width) && e.contains(addr))
            .map(|e| {
                let translated = match e.translation {
                    Translation::Offset => addr - e.low,
                    Translation::Absolute => addr,
                };
                (e.target, translated)
            })
    }

    pub fn entries(&self) -> &[MapEntry<T>] {
        &self.entries
    }
}

/// Targets reachable from the EE bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EeRegion {
    Ram,
    IopRam,
    Bios,
    GifRegisters,
    GifFifo,
    Dmac,
    Intc,
    Sif,
    GsPrivileged,
}

/// Targets reachable from the IOP bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IopRegion {
    Ram,
    Bios,
    Sif,
    Intc,
    Dma,
}

/// EE physical address map
pub fn ee_map_entries() -> Vec<MapEntry<EeRegion>> {
    use AccessWidth as W;
    use EeRegion::*;
    use Translation::*;

    vec![
        MapEntry::new(0x0000_0000, 0x01FF_FFFF, W::ANY, Ram, Offset),
        MapEntry::new(0x2000_0000, 0x21FF_FFFF, W::ANY, Ram, Offset),
        MapEntry::new(0x3000_0000, 0x31FF_FFFF, W::ANY, Ram, Offset),
        MapEntry::new(0x1C00_0000, 0x1C1F_FFFF, W::ANY, IopRam, Offset),
        MapEntry::new(0x1FC0_0000, 0x1FFF_FFFF, W::ANY, Bios, Offset),
        MapEntry::new(0x1000_3000, 0x1000_30AF, W::WORD, GifRegisters, Absolute),
        MapEntry::new(0x1000_6000, 0x1000_600F, W::QUAD, GifFifo, Absolute),
        MapEntry::new(0x1000_8000, 0x1000_EFFF, W::WORD, Dmac, Absolute),
        MapEntry::new(0x1000_F000, 0x1000_F01F, W::WORD, Intc, Absolute),
        MapEntry::new(0x1000_F200, 0x1000_F26F, W::WORD, Sif, Absolute),
        MapEntry::new(0x1000_F520, 0x1000_F523, W::WORD, Dmac, Absolute),
        MapEntry::new(0x1000_F590, 0x1000_F593, W::WORD, Dmac, Absolute),
        MapEntry::new(
            0x1200_0000,
            0x1200_1FFF,
            W::WORD.union(W::DOUBLE),
            GsPrivileged,
            Absolute,
        ),
    ]
}

/// IOP physical address map
pub fn iop_map_entries() -> Vec<MapEntry<IopRegion>> {
    use AccessWidth as W;
    use IopRegion::*;
    use Translation::*;

    vec![
        MapEntry::new(0x0000_0000, 0x001F_FFFF, W::ANY, Ram, Offset),
        MapEntry::new(0x1FC0_0000, 0x1FFF_FFFF, W::ANY, Bios, Offset),
        MapEntry::new(0x1D00_0000, 0x1D00_006F, W::WORD, Sif, Absolute),
        MapEntry::new(0x1F80_1070, 0x1F80_107B, W::WORD, Intc, Absolute),
        MapEntry::new(0x1F80_1080, 0x1F80_10EF, W::WORD, Dma, Absolute),
        MapEntry::new(0x1F80_10F0, 0x1F80_10F8, W::WORD, Dma, Absolute),
        MapEntry::new(0x1F80_1500, 0x1F80_155F, W::WORD, Dma, Absolute),
        MapEntry::new(0x1F80_1570, 0x1F80_157F, W::WORD, Dma, Absolute),
    ]
}
