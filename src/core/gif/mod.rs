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

//! GIF (Graphics Interface) packet unpacker
//!
//! The GIF receives quadwords at its FIFO (0x10006000), splits them into
//! GIFtags and data, and issues GS register writes.
//!
//! ## GIFtag
//!
//! ```text
//!  63-60  59-58  57-47        46   45-16   15   14-0
//! ┌──────┬──────┬────────────┬────┬───────┬────┬───────┐
//! │NREGS │ FLG  │    PRIM    │PRE │   -   │EOP │ NLOOP │
//! └──────┴──────┴────────────┴────┴───────┴────┴───────┘
//!  127-64: REGS, sixteen 4-bit register descriptors
//! ```
//!
//! ## Formats
//!
//! - **PACKED** (0): one quadword per descriptor
//! - **REGLIST** (1): handled like PACKED
//! - **IMAGE** (2): both halves of each quadword go to HWREG
//! - **DISABLE** (3): handled like IMAGE
//!
//! ## Registers
//!
//! | Address    | Name   | Access |
//! |------------|--------|--------|
//! | 0x10003000 | CTRL   | W      |
//! | 0x10003010 | MODE   | W      |
//! | 0x10003020 | STAT   | R      |
//! | 0x10003040 | TAG0   | R      |
//! | 0x10003050 | TAG1   | R      |
//! | 0x10003060 | TAG2   | R      |
//! | 0x10003070 | TAG3   | R      |
//! | 0x10003080 | CNT    | R      |
//! | 0x10003090 | P3CNT  | R      |
//! | 0x100030A0 | P3TAG  | R      |

use crate::core::gs::{registers::reg, Gs};
use crate::core::memory::IoDevice;

/// Unpacker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GifState {
    /// Next quadword is a GIFtag
    RecvTag,
    /// Next quadword is data for the current tag
    Processing,
}

/// Data formats (FLG)
pub mod gif_format {
    pub const PACKED: u8 = 0;
    pub const REGLIST: u8 = 1;
    pub const IMAGE: u8 = 2;
    pub const DISABLE: u8 = 3;
}

/// Decoded GIFtag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GifTag {
    pub nloop: u32,
    pub eop: bool,
    pub pre: bool,
    pub prim: u64,
    pub fmt: u8,
    pub nregs: u32,
    pub reg: u64,
}

impl GifTag {
    pub fn decode(raw: u128) -> Self {
        let lo = raw as u64;

        Self {
            nloop: (lo & 0x7FFF) as u32,
            eop: (lo >> 15) & 1 != 0,
            pre: (lo >> 46) & 1 != 0,
            prim: (lo >> 47) & 0x3FF,
            fmt: ((lo >> 58) & 0x3) as u8,
            nregs: ((lo >> 60) & 0xF) as u32,
            reg: (raw >> 64) as u64,
        }
    }

    /// Number of data quadwords (PACKED/REGLIST) or HWREG pairs (IMAGE) the tag carries
    pub fn data_count(&self) -> u32 {
        match self.fmt {
            gif_format::PACKED | gif_format::REGLIST => self.nregs * self.nloop,
            _ => self.nloop,
        }
    }
}

/// GIF unpacker
///
/// # Example
///
/// ```
/// use ps2rx::core::gif::{Gif, GifState};
/// use ps2rx::core::gs::Gs;
///
/// let mut gif = Gif::new();
/// let mut gs = Gs::new_null();
///
/// // One PACKED loop with a single A+D descriptor
/// let tag = (0xEu128 << 64) | (1u128 << 60) | 1;
/// gif.write128(tag, &mut gs);
/// assert_eq!(gif.state(), GifState::Processing);
///
/// // FOGCOL (0x3D) = 0x00FF00
/// gif.write128((0x3Du128 << 64) | 0x00FF00, &mut gs);
/// assert_eq!(gif.state(), GifState::RecvTag);
/// ```
pub struct Gif {
    state: GifState,
    tag: GifTag,

    /// Data quadwords left to expect for the current tag
    remaining: u32,

    /// Data quadwords consumed for the current tag
    index: u32,

    ctrl: u32,
    mode: u32,
    stat: u32,

    /// TAG0-TAG3: last GIFtag received
    tag_words: [u32; 4],
}

impl Gif {
    pub const CTRL_ADDR: u32 = 0x1000_3000;
    pub const MODE_ADDR: u32 = 0x1000_3010;
    pub const STAT_ADDR: u32 = 0x1000_3020;
    pub const TAG0_ADDR: u32 = 0x1000_3040;
    pub const TAG1_ADDR: u32 = 0x1000_3050;
    pub const TAG2_ADDR: u32 = 0x1000_3060;
    pub const TAG3_ADDR: u32 = 0x1000_3070;
    pub const CNT_ADDR: u32 = 0x1000_3080;
    pub const P3CNT_ADDR: u32 = 0x1000_3090;
    pub const P3TAG_ADDR: u32 = 0x1000_30A0;

    /// STAT.OPH: data is being output
    const STAT_OPH: u32 = 1 << 9;

    pub fn new() -> Self {
        Self {
            state: GifState::RecvTag,
            tag: GifTag::default(),
            remaining: 0,
            index: 0,
            ctrl: 0,
            mode: 0,
            stat: 0,
            tag_words: [0; 4],
        }
    }

    pub fn reset(&mut self) {
        log::debug!("GIF: reset");
        *self = Self::new();
    }

    pub fn state(&self) -> GifState {
        self.state
    }

    pub fn tag(&self) -> &GifTag {
        &self.tag
    }

    /// Accept one quadword from the FIFO
    pub fn write128(&mut self, data: u128, gs: &mut Gs) {
        match self.state {
            GifState::RecvTag => self.receive_tag(data, gs),
            GifState::Processing => self.process_data(data, gs),
        }
    }

    /// Read one quadword back from the FIFO (local → host transfers)
    pub fn read128(&mut self, gs: &mut Gs) -> u128 {
        let lo = gs.read_hwreg() as u128;
        let hi = gs.read_hwreg() as u128;
        lo | (hi << 64)
    }

    fn receive_tag(&mut self, data: u128, gs: &mut Gs) {
        let tag = GifTag::decode(data);

        self.tag_words = [
            data as u32,
            (data >> 32) as u32,
            (data >> 64) as u32,
            (data >> 96) as u32,
        ];
        self.tag = tag;
        self.index = 0;
        self.remaining = tag.data_count();

        log::trace!(
            "GIF: tag nloop={} eop={} pre={} prim=0x{:03X} fmt={} nregs={} regs=0x{:016X}",
            tag.nloop,
            tag.eop,
            tag.pre,
            tag.prim,
            tag.fmt,
            tag.nregs,
            tag.reg
        );

        if tag.pre {
            gs.write_register(reg::PRIM, tag.prim);
        }

        if self.remaining != 0 {
            self.state = GifState::Processing;
            self.stat |= Self::STAT_OPH;
        }
    }

    fn process_data(&mut self, data: u128, gs: &mut Gs) {
        let lo = data as u64;
        let hi = (data >> 64) as u64;

        match self.tag.fmt {
            gif_format::IMAGE | gif_format::DISABLE => {
                gs.write_register(reg::HWREG, lo);
                gs.write_register(reg::HWREG, hi);
            }
            _ => {
                let slot = self.index % self.tag.nregs;
                let descriptor = (self.tag.reg >> (slot * 4)) & 0xF;
                Self::write_packed(descriptor as u8, lo, hi, gs);
            }
        }

        self.index += 1;

        if self.index == self.remaining {
            self.state = GifState::RecvTag;
            self.stat &= !Self::STAT_OPH;
        }
    }

    /// Issue the GS write for one PACKED descriptor
    fn write_packed(descriptor: u8, lo: u64, hi: u64, gs: &mut Gs) {
        let target = match descriptor {
            0x0 => reg::PRIM,
            0x1 => reg::RGBAQ,
            0x2 => reg::ST,
            0x3 => reg::UV,
            0x4 => reg::XYZF2,
            0x5 => reg::XYZ2,
            0x6 => reg::TEX0_1,
            0x7 => reg::TEX0_2,
            0x8 => reg::CLAMP_1,
            0x9 => reg::CLAMP_2,
            0xA => reg::FOG,
            0xC => reg::XYZF3,
            0xD => reg::XYZ3,
            0xE => {
                gs.write_register((hi & 0xFF) as u8, lo);
                return;
            }
            // NOP and the reserved descriptor
            _ => return,
        };

        gs.write_register(target, lo);
    }

    /// CNT: loop counter (0-14) and register counter (16-19)
    fn read_cnt(&self) -> u32 {
        if self.state != GifState::Processing || self.tag.nregs == 0 {
            return 0;
        }

        let loops_left = match self.tag.fmt {
            gif_format::PACKED | gif_format::REGLIST => {
                self.tag.nloop - self.index / self.tag.nregs
            }
            _ => self.tag.nloop - self.index,
        };

        (loops_left & 0x7FFF) | ((self.index % self.tag.nregs) << 16)
    }
}

impl Default for Gif {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for Gif {
    fn name(&self) -> &'static str {
        "GIF"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            Self::STAT_ADDR => self.stat,
            Self::TAG0_ADDR => self.tag_words[0],
            Self::TAG1_ADDR => self.tag_words[1],
            Self::TAG2_ADDR => self.tag_words[2],
            Self::TAG3_ADDR => self.tag_words[3],
            Self::CNT_ADDR => self.read_cnt(),
            Self::P3CNT_ADDR | Self::P3TAG_ADDR => 0,
            _ => {
                log::debug!("GIF: unhandled read at 0x{:08X}", addr);
                0
            }
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        match addr {
            Self::CTRL_ADDR => {
                self.ctrl = value;
                if value & 1 != 0 {
                    self.reset();
                }
            }
            Self::MODE_ADDR => self.mode = value,
            _ => log::debug!("GIF: unhandled write at 0x{:08X} = 0x{:08X}", addr, value),
        }
    }
}
