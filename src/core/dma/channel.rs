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

//! DMAC channel state and DMA tag decoding

/// EE DMA channel identifiers
///
/// The discriminant is both the channel index and its D_STAT bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Vif0 = 0,
    Vif1 = 1,
    Gif = 2,
    IpuFrom = 3,
    IpuTo = 4,
    Sif0 = 5,
    Sif1 = 6,
    Sif2 = 7,
    SprFrom = 8,
    SprTo = 9,
}

impl ChannelId {
    /// All channels in index order
    pub const ALL: [ChannelId; 10] = [
        ChannelId::Vif0,
        ChannelId::Vif1,
        ChannelId::Gif,
        ChannelId::IpuFrom,
        ChannelId::IpuTo,
        ChannelId::Sif0,
        ChannelId::Sif1,
        ChannelId::Sif2,
        ChannelId::SprFrom,
        ChannelId::SprTo,
    ];

    /// Select a channel from a register address (`addr & 0xFF00`)
    ///
    /// # Example
    ///
    /// ```
    /// use ps2rx::core::dma::ChannelId;
    ///
    /// assert_eq!(ChannelId::from_address(0x1000_A010), Some(ChannelId::Gif));
    /// assert_eq!(ChannelId::from_address(0x1000_C400), Some(ChannelId::Sif1));
    /// assert_eq!(ChannelId::from_address(0x1000_E010), None);
    /// ```
    pub fn from_address(addr: u32) -> Option<Self> {
        match addr & 0xFF00 {
            0x8000 => Some(ChannelId::Vif0),
            0x9000 => Some(ChannelId::Vif1),
            0xA000 => Some(ChannelId::Gif),
            0xB000 => Some(ChannelId::IpuFrom),
            0xB400 => Some(ChannelId::IpuTo),
            0xC000 => Some(ChannelId::Sif0),
            0xC400 => Some(ChannelId::Sif1),
            0xC800 => Some(ChannelId::Sif2),
            0xD000 => Some(ChannelId::SprFrom),
            0xD400 => Some(ChannelId::SprTo),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelId::Vif0 => "vif0",
            ChannelId::Vif1 => "vif1",
            ChannelId::Gif => "gif",
            ChannelId::IpuFrom => "ipu_from",
            ChannelId::IpuTo => "ipu_to",
            ChannelId::Sif0 => "sif0",
            ChannelId::Sif1 => "sif1",
            ChannelId::Sif2 => "sif2",
            ChannelId::SprFrom => "spr_from",
            ChannelId::SprTo => "spr_to",
        }
    }
}

/// Tag identifiers with defined behaviour
pub mod tag_id {
    /// Transfer QWC from ADDR, then end
    pub const REFE: u8 = 0;
    /// Transfer QWC following the tag, next tag follows the data
    pub const CNT: u8 = 1;
    /// Transfer QWC following the tag, next tag at ADDR
    pub const NEXT: u8 = 2;
    /// Transfer QWC from ADDR, next tag follows this one
    pub const REF: u8 = 3;
    /// Transfer QWC following the tag, then end
    pub const END: u8 = 7;
}

/// Decoded 128-bit DMA tag
///
/// ```text
///  127          64 63  62          32 31  30-28 27-26 25-16  15-0
/// ┌──────────────┬───┬──────────────┬────┬─────┬─────┬──────┬─────┐
/// │     DATA     │MEM│     ADDR     │IRQ │ ID  │ PCT │  -   │ QWC │
/// └──────────────┴───┴──────────────┴────┴─────┴─────┴──────┴─────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DmaTag {
    pub qwc: u32,
    pub pct: u8,
    pub id: u8,
    pub irq: bool,
    pub addr: u32,
    pub mem: bool,
    pub data: u64,
    /// Set by tag processing when the chain terminates after this segment
    pub end: bool,
}

impl DmaTag {
    /// Decode a raw tag quadword
    ///
    /// # Example
    ///
    /// ```
    /// use ps2rx::core::dma::DmaTag;
    ///
    /// // NEXT tag, 4 quadwords, next tag at 0x2000, IRQ set
    /// let raw = (0x2000u128 << 32) | (1 << 31) | (2 << 28) | 4;
    /// let tag = DmaTag::decode(raw);
    /// assert_eq!(tag.qwc, 4);
    /// assert_eq!(tag.id, 2);
    /// assert!(tag.irq);
    /// assert_eq!(tag.addr, 0x2000);
    /// ```
    pub fn decode(raw: u128) -> Self {
        let lo = raw as u64;

        Self {
            qwc: (lo & 0xFFFF) as u32,
            pct: ((lo >> 26) & 0x3) as u8,
            id: ((lo >> 28) & 0x7) as u8,
            irq: (lo >> 31) & 1 != 0,
            addr: ((lo >> 32) & 0x7FFF_FFFF) as u32,
            mem: (lo >> 63) & 1 != 0,
            data: (raw >> 64) as u64,
            end: false,
        }
    }
}

/// One EE DMA channel's registers
#[derive(Debug, Clone, Copy, Default)]
pub struct DmaChannel {
    /// Dn_CHCR
    pub chcr: u32,
    /// Dn_MADR: memory address of the current segment
    pub madr: u32,
    /// Dn_QWC: quadwords left in the current segment
    pub qwc: u32,
    /// Dn_TADR: tag address
    pub tadr: u32,
    /// Dn_ASR0/1: tag address stack
    pub asr0: u32,
    pub asr1: u32,
    /// Dn_SADR: scratchpad address
    pub sadr: u32,
    /// Last tag processed by the chain walker
    pub tag: DmaTag,
}

impl DmaChannel {
    /// CHCR.DIR: 1 = from memory
    pub const CHCR_DIR: u32 = 1 << 0;
    /// CHCR.TIE: end chain on tags with IRQ set
    pub const CHCR_TIE: u32 = 1 << 7;
    /// CHCR.STR: channel busy
    pub const CHCR_STR: u32 = 1 << 8;

    /// Normal (burst) mode
    pub const MODE_NORMAL: u32 = 0;
    /// Source/destination chain mode
    pub const MODE_CHAIN: u32 = 1;

    pub fn is_started(&self) -> bool {
        self.chcr & Self::CHCR_STR != 0
    }

    /// CHCR.MOD (bits 2-3)
    pub fn mode(&self) -> u32 {
        (self.chcr >> 2) & 0x3
    }

    pub fn tag_interrupt_enabled(&self) -> bool {
        self.chcr & Self::CHCR_TIE != 0
    }

    /// Clear the STR bit once a transfer has completed
    pub fn deactivate(&mut self) {
        self.chcr &= !Self::CHCR_STR;
    }

    /// Apply a source-chain tag
    ///
    /// Updates MADR/TADR per the tag ID and latches the decoded tag.
    ///
    /// # Returns
    ///
    /// `true` when the chain ends after this segment
    pub fn process_source_tag(&mut self, raw: u128) -> bool {
        let mut tag = DmaTag::decode(raw);

        match tag.id {
            tag_id::REFE => {
                self.madr = tag.addr;
                self.tadr = self.tadr.wrapping_add(16);
                tag.end = true;
            }
            tag_id::CNT => {
                self.madr = self.tadr.wrapping_add(16);
                self.tadr = self.madr;
            }
            tag_id::NEXT => {
                self.madr = self.tadr.wrapping_add(16);
                self.tadr = tag.addr;
            }
            tag_id::REF => {
                self.madr = tag.addr;
                self.tadr = self.tadr.wrapping_add(16);
            }
            tag_id::END => {
                self.madr = self.tadr.wrapping_add(16);
                tag.end = true;
            }
            id => {
                log::warn!(
                    "DMAC: unsupported source tag id {} at TADR=0x{:08X}",
                    id,
                    self.tadr
                );
            }
        }

        if self.tag_interrupt_enabled() && tag.irq {
            tag.end = true;
        }

        self.qwc = tag.qwc;
        self.tag = tag;

        log::trace!(
            "DMAC: source tag id={} qwc={} madr=0x{:08X} tadr=0x{:08X} end={}",
            tag.id,
            tag.qwc,
            self.madr,
            self.tadr,
            tag.end
        );

        tag.end
    }

    /// Apply a destination-chain tag
    ///
    /// # Returns
    ///
    /// `true` when the chain ends after this segment
    pub fn process_dest_tag(&mut self, raw: u128) -> bool {
        let mut tag = DmaTag::decode(raw);

        tag.end = tag.irq && self.tag_interrupt_enabled();

        match tag.id {
            tag_id::END => {
                tag.end = true;
                self.madr = tag.addr;
            }
            tag_id::REFE | tag_id::CNT => self.madr = tag.addr,
            _ => {}
        }

        self.qwc = tag.qwc;
        self.tag = tag;

        log::trace!(
            "DMAC: dest tag id={} qwc={} madr=0x{:08X} end={}",
            tag.id,
            tag.qwc,
            self.madr,
            tag.end
        );

        tag.end
    }
}
