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

//! EE DMA Controller (DMAC)
//!
//! The DMAC moves quadwords between EE memory and the peripherals. Transfers in
//! this emulator are synchronous: writing CHCR with STR set runs the whole
//! transfer (including any tag chain) before the write returns.
//!
//! # DMA Channels
//!
//! | Channel | Device    | Base Address |
//! |---------|-----------|--------------|
//! | 0       | VIF0      | 0x10008000   |
//! | 1       | VIF1      | 0x10009000   |
//! | 2       | GIF       | 0x1000A000   |
//! | 3       | IPU_FROM  | 0x1000B000   |
//! | 4       | IPU_TO    | 0x1000B400   |
//! | 5       | SIF0      | 0x1000C000   |
//! | 6       | SIF1      | 0x1000C400   |
//! | 7       | SIF2      | 0x1000C800   |
//! | 8       | SPR_FROM  | 0x1000D000   |
//! | 9       | SPR_TO    | 0x1000D400   |
//!
//! # Channel Registers
//!
//! - **CHCR** (+0x00), **MADR** (+0x10), **QWC** (+0x20), **TADR** (+0x30)
//! - **ASR0** (+0x40), **ASR1** (+0x50), **SADR** (+0x80)
//!
//! # Global Registers
//!
//! - **D_CTRL** (0x1000E000), **D_STAT** (0x1000E010), **D_PCR** (0x1000E020)
//! - **D_SQWC** (0x1000E030), **D_RBSR** (0x1000E040), **D_RBOR** (0x1000E050)
//! - **D_ENABLER** (0x1000F520), **D_ENABLEW** (0x1000F590)
//!
//! D_STAT holds per-channel completion flags in bits 0-9 and their interrupt
//! masks in bits 16-25. The DMAC drives the EE's INT1 line whenever a flag and
//! its mask are both set.

mod channel;
mod transfer;

pub use channel::{tag_id, ChannelId, DmaChannel, DmaTag};

use crate::core::sif::SifFifo;

/// Memory-side services the DMAC needs to run a transfer
///
/// Implemented by the system bus; tests can supply a plain memory.
pub trait DmaBus {
    /// Read a quadword from the EE physical address space
    fn read128(&mut self, addr: u32) -> u128;

    /// Write a quadword to the EE physical address space
    fn write128(&mut self, addr: u32, value: u128);

    /// Read a quadword from the scratchpad
    fn read_scratchpad128(&mut self, offset: u32) -> u128;

    /// Write a quadword to the scratchpad
    fn write_scratchpad128(&mut self, offset: u32, value: u128);

    /// IOP → EE FIFO
    fn sif0_fifo(&mut self) -> &mut SifFifo;

    /// EE → IOP FIFO
    fn sif1_fifo(&mut self) -> &mut SifFifo;

    /// Let the IOP DMA drain the SIF1 FIFO
    fn iop_sif1_receive(&mut self);
}

/// EE DMA controller
///
/// # Example
///
/// ```
/// use ps2rx::core::dma::{ChannelId, Dmac};
///
/// let mut dmac = Dmac::new();
/// dmac.write32(0x1000_A010, 0x0010_0000); // D2_MADR
/// assert_eq!(dmac.read_madr(ChannelId::Gif), 0x0010_0000);
/// ```
pub struct Dmac {
    channels: [DmaChannel; 10],

    /// D_CTRL
    ctrl: u32,

    /// D_STAT: completion flags (0-9) and masks (16-25)
    stat: u32,

    /// D_PCR
    pcr: u32,

    /// D_SQWC
    sqwc: u32,

    /// D_RBSR / D_RBOR: ring buffer size and offset
    rbsr: u32,
    rbor: u32,

    /// D_ENABLER / D_ENABLEW
    enabler: u32,
    enablew: u32,

    /// Level of the EE INT1 line
    int1: bool,
}

impl Dmac {
    pub const CTRL_ADDR: u32 = 0x1000_E000;
    pub const STAT_ADDR: u32 = 0x1000_E010;
    pub const PCR_ADDR: u32 = 0x1000_E020;
    pub const SQWC_ADDR: u32 = 0x1000_E030;
    pub const RBSR_ADDR: u32 = 0x1000_E040;
    pub const RBOR_ADDR: u32 = 0x1000_E050;
    pub const ENABLER_ADDR: u32 = 0x1000_F520;
    pub const ENABLEW_ADDR: u32 = 0x1000_F590;

    /// Address the GIF channel streams into
    pub const GIF_FIFO_ADDR: u32 = 0x1000_6000;

    pub fn new() -> Self {
        Self {
            channels: [DmaChannel::default(); 10],
            ctrl: 0,
            stat: 0,
            pcr: 0,
            sqwc: 0,
            rbsr: 0,
            rbor: 0,
            enabler: 0,
            enablew: 0,
            int1: false,
        }
    }

    /// Read a DMAC register
    pub fn read32(&self, addr: u32) -> u32 {
        if let Some(id) = ChannelId::from_address(addr) {
            let ch = &self.channels[id.index()];

            return match addr & 0xFF {
                0x00 => ch.chcr,
                0x10 => ch.madr,
                0x20 => ch.qwc,
                0x30 => ch.tadr,
                0x40 => ch.asr0,
                0x50 => ch.asr1,
                0x80 => ch.sadr,
                reg => {
                    log::debug!(
                        "DMAC: unknown {} register 0x{:02X} read",
                        id.name(),
                        reg
                    );
                    0
                }
            };
        }

        match addr {
            Self::CTRL_ADDR => self.ctrl,
            Self::STAT_ADDR => self.stat,
            Self::PCR_ADDR => self.pcr,
            Self::SQWC_ADDR => self.sqwc,
            Self::RBSR_ADDR => self.rbsr,
            Self::RBOR_ADDR => self.rbor,
            Self::ENABLER_ADDR => self.enabler,
            Self::ENABLEW_ADDR => self.enablew,
            _ => {
                log::debug!("DMAC: unhandled read at 0x{:08X}", addr);
                0
            }
        }
    }

    /// Write a DMAC register
    ///
    /// # Returns
    ///
    /// The channel to start when the write set CHCR.STR. The caller runs
    /// [`Dmac::start_transfer`] with access to memory.
    #[must_use]
    pub fn write32(&mut self, addr: u32, value: u32) -> Option<ChannelId> {
        if let Some(id) = ChannelId::from_address(addr) {
            let ch = &mut self.channels[id.index()];

            match addr & 0xFF {
                0x00 => {
                    ch.chcr = value;
                    log::trace!("DMAC: {} CHCR=0x{:08X}", id.name(), value);

                    if value & DmaChannel::CHCR_STR != 0 {
                        return Some(id);
                    }
                }
                0x10 => ch.madr = value,
                0x20 => ch.qwc = value,
                0x30 => ch.tadr = value,
                0x40 => ch.asr0 = value,
                0x50 => ch.asr1 = value,
                0x80 => ch.sadr = value,
                reg => {
                    log::debug!(
                        "DMAC: unknown {} register 0x{:02X} write = 0x{:08X}",
                        id.name(),
                        reg,
                        value
                    );
                }
            }

            return None;
        }

        match addr {
            Self::CTRL_ADDR => self.ctrl = value,
            Self::STAT_ADDR => self.write_stat(value),
            Self::PCR_ADDR => self.pcr = value,
            Self::SQWC_ADDR => self.sqwc = value,
            Self::RBSR_ADDR => self.rbsr = value,
            Self::RBOR_ADDR => self.rbor = value,
            Self::ENABLER_ADDR => self.enabler = value,
            Self::ENABLEW_ADDR => self.enablew = value,
            _ => log::debug!(
                "DMAC: unhandled write at 0x{:08X} = 0x{:08X}",
                addr,
                value
            ),
        }

        None
    }

    /// Write D_STAT
    ///
    /// Flags (bits 0-9) are write-1-to-clear, masks (bits 16-25) are
    /// write-1-to-toggle, everything else is stored as written.
    pub fn write_stat(&mut self, value: u32) {
        self.stat &= !(value & 0x0000_03FF);
        self.stat ^= value & 0x03FF_0000;
        self.stat &= 0x03FF_03FF;
        self.stat |= value & !0x03FF_03FF;
        self.update_int1();
    }

    /// Flag a channel as complete
    pub fn set_irq(&mut self, id: ChannelId) {
        self.stat |= 1 << id.index();
        self.update_int1();
    }

    /// Level of the EE INT1 line
    pub fn int1(&self) -> bool {
        self.int1
    }

    pub fn stat(&self) -> u32 {
        self.stat
    }

    pub fn channel(&self, id: ChannelId) -> &DmaChannel {
        &self.channels[id.index()]
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> &mut DmaChannel {
        &mut self.channels[id.index()]
    }

    pub fn read_chcr(&self, id: ChannelId) -> u32 {
        self.channels[id.index()].chcr
    }

    pub fn read_madr(&self, id: ChannelId) -> u32 {
        self.channels[id.index()].madr
    }

    pub fn read_qwc(&self, id: ChannelId) -> u32 {
        self.channels[id.index()].qwc
    }

    pub fn read_tadr(&self, id: ChannelId) -> u32 {
        self.channels[id.index()].tadr
    }

    fn update_int1(&mut self) {
        let level = (self.stat & 0x3FF) & ((self.stat >> 16) & 0x3FF) != 0;

        if level != self.int1 {
            log::trace!(
                "DMAC: INT1 {} (stat=0x{:08X})",
                if level { "asserted" } else { "cleared" },
                self.stat
            );
        }

        self.int1 = level;
    }
}

impl Default for Dmac {
    fn default() -> Self {
        Self::new()
    }
}
