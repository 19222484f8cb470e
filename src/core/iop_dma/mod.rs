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

//! IOP DMA controller
//!
//! Only the two SIF channels move data; the remaining channels keep their
//! registers so the IOP kernel can program them.
//!
//! # DMA Channels
//!
//! | Channel | Device   | Base Address |
//! |---------|----------|--------------|
//! | 0-6     | PS1 set  | 0x1F801080   |
//! | 7       | SPU2     | 0x1F801500   |
//! | 8       | DEV9     | 0x1F801510   |
//! | 9       | SIF0     | 0x1F801520   |
//! | 10      | SIF1     | 0x1F801530   |
//! | 11      | SIO2 in  | 0x1F801540   |
//! | 12      | SIO2 out | 0x1F801550   |
//!
//! Each channel has **MADR** (+0x0), **BCR** (+0x4), **CHCR** (+0x8) and
//! **TADR** (+0xC).
//!
//! # Global Registers
//!
//! - **DPCR** (0x1F8010F0), **DICR** (0x1F8010F4)
//! - **DPCR2** (0x1F801570), **DICR2** (0x1F801574)
//! - **DMACEN** (0x1F801578), **DMACINTEN** (0x1F80157C)
//!
//! # SIF packet layout
//!
//! SIF0 (IOP → EE) walks IOP tags at TADR:
//!
//! ```text
//! word 0: bits 0-23 data address, bit 30 IRQ, bit 31 end
//! word 1: data length in words
//! word 2-3: EE destination tag forwarded ahead of the data
//! ```
//!
//! SIF1 (EE → IOP) packets start with a header quadword whose low two words use
//! the same layout, followed by the payload.

use crate::core::interrupt::{iop_interrupts, IopIntc};
use crate::core::memory::{IoDevice, Ram};
use crate::core::sif::SifFifo;

/// Number of IOP DMA channels
const CHANNEL_COUNT: usize = 13;

/// IOP DMA channel registers
#[derive(Debug, Clone, Copy, Default)]
pub struct IopDmaChannel {
    pub madr: u32,
    pub bcr: u32,
    pub chcr: u32,
    pub tadr: u32,
}

impl IopDmaChannel {
    /// CHCR start/busy bit
    pub const CHCR_START: u32 = 1 << 24;

    pub fn is_started(&self) -> bool {
        self.chcr & Self::CHCR_START != 0
    }

    fn deactivate(&mut self) {
        self.chcr &= !Self::CHCR_START;
    }
}

/// IOP DMA register file
pub struct IopDma {
    channels: [IopDmaChannel; CHANNEL_COUNT],
    dpcr: u32,
    dicr: u32,
    dpcr2: u32,
    dicr2: u32,
    dmacen: u32,
    dmacinten: u32,
}

impl IopDma {
    /// SIF0 channel index
    pub const SIF0: usize = 9;

    /// SIF1 channel index
    pub const SIF1: usize = 10;

    const DPCR_ADDR: u32 = 0x1F80_10F0;
    const DICR_ADDR: u32 = 0x1F80_10F4;
    const DPCR2_ADDR: u32 = 0x1F80_1570;
    const DICR2_ADDR: u32 = 0x1F80_1574;
    const DMACEN_ADDR: u32 = 0x1F80_1578;
    const DMACINTEN_ADDR: u32 = 0x1F80_157C;

    /// IOP tag end bit
    const TAG_END: u32 = 1 << 31;

    /// IOP tag IRQ bit
    const TAG_IRQ: u32 = 1 << 30;

    pub fn new() -> Self {
        Self {
            channels: [IopDmaChannel::default(); CHANNEL_COUNT],
            dpcr: 0,
            dicr: 0,
            dpcr2: 0,
            dicr2: 0,
            dmacen: 0,
            dmacinten: 0,
        }
    }

    pub fn channel(&self, index: usize) -> &IopDmaChannel {
        &self.channels[index]
    }

    pub fn dicr2(&self) -> u32 {
        self.dicr2
    }

    /// Map a register address to (channel, register offset)
    fn decode(addr: u32) -> Option<(usize, u32)> {
        match addr {
            0x1F80_1080..=0x1F80_10EF => {
                Some((((addr - 0x1F80_1080) >> 4) as usize, addr & 0xF))
            }
            0x1F80_1500..=0x1F80_155F => {
                Some((7 + ((addr - 0x1F80_1500) >> 4) as usize, addr & 0xF))
            }
            _ => None,
        }
    }

    /// Write a register
    ///
    /// # Returns
    ///
    /// The channel index when the write set its start bit
    #[must_use]
    pub fn write_register(&mut self, addr: u32, value: u32) -> Option<usize> {
        if let Some((index, reg)) = Self::decode(addr) {
            let ch = &mut self.channels[index];

            match reg {
                0x0 => ch.madr = value & 0x00FF_FFFF,
                0x4 => ch.bcr = value,
                0x8 => {
                    ch.chcr = value;
                    if ch.is_started() {
                        return Some(index);
                    }
                }
                0xC => ch.tadr = value & 0x00FF_FFFF,
                _ => {}
            }

            return None;
        }

        match addr {
            Self::DPCR_ADDR => self.dpcr = value,
            Self::DICR_ADDR => self.dicr = value,
            Self::DPCR2_ADDR => self.dpcr2 = value,
            Self::DICR2_ADDR => {
                // Flags (24-31) are write-1-to-clear
                let flags = (self.dicr2 & !value) & 0xFF00_0000;
                self.dicr2 = (value & 0x00FF_FFFF) | flags;
            }
            Self::DMACEN_ADDR => self.dmacen = value,
            Self::DMACINTEN_ADDR => self.dmacinten = value,
            _ => log::debug!(
                "IOP DMA: unhandled write at 0x{:08X} = 0x{:08X}",
                addr,
                value
            ),
        }

        None
    }

    /// Run a channel that was just started
    pub fn start_transfer(
        &mut self,
        index: usize,
        ram: &mut Ram,
        sif0: &mut SifFifo,
        sif1: &mut SifFifo,
        intc: &mut IopIntc,
    ) {
        match index {
            Self::SIF0 => self.transfer_sif0(ram, sif0, intc),
            Self::SIF1 => self.transfer_sif1(ram, sif1, intc),
            _ => log::warn!("IOP DMA: channel {} transfers are not supported", index),
        }
    }

    /// SIF0: IOP RAM → SIF0 FIFO
    pub fn transfer_sif0(&mut self, ram: &Ram, fifo: &mut SifFifo, intc: &mut IopIntc) {
        if !self.channels[Self::SIF0].is_started() {
            return;
        }

        let max_tags = Ram::IOP_SIZE / 16;
        let ch = &mut self.channels[Self::SIF0];
        let mut finished = false;

        for _ in 0..max_tags {
            let header = ram.read32(ch.tadr);
            let words = ram.read32(ch.tadr.wrapping_add(4));
            let ee_tag = ram.read64(ch.tadr.wrapping_add(8));
            ch.tadr = ch.tadr.wrapping_add(16);

            let addr = header & 0x00FF_FFFF;
            let quadwords = words.div_ceil(4);

            log::debug!(
                "IOP DMA: SIF0 packet addr=0x{:06X} words={} ee_tag=0x{:016X}",
                addr,
                words,
                ee_tag
            );

            fifo.push(ee_tag as u128);

            for i in 0..quadwords {
                fifo.push(ram.read128(addr.wrapping_add(i * 16)));
            }

            ch.madr = addr.wrapping_add(quadwords * 16);

            if header & (Self::TAG_END | Self::TAG_IRQ) != 0 {
                finished = true;
                break;
            }
        }

        if finished {
            self.complete(Self::SIF0, intc);
        } else {
            log::warn!("IOP DMA: SIF0 chain did not terminate");
        }
    }

    /// SIF1: SIF1 FIFO → IOP RAM
    ///
    /// Leaves the channel running when the FIFO drains before an end packet.
    pub fn transfer_sif1(&mut self, ram: &mut Ram, fifo: &mut SifFifo, intc: &mut IopIntc) {
        if !self.channels[Self::SIF1].is_started() {
            return;
        }

        let ch = &mut self.channels[Self::SIF1];
        let mut finished = false;

        while let Some(header) = fifo.pop() {
            let flags = header as u32;
            let words = (header >> 32) as u32;
            let addr = flags & 0x00FF_FFFF;

            log::debug!("IOP DMA: SIF1 packet addr=0x{:06X} words={}", addr, words);

            for i in 0..words.div_ceil(4) {
                let Some(q) = fifo.pop() else {
                    log::warn!("IOP DMA: SIF1 FIFO ran dry mid-packet");
                    break;
                };
                ram.write128(addr.wrapping_add(i * 16), q);
            }

            ch.madr = addr;

            if flags & (Self::TAG_END | Self::TAG_IRQ) != 0 {
                finished = true;
                break;
            }
        }

        if finished {
            self.complete(Self::SIF1, intc);
        }
    }

    fn complete(&mut self, index: usize, intc: &mut IopIntc) {
        self.channels[index].deactivate();

        let bit = (index - 7) as u32;
        self.dicr2 |= 1 << (24 + bit);

        if self.dicr2 & (1 << (16 + bit)) != 0 {
            intc.raise(iop_interrupts::DMA);
        }
    }
}

impl Default for IopDma {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for IopDma {
    fn name(&self) -> &'static str {
        "IOP DMA"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        if let Some((index, reg)) = Self::decode(addr) {
            let ch = &self.channels[index];
            return match reg {
                0x0 => ch.madr,
                0x4 => ch.bcr,
                0x8 => ch.chcr,
                0xC => ch.tadr,
                _ => 0,
            };
        }

        match addr {
            Self::DPCR_ADDR => self.dpcr,
            Self::DICR_ADDR => self.dicr,
            Self::DPCR2_ADDR => self.dpcr2,
            Self::DICR2_ADDR => self.dicr2,
            Self::DMACEN_ADDR => self.dmacen,
            Self::DMACINTEN_ADDR => self.dmacinten,
            _ => {
                log::debug!("IOP DMA: unhandled read at 0x{:08X}", addr);
                0
            }
        }
    }

    /// Register-only write; starting a channel goes through
    /// [`IopDma::write_register`] so the caller can run the transfer
    fn write32(&mut self, addr: u32, value: u32) {
        if let Some(index) = self.write_register(addr, value) {
            log::debug!("IOP DMA: channel {} started without a bus", index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIF0_BASE: u32 = 0x1F80_1520;
    const SIF1_BASE: u32 = 0x1F80_1530;

    fn create_test_env() -> (IopDma, Ram, SifFifo, SifFifo, IopIntc) {
        (
            IopDma::new(),
            Ram::new(Ram::IOP_SIZE),
            SifFifo::new(),
            SifFifo::new(),
            IopIntc::new(),
        )
    }

    #[test]
    fn test_register_decode() {
        let mut dma = IopDma::new();
        let _ = dma.write_register(0x1F80_10A0, 0x1234);
        let _ = dma.write_register(SIF1_BASE + 4, 0x10);

        assert_eq!(dma.read32(0x1F80_10A0), 0x1234, "channel 2 MADR");
        assert_eq!(dma.read32(SIF1_BASE + 4), 0x10, "channel 10 BCR");
        assert_eq!(dma.channel(10).bcr, 0x10);
    }

    #[test]
    fn test_start_bit_reports_channel() {
        let mut dma = IopDma::new();
        assert_eq!(
            dma.write_register(SIF0_BASE + 8, IopDmaChannel::CHCR_START),
            Some(IopDma::SIF0)
        );
        assert_eq!(dma.write_register(SIF0_BASE + 8, 0), None);
    }

    #[test]
    fn test_dicr2_flags_write_one_clear() {
        let mut dma = IopDma::new();
        let mut intc = IopIntc::new();
        dma.complete(IopDma::SIF1, &mut intc);
        assert_ne!(dma.dicr2() & (1 << 27), 0);

        let _ = dma.write_register(0x1F80_1574, 1 << 27);
        assert_eq!(dma.dicr2() & (1 << 27), 0);
    }

    #[test]
    fn test_sif0_pushes_tag_and_payload() {
        let (mut dma, mut ram, mut sif0, mut sif1, mut intc) = create_test_env();

        // Tag at 0x1000: 4 words from 0x2000, end, EE tag 0xAABB
        ram.write32(0x1000, 0x8000_2000);
        ram.write32(0x1004, 4);
        ram.write64(0x1008, 0xAABB);
        ram.write128(0x2000, 0x0102_0304);

        let _ = dma.write_register(0x1F80_1574, 1 << (16 + 2));
        let _ = dma.write_register(SIF0_BASE + 0xC, 0x1000);
        let started = dma.write_register(SIF0_BASE + 8, IopDmaChannel::CHCR_START);
        dma.start_transfer(started.unwrap(), &mut ram, &mut sif0, &mut sif1, &mut intc);

        assert_eq!(sif0.pop(), Some(0xAABB), "EE tag goes first");
        assert_eq!(sif0.pop(), Some(0x0102_0304));
        assert!(sif0.is_empty());
        assert!(!dma.channel(IopDma::SIF0).is_started());
        assert_ne!(intc.stat() & iop_interrupts::DMA, 0, "DMA interrupt raised");
    }

    #[test]
    fn test_sif1_writes_packets_to_ram() {
        let (mut dma, mut ram, mut sif0, mut sif1, mut intc) = create_test_env();

        sif1.push(((8u128) << 32) | 0x8000_3000);
        sif1.push(0x1111);
        sif1.push(0x2222);

        let started = dma.write_register(SIF1_BASE + 8, IopDmaChannel::CHCR_START);
        dma.start_transfer(started.unwrap(), &mut ram, &mut sif0, &mut sif1, &mut intc);

        assert_eq!(ram.read128(0x3000), 0x1111);
        assert_eq!(ram.read128(0x3010), 0x2222);
        assert!(!dma.channel(IopDma::SIF1).is_started());
        assert_eq!(intc.stat(), 0, "interrupt not enabled in DICR2");
    }

    #[test]
    fn test_sif1_waits_when_not_started() {
        let (mut dma, mut ram, _, mut sif1, mut intc) = create_test_env();
        sif1.push(0x8000_0000);

        dma.transfer_sif1(&mut ram, &mut sif1, &mut intc);
        assert_eq!(sif1.len(), 1, "data stays queued for a later start");
    }
}
