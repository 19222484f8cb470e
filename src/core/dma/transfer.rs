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

//! DMAC transfer engines
//!
//! Every transfer runs to completion synchronously. Chains are walked until a
//! tag ends them; a chain that never ends (self-referencing NEXT tags, tags with
//! unsupported IDs) is not cut short.

use super::{tag_id, ChannelId, DmaBus, DmaChannel, Dmac};

/// MADR bit 31 selects the scratchpad instead of main memory
const MADR_SPR: u32 = 0x8000_0000;

/// Scratchpad address mask
const SPR_MASK: u32 = 0x3FFF;

#[inline]
fn read_source<B: DmaBus + ?Sized>(bus: &mut B, addr: u32) -> u128 {
    if addr & MADR_SPR != 0 {
        bus.read_scratchpad128(addr & SPR_MASK)
    } else {
        bus.read128(addr)
    }
}

impl Dmac {
    /// Run a channel that was just started by a CHCR write
    pub fn start_transfer<B: DmaBus + ?Sized>(&mut self, id: ChannelId, bus: &mut B) {
        let ch = self.channel(id);
        log::debug!(
            "DMAC: {} start chcr=0x{:08X} mode={} madr=0x{:08X} qwc={} tadr=0x{:08X}",
            id.name(),
            ch.chcr,
            ch.mode(),
            ch.madr,
            ch.qwc,
            ch.tadr
        );

        match id {
            ChannelId::Gif => self.transfer_gif(bus),
            ChannelId::Sif0 => self.transfer_sif0(bus),
            ChannelId::Sif1 => self.transfer_sif1(bus),
            ChannelId::SprFrom => self.transfer_spr_from(bus),
            ChannelId::SprTo => self.transfer_spr_to(bus),
            ChannelId::Sif2 | ChannelId::Vif0 | ChannelId::Vif1 | ChannelId::IpuFrom
            | ChannelId::IpuTo => {
                log::warn!("DMAC: {} transfers are not supported", id.name());
            }
        }
    }

    /// Resume SIF0 if it is waiting for data the IOP has since pushed
    pub fn poll_sif0<B: DmaBus + ?Sized>(&mut self, bus: &mut B) {
        if self.channel(ChannelId::Sif0).is_started() && !bus.sif0_fifo().is_empty() {
            self.transfer_sif0(bus);
        }
    }

    /// GIF: memory → GIF FIFO (normal burst, then source chain)
    fn transfer_gif<B: DmaBus + ?Sized>(&mut self, bus: &mut B) {
        let ch = self.channel_mut(ChannelId::Gif);

        Self::burst_to_gif(ch, bus);

        if ch.mode() == DmaChannel::MODE_CHAIN {
            loop {
                let tag = read_source(bus, ch.tadr);
                let end = ch.process_source_tag(tag);

                Self::burst_to_gif(ch, bus);

                if ch.tag.id == tag_id::CNT {
                    ch.tadr = ch.madr;
                }

                if end {
                    break;
                }
            }
        }

        ch.deactivate();
        self.set_irq(ChannelId::Gif);
    }

    fn burst_to_gif<B: DmaBus + ?Sized>(ch: &mut DmaChannel, bus: &mut B) {
        for _ in 0..ch.qwc {
            let q = read_source(bus, ch.madr);
            bus.write128(Dmac::GIF_FIFO_ADDR, q);
            ch.madr = ch.madr.wrapping_add(16);
        }

        ch.qwc = 0;
    }

    /// SIF0: SIF0 FIFO → memory (destination chain)
    ///
    /// Waits (returns without effect) while the FIFO is empty or the channel
    /// has not been started.
    fn transfer_sif0<B: DmaBus + ?Sized>(&mut self, bus: &mut B) {
        if bus.sif0_fifo().is_empty() {
            return;
        }

        if !self.channel(ChannelId::Sif0).is_started() {
            return;
        }

        let ch = self.channel_mut(ChannelId::Sif0);
        let mut finished = false;

        while let Some(tag) = bus.sif0_fifo().pop() {
            let end = ch.process_dest_tag(tag);

            for _ in 0..ch.tag.qwc {
                let Some(q) = bus.sif0_fifo().pop() else {
                    log::warn!("DMAC: SIF0 FIFO ran dry mid-segment at 0x{:08X}", ch.madr);
                    break;
                };

                bus.write128(ch.madr, q);
                ch.madr = ch.madr.wrapping_add(16);
                ch.qwc = ch.qwc.saturating_sub(1);
            }

            if end {
                ch.deactivate();
                finished = true;
                break;
            }
        }

        if finished {
            self.set_irq(ChannelId::Sif0);
            bus.sif0_fifo().reset();
        }
    }

    /// SIF1: memory → SIF1 FIFO (source chain), then hand off to the IOP
    fn transfer_sif1<B: DmaBus + ?Sized>(&mut self, bus: &mut B) {
        let ch = self.channel_mut(ChannelId::Sif1);

        loop {
            let tag = read_source(bus, ch.tadr);
            let end = ch.process_source_tag(tag);

            log::debug!("DMAC: SIF1 segment madr=0x{:08X} qwc={}", ch.madr, ch.tag.qwc);

            for _ in 0..ch.tag.qwc {
                let q = read_source(bus, ch.madr);
                bus.sif1_fifo().push(q);
                ch.madr = ch.madr.wrapping_add(16);
            }

            ch.qwc = 0;

            if ch.tag.id == tag_id::CNT {
                ch.tadr = ch.madr;
            }

            if end {
                break;
            }
        }

        bus.iop_sif1_receive();

        self.set_irq(ChannelId::Sif1);
        self.channel_mut(ChannelId::Sif1).deactivate();
    }

    /// SPR_FROM: scratchpad (SADR) → memory (MADR)
    fn transfer_spr_from<B: DmaBus + ?Sized>(&mut self, bus: &mut B) {
        let ch = self.channel_mut(ChannelId::SprFrom);

        for _ in 0..ch.qwc {
            let q = bus.read_scratchpad128(ch.sadr & SPR_MASK);
            bus.write128(ch.madr, q);
            ch.sadr = ch.sadr.wrapping_add(16) & SPR_MASK;
            ch.madr = ch.madr.wrapping_add(16);
        }

        ch.qwc = 0;
        ch.deactivate();
        self.set_irq(ChannelId::SprFrom);
    }

    /// SPR_TO: memory (MADR) → scratchpad (SADR)
    fn transfer_spr_to<B: DmaBus + ?Sized>(&mut self, bus: &mut B) {
        let ch = self.channel_mut(ChannelId::SprTo);

        for _ in 0..ch.qwc {
            let q = bus.read128(ch.madr);
            bus.write_scratchpad128(ch.sadr & SPR_MASK, q);
            ch.sadr = ch.sadr.wrapping_add(16) & SPR_MASK;
            ch.madr = ch.madr.wrapping_add(16);
        }

        ch.qwc = 0;
        ch.deactivate();
        self.set_irq(ChannelId::SprTo);
    }
}

#[cfg(test)]
mod tests {
    use super::super::DmaTag;
    use super::*;
    use crate::core::sif::SifFifo;

    /// Flat memory with a recording GIF FIFO
    struct TestBus {
        ram: Vec<u128>,
        scratchpad: Vec<u128>,
        gif: Vec<u128>,
        sif0: SifFifo,
        sif1: SifFifo,
        iop_received: Vec<u128>,
    }

    impl TestBus {
        fn new() -> Self {
            Self {
                ram: vec![0; 0x1000],
                scratchpad: vec![0; 0x400],
                gif: Vec::new(),
                sif0: SifFifo::new(),
                sif1: SifFifo::new(),
                iop_received: Vec::new(),
            }
        }

        fn put(&mut self, addr: u32, value: u128) {
            self.ram[(addr >> 4) as usize] = value;
        }
    }

    impl DmaBus for TestBus {
        fn read128(&mut self, addr: u32) -> u128 {
            self.ram[(addr >> 4) as usize & 0xFFF]
        }

        fn write128(&mut self, addr: u32, value: u128) {
            if addr == Dmac::GIF_FIFO_ADDR {
                self.gif.push(value);
            } else {
                self.ram[(addr >> 4) as usize & 0xFFF] = value;
            }
        }

        fn read_scratchpad128(&mut self, offset: u32) -> u128 {
            self.scratchpad[(offset >> 4) as usize & 0x3FF]
        }

        fn write_scratchpad128(&mut self, offset: u32, value: u128) {
            self.scratchpad[(offset >> 4) as usize & 0x3FF] = value;
        }

        fn sif0_fifo(&mut self) -> &mut SifFifo {
            &mut self.sif0
        }

        fn sif1_fifo(&mut self) -> &mut SifFifo {
            &mut self.sif1
        }

        fn iop_sif1_receive(&mut self) {
            while let Some(q) = self.sif1.pop() {
                self.iop_received.push(q);
            }
        }
    }

    fn tag(id: u8, qwc: u16, addr: u32, irq: bool) -> u128 {
        ((qwc as u64) | ((id as u64) << 28) | ((irq as u64) << 31) | ((addr as u64) << 32))
            as u128
    }

    fn start(dmac: &mut Dmac, bus: &mut TestBus, base: u32, chcr: u32) {
        if let Some(id) = dmac.write32(base, chcr) {
            dmac.start_transfer(id, bus);
        }
    }

    // ============================================================================
    // GIF Channel Tests
    // ============================================================================

    #[test]
    fn test_gif_normal_burst() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();
        for i in 0..3 {
            bus.put(0x100 + i * 16, 0xA0 + i as u128);
        }

        let _ = dmac.write32(0x1000_A010, 0x100);
        let _ = dmac.write32(0x1000_A020, 3);
        start(&mut dmac, &mut bus, 0x1000_A000, 0x101);

        assert_eq!(bus.gif, vec![0xA0, 0xA1, 0xA2]);
        assert_eq!(dmac.read_madr(ChannelId::Gif), 0x130);
        assert_eq!(dmac.read_qwc(ChannelId::Gif), 0);
        assert_eq!(dmac.read_chcr(ChannelId::Gif) & 0x100, 0, "STR cleared");
        assert_ne!(dmac.stat() & (1 << 2), 0, "GIF flag set");
    }

    #[test]
    fn test_gif_burst_from_scratchpad() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();
        bus.scratchpad[2] = 0x5151;

        let _ = dmac.write32(0x1000_A010, 0x8000_0020);
        let _ = dmac.write32(0x1000_A020, 1);
        start(&mut dmac, &mut bus, 0x1000_A000, 0x101);

        assert_eq!(bus.gif, vec![0x5151]);
    }

    #[test]
    fn test_gif_chain_cnt_then_end() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();

        // CNT with 2 quadwords at 0x200, followed by END with 1 quadword
        bus.put(0x200, tag(tag_id::CNT, 2, 0, false));
        bus.put(0x210, 0x11);
        bus.put(0x220, 0x22);
        bus.put(0x230, tag(tag_id::END, 1, 0, false));
        bus.put(0x240, 0x33);

        let _ = dmac.write32(0x1000_A030, 0x200);
        start(&mut dmac, &mut bus, 0x1000_A000, 0x105);

        assert_eq!(bus.gif, vec![0x11, 0x22, 0x33]);
        assert_eq!(dmac.channel(ChannelId::Gif).tadr, 0x230, "END keeps TADR on the tag");
        assert!(!dmac.channel(ChannelId::Gif).is_started());
    }

    #[test]
    fn test_gif_chain_next_and_ref() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();

        bus.put(0x000, tag(tag_id::NEXT, 1, 0x400, false));
        bus.put(0x010, 0xAA);
        bus.put(0x400, tag(tag_id::REF, 2, 0x800, false));
        bus.put(0x410, tag(tag_id::REFE, 1, 0x900, false));
        bus.put(0x800, 0xB0);
        bus.put(0x810, 0xB1);
        bus.put(0x900, 0xC0);

        let _ = dmac.write32(0x1000_A030, 0x000);
        start(&mut dmac, &mut bus, 0x1000_A000, 0x105);

        assert_eq!(bus.gif, vec![0xAA, 0xB0, 0xB1, 0xC0]);
    }

    #[test]
    fn test_gif_chain_tie_irq_stops() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();

        bus.put(0x000, tag(tag_id::CNT, 1, 0, true));
        bus.put(0x010, 0x01);
        bus.put(0x020, tag(tag_id::END, 1, 0, false));
        bus.put(0x030, 0x02);

        start(&mut dmac, &mut bus, 0x1000_A000, 0x185);

        assert_eq!(bus.gif, vec![0x01], "TIE + IRQ ends after the first segment");
    }

    // ============================================================================
    // SIF Channel Tests
    // ============================================================================

    #[test]
    fn test_sif0_waits_for_data() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();

        start(&mut dmac, &mut bus, 0x1000_C000, 0x100);
        assert!(
            dmac.channel(ChannelId::Sif0).is_started(),
            "empty FIFO leaves the channel waiting"
        );
        assert_eq!(dmac.stat() & (1 << 5), 0);

        bus.sif0.push(tag(tag_id::END, 2, 0x300, false));
        bus.sif0.push(0x1111);
        bus.sif0.push(0x2222);
        dmac.poll_sif0(&mut bus);

        assert_eq!(bus.ram[0x30], 0x1111);
        assert_eq!(bus.ram[0x31], 0x2222);
        assert!(!dmac.channel(ChannelId::Sif0).is_started());
        assert_ne!(dmac.stat() & (1 << 5), 0, "SIF0 flag set");
        assert!(bus.sif0.is_empty());
    }

    #[test]
    fn test_sif0_not_started_ignores_fifo() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();
        bus.sif0.push(tag(tag_id::END, 0, 0, false));

        dmac.poll_sif0(&mut bus);
        assert_eq!(bus.sif0.len(), 1);
    }

    #[test]
    fn test_sif0_multiple_segments() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();

        bus.sif0.push(tag(tag_id::CNT, 1, 0x100, false));
        bus.sif0.push(0xAB);
        bus.sif0.push(tag(tag_id::END, 1, 0x500, false));
        bus.sif0.push(0xCD);

        start(&mut dmac, &mut bus, 0x1000_C000, 0x100);

        assert_eq!(bus.ram[0x10], 0xAB);
        assert_eq!(bus.ram[0x50], 0xCD);
        assert_eq!(dmac.channel(ChannelId::Sif0).tag, {
            let mut t = DmaTag::decode(tag(tag_id::END, 1, 0x500, false));
            t.end = true;
            t
        });
    }

    #[test]
    fn test_sif1_pushes_chain_and_notifies_iop() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();

        bus.put(0x000, tag(tag_id::CNT, 1, 0, false));
        bus.put(0x010, 0x77);
        bus.put(0x020, tag(tag_id::REFE, 1, 0x600, false));
        bus.put(0x600, 0x88);

        let _ = dmac.write32(0x1000_C430, 0x000);
        start(&mut dmac, &mut bus, 0x1000_C400, 0x105);

        assert_eq!(bus.iop_received, vec![0x77, 0x88]);
        assert!(!dmac.channel(ChannelId::Sif1).is_started());
        assert_ne!(dmac.stat() & (1 << 6), 0);
    }

    #[test]
    fn test_unsupported_channel_is_noop() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();

        start(&mut dmac, &mut bus, 0x1000_C800, 0x100);
        assert_eq!(dmac.stat() & 0x3FF, 0);
    }

    // ============================================================================
    // Scratchpad Channel Tests
    // ============================================================================

    #[test]
    fn test_spr_to_and_from() {
        let mut dmac = Dmac::new();
        let mut bus = TestBus::new();
        bus.put(0x100, 0xFEED);
        bus.put(0x110, 0xBEEF);

        let _ = dmac.write32(0x1000_D410, 0x100);
        let _ = dmac.write32(0x1000_D420, 2);
        let _ = dmac.write32(0x1000_D480, 0x40);
        start(&mut dmac, &mut bus, 0x1000_D400, 0x100);

        assert_eq!(bus.scratchpad[4], 0xFEED);
        assert_eq!(bus.scratchpad[5], 0xBEEF);

        let _ = dmac.write32(0x1000_D010, 0x700);
        let _ = dmac.write32(0x1000_D020, 2);
        let _ = dmac.write32(0x1000_D080, 0x40);
        start(&mut dmac, &mut bus, 0x1000_D000, 0x100);

        assert_eq!(bus.ram[0x70], 0xFEED);
        assert_eq!(bus.ram[0x71], 0xBEEF);
        assert_ne!(dmac.stat() & (1 << 8), 0);
        assert_ne!(dmac.stat() & (1 << 9), 0);
    }
}
