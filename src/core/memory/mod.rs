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

//! EE and IOP memory buses
//!
//! [`Bus`] owns every memory and every peripheral except the EE DMAC. The two
//! CPUs reach it through short-lived views that also borrow the DMAC:
//!
//! ```text
//!            ┌──────────── System ────────────┐
//!            │   Bus ◄──────────────── Dmac   │
//!            └────▲──────────────────────▲────┘
//!                 │                      │
//!        EeBus { bus, dmac }    IopBus { bus, dmac }
//!                 │                      │
//!              EE core                IOP core
//! ```
//!
//! Accesses are routed through the [`AddressMap`] of the issuing CPU after a
//! handful of exact-address special cases. Misses read as zero and drop
//! writes; they are logged, never reported as errors.
//!
//! # Example
//!
//! ```
//! use ps2rx::core::dma::Dmac;
//! use ps2rx::core::gs::Gs;
//! use ps2rx::core::memory::{Bus, CpuBus, EeBus};
//!
//! let mut bus = Bus::new(Gs::new_null()).unwrap();
//! let mut dmac = Dmac::new();
//!
//! let mut ee = EeBus::new(&mut bus, &mut dmac);
//! ee.write32(0x2000_0100, 0xCAFE_F00D);
//! assert_eq!(ee.read32(0x0000_0100), 0xCAFE_F00D);
//! ```

mod io_device;
mod mch;
mod ram;
mod region;

pub use io_device::{dispatch_read32, dispatch_write32, IoDevice};
pub use mch::Mch;
pub use ram::{Bios, Ram};
pub use region::*;

use std::path::Path;

use crate::core::dma::{DmaBus, Dmac};
use crate::core::error::Result;
use crate::core::gif::Gif;
use crate::core::gs::Gs;
use crate::core::interrupt::{ee_interrupts, EeIntc, IopIntc};
use crate::core::iop_dma::IopDma;
use crate::core::sif::{Sif, SifFifo, SifSide};

/// Memory access interface of one CPU
///
/// Addresses are physical. Every access completes; unmapped reads return 0.
pub trait CpuBus {
    fn read8(&mut self, addr: u32) -> u8;
    fn read16(&mut self, addr: u32) -> u16;
    fn read32(&mut self, addr: u32) -> u32;
    fn read64(&mut self, addr: u32) -> u64;
    fn read128(&mut self, addr: u32) -> u128;

    fn write8(&mut self, addr: u32, value: u8);
    fn write16(&mut self, addr: u32, value: u16);
    fn write32(&mut self, addr: u32, value: u32);
    fn write64(&mut self, addr: u32, value: u64);
    fn write128(&mut self, addr: u32, value: u128);
}

/// Console output written by the EE kernel one character at a time
#[derive(Debug, Default)]
pub struct TtySink {
    line: String,
    output: String,
    echo: bool,
}

impl TtySink {
    /// EE address of the kputchar register
    pub const ADDR: u32 = 0x1000_F180;

    pub fn new() -> Self {
        Self::default()
    }

    /// Print completed lines to stdout as well as the log
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Accept one character
    pub fn putc(&mut self, c: u8) {
        let c = c as char;
        self.output.push(c);

        if c == '\n' {
            log::info!("TTY: {}", self.line);
            if self.echo {
                println!("{}", self.line);
            }
            self.line.clear();
        } else {
            self.line.push(c);
        }
    }

    /// Everything received so far
    pub fn output(&self) -> &str {
        &self.output
    }
}

/// Shared memories and peripherals of both buses
pub struct Bus {
    /// EE main RAM (32 MiB)
    pub ram: Ram,

    /// IOP RAM (2 MiB), also mapped into the EE space at 0x1C000000
    pub iop_ram: Ram,

    /// Boot ROM, visible to both CPUs
    pub bios: Bios,

    /// EE scratchpad (16 KiB), reachable through the SPR DMA channels
    pub scratchpad: Ram,

    /// RDRAM initialisation handshake
    pub mch: Mch,

    pub tty: TtySink,

    pub ee_intc: EeIntc,
    pub iop_intc: IopIntc,
    pub sif: Sif,
    pub iop_dma: IopDma,
    pub gif: Gif,
    pub gs: Gs,

    /// Free-running counter read at 0x10000000
    timer: u32,

    ee_map: AddressMap<EeRegion>,
    iop_map: AddressMap<IopRegion>,
}

impl Bus {
    /// EE pseudo-timer address (T0_COUNT)
    pub const TIMER_ADDR: u32 = 0x1000_0000;

    /// IOP address that reports the boot mode
    const IOP_BOOT_MODE_ADDR: u32 = 0x1F40_2005;

    /// Create a bus with cleared memories around the given GS
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::error::EmulatorError::OverlappingRanges`] if
    /// an address map is not exclusive.
    pub fn new(gs: Gs) -> Result<Self> {
        Ok(Self {
            ram: Ram::new(Ram::EE_SIZE),
            iop_ram: Ram::new(Ram::IOP_SIZE),
            bios: Bios::new(),
            scratchpad: Ram::new(Ram::SCRATCHPAD_SIZE),
            mch: Mch::new(),
            tty: TtySink::new(),
            ee_intc: EeIntc::new(),
            iop_intc: IopIntc::new(),
            sif: Sif::new(),
            iop_dma: IopDma::new(),
            gif: Gif::new(),
            gs,
            timer: 0,
            ee_map: AddressMap::new(ee_map_entries())?,
            iop_map: AddressMap::new(iop_map_entries())?,
        })
    }

    /// Load a BIOS image from disk
    pub fn load_bios(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.bios.load(path)
    }

    /// Clear volatile memory and reset the pseudo-timer
    ///
    /// Peripherals keep their registers; the BIOS image is preserved.
    pub fn reset(&mut self) {
        self.ram = Ram::new(Ram::EE_SIZE);
        self.iop_ram = Ram::new(Ram::IOP_SIZE);
        self.scratchpad = Ram::new(Ram::SCRATCHPAD_SIZE);
        self.timer = 0;
    }

    /// Feed one quadword to the GIF and forward a GS interrupt to the INTC
    pub fn gif_write128(&mut self, value: u128) {
        self.gif.write128(value, &mut self.gs);

        if self.gs.take_interrupt() {
            self.ee_intc.raise(ee_interrupts::GS);
        }
    }

    // ------------------------------------------------------------------
    // EE side
    // ------------------------------------------------------------------

    pub fn ee_read8(&mut self, addr: u32) -> u8 {
        match self.ee_map.lookup(addr, AccessWidth::BYTE) {
            Some((EeRegion::Ram, offset)) => self.ram.read8(offset),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.read8(offset),
            Some((EeRegion::Bios, offset)) => self.bios.read8(offset),
            _ => unmapped_read("EE", "read8", addr) as u8,
        }
    }

    pub fn ee_read16(&mut self, addr: u32) -> u16 {
        match self.ee_map.lookup(addr, AccessWidth::HALF) {
            Some((EeRegion::Ram, offset)) => self.ram.read16(offset),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.read16(offset),
            Some((EeRegion::Bios, offset)) => self.bios.read16(offset),
            _ => unmapped_read("EE", "read16", addr) as u16,
        }
    }

    /// 32-bit EE read; DMAC registers need the controller
    pub fn ee_read32(&mut self, dmac: &Dmac, addr: u32) -> u32 {
        match addr {
            Self::TIMER_ADDR => {
                let value = self.timer;
                self.timer = self.timer.wrapping_add(1);
                return value;
            }
            Mch::RICM_ADDR => return self.mch.read_ricm(),
            Mch::DRD_ADDR => return self.mch.read_drd(),
            _ => {}
        }

        match self.ee_map.lookup(addr, AccessWidth::WORD) {
            Some((EeRegion::Ram, offset)) => self.ram.read32(offset),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.read32(offset),
            Some((EeRegion::Bios, offset)) => self.bios.read32(offset),
            Some((EeRegion::GifRegisters, addr)) => dispatch_read32(&mut self.gif, addr),
            Some((EeRegion::Dmac, addr)) => dmac.read32(addr),
            Some((EeRegion::Intc, addr)) => dispatch_read32(&mut self.ee_intc, addr),
            Some((EeRegion::Sif, addr)) => self.sif.read32(SifSide::Ee, addr),
            Some((EeRegion::GsPrivileged, addr)) => dispatch_read32(&mut self.gs, addr),
            _ => unmapped_read("EE", "read32", addr) as u32,
        }
    }

    pub fn ee_read64(&mut self, addr: u32) -> u64 {
        match self.ee_map.lookup(addr, AccessWidth::DOUBLE) {
            Some((EeRegion::Ram, offset)) => self.ram.read64(offset),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.read64(offset),
            Some((EeRegion::Bios, offset)) => self.bios.read64(offset),
            Some((EeRegion::GsPrivileged, addr)) => self.gs.read64(addr),
            _ => unmapped_read("EE", "read64", addr) as u64,
        }
    }

    pub fn ee_read128(&mut self, addr: u32) -> u128 {
        match self.ee_map.lookup(addr, AccessWidth::QUAD) {
            Some((EeRegion::Ram, offset)) => self.ram.read128(offset),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.read128(offset),
            Some((EeRegion::Bios, offset)) => self.bios.read128(offset),
            Some((EeRegion::GifFifo, _)) => self.gif.read128(&mut self.gs),
            _ => unmapped_read("EE", "read128", addr),
        }
    }

    pub fn ee_write8(&mut self, addr: u32, value: u8) {
        if addr == TtySink::ADDR {
            self.tty.putc(value);
            return;
        }

        match self.ee_map.lookup(addr, AccessWidth::BYTE) {
            Some((EeRegion::Ram, offset)) => self.ram.write8(offset, value),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.write8(offset, value),
            _ => unmapped_write("EE", "write8", addr, value as u128),
        }
    }

    pub fn ee_write16(&mut self, addr: u32, value: u16) {
        match self.ee_map.lookup(addr, AccessWidth::HALF) {
            Some((EeRegion::Ram, offset)) => self.ram.write16(offset, value),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.write16(offset, value),
            _ => unmapped_write("EE", "write16", addr, value as u128),
        }
    }

    /// 32-bit EE write; a CHCR write with STR set runs the DMA transfer
    pub fn ee_write32(&mut self, dmac: &mut Dmac, addr: u32, value: u32) {
        match addr {
            Mch::RICM_ADDR => return self.mch.write_ricm(value),
            Mch::DRD_ADDR => return self.mch.write_drd(value),
            _ => {}
        }

        match self.ee_map.lookup(addr, AccessWidth::WORD) {
            Some((EeRegion::Ram, offset)) => self.ram.write32(offset, value),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.write32(offset, value),
            Some((EeRegion::GifRegisters, addr)) => dispatch_write32(&mut self.gif, addr, value),
            Some((EeRegion::Dmac, addr)) => {
                log::trace!("DMAC: write 0x{:08X} <- 0x{:08X}", addr, value);
                if let Some(id) = dmac.write32(addr, value) {
                    dmac.start_transfer(id, self);
                }
            }
            Some((EeRegion::Intc, addr)) => dispatch_write32(&mut self.ee_intc, addr, value),
            Some((EeRegion::Sif, addr)) => self.sif.write32(SifSide::Ee, addr, value),
            Some((EeRegion::GsPrivileged, addr)) => dispatch_write32(&mut self.gs, addr, value),
            _ => unmapped_write("EE", "write32", addr, value as u128),
        }
    }

    pub fn ee_write64(&mut self, addr: u32, value: u64) {
        match self.ee_map.lookup(addr, AccessWidth::DOUBLE) {
            Some((EeRegion::Ram, offset)) => self.ram.write64(offset, value),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.write64(offset, value),
            Some((EeRegion::GsPrivileged, addr)) => self.gs.write64(addr, value),
            _ => unmapped_write("EE", "write64", addr, value as u128),
        }
    }

    pub fn ee_write128(&mut self, addr: u32, value: u128) {
        match self.ee_map.lookup(addr, AccessWidth::QUAD) {
            Some((EeRegion::Ram, offset)) => self.ram.write128(offset, value),
            Some((EeRegion::IopRam, offset)) => self.iop_ram.write128(offset, value),
            Some((EeRegion::GifFifo, _)) => self.gif_write128(value),
            _ => unmapped_write("EE", "write128", addr, value),
        }
    }

    // ------------------------------------------------------------------
    // IOP side
    // ------------------------------------------------------------------

    pub fn iop_read8(&mut self, addr: u32) -> u8 {
        if addr == Self::IOP_BOOT_MODE_ADDR {
            return 0x40;
        }

        match self.iop_map.lookup(addr, AccessWidth::BYTE) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.read8(offset),
            Some((IopRegion::Bios, offset)) => self.bios.read8(offset),
            _ => unmapped_read("IOP", "read8", addr) as u8,
        }
    }

    pub fn iop_read16(&mut self, addr: u32) -> u16 {
        match self.iop_map.lookup(addr, AccessWidth::HALF) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.read16(offset),
            Some((IopRegion::Bios, offset)) => self.bios.read16(offset),
            _ => unmapped_read("IOP", "read16", addr) as u16,
        }
    }

    pub fn iop_read32(&mut self, addr: u32) -> u32 {
        match self.iop_map.lookup(addr, AccessWidth::WORD) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.read32(offset),
            Some((IopRegion::Bios, offset)) => self.bios.read32(offset),
            Some((IopRegion::Sif, addr)) => self.sif.read32(SifSide::Iop, addr),
            Some((IopRegion::Intc, addr)) => dispatch_read32(&mut self.iop_intc, addr),
            Some((IopRegion::Dma, addr)) => dispatch_read32(&mut self.iop_dma, addr),
            _ => unmapped_read("IOP", "read32", addr) as u32,
        }
    }

    pub fn iop_read64(&mut self, addr: u32) -> u64 {
        match self.iop_map.lookup(addr, AccessWidth::DOUBLE) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.read64(offset),
            Some((IopRegion::Bios, offset)) => self.bios.read64(offset),
            _ => unmapped_read("IOP", "read64", addr) as u64,
        }
    }

    pub fn iop_read128(&mut self, addr: u32) -> u128 {
        match self.iop_map.lookup(addr, AccessWidth::QUAD) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.read128(offset),
            Some((IopRegion::Bios, offset)) => self.bios.read128(offset),
            _ => unmapped_read("IOP", "read128", addr),
        }
    }

    pub fn iop_write8(&mut self, addr: u32, value: u8) {
        match self.iop_map.lookup(addr, AccessWidth::BYTE) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.write8(offset, value),
            _ => unmapped_write("IOP", "write8", addr, value as u128),
        }
    }

    pub fn iop_write16(&mut self, addr: u32, value: u16) {
        match self.iop_map.lookup(addr, AccessWidth::HALF) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.write16(offset, value),
            _ => unmapped_write("IOP", "write16", addr, value as u128),
        }
    }

    /// 32-bit IOP write; starting an IOP SIF channel may feed the EE DMAC
    pub fn iop_write32(&mut self, dmac: &mut Dmac, addr: u32, value: u32) {
        match self.iop_map.lookup(addr, AccessWidth::WORD) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.write32(offset, value),
            Some((IopRegion::Sif, addr)) => self.sif.write32(SifSide::Iop, addr, value),
            Some((IopRegion::Intc, addr)) => dispatch_write32(&mut self.iop_intc, addr, value),
            Some((IopRegion::Dma, addr)) => {
                log::trace!("IOP DMA: write 0x{:08X} <- 0x{:08X}", addr, value);
                if let Some(index) = self.iop_dma.write_register(addr, value) {
                    self.iop_dma.start_transfer(
                        index,
                        &mut self.iop_ram,
                        &mut self.sif.sif0,
                        &mut self.sif.sif1,
                        &mut self.iop_intc,
                    );
                    dmac.poll_sif0(self);
                }
            }
            _ => unmapped_write("IOP", "write32", addr, value as u128),
        }
    }

    pub fn iop_write64(&mut self, addr: u32, value: u64) {
        match self.iop_map.lookup(addr, AccessWidth::DOUBLE) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.write64(offset, value),
            _ => unmapped_write("IOP", "write64", addr, value as u128),
        }
    }

    pub fn iop_write128(&mut self, addr: u32, value: u128) {
        match self.iop_map.lookup(addr, AccessWidth::QUAD) {
            Some((IopRegion::Ram, offset)) => self.iop_ram.write128(offset, value),
            _ => unmapped_write("IOP", "write128", addr, value),
        }
    }
}

#[cold]
fn unmapped_read(cpu: &str, op: &str, addr: u32) -> u128 {
    log::debug!("{}: unmapped {} at 0x{:08X}", cpu, op, addr);
    0
}

#[cold]
fn unmapped_write(cpu: &str, op: &str, addr: u32, value: u128) {
    log::debug!("{}: dropped {} at 0x{:08X} = 0x{:X}", cpu, op, addr, value);
}

impl DmaBus for Bus {
    fn read128(&mut self, addr: u32) -> u128 {
        self.ee_read128(addr)
    }

    fn write128(&mut self, addr: u32, value: u128) {
        self.ee_write128(addr, value);
    }

    fn read_scratchpad128(&mut self, offset: u32) -> u128 {
        self.scratchpad.read128(offset)
    }

    fn write_scratchpad128(&mut self, offset: u32, value: u128) {
        self.scratchpad.write128(offset, value);
    }

    fn sif0_fifo(&mut self) -> &mut SifFifo {
        &mut self.sif.sif0
    }

    fn sif1_fifo(&mut self) -> &mut SifFifo {
        &mut self.sif.sif1
    }

    fn iop_sif1_receive(&mut self) {
        self.iop_dma
            .transfer_sif1(&mut self.iop_ram, &mut self.sif.sif1, &mut self.iop_intc);
    }
}

/// The EE's view of the bus
pub struct EeBus<'a> {
    bus: &'a mut Bus,
    dmac: &'a mut Dmac,
}

impl<'a> EeBus<'a> {
    pub fn new(bus: &'a mut Bus, dmac: &'a mut Dmac) -> Self {
        Self { bus, dmac }
    }
}

impl CpuBus for EeBus<'_> {
    fn read8(&mut self, addr: u32) -> u8 {
        self.bus.ee_read8(addr)
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.bus.ee_read16(addr)
    }

    fn read32(&mut self, addr: u32) -> u32 {
        self.bus.ee_read32(self.dmac, addr)
    }

    fn read64(&mut self, addr: u32) -> u64 {
        self.bus.ee_read64(addr)
    }

    fn read128(&mut self, addr: u32) -> u128 {
        self.bus.ee_read128(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.bus.ee_write8(addr, value);
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.bus.ee_write16(addr, value);
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.bus.ee_write32(self.dmac, addr, value);
    }

    fn write64(&mut self, addr: u32, value: u64) {
        self.bus.ee_write64(addr, value);
    }

    fn write128(&mut self, addr: u32, value: u128) {
        self.bus.ee_write128(addr, value);
    }
}

/// The IOP's view of the bus
pub struct IopBus<'a> {
    bus: &'a mut Bus,
    dmac: &'a mut Dmac,
}

impl<'a> IopBus<'a> {
    pub fn new(bus: &'a mut Bus, dmac: &'a mut Dmac) -> Self {
        Self { bus, dmac }
    }
}

impl CpuBus for IopBus<'_> {
    fn read8(&mut self, addr: u32) -> u8 {
        self.bus.iop_read8(addr)
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.bus.iop_read16(addr)
    }

    fn read32(&mut self, addr: u32) -> u32 {
        self.bus.iop_read32(addr)
    }

    fn read64(&mut self, addr: u32) -> u64 {
        self.bus.iop_read64(addr)
    }

    fn read128(&mut self, addr: u32) -> u128 {
        self.bus.iop_read128(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.bus.iop_write8(addr, value);
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.bus.iop_write16(addr, value);
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.bus.iop_write32(self.dmac, addr, value);
    }

    fn write64(&mut self, addr: u32, value: u64) {
        self.bus.iop_write64(addr, value);
    }

    fn write128(&mut self, addr: u32, value: u128) {
        self.bus.iop_write128(addr, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dma::ChannelId;
    use crate::core::gs::registers::reg;
    use crate::core::interrupt::iop_interrupts;

    fn create_test_bus() -> (Bus, Dmac) {
        (Bus::new(Gs::new_null()).unwrap(), Dmac::new())
    }

    /// GIFtag: PACKED, one A+D register, EOP
    fn a_plus_d_tag(nloop: u128) -> u128 {
        nloop | (1 << 15) | (1 << 60) | (0xE << 64)
    }

    // ========================================
    // EE Routing Tests
    // ========================================

    #[test]
    fn test_ee_ram_aliases() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut ee = EeBus::new(&mut bus, &mut dmac);

        ee.write32(0x2000_0010, 0x1234_5678);

        assert_eq!(ee.read32(0x0000_0010), 0x1234_5678);
        assert_eq!(ee.read32(0x3000_0010), 0x1234_5678);
        assert_eq!(ee.read8(0x0000_0013), 0x12, "little-endian byte order");
    }

    #[test]
    fn test_ee_sees_iop_ram() {
        let (mut bus, mut dmac) = create_test_bus();
        bus.iop_ram.write32(0x100, 0xAABB_CCDD);

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        assert_eq!(ee.read32(0x1C00_0100), 0xAABB_CCDD);
    }

    #[test]
    fn test_bios_ignores_writes() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut image = vec![0u8; Bios::SIZE];
        image[4..8].copy_from_slice(&0x3C08_BFC0u32.to_le_bytes());
        bus.bios.load_bytes(&image);

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(0x1FC0_0004, 0);
        assert_eq!(ee.read32(0x1FC0_0004), 0x3C08_BFC0, "BIOS is read-only");

        let mut iop = IopBus::new(&mut bus, &mut dmac);
        assert_eq!(iop.read32(0x1FC0_0004), 0x3C08_BFC0, "IOP sees the same ROM");
    }

    #[test]
    fn test_unmapped_access_reads_zero() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut ee = EeBus::new(&mut bus, &mut dmac);

        ee.write32(0x1500_0000, 0xFFFF_FFFF);
        assert_eq!(ee.read32(0x1500_0000), 0);
        assert_eq!(ee.read8(0x1000_F000), 0, "INTC answers word accesses only");
    }

    #[test]
    fn test_pseudo_timer_counts_reads() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut ee = EeBus::new(&mut bus, &mut dmac);

        let first = ee.read32(Bus::TIMER_ADDR);
        let second = ee.read32(Bus::TIMER_ADDR);
        assert_eq!(second, first + 1);
    }

    #[test]
    fn test_mch_handshake_through_bus() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut ee = EeBus::new(&mut bus, &mut dmac);

        ee.write32(Mch::RICM_ADDR, 0x8021_0000);
        assert_eq!(ee.read32(Mch::RICM_ADDR), 0);
        assert_eq!(ee.read32(Mch::DRD_ADDR), 0x1F);
        assert_eq!(ee.read32(Mch::DRD_ADDR), 0x1F);
        assert_eq!(ee.read32(Mch::DRD_ADDR), 0, "only two devices answer");

        ee.write32(Mch::RICM_ADDR, 0x0024_0000);
        assert_eq!(ee.read32(Mch::DRD_ADDR), 0x0090);
    }

    #[test]
    fn test_tty_collects_characters() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut ee = EeBus::new(&mut bus, &mut dmac);

        for &c in b"hi\n" {
            ee.write8(TtySink::ADDR, c);
        }

        assert_eq!(bus.tty.output(), "hi\n");
    }

    // ========================================
    // Interrupt Controller Tests
    // ========================================

    #[test]
    fn test_intc_stat_clear_is_idempotent() {
        let (mut bus, mut dmac) = create_test_bus();
        bus.ee_intc.raise(ee_interrupts::GS);
        bus.ee_intc.raise(ee_interrupts::VBLANK_ON);

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(EeIntc::STAT_ADDR, 1 << ee_interrupts::GS);
        let once = ee.read32(EeIntc::STAT_ADDR);
        ee.write32(EeIntc::STAT_ADDR, 1 << ee_interrupts::GS);

        assert_eq!(once, 1 << ee_interrupts::VBLANK_ON);
        assert_eq!(ee.read32(EeIntc::STAT_ADDR), once, "clearing twice changes nothing");
    }

    #[test]
    fn test_intc_mask_toggles_int0() {
        let (mut bus, mut dmac) = create_test_bus();
        bus.ee_intc.raise(ee_interrupts::VBLANK_ON);

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(EeIntc::MASK_ADDR, 1 << ee_interrupts::VBLANK_ON);
        assert!(bus.ee_intc.int0());

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(EeIntc::MASK_ADDR, 1 << ee_interrupts::VBLANK_ON);
        assert!(!bus.ee_intc.int0(), "second write toggles the mask off");
    }

    #[test]
    fn test_iop_intc_ctrl_read_clears() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut iop = IopBus::new(&mut bus, &mut dmac);

        iop.write32(IopIntc::MASK_ADDR, iop_interrupts::VBLANK);
        assert_eq!(iop.read32(IopIntc::CTRL_ADDR), 1);
        assert_eq!(iop.read32(IopIntc::CTRL_ADDR), 0);
    }

    #[test]
    fn test_iop_boot_mode_byte() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut iop = IopBus::new(&mut bus, &mut dmac);
        assert_eq!(iop.read8(0x1F40_2005), 0x40);
    }

    // ========================================
    // DMAC Tests
    // ========================================

    #[test]
    fn test_dmac_stat_masking_through_bus() {
        let (mut bus, mut dmac) = create_test_bus();
        dmac.set_irq(ChannelId::Gif);

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(Dmac::STAT_ADDR, 1 << 18);
        assert!(dmac.int1(), "GIF flag and mask both set");

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(Dmac::STAT_ADDR, 1 << 2);
        assert_eq!(dmac.stat(), 1 << 18, "flag cleared, mask kept");
        assert!(!dmac.int1());
    }

    #[test]
    fn test_gif_dma_normal_transfer() {
        let (mut bus, mut dmac) = create_test_bus();
        bus.ram.write128(0x1000, a_plus_d_tag(1));
        bus.ram.write128(0x1010, ((reg::RGBAQ as u128) << 64) | 0x8011_2233);

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(0x1000_A010, 0x1000);
        ee.write32(0x1000_A020, 2);
        ee.write32(0x1000_A000, 0x100);

        assert_eq!(bus.gs.state().rgbaq.to_rgba32(), 0x8011_2233);
        assert_eq!(dmac.stat() & (1 << 2), 1 << 2, "GIF channel flagged");
        assert!(!dmac.channel(ChannelId::Gif).is_started());
    }

    #[test]
    fn test_finish_raises_gs_interrupt() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut ee = EeBus::new(&mut bus, &mut dmac);

        ee.write64(Gs::IMR_ADDR, 0);
        ee.write128(Dmac::GIF_FIFO_ADDR, a_plus_d_tag(1));
        ee.write128(Dmac::GIF_FIFO_ADDR, (reg::FINISH as u128) << 64);

        assert_ne!(bus.ee_intc.stat() & (1 << ee_interrupts::GS), 0);
        assert_ne!(bus.gs.read_privileged64(Gs::CSR_ADDR) & 0x2, 0, "CSR.FINISH set");
    }

    #[test]
    fn test_gs_privileged_access_widths() {
        let (mut bus, mut dmac) = create_test_bus();
        let mut ee = EeBus::new(&mut bus, &mut dmac);

        ee.write64(Gs::BGCOLOR_ADDR, 0x0000_0000_00FF_8040);
        assert_eq!(ee.read32(Gs::BGCOLOR_ADDR), 0x00FF_8040);
        assert_eq!(ee.read64(Gs::BGCOLOR_ADDR), 0x00FF_8040);
        assert_eq!(ee.read8(Gs::BGCOLOR_ADDR), 0, "byte access is unmapped");
    }

    // ========================================
    // SIF Tests
    // ========================================

    #[test]
    fn test_sif_mailbox_crosses_sides() {
        let (mut bus, mut dmac) = create_test_bus();

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(Sif::EE_BASE, 0x1234);
        ee.write32(Sif::EE_BASE + 0x20, 0x10000);

        let mut iop = IopBus::new(&mut bus, &mut dmac);
        assert_eq!(iop.read32(Sif::IOP_BASE), 0x1234, "MSCOM");
        assert_eq!(iop.read32(Sif::IOP_BASE + 0x20), 0x10000, "MSFLG");
    }

    #[test]
    fn test_iop_sif0_feeds_waiting_ee_channel() {
        let (mut bus, mut dmac) = create_test_bus();

        // EE side: SIF0 started in chain mode, FIFO still empty
        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(0x1000_C000, 0x104);
        assert!(dmac.channel(ChannelId::Sif0).is_started(), "channel waits for data");

        // IOP side: one END packet carrying one quadword for EE 0x5000
        bus.iop_ram.write32(0x1000, 0x8000_2000);
        bus.iop_ram.write32(0x1004, 4);
        bus.iop_ram.write64(0x1008, (0x5000 << 32) | (7 << 28) | 1);
        bus.iop_ram.write128(0x2000, 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210);

        let mut iop = IopBus::new(&mut bus, &mut dmac);
        iop.write32(0x1F80_152C, 0x1000);
        iop.write32(0x1F80_1528, 1 << 24);

        assert_eq!(bus.ram.read128(0x5000), 0x0123_4567_89AB_CDEF_FEDC_BA98_7654_3210);
        assert!(!dmac.channel(ChannelId::Sif0).is_started());
        assert_ne!(dmac.stat() & (1 << 5), 0, "SIF0 flagged on the EE side");
    }

    #[test]
    fn test_ee_sif1_reaches_iop_ram() {
        let (mut bus, mut dmac) = create_test_bus();

        // IOP SIF1 channel armed first
        let mut iop = IopBus::new(&mut bus, &mut dmac);
        iop.write32(0x1F80_1538, 1 << 24);

        // EE chain: END tag, 2 quadwords: IOP packet header + payload
        bus.ram.write128(0x3000, (7 << 28) | 2);
        bus.ram.write128(0x3010, (4u128 << 32) | 0x8000_0400);
        bus.ram.write128(0x3020, 0xBEEF);

        let mut ee = EeBus::new(&mut bus, &mut dmac);
        ee.write32(0x1000_C430, 0x3000);
        ee.write32(0x1000_C400, 0x105);

        assert_eq!(bus.iop_ram.read128(0x400), 0xBEEF);
        assert!(!bus.iop_dma.channel(IopDma::SIF1).is_started());
    }
}
