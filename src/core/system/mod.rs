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

//! Machine aggregate
//!
//! [`System`] owns the [`Bus`] and the [`Dmac`] and hands out per-CPU views of
//! them. It also drives frame timing: every frame ends with a vertical blank
//! whose start and end are signalled to both interrupt controllers.
//!
//! ```text
//! 0                                   vblank start          cycles_per_frame
//! |----------------- visible -----------------|---- vblank ----|
//!                                       VBLANK_ON (EE)     VBLANK_OFF (EE)
//!                                       VBLANK (IOP)       EVBLANK (IOP)
//!                                       GS CSR.FIELD ^= 1
//! ```

mod snapshot;

pub use snapshot::{
    ChannelSnapshot, DmacSnapshot, EeIntcSnapshot, GsSnapshot, IopIntcSnapshot, SifSnapshot,
    SystemSnapshot,
};

use std::path::Path;

use crate::config::{Config, RendererKind};

use super::dma::{ChannelId, DmaChannel, Dmac};
use super::error::Result;
use super::gs::Gs;
use super::interrupt::{ee_interrupts, iop_interrupts, EeIntc, IopIntc};
use super::iop_dma::IopDma;
use super::memory::{Bus, CpuBus, EeBus, IopBus, Ram};
use super::sif::Sif;

/// Callback run when the machine shuts down
///
/// Any `FnMut(&System)` closure is a hook.
pub trait DiagnosticHook {
    fn on_shutdown(&mut self, system: &System);
}

impl<F: FnMut(&System)> DiagnosticHook for F {
    fn on_shutdown(&mut self, system: &System) {
        self(system)
    }
}

/// PlayStation 2 machine
///
/// # Example
///
/// ```
/// use ps2rx::config::{Config, RendererKind};
/// use ps2rx::core::memory::CpuBus;
/// use ps2rx::core::system::System;
///
/// let config = Config {
///     renderer: RendererKind::Null,
///     ..Config::default()
/// };
/// let mut system = System::new(&config)?;
///
/// system.ee_bus().write32(0x0010_0000, 0xCAFE_F00D);
/// assert_eq!(system.ee_bus().read32(0x2010_0000), 0xCAFE_F00D);
///
/// system.run_frame();
/// assert_eq!(system.frames(), 1);
/// # Ok::<(), ps2rx::EmulatorError>(())
/// ```
pub struct System {
    bus: Bus,
    dmac: Dmac,

    /// EE cycles per frame
    cycles_per_frame: u64,
    /// Cycles at the end of each frame spent in vertical blank
    vblank_cycles: u64,

    /// Total cycles executed
    cycles: u64,
    /// Position within the current frame
    frame_cycle: u64,
    /// Completed frames
    frames: u64,
    in_vblank: bool,

    hook: Option<Box<dyn DiagnosticHook>>,
}

impl System {
    /// Base address of the GIF channel registers
    const GIF_CHANNEL_BASE: u32 = 0x1000_A000;

    /// Build a machine from a configuration
    ///
    /// Loads the BIOS when `config.bios_path` is set.
    ///
    /// # Errors
    ///
    /// Invalid frame timing, a missing or badly sized BIOS image, or an
    /// inconsistent address map.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let gs = match config.renderer {
            RendererKind::Software => Gs::new_software(),
            RendererKind::Null => Gs::new_null(),
        };

        let mut bus = Bus::new(gs)?;
        bus.tty.set_echo(config.tty_echo);

        if let Some(path) = &config.bios_path {
            bus.load_bios(path)?;
        }

        log::info!(
            "System: {} renderer, {} cycles/frame ({} in vblank)",
            config.renderer,
            config.cycles_per_frame,
            config.vblank_cycles
        );

        Ok(Self {
            bus,
            dmac: Dmac::new(),
            cycles_per_frame: config.cycles_per_frame,
            vblank_cycles: config.vblank_cycles,
            cycles: 0,
            frame_cycle: 0,
            frames: 0,
            in_vblank: false,
            hook: None,
        })
    }

    /// Load a BIOS image from disk
    pub fn load_bios(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.bus.load_bios(path)
    }

    /// Return every device to its power-on state
    ///
    /// The BIOS image and GS VRAM survive a reset.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.bus.ee_intc = EeIntc::new();
        self.bus.iop_intc = IopIntc::new();
        self.bus.sif = Sif::new();
        self.bus.iop_dma = IopDma::new();
        self.bus.gif.reset();
        self.bus.gs.reset();
        self.dmac = Dmac::new();

        self.cycles = 0;
        self.frame_cycle = 0;
        self.frames = 0;
        self.in_vblank = false;

        log::info!("System reset");
    }

    /// The EE's view of the machine
    pub fn ee_bus(&mut self) -> EeBus<'_> {
        EeBus::new(&mut self.bus, &mut self.dmac)
    }

    /// The IOP's view of the machine
    pub fn iop_bus(&mut self) -> IopBus<'_> {
        IopBus::new(&mut self.bus, &mut self.dmac)
    }

    /// Advance time by `cycles` EE cycles
    ///
    /// Signals every VBLANK edge crossed on the way, then resumes a SIF0
    /// transfer that is waiting on IOP data.
    pub fn step(&mut self, cycles: u64) {
        let mut remaining = cycles;

        while remaining > 0 {
            let boundary = if self.in_vblank {
                self.cycles_per_frame
            } else {
                self.vblank_start()
            };

            let advance = remaining.min(boundary - self.frame_cycle);
            self.frame_cycle += advance;
            self.cycles += advance;
            remaining -= advance;

            if self.frame_cycle == boundary {
                if self.in_vblank {
                    self.end_vblank();
                } else {
                    self.start_vblank();
                }
            }
        }

        self.dmac.poll_sif0(&mut self.bus);
    }

    /// Run to the end of the current frame
    pub fn run_frame(&mut self) {
        let remaining = self.cycles_per_frame - self.frame_cycle;
        self.step(remaining);
    }

    fn vblank_start(&self) -> u64 {
        self.cycles_per_frame - self.vblank_cycles
    }

    fn start_vblank(&mut self) {
        log::trace!("VBLANK start (frame {})", self.frames);
        self.in_vblank = true;

        self.bus.ee_intc.raise(ee_interrupts::VBLANK_ON);
        self.bus.iop_intc.raise(iop_interrupts::VBLANK);

        self.bus.gs.vblank();
        if self.bus.gs.take_interrupt() {
            self.bus.ee_intc.raise(ee_interrupts::GS);
        }
    }

    fn end_vblank(&mut self) {
        self.in_vblank = false;
        self.frame_cycle = 0;
        self.frames += 1;

        self.bus.ee_intc.raise(ee_interrupts::VBLANK_OFF);
        self.bus.iop_intc.raise(iop_interrupts::EVBLANK);
    }

    /// Copy a GIF packet into EE RAM at `addr` and send it through GIF DMA
    ///
    /// The packet is padded to whole quadwords. Packets longer than one
    /// channel transfer (65535 quadwords) are sent in several bursts.
    pub fn send_gif_packet(&mut self, addr: u32, packet: &[u8]) {
        let addr = addr & !0xF;
        let room = Ram::EE_SIZE.saturating_sub(addr as usize);
        let packet = if packet.len() > room {
            log::warn!(
                "GIF packet of {} bytes truncated to {} bytes",
                packet.len(),
                room
            );
            &packet[..room]
        } else {
            packet
        };

        self.bus.ram.write_slice(addr, packet);
        let padding = packet.len().next_multiple_of(16) - packet.len();
        if padding > 0 {
            self.bus
                .ram
                .write_slice(addr + packet.len() as u32, &[0u8; 16][..padding]);
        }

        let mut qwc_left = packet.len().div_ceil(16) as u32;
        let mut madr = addr;

        while qwc_left > 0 {
            let qwc = qwc_left.min(0xFFFF);
            let mut ee = self.ee_bus();
            ee.write32(Self::GIF_CHANNEL_BASE + 0x10, madr);
            ee.write32(Self::GIF_CHANNEL_BASE + 0x20, qwc);
            ee.write32(Self::GIF_CHANNEL_BASE, DmaChannel::CHCR_STR);

            madr += qwc * 16;
            qwc_left -= qwc;
        }

        log::debug!(
            "Sent {} byte GIF packet from 0x{:08X}",
            packet.len(),
            addr
        );
    }

    /// EE interrupt lines (INT0 from the INTC, INT1 from the DMAC)
    pub fn ee_interrupt_lines(&self) -> (bool, bool) {
        (self.bus.ee_intc.int0(), self.dmac.int1())
    }

    /// Whether the IOP interrupt line is asserted
    pub fn iop_interrupt_pending(&self) -> bool {
        self.bus.iop_intc.is_pending()
    }

    /// Capture a register dump
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::capture(self)
    }

    /// Install the hook run by [`System::shutdown`]
    pub fn set_diagnostic_hook(&mut self, hook: Box<dyn DiagnosticHook>) {
        self.hook = Some(hook);
    }

    /// Stop the machine and run the diagnostic hook, if any
    pub fn shutdown(&mut self) {
        log::info!(
            "System shutdown after {} frames ({} cycles)",
            self.frames,
            self.cycles
        );

        if let Some(mut hook) = self.hook.take() {
            hook.on_shutdown(self);
            self.hook = Some(hook);
        }
    }

    pub fn gs(&self) -> &Gs {
        &self.bus.gs
    }

    pub fn gs_mut(&mut self) -> &mut Gs {
        &mut self.bus.gs
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn dmac(&self) -> &Dmac {
        &self.dmac
    }

    pub fn dmac_mut(&mut self) -> &mut Dmac {
        &mut self.dmac
    }

    /// Total cycles executed
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Completed frames
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn in_vblank(&self) -> bool {
        self.in_vblank
    }

    /// Whether the GIF channel is still running
    pub fn gif_busy(&self) -> bool {
        self.dmac.channel(ChannelId::Gif).is_started()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gs::registers::{prim_kind, reg};
    use crate::core::gs::GsEventListener;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    const FRAME: u64 = 1000;
    const VBLANK: u64 = 100;

    fn create_test_config() -> Config {
        Config {
            bios_path: None,
            renderer: RendererKind::Software,
            cycles_per_frame: FRAME,
            vblank_cycles: VBLANK,
            tty_echo: false,
        }
    }

    fn create_test_system() -> System {
        System::new(&create_test_config()).unwrap()
    }

    /// GIFtag: PACKED, one A+D register, EOP
    fn a_plus_d_tag(nloop: u128) -> u128 {
        nloop | (1 << 15) | (1 << 60) | (0xE << 64)
    }

    fn a_plus_d(id: u8, value: u64) -> u128 {
        ((id as u128) << 64) | value as u128
    }

    fn packet_bytes(quadwords: &[u128]) -> Vec<u8> {
        quadwords.iter().flat_map(|q| q.to_le_bytes()).collect()
    }

    // ========================================
    // Construction Tests
    // ========================================

    #[test]
    fn test_system_creation() {
        let system = create_test_system();

        assert_eq!(system.cycles(), 0);
        assert_eq!(system.frames(), 0);
        assert!(!system.in_vblank());
        assert_eq!(system.gs().backend_name(), "software");
        assert_eq!(system.ee_interrupt_lines(), (false, false));
        assert!(!system.iop_interrupt_pending());
    }

    #[test]
    fn test_system_null_renderer() {
        let config = Config {
            renderer: RendererKind::Null,
            ..create_test_config()
        };
        let system = System::new(&config).unwrap();
        assert_eq!(system.gs().backend_name(), "null");
    }

    #[test]
    fn test_system_rejects_bad_timing() {
        let config = Config {
            vblank_cycles: FRAME,
            ..create_test_config()
        };
        assert!(System::new(&config).is_err());
    }

    #[test]
    fn test_system_missing_bios() {
        let config = Config {
            bios_path: Some("/nonexistent/bios.bin".into()),
            ..create_test_config()
        };
        assert!(System::new(&config).is_err());
    }

    #[test]
    fn test_system_loads_bios_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bios.bin");
        let mut image = vec![0u8; crate::core::memory::Bios::SIZE];
        image[0..4].copy_from_slice(&0x3C1A_BFC0u32.to_le_bytes());
        std::fs::write(&path, &image).unwrap();

        let config = Config {
            bios_path: Some(path),
            ..create_test_config()
        };
        let mut system = System::new(&config).unwrap();

        assert_eq!(system.ee_bus().read32(0x1FC0_0000), 0x3C1A_BFC0);
        assert_eq!(system.iop_bus().read32(0x1FC0_0000), 0x3C1A_BFC0);
    }

    // ========================================
    // Frame Timing Tests
    // ========================================

    #[test]
    fn test_step_before_vblank_raises_nothing() {
        let mut system = create_test_system();
        system.step(FRAME - VBLANK - 1);

        assert!(!system.in_vblank());
        assert_eq!(system.bus().ee_intc.stat(), 0);
        assert_eq!(system.bus().iop_intc.stat(), 0);
    }

    #[test]
    fn test_vblank_start_signals_both_intcs() {
        let mut system = create_test_system();
        system.step(FRAME - VBLANK);

        assert!(system.in_vblank());
        assert_eq!(
            system.bus().ee_intc.stat(),
            1 << ee_interrupts::VBLANK_ON,
            "only VBLANK_ON should be pending"
        );
        assert_eq!(system.bus().iop_intc.stat(), iop_interrupts::VBLANK);
        assert_ne!(
            system.gs().state().privileged.csr & crate::core::gs::csr::FIELD,
            0,
            "FIELD toggles on vblank"
        );
    }

    #[test]
    fn test_vblank_end_signals_both_intcs() {
        let mut system = create_test_system();
        system.step(FRAME);

        assert!(!system.in_vblank());
        assert_eq!(system.frames(), 1);

        let ee_stat = system.bus().ee_intc.stat();
        assert_ne!(ee_stat & (1 << ee_interrupts::VBLANK_OFF), 0);
        assert_ne!(system.bus().iop_intc.stat() & iop_interrupts::EVBLANK, 0);
    }

    #[test]
    fn test_large_step_crosses_several_frames() {
        let mut system = create_test_system();
        system.step(FRAME * 3 + 10);

        assert_eq!(system.frames(), 3);
        assert_eq!(system.cycles(), FRAME * 3 + 10);
        assert_eq!(
            system.gs().state().privileged.csr & crate::core::gs::csr::FIELD,
            crate::core::gs::csr::FIELD,
            "three vblanks leave FIELD set"
        );
    }

    #[test]
    fn test_run_frame_from_mid_frame() {
        let mut system = create_test_system();
        system.step(FRAME - 50);
        system.run_frame();

        assert_eq!(system.frames(), 1);
        assert_eq!(system.cycles(), FRAME);

        system.run_frame();
        assert_eq!(system.frames(), 2);
        assert_eq!(system.cycles(), 2 * FRAME);
    }

    #[test]
    fn test_vblank_unmasked_reaches_int0() {
        let mut system = create_test_system();
        system
            .ee_bus()
            .write32(EeIntc::MASK_ADDR, 1 << ee_interrupts::VBLANK_ON);

        system.step(FRAME - VBLANK);
        assert_eq!(system.ee_interrupt_lines(), (true, false));

        system
            .ee_bus()
            .write32(EeIntc::STAT_ADDR, 1 << ee_interrupts::VBLANK_ON);
        assert_eq!(system.ee_interrupt_lines(), (false, false), "ack lowers INT0");
    }

    #[test]
    fn test_iop_vblank_pending() {
        let mut system = create_test_system();
        let mut iop = system.iop_bus();
        iop.write32(IopIntc::MASK_ADDR, iop_interrupts::VBLANK);
        iop.write32(IopIntc::CTRL_ADDR, 1);

        system.step(FRAME - VBLANK);
        assert!(system.iop_interrupt_pending());
    }

    #[test]
    fn test_vsint_forwarded_when_unmasked() {
        let mut system = create_test_system();
        system.ee_bus().write64(Gs::IMR_ADDR, 0);

        system.step(FRAME - VBLANK);

        assert_ne!(system.bus().ee_intc.stat() & (1 << ee_interrupts::GS), 0);
    }

    #[test]
    fn test_vblank_notifies_listener() {
        struct Counter(Rc<Cell<u32>>);

        impl GsEventListener for Counter {
            fn on_vblank(&mut self, _state: &crate::core::gs::GsState) {
                self.0.set(self.0.get() + 1);
            }
        }

        let count = Rc::new(Cell::new(0));
        let mut system = create_test_system();
        system.gs_mut().set_listener(Box::new(Counter(Rc::clone(&count))));

        system.run_frame();
        system.run_frame();

        assert_eq!(count.get(), 2);
    }

    // ========================================
    // Integration Tests
    // ========================================

    #[test]
    fn test_gif_dma_draws_full_screen_sprite() {
        let mut system = create_test_system();

        let packet = packet_bytes(&[
            a_plus_d_tag(7),
            a_plus_d(reg::FRAME_1, 10 << 16),
            a_plus_d(reg::ZBUF_1, 160),
            a_plus_d(reg::SCISSOR_1, (479 << 48) | (639 << 16)),
            a_plus_d(reg::PRIM, prim_kind::SPRITE as u64),
            a_plus_d(reg::RGBAQ, 0x8020_4060),
            a_plus_d(reg::XYZ2, 0),
            a_plus_d(reg::XYZ2, (480u64 << 4 << 16) | (640 << 4)),
        ]);

        system.send_gif_packet(0x0010_0000, &packet);

        assert!(!system.gif_busy());
        assert_ne!(system.dmac().stat() & (1 << ChannelId::Gif.index()), 0);

        let vram = &system.gs().state().vram;
        assert!(
            vram[..640 * 480].iter().all(|&p| p == 0x8020_4060),
            "every pixel of the 640x480 frame should be filled"
        );
        assert_eq!(vram[640 * 480], 0);
    }

    #[test]
    fn test_gif_packet_is_padded() {
        let mut system = create_test_system();
        let mut packet = packet_bytes(&[a_plus_d_tag(1), a_plus_d(reg::RGBAQ, 0x11)]);
        packet.truncate(16 + 9);

        system.bus_mut().ram.write128(0x2010, u128::MAX);
        system.send_gif_packet(0x2000, &packet);

        assert_eq!(system.gs().state().rgbaq.r, 0x11);
        assert_eq!(
            system.bus().ram.read128(0x2010) >> 72,
            0,
            "padding clears the partial quadword"
        );
    }

    #[test]
    fn test_sif0_resumes_on_step() {
        let mut system = create_test_system();

        // EE SIF0 waits in chain mode with nothing in the FIFO
        let mut ee = system.ee_bus();
        ee.write32(0x1000_C000, DmaChannel::CHCR_STR | (1 << 2));
        assert!(system.dmac().channel(ChannelId::Sif0).is_started());

        // Destination tag (END, qwc=1, addr 0x3000) followed by one quadword
        let tag = (7u128 << 28) | 1 | (0x3000u128 << 32);
        system.bus_mut().sif.sif0.push(tag);
        system.bus_mut().sif.sif0.push(0xFEED);

        system.step(1);

        assert!(!system.dmac().channel(ChannelId::Sif0).is_started());
        assert_eq!(system.bus().ram.read128(0x3000), 0xFEED);
    }

    // ========================================
    // Diagnostics Tests
    // ========================================

    #[test]
    fn test_snapshot_serializes() {
        let mut system = create_test_system();
        system.ee_bus().write32(0x1000_A010, 0x4000);
        system.step(FRAME - VBLANK);

        let snapshot = system.snapshot();
        assert_eq!(snapshot.cycles, FRAME - VBLANK);
        assert!(snapshot.in_vblank);
        assert_eq!(snapshot.dmac.channels.len(), 10);
        assert_eq!(snapshot.dmac.channels[2].name, "gif");
        assert_eq!(snapshot.dmac.channels[2].madr, 0x4000);

        let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(
            json["ee_intc"]["stat"].as_u64(),
            Some(1 << ee_interrupts::VBLANK_ON)
        );
        assert!(json["timestamp"].is_string());
        assert!(json["gs"]["display"].is_null(), "PMODE enables no circuit");
    }

    #[test]
    fn test_shutdown_runs_hook() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut system = create_test_system();
        system.set_diagnostic_hook(Box::new(move |s: &System| {
            sink.borrow_mut().push(s.frames());
        }));

        system.run_frame();
        system.shutdown();
        system.run_frame();
        system.shutdown();

        assert_eq!(*seen.borrow(), vec![1, 2], "hook survives each shutdown");
    }

    #[test]
    fn test_shutdown_without_hook() {
        let mut system = create_test_system();
        system.shutdown();
        assert_eq!(system.frames(), 0);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut system = create_test_system();
        system.ee_bus().write32(0x100, 0xDEAD_BEEF);
        system.step(FRAME + 10);

        system.reset();

        assert_eq!(system.cycles(), 0);
        assert_eq!(system.frames(), 0);
        assert_eq!(system.bus().ee_intc.stat(), 0);
        assert_eq!(system.ee_bus().read32(0x100), 0);
    }
}
