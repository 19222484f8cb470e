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

//! Interrupt controllers
//!
//! The PS2 has one interrupt controller per CPU. Both latch device requests in a
//! status register and gate them with a mask, but their register semantics differ.
//!
//! ## EE INTC
//!
//! - **I_STAT** (0x1000F000): writing 1 to a bit clears it
//! - **I_MASK** (0x1000F010): writing 1 to a bit toggles it
//!
//! The INTC drives the EE's INT0 line: `(I_STAT & I_MASK) != 0`.
//!
//! ```text
//! Bit | Source        Bit | Source
//! ----|-----------    ----|-----------
//! 0   | GS            8   | IPU
//! 1   | SBUS          9   | TIMER0
//! 2   | VBLANK_ON     10  | TIMER1
//! 3   | VBLANK_OFF    11  | TIMER2
//! 4   | VIF0          12  | TIMER3
//! 5   | VIF1          13  | SFIFO
//! 6   | VU0           14  | VU0 watchdog
//! 7   | VU1
//! ```
//!
//! ## IOP INTC
//!
//! - **I_STAT** (0x1F801070): writing 0 to a bit clears it
//! - **I_MASK** (0x1F801074): plain store
//! - **I_CTRL** (0x1F801078): master enable; reading returns the value and clears it
//!
//! The IOP interrupt is pending when `I_CTRL != 0 && (I_STAT & I_MASK) != 0`.

use crate::core::memory::IoDevice;

/// EE INTC cause bits (bit indices, pass to [`EeIntc::raise`])
pub mod ee_interrupts {
    pub const GS: u32 = 0;
    pub const SBUS: u32 = 1;
    pub const VBLANK_ON: u32 = 2;
    pub const VBLANK_OFF: u32 = 3;
    pub const VIF0: u32 = 4;
    pub const VIF1: u32 = 5;
    pub const VU0: u32 = 6;
    pub const VU1: u32 = 7;
    pub const IPU: u32 = 8;
    pub const TIMER0: u32 = 9;
    pub const TIMER1: u32 = 10;
    pub const TIMER2: u32 = 11;
    pub const TIMER3: u32 = 12;
    pub const SFIFO: u32 = 13;
    pub const VU0_WATCHDOG: u32 = 14;
}

/// IOP INTC source masks (pass to [`IopIntc::raise`], can be ORed together)
pub mod iop_interrupts {
    /// Vertical blank start (bit 0)
    pub const VBLANK: u32 = 1 << 0;
    /// GPU (PS1 mode) (bit 1)
    pub const GPU: u32 = 1 << 1;
    /// CD/DVD drive (bit 2)
    pub const CDVD: u32 = 1 << 2;
    /// DMA completion (bit 3)
    pub const DMA: u32 = 1 << 3;
    pub const TIMER0: u32 = 1 << 4;
    pub const TIMER1: u32 = 1 << 5;
    pub const TIMER2: u32 = 1 << 6;
    /// Controller/memory card port (bit 7)
    pub const SIO0: u32 = 1 << 7;
    pub const SIO1: u32 = 1 << 8;
    /// Sound processor (bit 9)
    pub const SPU2: u32 = 1 << 9;
    pub const PIO: u32 = 1 << 10;
    /// Vertical blank end (bit 11)
    pub const EVBLANK: u32 = 1 << 11;
    pub const DVD: u32 = 1 << 12;
    pub const PCMCIA: u32 = 1 << 13;
    pub const TIMER3: u32 = 1 << 14;
    pub const TIMER4: u32 = 1 << 15;
    pub const TIMER5: u32 = 1 << 16;
    pub const SIO2: u32 = 1 << 17;
}

/// EE interrupt controller
///
/// # Example
///
/// ```
/// use ps2rx::core::interrupt::{EeIntc, ee_interrupts};
///
/// let mut intc = EeIntc::new();
/// intc.raise(ee_interrupts::VBLANK_ON);
/// assert!(!intc.int0(), "masked cause must not assert INT0");
///
/// // I_MASK writes toggle
/// intc.write32(EeIntc::MASK_ADDR, 1 << ee_interrupts::VBLANK_ON);
/// assert!(intc.int0());
///
/// // I_STAT writes clear
/// intc.write32(EeIntc::STAT_ADDR, 1 << ee_interrupts::VBLANK_ON);
/// assert!(!intc.int0());
/// ```
pub struct EeIntc {
    /// I_STAT: latched causes
    stat: u32,

    /// I_MASK: enabled causes
    mask: u32,

    /// Level of the INT0 line, recomputed after every mutation
    int0: bool,
}

impl EeIntc {
    /// I_STAT register address
    pub const STAT_ADDR: u32 = 0x1000_F000;

    /// I_MASK register address
    pub const MASK_ADDR: u32 = 0x1000_F010;

    pub fn new() -> Self {
        Self {
            stat: 0,
            mask: 0,
            int0: false,
        }
    }

    /// Latch a cause
    ///
    /// # Arguments
    ///
    /// * `cause` - Bit index of the requesting device (see [`ee_interrupts`])
    pub fn raise(&mut self, cause: u32) {
        self.stat |= 1 << cause;
        log::trace!("EE INTC: cause {} raised, stat=0x{:08X}", cause, self.stat);
        self.update_int0();
    }

    /// Read a register
    ///
    /// Unknown addresses read as 0.
    pub fn read32(&self, addr: u32) -> u32 {
        match addr {
            Self::STAT_ADDR => self.stat,
            Self::MASK_ADDR => self.mask,
            _ => {
                log::debug!("EE INTC: unhandled read at 0x{:08X}", addr);
                0
            }
        }
    }

    /// Write a register
    ///
    /// I_STAT is write-1-to-clear, I_MASK is write-1-to-toggle.
    pub fn write32(&mut self, addr: u32, value: u32) {
        match addr {
            Self::STAT_ADDR => self.stat &= !value,
            Self::MASK_ADDR => self.mask ^= value,
            _ => {
                log::debug!(
                    "EE INTC: unhandled write at 0x{:08X} = 0x{:08X}",
                    addr,
                    value
                );
                return;
            }
        }

        self.update_int0();
    }

    /// Current level of the INT0 line
    pub fn int0(&self) -> bool {
        self.int0
    }

    pub fn stat(&self) -> u32 {
        self.stat
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    fn update_int0(&mut self) {
        let level = (self.stat & self.mask) != 0;

        if level != self.int0 {
            log::trace!("EE INTC: INT0 {}", if level { "asserted" } else { "cleared" });
        }

        self.int0 = level;
    }
}

impl Default for EeIntc {
    fn default() -> Self {
        Self::new()
    }
}

/// IOP interrupt controller
///
/// # Example
///
/// ```
/// use ps2rx::core::interrupt::{IopIntc, iop_interrupts};
///
/// let mut intc = IopIntc::new();
/// intc.write32(IopIntc::MASK_ADDR, iop_interrupts::DMA);
/// intc.raise(iop_interrupts::DMA);
/// assert!(intc.is_pending());
///
/// // Reading I_CTRL returns the enable and clears it
/// assert_eq!(intc.read32(IopIntc::CTRL_ADDR), 1);
/// assert!(!intc.is_pending());
/// ```
pub struct IopIntc {
    /// I_STAT: latched sources
    stat: u32,

    /// I_MASK: enabled sources
    mask: u32,

    /// I_CTRL: master enable
    ctrl: u32,

    /// Level of the IOP interrupt line
    pending: bool,
}

impl IopIntc {
    /// I_STAT register address
    pub const STAT_ADDR: u32 = 0x1F80_1070;

    /// I_MASK register address
    pub const MASK_ADDR: u32 = 0x1F80_1074;

    /// I_CTRL register address
    pub const CTRL_ADDR: u32 = 0x1F80_1078;

    /// Create a controller with the master enable set
    pub fn new() -> Self {
        Self {
            stat: 0,
            mask: 0,
            ctrl: 1,
            pending: false,
        }
    }

    /// Latch one or more sources
    ///
    /// # Arguments
    ///
    /// * `sources` - Source mask (see [`iop_interrupts`])
    pub fn raise(&mut self, sources: u32) {
        self.stat |= sources;
        log::trace!(
            "IOP INTC: sources 0x{:08X} raised, stat=0x{:08X}",
            sources,
            self.stat
        );
        self.update_pending();
    }

    /// Read a register
    ///
    /// Reading I_CTRL has a side effect: the enable is cleared until software
    /// writes it back.
    pub fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            Self::STAT_ADDR => self.stat,
            Self::MASK_ADDR => self.mask,
            Self::CTRL_ADDR => {
                let ctrl = self.ctrl;
                self.ctrl = 0;
                self.update_pending();
                ctrl
            }
            _ => {
                log::debug!("IOP INTC: unhandled read at 0x{:08X}", addr);
                0
            }
        }
    }

    /// Write a register
    ///
    /// I_STAT is acknowledged by writing 0 to a bit.
    pub fn write32(&mut self, addr: u32, value: u32) {
        match addr {
            Self::STAT_ADDR => self.stat &= value,
            Self::MASK_ADDR => self.mask = value,
            Self::CTRL_ADDR => self.ctrl = value,
            _ => {
                log::debug!(
                    "IOP INTC: unhandled write at 0x{:08X} = 0x{:08X}",
                    addr,
                    value
                );
                return;
            }
        }

        self.update_pending();
    }

    /// Whether an enabled source is waiting for the IOP
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn stat(&self) -> u32 {
        self.stat
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn ctrl(&self) -> u32 {
        self.ctrl
    }

    fn update_pending(&mut self) {
        self.pending = self.ctrl != 0 && (self.stat & self.mask) != 0;
    }
}

impl Default for IopIntc {
    fn default() -> Self {
        Self::new()
    }
}

impl IoDevice for EeIntc {
    fn name(&self) -> &'static str {
        "INTC"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        EeIntc::read32(self, addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        EeIntc::write32(self, addr, value)
    }
}

impl IoDevice for IopIntc {
    fn name(&self) -> &'static str {
        "IOP INTC"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        IopIntc::read32(self, addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        IopIntc::write32(self, addr, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================================================
    // EE INTC Tests
    // ============================================================================

    #[test]
    fn test_ee_intc_initial_state() {
        let intc = EeIntc::new();
        assert_eq!(intc.read32(EeIntc::STAT_ADDR), 0);
        assert_eq!(intc.read32(EeIntc::MASK_ADDR), 0);
        assert!(!intc.int0(), "INT0 should be low after reset");
    }

    #[test]
    fn test_ee_intc_raise_then_unmask() {
        let mut intc = EeIntc::new();

        intc.raise(ee_interrupts::VBLANK_ON);
        assert_eq!(intc.stat(), 1 << 2);
        assert!(!intc.int0(), "cause is masked");

        intc.write32(EeIntc::MASK_ADDR, 1 << ee_interrupts::VBLANK_ON);
        assert!(intc.int0(), "unmasking a latched cause asserts INT0");
    }

    #[test]
    fn test_ee_intc_stat_write_one_clears() {
        let mut intc = EeIntc::new();
        intc.raise(ee_interrupts::GS);
        intc.raise(ee_interrupts::TIMER0);

        intc.write32(EeIntc::STAT_ADDR, 1 << ee_interrupts::GS);
        assert_eq!(
            intc.stat(),
            1 << ee_interrupts::TIMER0,
            "only the written bit should clear"
        );
    }

    #[test]
    fn test_ee_intc_mask_write_toggles() {
        let mut intc = EeIntc::new();

        intc.write32(EeIntc::MASK_ADDR, 0b1010);
        assert_eq!(intc.mask(), 0b1010);

        intc.write32(EeIntc::MASK_ADDR, 0b0110);
        assert_eq!(intc.mask(), 0b1100, "mask writes XOR into the register");
    }

    #[test]
    fn test_ee_intc_mask_toggle_deasserts_line() {
        let mut intc = EeIntc::new();
        intc.write32(EeIntc::MASK_ADDR, 1 << ee_interrupts::SBUS);
        intc.raise(ee_interrupts::SBUS);
        assert!(intc.int0());

        intc.write32(EeIntc::MASK_ADDR, 1 << ee_interrupts::SBUS);
        assert!(!intc.int0(), "toggling the mask bit off should clear INT0");
        assert_eq!(intc.stat(), 1 << ee_interrupts::SBUS, "stat is untouched");
    }

    #[test]
    fn test_ee_intc_unknown_register() {
        let mut intc = EeIntc::new();
        intc.write32(0x1000_F004, 0xFFFF_FFFF);
        assert_eq!(intc.read32(0x1000_F004), 0);
        assert_eq!(intc.mask(), 0);
    }

    // ============================================================================
    // IOP INTC Tests
    // ============================================================================

    #[test]
    fn test_iop_intc_initial_state() {
        let intc = IopIntc::new();
        assert_eq!(intc.ctrl(), 1, "I_CTRL starts enabled");
        assert!(!intc.is_pending());
    }

    #[test]
    fn test_iop_intc_pending_requires_mask() {
        let mut intc = IopIntc::new();
        intc.raise(iop_interrupts::VBLANK);
        assert!(!intc.is_pending(), "masked source should not be pending");

        intc.write32(IopIntc::MASK_ADDR, iop_interrupts::VBLANK);
        assert!(intc.is_pending());
    }

    #[test]
    fn test_iop_intc_stat_write_zero_acknowledges() {
        let mut intc = IopIntc::new();
        intc.write32(IopIntc::MASK_ADDR, 0xFFFF_FFFF);
        intc.raise(iop_interrupts::VBLANK | iop_interrupts::DMA);

        intc.write32(IopIntc::STAT_ADDR, !iop_interrupts::VBLANK);
        assert_eq!(intc.stat(), iop_interrupts::DMA);
        assert!(intc.is_pending());

        intc.write32(IopIntc::STAT_ADDR, 0);
        assert!(!intc.is_pending());
    }

    #[test]
    fn test_iop_intc_ctrl_read_clears() {
        let mut intc = IopIntc::new();
        intc.write32(IopIntc::MASK_ADDR, iop_interrupts::CDVD);
        intc.raise(iop_interrupts::CDVD);
        assert!(intc.is_pending());

        assert_eq!(intc.read32(IopIntc::CTRL_ADDR), 1, "read returns old ctrl");
        assert_eq!(intc.ctrl(), 0, "read clears ctrl");
        assert!(!intc.is_pending(), "clearing ctrl withdraws the interrupt");

        assert_eq!(intc.read32(IopIntc::CTRL_ADDR), 0);

        intc.write32(IopIntc::CTRL_ADDR, 1);
        assert!(intc.is_pending(), "re-enabling restores the pending level");
    }

    #[test]
    fn test_iop_intc_stat_and_mask_reads_have_no_side_effects() {
        let mut intc = IopIntc::new();
        intc.write32(IopIntc::MASK_ADDR, 0x55);
        intc.raise(0x11);

        assert_eq!(intc.read32(IopIntc::STAT_ADDR), 0x11);
        assert_eq!(intc.read32(IopIntc::MASK_ADDR), 0x55);
        assert_eq!(intc.ctrl(), 1);
    }
}
