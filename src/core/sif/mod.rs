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

//! SIF (Sub-system Interface) between the EE and the IOP
//!
//! The SIF exposes a small mailbox register file to both CPUs and carries bulk
//! data through two quadword FIFOs fed by DMA:
//!
//! - **SIF0**: IOP → EE (IOP DMA channel 9 pushes, EE DMAC channel 5 pops)
//! - **SIF1**: EE → IOP (EE DMAC channel 6 pushes, IOP DMA channel 10 pops)
//!
//! ## Mailbox registers
//!
//! | Offset | Name  | EE write          | IOP write         |
//! |--------|-------|-------------------|-------------------|
//! | 0x00   | MSCOM | store             | ignored           |
//! | 0x10   | SMCOM | ignored           | store             |
//! | 0x20   | MSFLG | set bits          | clear bits        |
//! | 0x30   | SMFLG | clear bits        | set bits          |
//! | 0x40   | CTRL  | store             | store             |
//! | 0x60   | BD6   | store             | store             |
//!
//! The EE sees the window at 0x1000F200, the IOP at 0x1D000000.

use std::collections::VecDeque;

/// Quadword FIFO between the two DMA engines
#[derive(Debug, Default)]
pub struct SifFifo {
    data: VecDeque<u128>,
}

impl SifFifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: u128) {
        self.data.push_back(value);
    }

    pub fn pop(&mut self) -> Option<u128> {
        self.data.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Drop everything queued
    pub fn reset(&mut self) {
        self.data.clear();
    }
}

/// Which CPU is accessing the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SifSide {
    Ee,
    Iop,
}

/// SIF mailbox registers and FIFOs
#[derive(Debug, Default)]
pub struct Sif {
    mscom: u32,
    smcom: u32,
    msflg: u32,
    smflg: u32,
    ctrl: u32,
    bd6: u32,

    /// IOP → EE
    pub sif0: SifFifo,

    /// EE → IOP
    pub sif1: SifFifo,
}

impl Sif {
    /// EE view base address
    pub const EE_BASE: u32 = 0x1000_F200;

    /// IOP view base address
    pub const IOP_BASE: u32 = 0x1D00_0000;

    const MSCOM: u32 = 0x00;
    const SMCOM: u32 = 0x10;
    const MSFLG: u32 = 0x20;
    const SMFLG: u32 = 0x30;
    const CTRL: u32 = 0x40;
    const BD6: u32 = 0x60;

    pub fn new() -> Self {
        Self::default()
    }

    /// Read a mailbox register
    ///
    /// # Arguments
    ///
    /// * `side` - Accessing CPU
    /// * `addr` - Absolute address in that CPU's window
    pub fn read32(&self, side: SifSide, addr: u32) -> u32 {
        match Self::offset(side, addr) {
            Self::MSCOM => self.mscom,
            Self::SMCOM => self.smcom,
            Self::MSFLG => self.msflg,
            Self::SMFLG => self.smflg,
            Self::CTRL => self.ctrl,
            Self::BD6 => self.bd6,
            offset => {
                log::debug!("SIF: unhandled {:?} read at offset 0x{:02X}", side, offset);
                0
            }
        }
    }

    /// Write a mailbox register
    pub fn write32(&mut self, side: SifSide, addr: u32, value: u32) {
        match (side, Self::offset(side, addr)) {
            (SifSide::Ee, Self::MSCOM) => {
                log::debug!("SIF: MSCOM=0x{:08X}", value);
                self.mscom = value;
            }
            (SifSide::Iop, Self::SMCOM) => {
                log::debug!("SIF: SMCOM=0x{:08X}", value);
                self.smcom = value;
            }
            (SifSide::Ee, Self::MSFLG) => {
                log::debug!("SIF: MSFLG |= 0x{:08X}", value);
                self.msflg |= value;
            }
            (SifSide::Iop, Self::MSFLG) => self.msflg &= !value,
            (SifSide::Ee, Self::SMFLG) => {
                log::debug!("SIF: SMFLG &= !0x{:08X}", value);
                self.smflg &= !value;
            }
            (SifSide::Iop, Self::SMFLG) => self.smflg |= value,
            (_, Self::CTRL) => self.ctrl = value,
            (_, Self::BD6) => self.bd6 = value,
            (side, offset) => {
                log::debug!(
                    "SIF: ignored {:?} write at offset 0x{:02X} = 0x{:08X}",
                    side,
                    offset,
                    value
                );
            }
        }
    }

    pub fn mscom(&self) -> u32 {
        self.mscom
    }

    pub fn smcom(&self) -> u32 {
        self.smcom
    }

    pub fn msflg(&self) -> u32 {
        self.msflg
    }

    pub fn smflg(&self) -> u32 {
        self.smflg
    }

    fn offset(side: SifSide, addr: u32) -> u32 {
        match side {
            SifSide::Ee => addr.wrapping_sub(Self::EE_BASE),
            SifSide::Iop => addr.wrapping_sub(Self::IOP_BASE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut fifo = SifFifo::new();
        fifo.push(1);
        fifo.push(2);

        assert_eq!(fifo.len(), 2);
        assert_eq!(fifo.pop(), Some(1));
        assert_eq!(fifo.pop(), Some(2));
        assert!(fifo.is_empty());
        assert_eq!(fifo.pop(), None);
    }

    #[test]
    fn test_fifo_reset() {
        let mut fifo = SifFifo::new();
        fifo.push(7);
        fifo.reset();
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_command_registers_are_owned_per_side() {
        let mut sif = Sif::new();

        sif.write32(SifSide::Ee, 0x1000_F200, 0x1234);
        sif.write32(SifSide::Iop, 0x1D00_0000, 0xFFFF);
        assert_eq!(sif.mscom(), 0x1234, "IOP cannot write MSCOM");

        sif.write32(SifSide::Iop, 0x1D00_0010, 0x5678);
        sif.write32(SifSide::Ee, 0x1000_F210, 0xFFFF);
        assert_eq!(sif.smcom(), 0x5678, "EE cannot write SMCOM");

        assert_eq!(sif.read32(SifSide::Iop, 0x1D00_0000), 0x1234);
        assert_eq!(sif.read32(SifSide::Ee, 0x1000_F210), 0x5678);
    }

    #[test]
    fn test_msflg_set_by_ee_cleared_by_iop() {
        let mut sif = Sif::new();
        sif.write32(SifSide::Ee, 0x1000_F220, 0x0001_0000);
        sif.write32(SifSide::Ee, 0x1000_F220, 0x0000_0001);
        assert_eq!(sif.msflg(), 0x0001_0001);

        sif.write32(SifSide::Iop, 0x1D00_0020, 0x0001_0000);
        assert_eq!(sif.msflg(), 0x0000_0001);
    }

    #[test]
    fn test_smflg_set_by_iop_cleared_by_ee() {
        let mut sif = Sif::new();
        sif.write32(SifSide::Iop, 0x1D00_0030, 0x0004_0000);
        assert_eq!(sif.read32(SifSide::Ee, 0x1000_F230), 0x0004_0000);

        sif.write32(SifSide::Ee, 0x1000_F230, 0x0004_0000);
        assert_eq!(sif.smflg(), 0);
    }

    #[test]
    fn test_unknown_offset_reads_zero() {
        let sif = Sif::new();
        assert_eq!(sif.read32(SifSide::Ee, 0x1000_F250), 0);
    }
}
