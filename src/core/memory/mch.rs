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

//! Memory controller hub (MCH) RDRAM initialisation handshake
//!
//! The BIOS probes the RDRAM devices through two registers:
//!
//! - **MCH_RICM** (0x1000F430): serial command register
//! - **MCH_DRD** (0x1000F440): serial data register
//!
//! Only the responses the BIOS waits on are modelled: the device-count probe
//! (two devices answer with 0x1F) and a few fixed configuration registers.

/// RDRAM handshake state
#[derive(Debug, Clone, Default)]
pub struct Mch {
    /// Last command written to MCH_RICM (busy bit masked)
    ricm: u32,

    /// Last value written to MCH_DRD
    drd: u32,

    /// Number of RDRAM devices that have answered the SDEVID probe
    rdram_sdevid: u32,
}

impl Mch {
    /// MCH_RICM register address
    pub const RICM_ADDR: u32 = 0x1000_F430;

    /// MCH_DRD register address
    pub const DRD_ADDR: u32 = 0x1000_F440;

    /// Number of RDRAM devices on the board
    const RDRAM_DEVICES: u32 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Read MCH_RICM (always idle)
    pub fn read_ricm(&self) -> u32 {
        0
    }

    /// Read MCH_DRD, answering the pending serial command
    pub fn read_drd(&mut self) -> u32 {
        let sop = (self.ricm >> 6) & 0xF;
        let sa = (self.ricm >> 16) & 0xFFF;

        if sop != 0 {
            return 0;
        }

        match sa {
            // SDEVID: each device answers once
            0x21 => {
                if self.rdram_sdevid < Self::RDRAM_DEVICES {
                    self.rdram_sdevid += 1;
                    0x1F
                } else {
                    0
                }
            }
            // NAPX
            0x23 => 0x0D0D,
            // DEVID
            0x24 => 0x0090,
            // CCA
            0x40 => self.ricm & 0x1F,
            _ => 0,
        }
    }

    /// Write MCH_RICM
    pub fn write_ricm(&mut self, value: u32) {
        let sa = (value >> 16) & 0xFFF;
        let sbc = (value >> 6) & 0xF;

        if sa == 0x21 && sbc == 0x1 && ((self.drd >> 7) & 1) == 0 {
            self.rdram_sdevid = 0;
        }

        self.ricm = value & !0x8000_0000;
        log::trace!("MCH: RICM=0x{:08X}", self.ricm);
    }

    /// Write MCH_DRD
    pub fn write_drd(&mut self, value: u32) {
        self.drd = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(sa: u32, sop: u32) -> u32 {
        (sa << 16) | (sop << 6)
    }

    #[test]
    fn test_sdevid_probe_answers_twice() {
        let mut mch = Mch::new();
        mch.write_ricm(command(0x21, 0));

        assert_eq!(mch.read_drd(), 0x1F, "first device");
        assert_eq!(mch.read_drd(), 0x1F, "second device");
        assert_eq!(mch.read_drd(), 0, "no third device");
    }

    #[test]
    fn test_sdevid_reset_command() {
        let mut mch = Mch::new();
        mch.write_ricm(command(0x21, 0));
        mch.read_drd();
        mch.read_drd();

        // SBC=1 on SA 0x21 with DRD bit 7 clear restarts enumeration
        mch.write_ricm(command(0x21, 1));
        mch.write_ricm(command(0x21, 0));
        assert_eq!(mch.read_drd(), 0x1F);
    }

    #[test]
    fn test_sdevid_reset_suppressed_by_drd_bit7() {
        let mut mch = Mch::new();
        mch.write_ricm(command(0x21, 0));
        mch.read_drd();
        mch.read_drd();

        mch.write_drd(0x80);
        mch.write_ricm(command(0x21, 1));
        mch.write_ricm(command(0x21, 0));
        assert_eq!(mch.read_drd(), 0, "enumeration should not restart");
    }

    #[test]
    fn test_fixed_configuration_registers() {
        let mut mch = Mch::new();

        mch.write_ricm(command(0x23, 0));
        assert_eq!(mch.read_drd(), 0x0D0D);

        mch.write_ricm(command(0x24, 0));
        assert_eq!(mch.read_drd(), 0x0090);

        mch.write_ricm(command(0x40, 0) | 0x15);
        assert_eq!(mch.read_drd(), 0x15);
    }

    #[test]
    fn test_non_zero_sop_reads_zero() {
        let mut mch = Mch::new();
        mch.write_ricm(command(0x23, 2));
        assert_eq!(mch.read_drd(), 0);
    }

    #[test]
    fn test_busy_bit_is_masked() {
        let mut mch = Mch::new();
        mch.write_ricm(0x8000_0000 | command(0x40, 0) | 0x03);
        assert_eq!(mch.read_drd(), 0x03);
        assert_eq!(mch.read_ricm(), 0);
    }
}
