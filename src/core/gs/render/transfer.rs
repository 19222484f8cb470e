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

//! BITBLT transfers
//!
//! Host-to-local (`xdir = 0`) payloads arrive 64 bits at a time through
//! HWREG and are unpacked according to the destination format. Local-to-host
//! (`xdir = 1`) streams CT32 pixels back out through HWREG. Local-to-local
//! (`xdir = 2`) copies a rectangle of words as soon as TRXDIR is written.

use super::format::pixels_to_words;
use crate::core::gs::registers::{bits, psm};

const VRAM_MASK: u32 = 0xF_FFFF;

#[inline(always)]
fn index(addr: u32) -> usize {
    (addr & VRAM_MASK) as usize
}

/// Decoded BITBLTBUF/TRXPOS/TRXREG/TRXDIR plus the transfer cursors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferState {
    /// Source base (words)
    pub sbp: u32,
    /// Source row stride (words)
    pub sbw: u32,
    pub spsm: u8,
    /// Destination base (words)
    pub dbp: u32,
    /// Destination row stride (words)
    pub dbw: u32,
    pub dpsm: u8,
    pub ssax: u32,
    pub ssay: u32,
    pub dsax: u32,
    pub dsay: u32,
    /// Pixel scan direction (unused by the copy loops)
    pub dir: u8,
    /// Rectangle width in pixels
    pub rrw: u32,
    /// Rectangle height in pixels
    pub rrh: u32,
    /// 0 host to local, 1 local to host, 2 local to local, 3 off
    pub xdir: u8,
    /// Destination cursor
    pub dx: u32,
    pub dy: u32,
    /// Source cursor
    pub sx: u32,
    pub sy: u32,
    ct24_phase: u8,
    ct24_carry: u32,
}

impl TransferState {
    /// Decode the transfer registers and reset the cursors
    pub fn start(bitbltbuf: u64, trxpos: u64, trxreg: u64, trxdir: u64) -> Self {
        let spsm = bits(bitbltbuf, 24, 6) as u8;
        let dpsm = bits(bitbltbuf, 56, 6) as u8;

        Self {
            sbp: (bits(bitbltbuf, 0, 14) as u32) << 6,
            sbw: pixels_to_words(spsm, (bits(bitbltbuf, 16, 6) as u32) << 6),
            spsm,
            dbp: (bits(bitbltbuf, 32, 14) as u32) << 6,
            dbw: pixels_to_words(dpsm, (bits(bitbltbuf, 48, 6) as u32) << 6),
            dpsm,
            ssax: bits(trxpos, 0, 11) as u32,
            ssay: bits(trxpos, 16, 11) as u32,
            dsax: bits(trxpos, 32, 11) as u32,
            dsay: bits(trxpos, 48, 11) as u32,
            dir: bits(trxpos, 59, 2) as u8,
            rrw: bits(trxreg, 0, 12) as u32,
            rrh: bits(trxreg, 32, 12) as u32,
            xdir: bits(trxdir, 0, 2) as u8,
            ..Default::default()
        }
    }

    /// True while the destination cursor is inside the rectangle
    #[inline]
    fn accepting(&self) -> bool {
        self.rrw != 0 && self.dy < self.rrh
    }

    /// Advance the destination cursor by one pixel
    #[inline]
    fn advance(&mut self) {
        self.dx += 1;
        if self.dx == self.rrw {
            self.dx = 0;
            self.dy += 1;
        }
    }

    /// Store a 32-bit pixel; `keep` bits of the old word survive
    fn put32(&mut self, vram: &mut [u32], value: u32, keep: u32) {
        if !self.accepting() {
            return;
        }

        let i = index(self.dbp + self.dsax + self.dx + (self.dsay + self.dy) * self.dbw);
        vram[i] = (vram[i] & keep) | (value & !keep);
        self.advance();
    }

    /// Store a sub-word pixel (`width` bits) at the current cursor
    fn put_packed(&mut self, vram: &mut [u32], value: u32, width: u32) {
        if !self.accepting() {
            return;
        }

        let per_word = 32 / width;
        let x = self.dsax + self.dx;
        let shift = (x % per_word) * width;
        let mask = ((1u32 << width) - 1) << shift;

        let i = index(self.dbp + x / per_word + (self.dsay + self.dy) * self.dbw);
        vram[i] = (vram[i] & !mask) | ((value << shift) & mask);
        self.advance();
    }

    /// Consume one 64-bit host-to-local payload
    pub fn write(&mut self, vram: &mut [u32], data: u64) {
        if self.xdir != 0 {
            return;
        }

        match self.dpsm {
            psm::PSMCT24 | psm::PSMZ24 => self.write_ct24(vram, data),
            psm::PSMCT16 | psm::PSMCT16S | psm::PSMZ16 | psm::PSMZ16S => {
                for i in 0..4 {
                    self.put_packed(vram, (data >> (i * 16)) as u32 & 0xFFFF, 16);
                }
            }
            psm::PSMT8 => {
                for i in 0..8 {
                    self.put_packed(vram, (data >> (i * 8)) as u32 & 0xFF, 8);
                }
            }
            psm::PSMT4 => {
                for i in 0..16 {
                    self.put_packed(vram, (data >> (i * 4)) as u32 & 0xF, 4);
                }
            }
            _ => {
                self.put32(vram, data as u32, 0);
                self.put32(vram, (data >> 32) as u32, 0);
            }
        }
    }

    /// Three 64-bit payloads carry eight 24-bit pixels (2 + 3 + 3)
    fn write_ct24(&mut self, vram: &mut [u32], data: u64) {
        const KEEP: u32 = 0xFF00_0000;

        match self.ct24_phase {
            0 => {
                self.put32(vram, data as u32 & 0xFF_FFFF, KEEP);
                self.put32(vram, (data >> 24) as u32 & 0xFF_FFFF, KEEP);
                self.ct24_carry = (data >> 48) as u32 & 0xFFFF;
                self.ct24_phase = 1;
            }
            1 => {
                let first = self.ct24_carry | ((data as u32 & 0xFF) << 16);
                self.put32(vram, first, KEEP);
                self.put32(vram, (data >> 8) as u32 & 0xFF_FFFF, KEEP);
                self.put32(vram, (data >> 32) as u32 & 0xFF_FFFF, KEEP);
                self.ct24_carry = (data >> 56) as u32 & 0xFF;
                self.ct24_phase = 2;
            }
            _ => {
                let first = self.ct24_carry | ((data as u32 & 0xFFFF) << 8);
                self.put32(vram, first, KEEP);
                self.put32(vram, (data >> 16) as u32 & 0xFF_FFFF, KEEP);
                self.put32(vram, (data >> 40) as u32 & 0xFF_FFFF, KEEP);
                self.ct24_phase = 0;
            }
        }
    }

    /// Produce the next two CT32 pixels of a local-to-host transfer
    ///
    /// # Returns
    ///
    /// The packed pixels, or 0 once the rectangle is exhausted
    pub fn read(&mut self, vram: &[u32]) -> u64 {
        if self.xdir != 1 || self.rrw == 0 {
            return 0;
        }

        let mut out = 0u64;
        for half in 0..2 {
            if self.sy >= self.rrh {
                break;
            }

            let i = index(self.sbp + self.ssax + self.sx + (self.ssay + self.sy) * self.sbw);
            out |= (vram[i] as u64) << (half * 32);

            self.sx += 1;
            if self.sx == self.rrw {
                self.sx = 0;
                self.sy += 1;
            }
        }

        out
    }

    /// Copy the source rectangle to the destination, row by row
    ///
    /// The copy works on whole words, so it is exact for 32-bit formats.
    pub fn blit(&self, vram: &mut [u32]) {
        for y in 0..self.rrh {
            let src = self.sbp + self.ssax + (self.ssay + y) * self.sbw;
            let dst = self.dbp + self.dsax + (self.dsay + y) * self.dbw;

            for x in 0..self.rrw {
                vram[index(dst + x)] = vram[index(src + x)];
            }
        }
    }
}
