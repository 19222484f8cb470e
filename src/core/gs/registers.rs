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

//! GS register definitions
//!
//! Register IDs, pixel storage formats, and decoded views of the general
//! purpose registers. Decoding converts hardware units at write time: buffer
//! pointers become word addresses, widths become pixels, and 12.4 fixed-point
//! coordinates become whole pixels.

/// GS general purpose register IDs
pub mod reg {
    pub const PRIM: u8 = 0x00;
    pub const RGBAQ: u8 = 0x01;
    pub const ST: u8 = 0x02;
    pub const UV: u8 = 0x03;
    pub const XYZF2: u8 = 0x04;
    pub const XYZ2: u8 = 0x05;
    pub const TEX0_1: u8 = 0x06;
    pub const TEX0_2: u8 = 0x07;
    pub const CLAMP_1: u8 = 0x08;
    pub const CLAMP_2: u8 = 0x09;
    pub const FOG: u8 = 0x0A;
    pub const XYZF3: u8 = 0x0C;
    pub const XYZ3: u8 = 0x0D;
    pub const TEX1_1: u8 = 0x14;
    pub const TEX1_2: u8 = 0x15;
    pub const TEX2_1: u8 = 0x16;
    pub const TEX2_2: u8 = 0x17;
    pub const XYOFFSET_1: u8 = 0x18;
    pub const XYOFFSET_2: u8 = 0x19;
    pub const PRMODECONT: u8 = 0x1A;
    pub const PRMODE: u8 = 0x1B;
    pub const TEXCLUT: u8 = 0x1C;
    pub const SCANMSK: u8 = 0x22;
    pub const MIPTBP1_1: u8 = 0x34;
    pub const MIPTBP1_2: u8 = 0x35;
    pub const MIPTBP2_1: u8 = 0x36;
    pub const MIPTBP2_2: u8 = 0x37;
    pub const TEXA: u8 = 0x3B;
    pub const FOGCOL: u8 = 0x3D;
    pub const TEXFLUSH: u8 = 0x3F;
    pub const SCISSOR_1: u8 = 0x40;
    pub const SCISSOR_2: u8 = 0x41;
    pub const ALPHA_1: u8 = 0x42;
    pub const ALPHA_2: u8 = 0x43;
    pub const DIMX: u8 = 0x44;
    pub const DTHE: u8 = 0x45;
    pub const COLCLAMP: u8 = 0x46;
    pub const TEST_1: u8 = 0x47;
    pub const TEST_2: u8 = 0x48;
    pub const PABE: u8 = 0x49;
    pub const FBA_1: u8 = 0x4A;
    pub const FBA_2: u8 = 0x4B;
    pub const FRAME_1: u8 = 0x4C;
    pub const FRAME_2: u8 = 0x4D;
    pub const ZBUF_1: u8 = 0x4E;
    pub const ZBUF_2: u8 = 0x4F;
    pub const BITBLTBUF: u8 = 0x50;
    pub const TRXPOS: u8 = 0x51;
    pub const TRXREG: u8 = 0x52;
    pub const TRXDIR: u8 = 0x53;
    pub const HWREG: u8 = 0x54;
    pub const SIGNAL: u8 = 0x60;
    pub const FINISH: u8 = 0x61;
    pub const LABEL: u8 = 0x62;
}

/// Pixel storage formats
pub mod psm {
    pub const PSMCT32: u8 = 0x00;
    pub const PSMCT24: u8 = 0x01;
    pub const PSMCT16: u8 = 0x02;
    pub const PSMCT16S: u8 = 0x0A;
    pub const PSMT8: u8 = 0x13;
    pub const PSMT4: u8 = 0x14;
    pub const PSMT8H: u8 = 0x1B;
    pub const PSMT4HL: u8 = 0x24;
    pub const PSMT4HH: u8 = 0x2C;
    pub const PSMZ32: u8 = 0x30;
    pub const PSMZ24: u8 = 0x31;
    pub const PSMZ16: u8 = 0x32;
    pub const PSMZ16S: u8 = 0x3A;
}

/// Extract `len` bits starting at `lo`
#[inline(always)]
pub(crate) fn bits(value: u64, lo: u32, len: u32) -> u64 {
    (value >> lo) & ((1u64 << len) - 1)
}

/// Primitive kinds (PRIM bits 0-2)
pub mod prim_kind {
    pub const POINT: u8 = 0;
    pub const LINE: u8 = 1;
    pub const LINE_STRIP: u8 = 2;
    pub const TRIANGLE: u8 = 3;
    pub const TRIANGLE_STRIP: u8 = 4;
    pub const TRIANGLE_FAN: u8 = 5;
    pub const SPRITE: u8 = 6;
}

/// PRIM / PRMODE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Prim {
    /// Primitive kind (see [`prim_kind`])
    pub kind: u8,
    /// Gouraud shading
    pub iip: bool,
    /// Texture mapping
    pub tme: bool,
    /// Fogging
    pub fge: bool,
    /// Alpha blending
    pub abe: bool,
    /// Antialiasing
    pub aa1: bool,
    /// UV (true) or STQ (false) texture coordinates
    pub fst: bool,
    /// Drawing context (0 or 1)
    pub ctxt: usize,
    /// Fragment value control
    pub fix: bool,
}

impl From<u64> for Prim {
    fn from(raw: u64) -> Self {
        Self {
            kind: bits(raw, 0, 3) as u8,
            iip: bits(raw, 3, 1) != 0,
            tme: bits(raw, 4, 1) != 0,
            fge: bits(raw, 5, 1) != 0,
            abe: bits(raw, 6, 1) != 0,
            aa1: bits(raw, 7, 1) != 0,
            fst: bits(raw, 8, 1) != 0,
            ctxt: bits(raw, 9, 1) as usize,
            fix: bits(raw, 10, 1) != 0,
        }
    }
}

impl Prim {
    /// Vertices needed before a drawing kick (0 for the reserved kind)
    pub fn vertex_count(&self) -> usize {
        match self.kind {
            prim_kind::POINT => 1,
            prim_kind::LINE | prim_kind::LINE_STRIP | prim_kind::SPRITE => 2,
            prim_kind::TRIANGLE | prim_kind::TRIANGLE_STRIP | prim_kind::TRIANGLE_FAN => 3,
            _ => 0,
        }
    }
}

/// RGBAQ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgbaq {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
    pub q: f32,
}

impl Default for Rgbaq {
    fn default() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
            q: 1.0,
        }
    }
}

impl From<u64> for Rgbaq {
    fn from(raw: u64) -> Self {
        Self {
            r: bits(raw, 0, 8) as u8,
            g: bits(raw, 8, 8) as u8,
            b: bits(raw, 16, 8) as u8,
            a: bits(raw, 24, 8) as u8,
            q: f32::from_bits((raw >> 32) as u32),
        }
    }
}

impl Rgbaq {
    /// Packed 0xAABBGGRR colour
    pub fn to_rgba32(&self) -> u32 {
        (self.r as u32) | ((self.g as u32) << 8) | ((self.b as u32) << 16) | ((self.a as u32) << 24)
    }
}

/// A committed vertex
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    /// Window X in pixels (offset not yet applied)
    pub x: i32,
    /// Window Y in pixels (offset not yet applied)
    pub y: i32,
    pub z: u32,
    pub fog: u8,
    pub color: Rgbaq,
    pub s: f32,
    pub t: f32,
    /// Texel U (UV mode)
    pub u: i32,
    /// Texel V (UV mode)
    pub v: i32,
}

/// TEX0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tex0 {
    /// Texture base pointer (words)
    pub tbp0: u32,
    /// Texture buffer width (pixels)
    pub tbw: u32,
    pub psm: u8,
    /// log2 of the texture width
    pub tw: u32,
    /// log2 of the texture height
    pub th: u32,
    /// Use texture alpha
    pub tcc: bool,
    /// Texture function
    pub tfx: u8,
    /// CLUT base pointer (words)
    pub cbp: u32,
    pub cpsm: u8,
    pub csm: bool,
    pub csa: u32,
    pub cld: u8,
}

impl From<u64> for Tex0 {
    fn from(raw: u64) -> Self {
        Self {
            tbp0: bits(raw, 0, 14) as u32 * 64,
            tbw: bits(raw, 14, 6) as u32 * 64,
            psm: bits(raw, 20, 6) as u8,
            tw: bits(raw, 26, 4) as u32,
            th: bits(raw, 30, 4) as u32,
            tcc: bits(raw, 34, 1) != 0,
            tfx: bits(raw, 35, 2) as u8,
            cbp: bits(raw, 37, 14) as u32 * 64,
            cpsm: bits(raw, 51, 4) as u8,
            csm: bits(raw, 55, 1) != 0,
            csa: bits(raw, 56, 5) as u32,
            cld: bits(raw, 61, 3) as u8,
        }
    }
}

impl Tex0 {
    /// Texture width in texels
    pub fn width(&self) -> i32 {
        1 << self.tw.min(11)
    }

    /// Texture height in texels
    pub fn height(&self) -> i32 {
        1 << self.th.min(11)
    }

    /// Apply a TEX2 write (format and CLUT fields only)
    pub fn apply_tex2(&mut self, raw: u64) {
        let tex2 = Tex0::from(raw);
        self.psm = tex2.psm;
        self.cbp = tex2.cbp;
        self.cpsm = tex2.cpsm;
        self.csm = tex2.csm;
        self.csa = tex2.csa;
        self.cld = tex2.cld;
    }
}

/// CLAMP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clamp {
    pub wms: u8,
    pub wmt: u8,
    pub minu: i32,
    pub maxu: i32,
    pub minv: i32,
    pub maxv: i32,
}

impl From<u64> for Clamp {
    fn from(raw: u64) -> Self {
        Self {
            wms: bits(raw, 0, 2) as u8,
            wmt: bits(raw, 2, 2) as u8,
            minu: bits(raw, 4, 10) as i32,
            maxu: bits(raw, 14, 10) as i32,
            minv: bits(raw, 24, 10) as i32,
            maxv: bits(raw, 34, 10) as i32,
        }
    }
}

/// XYOFFSET, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XyOffset {
    pub x: i32,
    pub y: i32,
}

impl From<u64> for XyOffset {
    fn from(raw: u64) -> Self {
        Self {
            x: (bits(raw, 0, 16) >> 4) as i32,
            y: (bits(raw, 32, 16) >> 4) as i32,
        }
    }
}

/// SCISSOR, inclusive window coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scissor {
    pub x0: i32,
    pub x1: i32,
    pub y0: i32,
    pub y1: i32,
}

impl From<u64> for Scissor {
    fn from(raw: u64) -> Self {
        Self {
            x0: bits(raw, 0, 11) as i32,
            x1: bits(raw, 16, 11) as i32,
            y0: bits(raw, 32, 11) as i32,
            y1: bits(raw, 48, 11) as i32,
        }
    }
}

impl Scissor {
    #[inline(always)]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

/// ALPHA: `((A - B) * C >> 7) + D`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alpha {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub fix: u32,
}

impl From<u64> for Alpha {
    fn from(raw: u64) -> Self {
        Self {
            a: bits(raw, 0, 2) as u8,
            b: bits(raw, 2, 2) as u8,
            c: bits(raw, 4, 2) as u8,
            d: bits(raw, 6, 2) as u8,
            fix: bits(raw, 32, 8) as u32,
        }
    }
}

/// TEST
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Test {
    pub ate: bool,
    pub atst: u8,
    pub aref: u32,
    pub afail: u8,
    pub date: bool,
    pub datm: bool,
    pub zte: bool,
    pub ztst: u8,
}

impl From<u64> for Test {
    fn from(raw: u64) -> Self {
        Self {
            ate: bits(raw, 0, 1) != 0,
            atst: bits(raw, 1, 3) as u8,
            aref: bits(raw, 4, 8) as u32,
            afail: bits(raw, 12, 2) as u8,
            date: bits(raw, 14, 1) != 0,
            datm: bits(raw, 15, 1) != 0,
            zte: bits(raw, 16, 1) != 0,
            ztst: bits(raw, 17, 2) as u8,
        }
    }
}

/// FRAME
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    /// Frame buffer pointer (words)
    pub fbp: u32,
    /// Frame buffer width (pixels)
    pub fbw: u32,
    pub psm: u8,
    /// Bits set here are not written
    pub fbmsk: u32,
}

impl From<u64> for Frame {
    fn from(raw: u64) -> Self {
        Self {
            fbp: bits(raw, 0, 9) as u32 * 2048,
            fbw: bits(raw, 16, 6) as u32 * 64,
            psm: bits(raw, 24, 6) as u8,
            fbmsk: (raw >> 32) as u32,
        }
    }
}

/// ZBUF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zbuf {
    /// Depth buffer pointer (words)
    pub zbp: u32,
    /// Depth format (PSMZ*)
    pub psm: u8,
    /// Depth writes disabled
    pub zmsk: bool,
}

impl Default for Zbuf {
    fn default() -> Self {
        Self {
            zbp: 0,
            psm: psm::PSMZ32,
            zmsk: false,
        }
    }
}

impl From<u64> for Zbuf {
    fn from(raw: u64) -> Self {
        Self {
            zbp: bits(raw, 0, 9) as u32 * 2048,
            psm: bits(raw, 24, 4) as u8 | 0x30,
            zmsk: bits(raw, 32, 1) != 0,
        }
    }
}

/// TEXA: alpha expansion for 24/16-bit textures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Texa {
    pub ta0: u8,
    pub aem: bool,
    pub ta1: u8,
}

impl From<u64> for Texa {
    fn from(raw: u64) -> Self {
        Self {
            ta0: bits(raw, 0, 8) as u8,
            aem: bits(raw, 15, 1) != 0,
            ta1: bits(raw, 32, 8) as u8,
        }
    }
}

/// TEXCLUT
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TexClut {
    pub cbw: u32,
    pub cou: u32,
    pub cov: u32,
}

impl From<u64> for TexClut {
    fn from(raw: u64) -> Self {
        Self {
            cbw: bits(raw, 0, 6) as u32 * 64,
            cou: bits(raw, 6, 6) as u32 * 16,
            cov: bits(raw, 12, 10) as u32,
        }
    }
}

/// Per-context drawing state (`_1` / `_2` register pairs)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawContext {
    pub xyoffset: XyOffset,
    pub scissor: Scissor,
    pub tex0: Tex0,
    pub tex1: u64,
    pub clamp: Clamp,
    pub alpha: Alpha,
    pub test: Test,
    pub frame: Frame,
    pub zbuf: Zbuf,
    pub fba: bool,
    pub miptbp1: u64,
    pub miptbp2: u64,
}
