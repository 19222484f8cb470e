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

//! Per-pixel pipeline
//!
//! Every primitive funnels its fragments through [`PixelPipeline::draw`]:
//!
//! ```text
//! scissor -> alpha test -> destination alpha test -> depth test
//!         -> alpha blend (ABE) -> frame/depth writes
//! ```
//!
//! The pipeline snapshots the current drawing context when it is created, so
//! one primitive always sees one consistent context.

use super::format::{from_rgba32, is_16bit, is_indexed, to_rgba32};
use crate::core::gs::registers::{psm, DrawContext, Prim, Texa, TexClut};
use crate::core::gs::GsState;

/// VRAM size in 32-bit words (4 MiB)
pub const VRAM_WORDS: usize = 0x10_0000;

/// VRAM word address mask
const VRAM_MASK: u32 = 0xF_FFFF;

/// CT32 CLUT entry layout (two interleaved 8x2 blocks)
const CLUT_BLOCK_CT32: [u32; 32] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, //
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, //
    0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, //
    0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
];

/// Outcome of the pixel tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestResult {
    /// Nothing is written
    Fail,
    /// Colour and depth are written
    Pass,
    /// Only the frame buffer is written
    FbOnly,
    /// Only the depth buffer is written
    ZbOnly,
    /// Only the RGB channels of the frame buffer are written
    RgbOnly,
}

/// A shaded fragment in window coordinates
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub x: i32,
    pub y: i32,
    pub z: u32,
    /// Packed 0xAABBGGRR colour
    pub color: u32,
}

/// Draw-time view of VRAM plus the context of the primitive being drawn
pub struct PixelPipeline<'a> {
    pub ctx: DrawContext,
    pub attrs: Prim,
    texa: Texa,
    texclut: TexClut,
    fogcol: u32,
    colclamp: bool,
    pabe: bool,
    vram: &'a mut [u32],
}

#[inline(always)]
fn index(addr: u32) -> usize {
    (addr & VRAM_MASK) as usize
}

#[inline(always)]
fn channel(c: u32, n: u32) -> i32 {
    ((c >> (n * 8)) & 0xFF) as i32
}

#[inline(always)]
fn pack(r: i32, g: i32, b: i32, a: i32) -> u32 {
    (r as u32 & 0xFF) | ((g as u32 & 0xFF) << 8) | ((b as u32 & 0xFF) << 16) | ((a as u32 & 0xFF) << 24)
}

/// Apply a wrap mode to one texture coordinate
#[inline]
pub fn wrap_coordinate(c: i32, mode: u8, size: i32, min: i32, max: i32) -> i32 {
    match mode {
        0 => c.rem_euclid(size),
        1 => c.max(0).min(size - 1),
        2 => c.max(min).min(max),
        _ => (c & min) | max,
    }
}

impl<'a> PixelPipeline<'a> {
    /// Capture the current context and attributes of `state`
    pub fn new(state: &'a mut GsState) -> Self {
        let attrs = state.attributes();

        Self {
            ctx: state.ctx[attrs.ctxt],
            attrs,
            texa: state.texa,
            texclut: state.texclut,
            fogcol: state.fogcol,
            colclamp: state.colclamp,
            pabe: state.pabe,
            vram: &mut state.vram,
        }
    }

    // ------------------------------------------------------------------
    // Frame and depth buffers
    // ------------------------------------------------------------------

    /// Read the raw frame buffer value at (x, y)
    pub fn read_fb(&self, x: i32, y: i32) -> u32 {
        let frame = &self.ctx.frame;
        let (x, y) = (x as u32, y as u32);

        match frame.psm {
            psm::PSMCT32 => self.vram[index(frame.fbp + x + y * frame.fbw)],
            psm::PSMCT24 => self.vram[index(frame.fbp + x + y * frame.fbw)] & 0x00FF_FFFF,
            psm::PSMCT16 | psm::PSMCT16S => {
                let word = self.vram[index(frame.fbp + (x >> 1) + y * (frame.fbw >> 1))];
                (word >> ((x & 1) * 16)) & 0xFFFF
            }
            _ => 0,
        }
    }

    /// Write an RGBA32 colour to the frame buffer
    ///
    /// Bits set in FBMSK or `keep` are preserved.
    pub fn write_fb(&mut self, x: i32, y: i32, color: u32, keep: u32) {
        let frame = self.ctx.frame;
        let (x, y) = (x as u32, y as u32);
        let color = if self.ctx.fba { color | 0x8000_0000 } else { color };
        let mask = frame.fbmsk | keep;

        match frame.psm {
            psm::PSMCT32 | psm::PSMCT24 => {
                let mask = if frame.psm == psm::PSMCT24 {
                    mask | 0xFF00_0000
                } else {
                    mask
                };
                let i = index(frame.fbp + x + y * frame.fbw);
                let value = from_rgba32(color, frame.psm, psm::PSMCT32);
                self.vram[i] = (self.vram[i] & mask) | (value & !mask);
            }
            psm::PSMCT16 | psm::PSMCT16S => {
                let shift = (x & 1) * 16;
                let mask16 = from_rgba32(mask, psm::PSMCT16, psm::PSMCT32);
                let i = index(frame.fbp + (x >> 1) + y * (frame.fbw >> 1));
                let value = from_rgba32(color, frame.psm, psm::PSMCT32);
                let merged = (self.read_fb(x as i32, y as i32) & mask16) | (value & !mask16);
                self.vram[i] = (self.vram[i] & !(0xFFFF << shift)) | ((merged & 0xFFFF) << shift);
            }
            other => log::warn!("GS: unsupported frame buffer format 0x{:02X}", other),
        }
    }

    /// Read the depth buffer at (x, y)
    pub fn read_zb(&self, x: i32, y: i32) -> u32 {
        let zbuf = &self.ctx.zbuf;
        let fbw = self.ctx.frame.fbw;
        let (x, y) = (x as u32, y as u32);

        match zbuf.psm {
            psm::PSMZ32 => self.vram[index(zbuf.zbp + x + y * fbw)],
            psm::PSMZ24 => self.vram[index(zbuf.zbp + x + y * fbw)] & 0x00FF_FFFF,
            _ => {
                let word = self.vram[index(zbuf.zbp + (x >> 1) + y * (fbw >> 1))];
                (word >> ((x & 1) * 16)) & 0xFFFF
            }
        }
    }

    /// Write the depth buffer unless ZBUF.ZMSK is set
    pub fn write_zb(&mut self, x: i32, y: i32, z: u32) {
        let zbuf = self.ctx.zbuf;
        if zbuf.zmsk {
            return;
        }

        let fbw = self.ctx.frame.fbw;
        let (x, y) = (x as u32, y as u32);

        match zbuf.psm {
            psm::PSMZ32 => self.vram[index(zbuf.zbp + x + y * fbw)] = z,
            psm::PSMZ24 => {
                let i = index(zbuf.zbp + x + y * fbw);
                self.vram[i] = (self.vram[i] & 0xFF00_0000) | (z & 0x00FF_FFFF);
            }
            _ => {
                let shift = (x & 1) * 16;
                let i = index(zbuf.zbp + (x >> 1) + y * (fbw >> 1));
                self.vram[i] = (self.vram[i] & !(0xFFFF << shift)) | ((z & 0xFFFF) << shift);
            }
        }
    }

    /// Clamp a depth value to the range of the depth format
    #[inline]
    pub fn clamp_depth(&self, z: u32) -> u32 {
        match self.ctx.zbuf.psm {
            psm::PSMZ32 => z,
            psm::PSMZ24 => z.min(0x00FF_FFFF),
            _ => z.min(0xFFFF),
        }
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Read a CLUT entry
    pub fn read_clut(&self, i: u32) -> u32 {
        let tex0 = &self.ctx.tex0;

        if tex0.csm {
            // CSM2: the CLUT is a plain 16-bit strip addressed through TEXCLUT
            let offset = self.texclut.cov * self.texclut.cbw + self.texclut.cou + i;
            let word = self.vram[index(tex0.cbp + (offset >> 1))];
            return (word >> ((offset & 1) * 16)) & 0xFFFF;
        }

        match tex0.cpsm {
            psm::PSMCT32 | psm::PSMCT24 => {
                let p = CLUT_BLOCK_CT32[(i & 0x1F) as usize] + (i >> 5);
                self.vram[index(tex0.cbp + p)]
            }
            psm::PSMCT16 | psm::PSMCT16S => {
                let word = self.vram[index(tex0.cbp + (i >> 1))];
                (word >> ((i & 1) * 16)) & 0xFFFF
            }
            _ => 0,
        }
    }

    /// Read the raw texel at (u, v), resolving CLUT indices
    pub fn read_texel(&self, u: i32, v: i32) -> u32 {
        let tex0 = &self.ctx.tex0;
        let (u, v) = (u as u32, v as u32);

        match tex0.psm {
            psm::PSMCT32 => self.vram[index(tex0.tbp0 + u + v * tex0.tbw)],
            psm::PSMCT24 => self.vram[index(tex0.tbp0 + u + v * tex0.tbw)] & 0x00FF_FFFF,
            psm::PSMCT16 | psm::PSMCT16S => {
                let word = self.vram[index(tex0.tbp0 + (u >> 1) + v * (tex0.tbw >> 1))];
                (word >> ((u & 1) * 16)) & 0xFFFF
            }
            psm::PSMT8 => {
                let addr = tex0.tbp0 + (u >> 2) + v * (tex0.tbw >> 2);
                if addr as usize >= VRAM_WORDS {
                    return 0;
                }
                let i = (self.vram[addr as usize] >> ((u & 3) * 8)) & 0xFF;
                self.read_clut(i)
            }
            psm::PSMT4 => {
                let addr = tex0.tbp0 + (u >> 3) + v * (tex0.tbw >> 3);
                if addr as usize >= VRAM_WORDS {
                    return 0;
                }
                let i = (self.vram[addr as usize] >> ((u & 7) * 4)) & 0xF;
                self.read_clut(i + tex0.csa * 16)
            }
            psm::PSMT8H => {
                let i = self.vram[index(tex0.tbp0 + u + v * tex0.tbw)] >> 24;
                self.read_clut(i)
            }
            psm::PSMT4HL => {
                let i = (self.vram[index(tex0.tbp0 + u + v * tex0.tbw)] >> 24) & 0xF;
                self.read_clut(i + tex0.csa * 16)
            }
            psm::PSMT4HH => {
                let i = self.vram[index(tex0.tbp0 + u + v * tex0.tbw)] >> 28;
                self.read_clut(i + tex0.csa * 16)
            }
            _ => 0,
        }
    }

    /// Expand a texel to RGBA32, filling alpha from TEXA for 24/16-bit data
    fn expand_texel(&self, raw: u32, format: u8) -> u32 {
        match format {
            psm::PSMCT32 => raw,
            psm::PSMCT24 => {
                let rgb = raw & 0x00FF_FFFF;
                let alpha = if self.texa.aem && rgb == 0 {
                    0
                } else {
                    self.texa.ta0 as u32
                };
                rgb | (alpha << 24)
            }
            psm::PSMCT16 | psm::PSMCT16S => {
                let rgb = to_rgba32(raw, psm::PSMCT16, psm::PSMCT32) & 0x00FF_FFFF;
                let alpha = if raw & 0x8000 != 0 {
                    self.texa.ta1
                } else if self.texa.aem && raw & 0x7FFF == 0 {
                    0
                } else {
                    self.texa.ta0
                };
                rgb | ((alpha as u32) << 24)
            }
            _ => 0,
        }
    }

    /// Sample the texture at integer texel coordinates, applying wrap modes
    pub fn sample(&self, u: i32, v: i32) -> u32 {
        let tex0 = &self.ctx.tex0;
        let clamp = &self.ctx.clamp;

        let u = wrap_coordinate(u, clamp.wms, tex0.width(), clamp.minu, clamp.maxu);
        let v = wrap_coordinate(v, clamp.wmt, tex0.height(), clamp.minv, clamp.maxv);

        let raw = self.read_texel(u, v);
        let format = if is_indexed(tex0.psm) {
            tex0.cpsm
        } else {
            tex0.psm
        };

        self.expand_texel(raw, format)
    }

    /// Combine a texel with the fragment colour (TFX / TCC)
    pub fn texture_function(&self, t: u32, f: u32) -> u32 {
        let fa = channel(f, 3);
        let ta = channel(t, 3);
        let tcc = self.ctx.tex0.tcc;

        let modulate = |n: u32| ((channel(t, n) * channel(f, n)) >> 7).min(255);

        let (r, g, b, a) = match self.ctx.tex0.tfx {
            // MODULATE
            0 => (
                modulate(0),
                modulate(1),
                modulate(2),
                if tcc { ((ta * fa) >> 7).min(255) } else { fa },
            ),
            // DECAL
            1 => (
                channel(t, 0),
                channel(t, 1),
                channel(t, 2),
                if tcc { ta } else { fa },
            ),
            // HIGHLIGHT
            2 => (
                (modulate(0) + fa).min(255),
                (modulate(1) + fa).min(255),
                (modulate(2) + fa).min(255),
                if tcc { (ta + fa).min(255) } else { fa },
            ),
            // HIGHLIGHT2
            _ => (
                (modulate(0) + fa).min(255),
                (modulate(1) + fa).min(255),
                (modulate(2) + fa).min(255),
                if tcc { ta } else { fa },
            ),
        };

        pack(r, g, b, a)
    }

    /// Blend the fragment colour towards FOGCOL by fog coefficient `f`
    pub fn apply_fog(&self, c: u32, f: u8) -> u32 {
        let f = f as i32;
        let mix = |n: u32| (f * channel(c, n) + (255 - f) * channel(self.fogcol, n)) >> 8;

        pack(mix(0), mix(1), mix(2), channel(c, 3))
    }

    /// Resolve texel coordinates from either UV or STQ attributes
    #[inline]
    pub fn texel_coords(&self, s: f32, t: f32, q: f32, u: f32, v: f32) -> (i32, i32) {
        if self.attrs.fst {
            (u as i32, v as i32)
        } else {
            let q = if q == 0.0 { 1.0 } else { q };
            let tex0 = &self.ctx.tex0;
            (
                ((s / q) * tex0.width() as f32).floor() as i32,
                ((t / q) * tex0.height() as f32).floor() as i32,
            )
        }
    }

    /// Texture and fog a fragment colour according to the primitive attributes
    #[inline]
    pub fn shade(&self, color: u32, texel: Option<(i32, i32)>, fog: u8) -> u32 {
        let mut color = color;

        if let Some((u, v)) = texel {
            color = self.texture_function(self.sample(u, v), color);
        }

        if self.attrs.fge {
            color = self.apply_fog(color, fog);
        }

        color
    }

    // ------------------------------------------------------------------
    // Tests and blending
    // ------------------------------------------------------------------

    /// Run the scissor, alpha, destination alpha and depth tests
    pub fn test(&self, x: i32, y: i32, z: u32, alpha: u32) -> TestResult {
        if !self.ctx.scissor.contains(x, y) {
            return TestResult::Fail;
        }

        let test = &self.ctx.test;
        let mut result = TestResult::Pass;

        if test.ate {
            let pass = match test.atst {
                0 => false,
                1 => true,
                2 => alpha < test.aref,
                3 => alpha <= test.aref,
                4 => alpha == test.aref,
                5 => alpha >= test.aref,
                6 => alpha > test.aref,
                _ => alpha != test.aref,
            };

            if !pass {
                result = match test.afail {
                    0 => return TestResult::Fail,
                    1 => TestResult::FbOnly,
                    2 => TestResult::ZbOnly,
                    _ => TestResult::RgbOnly,
                };
            }
        }

        if test.date {
            let dest = self.read_fb(x, y);
            let bit = if is_16bit(self.ctx.frame.psm) {
                (dest >> 15) & 1
            } else {
                (dest >> 31) & 1
            };

            if (bit != 0) != test.datm {
                return TestResult::Fail;
            }
        }

        if test.zte {
            let zb = self.read_zb(x, y);

            match test.ztst {
                0 => return TestResult::Fail,
                2 if z < zb => return TestResult::Fail,
                3 if z <= zb => return TestResult::Fail,
                _ => {}
            }
        }

        result
    }

    /// Blend `s` with the frame buffer: `((A - B) * C >> 7) + D`
    pub fn blend(&self, x: i32, y: i32, s: u32) -> u32 {
        let alpha = &self.ctx.alpha;
        let d = to_rgba32(self.read_fb(x, y), self.ctx.frame.psm, psm::PSMCT32);

        let select = |sel: u8| match sel {
            0 => s,
            1 => d,
            _ => 0,
        };
        let (av, bv, dv) = (select(alpha.a), select(alpha.b), select(alpha.d));
        let cv = match alpha.c {
            0 => channel(s, 3),
            1 => channel(d, 3),
            _ => alpha.fix as i32,
        };

        let mix = |n: u32| {
            let value = (((channel(av, n) - channel(bv, n)) * cv) >> 7) + channel(dv, n);
            if self.colclamp {
                value.clamp(0, 255)
            } else {
                value & 0xFF
            }
        };

        pack(mix(0), mix(1), mix(2), mix(3))
    }

    /// Push a fragment through the tests and write it out
    ///
    /// # Returns
    ///
    /// The test result that decided which buffers were written
    pub fn draw(&mut self, fragment: Fragment) -> TestResult {
        let Fragment { x, y, z, color } = fragment;
        let z = self.clamp_depth(z);

        let result = self.test(x, y, z, color >> 24);
        if result == TestResult::Fail {
            return result;
        }

        let blended = self.attrs.abe && !(self.pabe && color & 0x8000_0000 == 0);
        let color = if blended { self.blend(x, y, color) } else { color };

        match result {
            TestResult::Pass => {
                self.write_fb(x, y, color, 0);
                self.write_zb(x, y, z);
            }
            TestResult::FbOnly => self.write_fb(x, y, color, 0),
            TestResult::ZbOnly => self.write_zb(x, y, z),
            TestResult::RgbOnly => self.write_fb(x, y, color, 0xFF00_0000),
            TestResult::Fail => {}
        }

        result
    }
}
