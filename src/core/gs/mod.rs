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

//! GS (Graphics Synthesizer)
//!
//! The GS is fed 64-bit register writes by the GIF. Drawing state lives in
//! [`GsState`]; rasterization is delegated to a [`RenderBackend`].
//!
//! # Register File
//!
//! ```text
//! general purpose (via GIF)      privileged (0x1200_0000, EE bus)
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │ PRIM RGBAQ ST UV XYZ*    │   │ PMODE SMODE* DISPFB* DISPLAY*│
//! │ TEX0/CLAMP/ALPHA/TEST/.. │   │ BGCOLOR                      │
//! │   x2 drawing contexts    │   │ CSR IMR BUSDIR SIGLBLID      │
//! │ BITBLTBUF TRXPOS TRXREG  │   └──────────────────────────────┘
//! │ TRXDIR HWREG             │
//! │ SIGNAL FINISH LABEL      │
//! └──────────────────────────┘
//! ```
//!
//! # Vertex Kick
//!
//! RGBAQ, ST, UV and FOG latch attributes for the next vertex. XYZ2/XYZF2
//! commit a vertex and draw once the primitive has enough of them; XYZ3/XYZF3
//! commit without drawing. Strips keep their trailing vertices and fans keep
//! their first vertex.
//!
//! # References
//!
//! - [GS User's Manual register descriptions](https://psi-rockin.github.io/ps2tek/#gs)

pub mod registers;
pub mod render;

use serde::Serialize;

use crate::core::memory::IoDevice;
use registers::{
    bits, prim_kind, reg, Alpha, Clamp, DrawContext, Frame, Prim, Rgbaq, Scissor, Test, Tex0,
    TexClut, Texa, Vertex, XyOffset, Zbuf,
};
pub use render::{NullRenderer, RenderBackend, SoftwareRenderer};
use render::{format, VRAM_WORDS};

/// CSR bits
pub mod csr {
    pub const SIGNAL: u64 = 1 << 0;
    pub const FINISH: u64 = 1 << 1;
    pub const HSINT: u64 = 1 << 2;
    pub const VSINT: u64 = 1 << 3;
    pub const EDWINT: u64 = 1 << 4;
    pub const RESET: u64 = 1 << 9;
    pub const FIELD: u64 = 1 << 13;
    /// Revision and ID reported in bits 16-31
    pub const REVISION: u64 = 0x551B_0000;
}

/// IMR mask bits
pub mod imr {
    pub const SIGMSK: u64 = 1 << 8;
    pub const FINISHMSK: u64 = 1 << 9;
    pub const HSMSK: u64 = 1 << 10;
    pub const VSMSK: u64 = 1 << 11;
    pub const EDWMSK: u64 = 1 << 12;
}

/// Privileged registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrivilegedRegisters {
    pub pmode: u64,
    pub smode1: u64,
    pub smode2: u64,
    pub srfsh: u64,
    pub synch1: u64,
    pub synch2: u64,
    pub syncv: u64,
    pub dispfb1: u64,
    pub display1: u64,
    pub dispfb2: u64,
    pub display2: u64,
    pub extbuf: u64,
    pub extdata: u64,
    pub extwrite: u64,
    pub bgcolor: u64,
    pub csr: u64,
    pub imr: u64,
    pub busdir: u64,
    pub siglblid: u64,
}

impl Default for PrivilegedRegisters {
    fn default() -> Self {
        Self {
            pmode: 0,
            smode1: 0,
            smode2: 0,
            srfsh: 0,
            synch1: 0,
            synch2: 0,
            syncv: 0,
            dispfb1: 0,
            display1: 0,
            dispfb2: 0,
            display2: 0,
            extbuf: 0,
            extdata: 0,
            extwrite: 0,
            bgcolor: 0,
            csr: 0,
            imr: 0x7F00,
            busdir: 0,
            siglblid: 0,
        }
    }
}

/// Pending vertices of the primitive being assembled
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexQueue {
    verts: [Vertex; 3],
    len: usize,
}

impl VertexQueue {
    /// Committed vertices, oldest first
    pub fn vertices(&self) -> &[Vertex] {
        &self.verts[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn push(&mut self, vertex: Vertex) {
        if self.len < self.verts.len() {
            self.verts[self.len] = vertex;
            self.len += 1;
        }
    }

    /// Drop consumed vertices after a full primitive
    fn advance(&mut self, kind: u8) {
        match kind {
            prim_kind::LINE_STRIP => {
                self.verts[0] = self.verts[self.len - 1];
                self.len = 1;
            }
            prim_kind::TRIANGLE_STRIP => {
                self.verts[0] = self.verts[1];
                self.verts[1] = self.verts[2];
                self.len = 2;
            }
            prim_kind::TRIANGLE_FAN => {
                self.verts[1] = self.verts[2];
                self.len = 2;
            }
            _ => self.len = 0,
        }
    }
}

/// Complete GS drawing state shared with render backends
pub struct GsState {
    /// Local memory: 4 MiB as 32-bit words
    pub vram: Vec<u32>,

    /// Last PRIM write
    pub prim: Prim,
    /// Attributes used when PRMODECONT selects PRMODE
    pub prmode: Prim,
    /// PRMODECONT.AC: attributes come from PRIM (true) or PRMODE (false)
    pub prmodecont: bool,

    pub rgbaq: Rgbaq,
    pub s: f32,
    pub t: f32,
    pub u: i32,
    pub v: i32,
    pub fog: u8,

    /// Drawing contexts 1 and 2
    pub ctx: [DrawContext; 2],

    pub texclut: TexClut,
    pub scanmsk: u8,
    pub texa: Texa,
    /// FOGCOL (0x00BBGGRR)
    pub fogcol: u32,
    pub dimx: u64,
    pub dthe: bool,
    pub colclamp: bool,
    pub pabe: bool,

    pub bitbltbuf: u64,
    pub trxpos: u64,
    pub trxreg: u64,
    pub trxdir: u64,
    pub hwreg: u64,

    pub vq: VertexQueue,

    pub privileged: PrivilegedRegisters,
}

impl GsState {
    /// Create a power-on state with cleared VRAM
    pub fn new() -> Self {
        Self::with_vram(vec![0; VRAM_WORDS])
    }

    fn with_vram(vram: Vec<u32>) -> Self {
        Self {
            vram,
            prim: Prim::default(),
            prmode: Prim::default(),
            prmodecont: true,
            rgbaq: Rgbaq::default(),
            s: 0.0,
            t: 0.0,
            u: 0,
            v: 0,
            fog: 0,
            ctx: [DrawContext::default(); 2],
            texclut: TexClut::default(),
            scanmsk: 0,
            texa: Texa::default(),
            fogcol: 0,
            dimx: 0,
            dthe: false,
            colclamp: false,
            pabe: false,
            bitbltbuf: 0,
            trxpos: 0,
            trxreg: 0,
            trxdir: 0,
            hwreg: 0,
            vq: VertexQueue::default(),
            privileged: PrivilegedRegisters::default(),
        }
    }

    /// Attributes in effect for the current primitive
    ///
    /// The primitive kind always comes from PRIM.
    pub fn attributes(&self) -> Prim {
        if self.prmodecont {
            self.prim
        } else {
            Prim {
                kind: self.prim.kind,
                ..self.prmode
            }
        }
    }

    /// Drawing context selected by the current attributes
    pub fn context(&self) -> &DrawContext {
        &self.ctx[self.attributes().ctxt]
    }

    /// Reset every register, keeping VRAM
    fn reset_registers(&mut self) {
        let vram = std::mem::take(&mut self.vram);
        *self = Self::with_vram(vram);
    }
}

impl Default for GsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Front-end notifications
pub trait GsEventListener {
    /// A display refresh (VBLANK start) happened
    fn on_vblank(&mut self, _state: &GsState) {}

    /// SCISSOR_1 (context 0) or SCISSOR_2 (context 1) was written
    fn on_scissor_changed(&mut self, _context: usize, _scissor: Scissor) {}
}

/// Geometry of the displayed frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    /// Frame buffer base (words)
    pub fbp: u32,
    /// Frame buffer width (pixels)
    pub fbw: u32,
    pub psm: u8,
    pub magh: u32,
    pub magv: u32,
    pub width: u32,
    pub height: u32,
}

/// RGBA32 copy of the displayed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayImage {
    pub width: u32,
    pub height: u32,
    /// Row-major 0xAABBGGRR pixels
    pub pixels: Vec<u32>,
}

/// The Graphics Synthesizer
///
/// # Examples
///
/// ```
/// use ps2rx::core::gs::{registers::reg, Gs};
///
/// let mut gs = Gs::new_null();
/// gs.write_register(reg::RGBAQ, 0x8000_00FF);
/// assert_eq!(gs.state().rgbaq.r, 0xFF);
/// ```
pub struct Gs {
    state: GsState,
    backend: Box<dyn RenderBackend>,
    listener: Option<Box<dyn GsEventListener>>,
    interrupt: bool,
}

impl Gs {
    pub const PMODE_ADDR: u32 = 0x1200_0000;
    pub const SMODE1_ADDR: u32 = 0x1200_0010;
    pub const SMODE2_ADDR: u32 = 0x1200_0020;
    pub const SRFSH_ADDR: u32 = 0x1200_0030;
    pub const SYNCH1_ADDR: u32 = 0x1200_0040;
    pub const SYNCH2_ADDR: u32 = 0x1200_0050;
    pub const SYNCV_ADDR: u32 = 0x1200_0060;
    pub const DISPFB1_ADDR: u32 = 0x1200_0070;
    pub const DISPLAY1_ADDR: u32 = 0x1200_0080;
    pub const DISPFB2_ADDR: u32 = 0x1200_0090;
    pub const DISPLAY2_ADDR: u32 = 0x1200_00A0;
    pub const EXTBUF_ADDR: u32 = 0x1200_00B0;
    pub const EXTDATA_ADDR: u32 = 0x1200_00C0;
    pub const EXTWRITE_ADDR: u32 = 0x1200_00D0;
    pub const BGCOLOR_ADDR: u32 = 0x1200_00E0;
    pub const CSR_ADDR: u32 = 0x1200_1000;
    pub const IMR_ADDR: u32 = 0x1200_1010;
    pub const BUSDIR_ADDR: u32 = 0x1200_1040;
    pub const SIGLBLID_ADDR: u32 = 0x1200_1080;

    /// Create a GS drawing through `backend`
    pub fn new(backend: Box<dyn RenderBackend>) -> Self {
        log::info!("GS: using {} renderer", backend.name());

        Self {
            state: GsState::new(),
            backend,
            listener: None,
            interrupt: false,
        }
    }

    /// Create a GS with the software rasterizer
    pub fn new_software() -> Self {
        Self::new(Box::new(SoftwareRenderer::new()))
    }

    /// Create a GS that draws nothing
    pub fn new_null() -> Self {
        Self::new(Box::new(NullRenderer))
    }

    pub fn state(&self) -> &GsState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GsState {
        &mut self.state
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Install the front-end listener
    pub fn set_listener(&mut self, listener: Box<dyn GsEventListener>) {
        self.listener = Some(listener);
    }

    /// Reset all registers (VRAM is kept)
    pub fn reset(&mut self) {
        self.state.reset_registers();
        self.interrupt = false;
    }

    /// Returns and clears the pending GS interrupt request
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.interrupt)
    }

    // ------------------------------------------------------------------
    // General purpose registers
    // ------------------------------------------------------------------

    /// Write a general purpose register
    ///
    /// # Arguments
    ///
    /// * `id` - Register ID (see [`registers::reg`])
    /// * `value` - 64-bit register value
    pub fn write_register(&mut self, id: u8, value: u64) {
        log::trace!("GS: reg 0x{:02X} <- 0x{:016X}", id, value);

        let state = &mut self.state;

        match id {
            reg::PRIM => {
                state.prim = Prim::from(value);
                state.vq.clear();
            }
            reg::RGBAQ => state.rgbaq = Rgbaq::from(value),
            reg::ST => {
                state.s = f32::from_bits(value as u32);
                state.t = f32::from_bits((value >> 32) as u32);
            }
            reg::UV => {
                state.u = (bits(value, 0, 14) >> 4) as i32;
                state.v = (bits(value, 16, 14) >> 4) as i32;
            }
            reg::XYZF2 => self.vertex_kick(value, true, true),
            reg::XYZ2 => self.vertex_kick(value, false, true),
            reg::XYZF3 => self.vertex_kick(value, true, false),
            reg::XYZ3 => self.vertex_kick(value, false, false),
            reg::TEX0_1 | reg::TEX0_2 => {
                state.ctx[(id - reg::TEX0_1) as usize].tex0 = Tex0::from(value)
            }
            reg::CLAMP_1 | reg::CLAMP_2 => {
                state.ctx[(id - reg::CLAMP_1) as usize].clamp = Clamp::from(value)
            }
            reg::FOG => state.fog = bits(value, 56, 8) as u8,
            reg::TEX1_1 | reg::TEX1_2 => state.ctx[(id - reg::TEX1_1) as usize].tex1 = value,
            reg::TEX2_1 | reg::TEX2_2 => state.ctx[(id - reg::TEX2_1) as usize]
                .tex0
                .apply_tex2(value),
            reg::XYOFFSET_1 | reg::XYOFFSET_2 => {
                state.ctx[(id - reg::XYOFFSET_1) as usize].xyoffset = XyOffset::from(value)
            }
            reg::PRMODECONT => state.prmodecont = value & 1 != 0,
            reg::PRMODE => state.prmode = Prim::from(value),
            reg::TEXCLUT => state.texclut = TexClut::from(value),
            reg::SCANMSK => state.scanmsk = (value & 3) as u8,
            reg::MIPTBP1_1 | reg::MIPTBP1_2 => {
                state.ctx[(id - reg::MIPTBP1_1) as usize].miptbp1 = value
            }
            reg::MIPTBP2_1 | reg::MIPTBP2_2 => {
                state.ctx[(id - reg::MIPTBP2_1) as usize].miptbp2 = value
            }
            reg::TEXA => state.texa = Texa::from(value),
            reg::FOGCOL => state.fogcol = (value & 0xFF_FFFF) as u32,
            reg::TEXFLUSH => {}
            reg::SCISSOR_1 | reg::SCISSOR_2 => {
                let context = (id - reg::SCISSOR_1) as usize;
                let scissor = Scissor::from(value);
                state.ctx[context].scissor = scissor;

                if let Some(listener) = self.listener.as_mut() {
                    listener.on_scissor_changed(context, scissor);
                }
            }
            reg::ALPHA_1 | reg::ALPHA_2 => {
                state.ctx[(id - reg::ALPHA_1) as usize].alpha = Alpha::from(value)
            }
            reg::DIMX => state.dimx = value,
            reg::DTHE => state.dthe = value & 1 != 0,
            reg::COLCLAMP => state.colclamp = value & 1 != 0,
            reg::TEST_1 | reg::TEST_2 => {
                state.ctx[(id - reg::TEST_1) as usize].test = Test::from(value)
            }
            reg::PABE => state.pabe = value & 1 != 0,
            reg::FBA_1 | reg::FBA_2 => state.ctx[(id - reg::FBA_1) as usize].fba = value & 1 != 0,
            reg::FRAME_1 | reg::FRAME_2 => {
                state.ctx[(id - reg::FRAME_1) as usize].frame = Frame::from(value)
            }
            reg::ZBUF_1 | reg::ZBUF_2 => {
                state.ctx[(id - reg::ZBUF_1) as usize].zbuf = Zbuf::from(value)
            }
            reg::BITBLTBUF => state.bitbltbuf = value,
            reg::TRXPOS => state.trxpos = value,
            reg::TRXREG => state.trxreg = value,
            reg::TRXDIR => {
                state.trxdir = value;
                self.backend.transfer_start(&mut self.state);
            }
            reg::HWREG => {
                state.hwreg = value;
                self.backend.transfer_write(&mut self.state);
            }
            reg::SIGNAL => {
                let regs = &mut state.privileged;
                let (id, mask) = (value & 0xFFFF_FFFF, value >> 32);
                regs.siglblid = (regs.siglblid & !mask) | (id & mask);
                regs.csr |= csr::SIGNAL;

                if regs.imr & imr::SIGMSK == 0 {
                    self.interrupt = true;
                }
            }
            reg::FINISH => {
                let regs = &mut state.privileged;
                regs.csr |= csr::FINISH;

                if regs.imr & imr::FINISHMSK == 0 {
                    self.interrupt = true;
                }
            }
            reg::LABEL => {
                let regs = &mut state.privileged;
                let (id, mask) = ((value & 0xFFFF_FFFF) << 32, (value >> 32) << 32);
                regs.siglblid = (regs.siglblid & !mask) | (id & mask);
            }
            _ => log::warn!("GS: write to unknown register 0x{:02X} = 0x{:016X}", id, value),
        }
    }

    /// Read HWREG (local-to-host transfer data)
    pub fn read_hwreg(&mut self) -> u64 {
        self.backend.transfer_read(&mut self.state);
        self.state.hwreg
    }

    fn vertex_kick(&mut self, value: u64, with_fog: bool, draw: bool) {
        let state = &mut self.state;

        let vertex = Vertex {
            x: (bits(value, 0, 16) >> 4) as i32,
            y: (bits(value, 16, 16) >> 4) as i32,
            z: if with_fog {
                bits(value, 32, 24) as u32
            } else {
                (value >> 32) as u32
            },
            fog: if with_fog {
                bits(value, 56, 8) as u8
            } else {
                state.fog
            },
            color: state.rgbaq,
            s: state.s,
            t: state.t,
            u: state.u,
            v: state.v,
        };

        let kind = state.prim.kind;
        let needed = state.prim.vertex_count();
        if needed == 0 {
            log::warn!("GS: vertex kick with reserved primitive kind {}", kind);
            return;
        }

        state.vq.push(vertex);
        if state.vq.len() < needed {
            return;
        }

        if draw {
            match kind {
                prim_kind::POINT => self.backend.render_point(&mut self.state),
                prim_kind::LINE | prim_kind::LINE_STRIP => {
                    self.backend.render_line(&mut self.state)
                }
                prim_kind::SPRITE => self.backend.render_sprite(&mut self.state),
                _ => self.backend.render_triangle(&mut self.state),
            }
        }

        self.state.vq.advance(kind);
    }

    // ------------------------------------------------------------------
    // Privileged registers
    // ------------------------------------------------------------------

    fn privileged_slot(&mut self, addr: u32) -> Option<&mut u64> {
        let regs = &mut self.state.privileged;

        let slot = match addr & !0xF {
            Self::PMODE_ADDR => &mut regs.pmode,
            Self::SMODE1_ADDR => &mut regs.smode1,
            Self::SMODE2_ADDR => &mut regs.smode2,
            Self::SRFSH_ADDR => &mut regs.srfsh,
            Self::SYNCH1_ADDR => &mut regs.synch1,
            Self::SYNCH2_ADDR => &mut regs.synch2,
            Self::SYNCV_ADDR => &mut regs.syncv,
            Self::DISPFB1_ADDR => &mut regs.dispfb1,
            Self::DISPLAY1_ADDR => &mut regs.display1,
            Self::DISPFB2_ADDR => &mut regs.dispfb2,
            Self::DISPLAY2_ADDR => &mut regs.display2,
            Self::EXTBUF_ADDR => &mut regs.extbuf,
            Self::EXTDATA_ADDR => &mut regs.extdata,
            Self::EXTWRITE_ADDR => &mut regs.extwrite,
            Self::BGCOLOR_ADDR => &mut regs.bgcolor,
            Self::CSR_ADDR => &mut regs.csr,
            Self::IMR_ADDR => &mut regs.imr,
            Self::BUSDIR_ADDR => &mut regs.busdir,
            Self::SIGLBLID_ADDR => &mut regs.siglblid,
            _ => return None,
        };

        Some(slot)
    }

    /// Read a 64-bit privileged register
    pub fn read_privileged64(&mut self, addr: u32) -> u64 {
        let is_csr = addr & !0xF == Self::CSR_ADDR;

        match self.privileged_slot(addr) {
            Some(value) if is_csr => *value | csr::REVISION,
            Some(value) => *value,
            None => {
                log::warn!("GS: read from unknown privileged register 0x{:08X}", addr);
                0
            }
        }
    }

    /// Write a 64-bit privileged register
    pub fn write_privileged64(&mut self, addr: u32, value: u64) {
        log::trace!("GS: priv 0x{:08X} <- 0x{:016X}", addr, value);

        if addr & !0xF == Self::CSR_ADDR {
            self.write_csr(value);
            return;
        }

        match self.privileged_slot(addr) {
            Some(slot) => *slot = value,
            None => log::warn!(
                "GS: write to unknown privileged register 0x{:08X} = 0x{:016X}",
                addr,
                value
            ),
        }
    }

    fn write_csr(&mut self, value: u64) {
        if value & csr::RESET != 0 {
            log::debug!("GS: reset via CSR");
            let imr = self.state.privileged.imr;
            self.reset();
            self.state.privileged.imr = imr;
            return;
        }

        let clear = value & (csr::SIGNAL | csr::FINISH | csr::HSINT | csr::VSINT | csr::EDWINT);
        self.state.privileged.csr &= !clear;
    }

    // ------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------

    /// Start of vertical blank: flip FIELD, raise VSINT, notify and present
    pub fn vblank(&mut self) {
        let regs = &mut self.state.privileged;
        regs.csr ^= csr::FIELD;
        regs.csr |= csr::VSINT;

        if regs.imr & imr::VSMSK == 0 {
            self.interrupt = true;
        }

        if let Some(listener) = self.listener.as_mut() {
            listener.on_vblank(&self.state);
        }

        self.backend.present(&self.state);
    }

    /// Geometry of the enabled read circuit (circuit 1 wins over circuit 2)
    ///
    /// # Returns
    ///
    /// `None` when PMODE enables neither circuit
    pub fn display_info(&self) -> Option<DisplayInfo> {
        let regs = &self.state.privileged;

        let (display, dispfb) = if regs.pmode & 1 != 0 {
            (regs.display1, regs.dispfb1)
        } else if regs.pmode & 2 != 0 {
            (regs.display2, regs.dispfb2)
        } else {
            return None;
        };

        let magh = bits(display, 23, 3) as u32 + 1;
        let magv = bits(display, 27, 2) as u32 + 1;
        let dw = bits(display, 32, 12) as u32;
        let dh = bits(display, 44, 11) as u32;

        let (width, height) = if dw == 0 {
            (0, 0)
        } else {
            (dw / magh + 1, dh / magv + 1)
        };

        Some(DisplayInfo {
            fbp: (bits(dispfb, 0, 9) as u32) << 11,
            fbw: bits(dispfb, 9, 6) as u32 * 64,
            psm: bits(dispfb, 15, 5) as u8,
            magh,
            magv,
            width,
            height,
        })
    }

    /// Convert the displayed frame buffer to RGBA32
    pub fn capture_display(&self) -> Option<DisplayImage> {
        let info = self.display_info()?;
        if info.width == 0 || info.height == 0 {
            return None;
        }

        let vram = &self.state.vram;
        let mut pixels = Vec::with_capacity((info.width * info.height) as usize);

        for y in 0..info.height {
            for x in 0..info.width {
                let raw = if format::is_16bit(info.psm) {
                    let word = vram[((info.fbp + (x + y * info.fbw) / 2) & 0xF_FFFF) as usize];
                    (word >> ((x & 1) * 16)) & 0xFFFF
                } else {
                    vram[((info.fbp + x + y * info.fbw) & 0xF_FFFF) as usize]
                };

                pixels.push(format::to_rgba32(raw, info.psm, info.psm));
            }
        }

        Some(DisplayImage {
            width: info.width,
            height: info.height,
            pixels,
        })
    }
}

impl IoDevice for Gs {
    fn name(&self) -> &'static str {
        "GS"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        let value = self.read_privileged64(addr & !7);
        if addr & 4 != 0 {
            (value >> 32) as u32
        } else {
            value as u32
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        let base = addr & !7;
        let upper = addr & 4 != 0;

        if base & !0xF == Self::CSR_ADDR {
            let shift = if upper { 32 } else { 0 };
            self.write_csr((value as u64) << shift);
            return;
        }

        let current = self.privileged_slot(base).map(|slot| *slot).unwrap_or(0);
        let merged = if upper {
            (current & 0xFFFF_FFFF) | ((value as u64) << 32)
        } else {
            (current & !0xFFFF_FFFF) | value as u64
        };
        self.write_privileged64(base, merged);
    }

    fn read64(&mut self, addr: u32) -> u64 {
        self.read_privileged64(addr)
    }

    fn write64(&mut self, addr: u32, value: u64) {
        self.write_privileged64(addr, value);
    }
}
