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

//! Software rasterizer backend

use super::pixel::{Fragment, PixelPipeline, TestResult};
use super::transfer::TransferState;
use super::RenderBackend;
use crate::core::gs::GsState;

/// CPU rasterizer drawing straight into GS VRAM
///
/// # Examples
///
/// ```
/// use ps2rx::core::gs::{registers::reg, Gs};
///
/// let mut gs = Gs::new_software();
/// gs.write_register(reg::FRAME_1, 10 << 16); // 640 pixels wide, PSMCT32
/// gs.write_register(reg::SCISSOR_1, (479 << 48) | (639 << 16));
/// gs.write_register(reg::ZBUF_1, 1 << 32); // depth writes masked
/// gs.write_register(reg::PRIM, 0); // point
/// gs.write_register(reg::RGBAQ, 0x80FF_0000);
/// gs.write_register(reg::XYZ2, (2 << 4) << 16 | (1 << 4));
///
/// assert_eq!(gs.state().vram[2 * 640 + 1], 0x80FF_0000);
/// ```
#[derive(Debug, Default)]
pub struct SoftwareRenderer {
    /// Active BITBLT transfer
    pub(super) transfer: TransferState,

    /// Fragments that reached a buffer since creation
    pub(super) pixels: u64,
}

impl SoftwareRenderer {
    /// Create a new software renderer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fragments written so far
    pub fn pixels_drawn(&self) -> u64 {
        self.pixels
    }

    /// Count a fragment unless every test failed
    #[inline(always)]
    pub(super) fn count(&mut self, result: TestResult) {
        if result != TestResult::Fail {
            self.pixels += 1;
        }
    }

    fn draw_point(&mut self, state: &mut GsState) {
        let vertex = state.vq.vertices()[0];
        let mut pipeline = PixelPipeline::new(state);
        let offset = pipeline.ctx.xyoffset;

        let texel = if pipeline.attrs.tme {
            Some(pipeline.texel_coords(
                vertex.s,
                vertex.t,
                vertex.color.q,
                vertex.u as f32,
                vertex.v as f32,
            ))
        } else {
            None
        };
        let color = pipeline.shade(vertex.color.to_rgba32(), texel, vertex.fog);

        let result = pipeline.draw(Fragment {
            x: vertex.x - offset.x,
            y: vertex.y - offset.y,
            z: vertex.z,
            color,
        });
        self.count(result);
    }
}

impl RenderBackend for SoftwareRenderer {
    fn name(&self) -> &'static str {
        "software"
    }

    fn render_point(&mut self, state: &mut GsState) {
        self.draw_point(state);
    }

    fn render_line(&mut self, state: &mut GsState) {
        self.draw_line(state);
    }

    fn render_triangle(&mut self, state: &mut GsState) {
        self.draw_triangle(state);
    }

    fn render_sprite(&mut self, state: &mut GsState) {
        self.draw_sprite(state);
    }

    fn transfer_start(&mut self, state: &mut GsState) {
        self.transfer = TransferState::start(state.bitbltbuf, state.trxpos, state.trxreg, state.trxdir);

        log::debug!(
            "GS: transfer xdir={} dbp=0x{:05X} dbw={} dpsm=0x{:02X} dsa=({},{}) rr=({},{})",
            self.transfer.xdir,
            self.transfer.dbp,
            self.transfer.dbw,
            self.transfer.dpsm,
            self.transfer.dsax,
            self.transfer.dsay,
            self.transfer.rrw,
            self.transfer.rrh
        );

        if self.transfer.xdir == 2 {
            self.transfer.blit(&mut state.vram);
        }
    }

    fn transfer_write(&mut self, state: &mut GsState) {
        self.transfer.write(&mut state.vram, state.hwreg);
    }

    fn transfer_read(&mut self, state: &mut GsState) {
        state.hwreg = self.transfer.read(&state.vram);
    }
}
