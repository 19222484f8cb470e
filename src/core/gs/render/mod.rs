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

//! GS render backends
//!
//! The GS register file owns all drawing state; a backend turns kicked
//! primitives and BITBLT traffic into VRAM updates. Two backends exist:
//!
//! - [`SoftwareRenderer`]: rasterizes into VRAM on the CPU
//! - [`NullRenderer`]: accepts everything and draws nothing
//!
//! Backends receive the whole [`GsState`] for each call. The vertices of the
//! primitive being drawn are `state.vq.vertices()`.

pub mod format;
mod line;
pub mod pixel;
mod software;
mod sprite;
mod transfer;
mod triangle;

pub use pixel::{Fragment, PixelPipeline, TestResult, VRAM_WORDS};
pub use software::SoftwareRenderer;
pub use transfer::TransferState;

use super::GsState;

/// Drawing and transfer entry points invoked by the GS register file
pub trait RenderBackend {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Draw `state.vq` as a point
    fn render_point(&mut self, state: &mut GsState);

    /// Draw `state.vq` as a line
    fn render_line(&mut self, state: &mut GsState);

    /// Draw `state.vq` as a triangle
    fn render_triangle(&mut self, state: &mut GsState);

    /// Draw `state.vq` as a sprite
    fn render_sprite(&mut self, state: &mut GsState);

    /// Begin a transfer described by BITBLTBUF/TRXPOS/TRXREG/TRXDIR
    fn transfer_start(&mut self, state: &mut GsState);

    /// Consume the 64-bit payload in `state.hwreg` (host to local)
    fn transfer_write(&mut self, state: &mut GsState);

    /// Produce the next 64-bit payload into `state.hwreg` (local to host)
    fn transfer_read(&mut self, state: &mut GsState);

    /// Called once per VBLANK with the finished frame
    fn present(&mut self, _state: &GsState) {}
}

/// Backend that discards all drawing
#[derive(Debug, Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn name(&self) -> &'static str {
        "null"
    }

    fn render_point(&mut self, _state: &mut GsState) {}

    fn render_line(&mut self, _state: &mut GsState) {}

    fn render_triangle(&mut self, _state: &mut GsState) {}

    fn render_sprite(&mut self, _state: &mut GsState) {}

    fn transfer_start(&mut self, _state: &mut GsState) {}

    fn transfer_write(&mut self, _state: &mut GsState) {}

    fn transfer_read(&mut self, state: &mut GsState) {
        state.hwreg = 0;
    }
}
