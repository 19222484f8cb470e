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

//! Sprite rasterization
//!
//! Sprites are axis-aligned boxes spanned by two vertices. The upper bounds
//! are exclusive. Depth, colour and fog come from the second vertex; texture
//! coordinates run linearly from the first vertex to the second.

use super::pixel::{Fragment, PixelPipeline};
use super::software::SoftwareRenderer;
use crate::core::gs::GsState;

/// Fraction of the way from `from` to `to` at `p`
#[inline(always)]
fn progress(p: i32, from: i32, to: i32) -> f32 {
    if from == to {
        0.0
    } else {
        (p - from) as f32 / (to - from) as f32
    }
}

impl SoftwareRenderer {
    pub(super) fn draw_sprite(&mut self, state: &mut GsState) {
        let vq = state.vq.vertices();
        let (v0, v1) = (vq[0], vq[1]);

        let mut pipeline = PixelPipeline::new(state);
        let offset = pipeline.ctx.xyoffset;
        let scissor = pipeline.ctx.scissor;
        let attrs = pipeline.attrs;

        let (x0, y0) = (v0.x - offset.x, v0.y - offset.y);
        let (x1, y1) = (v1.x - offset.x, v1.y - offset.y);

        // Clip to the scissor up front; the per-pixel test still runs
        let xmin = x0.min(x1).max(scissor.x0);
        let ymin = y0.min(y1).max(scissor.y0);
        let xmax = x0.max(x1).min(scissor.x1 + 1);
        let ymax = y0.max(y1).min(scissor.y1 + 1);

        log::trace!(
            "GS: sprite ({},{})-({},{}) color=0x{:08X} z=0x{:08X}",
            xmin,
            ymin,
            xmax,
            ymax,
            v1.color.to_rgba32(),
            v1.z
        );

        let color = v1.color.to_rgba32();
        let z = v1.z;

        for y in ymin..ymax {
            let ty = progress(y, y0, y1);

            for x in xmin..xmax {
                let texel = if attrs.tme {
                    let tx = progress(x, x0, x1);
                    Some(pipeline.texel_coords(
                        v0.s + (v1.s - v0.s) * tx,
                        v0.t + (v1.t - v0.t) * ty,
                        v1.color.q,
                        v0.u as f32 + (v1.u - v0.u) as f32 * tx,
                        v0.v as f32 + (v1.v - v0.v) as f32 * ty,
                    ))
                } else {
                    None
                };

                let result = pipeline.draw(Fragment {
                    x,
                    y,
                    z,
                    color: pipeline.shade(color, texel, v1.fog),
                });
                self.count(result);
            }
        }
    }
}
