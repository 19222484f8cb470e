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

//! Line rasterization (DDA, last pixel excluded)

use super::pixel::{Fragment, PixelPipeline};
use super::software::SoftwareRenderer;
use crate::core::gs::GsState;

#[inline(always)]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

impl SoftwareRenderer {
    pub(super) fn draw_line(&mut self, state: &mut GsState) {
        let vq = state.vq.vertices();
        let (v0, v1) = (vq[0], vq[1]);

        let mut pipeline = PixelPipeline::new(state);
        let offset = pipeline.ctx.xyoffset;
        let attrs = pipeline.attrs;

        let (x0, y0) = (v0.x - offset.x, v0.y - offset.y);
        let (x1, y1) = (v1.x - offset.x, v1.y - offset.y);

        let dx = x1 - x0;
        let dy = y1 - y0;
        let steps = dx.abs().max(dy.abs());

        if steps == 0 {
            return;
        }

        let flat = v1.color.to_rgba32();

        for i in 0..steps {
            let t = i as f32 / steps as f32;
            let x = x0 + (dx as f32 * t).round() as i32;
            let y = y0 + (dy as f32 * t).round() as i32;

            let color = if attrs.iip {
                let channel = |a: u8, b: u8| lerp(a as f32, b as f32, t).clamp(0.0, 255.0) as u32;
                channel(v0.color.r, v1.color.r)
                    | (channel(v0.color.g, v1.color.g) << 8)
                    | (channel(v0.color.b, v1.color.b) << 16)
                    | (channel(v0.color.a, v1.color.a) << 24)
            } else {
                flat
            };

            let texel = if attrs.tme {
                Some(pipeline.texel_coords(
                    lerp(v0.s, v1.s, t),
                    lerp(v0.t, v1.t, t),
                    lerp(v0.color.q, v1.color.q, t),
                    lerp(v0.u as f32, v1.u as f32, t),
                    lerp(v0.v as f32, v1.v as f32, t),
                ))
            } else {
                None
            };

            let fog = lerp(v0.fog as f32, v1.fog as f32, t) as u8;
            let z = v0.z as f64 + (v1.z as f64 - v0.z as f64) * t as f64;

            let result = pipeline.draw(Fragment {
                x,
                y,
                z: z as u32,
                color: pipeline.shade(color, texel, fog),
            });
            self.count(result);
        }
    }
}
