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

//! Triangle rasterization
//!
//! Half-space rasterizer over the scissored bounding box. Edge functions are
//! stepped incrementally per pixel and per row; a bias of -1 on edges that are
//! not top-left keeps shared edges from being filled twice.
//!
//! # References
//!
//! - [Fabian Giesen: The barycentric conspiracy](https://fgiesen.wordpress.com/2013/02/06/the-barycentric-conspirac/)

use super::pixel::{Fragment, PixelPipeline};
use super::software::SoftwareRenderer;
use crate::core::gs::registers::Vertex;
use crate::core::gs::GsState;

/// Twice the signed area of (a, b, c)
#[inline(always)]
pub(super) fn edge(a: (i32, i32), b: (i32, i32), c: (i32, i32)) -> i32 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

#[inline(always)]
fn is_top_left(a: (i32, i32), b: (i32, i32)) -> bool {
    b.1 > a.1 || (a.1 == b.1 && b.0 < a.0)
}

impl SoftwareRenderer {
    pub(super) fn draw_triangle(&mut self, state: &mut GsState) {
        let vq = state.vq.vertices();
        let (v0, mut v1, mut v2) = (vq[0], vq[1], vq[2]);

        if edge((v0.x, v0.y), (v1.x, v1.y), (v2.x, v2.y)) < 0 {
            std::mem::swap(&mut v1, &mut v2);
        }

        let mut pipeline = PixelPipeline::new(state);
        let offset = pipeline.ctx.xyoffset;
        let scissor = pipeline.ctx.scissor;

        let p0 = (v0.x - offset.x, v0.y - offset.y);
        let p1 = (v1.x - offset.x, v1.y - offset.y);
        let p2 = (v2.x - offset.x, v2.y - offset.y);

        let area = edge(p0, p1, p2);
        if area == 0 {
            return;
        }

        let xmin = p0.0.min(p1.0).min(p2.0).max(scissor.x0);
        let ymin = p0.1.min(p1.1).min(p2.1).max(scissor.y0);
        let xmax = p0.0.max(p1.0).max(p2.0).min(scissor.x1);
        let ymax = p0.1.max(p1.1).max(p2.1).min(scissor.y1);

        if xmin > xmax || ymin > ymax {
            return;
        }

        log::trace!(
            "GS: triangle ({},{}) ({},{}) ({},{}) bbox=({},{})-({},{})",
            p0.0,
            p0.1,
            p1.0,
            p1.1,
            p2.0,
            p2.1,
            xmin,
            ymin,
            xmax,
            ymax
        );

        // Per-pixel steps
        let (a01, b01) = (p0.1 - p1.1, p1.0 - p0.0);
        let (a12, b12) = (p1.1 - p2.1, p2.0 - p1.0);
        let (a20, b20) = (p2.1 - p0.1, p0.0 - p2.0);

        let bias0 = if is_top_left(p1, p2) { 0 } else { -1 };
        let bias1 = if is_top_left(p2, p0) { 0 } else { -1 };
        let bias2 = if is_top_left(p0, p1) { 0 } else { -1 };

        let start = (xmin, ymin);
        let mut w0_row = edge(p1, p2, start) + bias0;
        let mut w1_row = edge(p2, p0, start) + bias1;
        let mut w2_row = edge(p0, p1, start) + bias2;

        let area = area as f32;
        let attrs = pipeline.attrs;

        for y in ymin..=ymax {
            let (mut w0, mut w1, mut w2) = (w0_row, w1_row, w2_row);

            for x in xmin..=xmax {
                if (w0 | w1 | w2) >= 0 {
                    let weights = [w0 as f32 / area, w1 as f32 / area, w2 as f32 / area];
                    let fragment = interpolate(&pipeline, [&v0, &v1, &v2], weights, x, y, attrs.iip);
                    let result = pipeline.draw(fragment);
                    self.count(result);
                }

                w0 += a12;
                w1 += a20;
                w2 += a01;
            }

            w0_row += b12;
            w1_row += b20;
            w2_row += b01;
        }
    }
}

/// Build the shaded fragment at (x, y) from barycentric weights
#[inline]
fn interpolate(
    pipeline: &PixelPipeline,
    v: [&Vertex; 3],
    w: [f32; 3],
    x: i32,
    y: i32,
    gouraud: bool,
) -> Fragment {
    let lerp = |f: fn(&Vertex) -> f32| f(v[0]) * w[0] + f(v[1]) * w[1] + f(v[2]) * w[2];

    let color = if gouraud {
        let r = lerp(|v| v.color.r as f32) as u32;
        let g = lerp(|v| v.color.g as f32) as u32;
        let b = lerp(|v| v.color.b as f32) as u32;
        let a = lerp(|v| v.color.a as f32) as u32;
        r.min(255) | (g.min(255) << 8) | (b.min(255) << 16) | (a.min(255) << 24)
    } else {
        v[2].color.to_rgba32()
    };

    let texel = if pipeline.attrs.tme {
        Some(pipeline.texel_coords(
            lerp(|v| v.s),
            lerp(|v| v.t),
            lerp(|v| v.color.q),
            lerp(|v| v.u as f32),
            lerp(|v| v.v as f32),
        ))
    } else {
        None
    };

    let fog = lerp(|v| v.fog as f32).clamp(0.0, 255.0) as u8;

    let z = v[0].z as f64 * w[0] as f64 + v[1].z as f64 * w[1] as f64 + v[2].z as f64 * w[2] as f64;

    Fragment {
        x,
        y,
        z: z.clamp(0.0, u32::MAX as f64) as u32,
        color: pipeline.shade(color, texel, fog),
    }
}
