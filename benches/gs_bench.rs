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

use criterion::{criterion_group, criterion_main, Criterion};
use ps2rx::core::gs::registers::{prim_kind, reg};
use ps2rx::core::gs::Gs;
use std::hint::black_box;

fn create_bench_gs() -> Gs {
    let mut gs = Gs::new_software();
    gs.write_register(reg::FRAME_1, 10 << 16);
    gs.write_register(reg::ZBUF_1, 160);
    gs.write_register(reg::SCISSOR_1, (479 << 48) | (639 << 16));
    gs
}

fn xyz(x: u64, y: u64) -> u64 {
    ((y << 4) << 16) | (x << 4)
}

fn triangle(c: &mut Criterion) {
    let mut gs = create_bench_gs();

    c.bench_function("gs::triangle_flat", |b| {
        b.iter(|| {
            gs.write_register(reg::PRIM, prim_kind::TRIANGLE as u64);
            gs.write_register(reg::RGBAQ, 0x8040_2010);
            gs.write_register(reg::XYZ2, black_box(xyz(10, 10)));
            gs.write_register(reg::XYZ2, black_box(xyz(300, 40)));
            gs.write_register(reg::XYZ2, black_box(xyz(120, 250)));
        })
    });

    let mut gs = create_bench_gs();

    c.bench_function("gs::triangle_gouraud", |b| {
        b.iter(|| {
            gs.write_register(reg::PRIM, prim_kind::TRIANGLE as u64 | (1 << 3));
            gs.write_register(reg::RGBAQ, 0x80FF_0000);
            gs.write_register(reg::XYZ2, black_box(xyz(10, 10)));
            gs.write_register(reg::RGBAQ, 0x8000_FF00);
            gs.write_register(reg::XYZ2, black_box(xyz(300, 40)));
            gs.write_register(reg::RGBAQ, 0x8000_00FF);
            gs.write_register(reg::XYZ2, black_box(xyz(120, 250)));
        })
    });
}

fn sprite(c: &mut Criterion) {
    let mut gs = create_bench_gs();

    c.bench_function("gs::sprite_full_screen", |b| {
        b.iter(|| {
            gs.write_register(reg::PRIM, prim_kind::SPRITE as u64);
            gs.write_register(reg::RGBAQ, 0x8080_8080);
            gs.write_register(reg::XYZ2, black_box(xyz(0, 0)));
            gs.write_register(reg::XYZ2, black_box(xyz(640, 480)));
        })
    });
}

fn upload(c: &mut Criterion) {
    let mut gs = create_bench_gs();

    c.bench_function("gs::upload_64x64_ct32", |b| {
        b.iter(|| {
            gs.write_register(reg::BITBLTBUF, (1 << 48) | (0x800u64 << 32));
            gs.write_register(reg::TRXPOS, 0);
            gs.write_register(reg::TRXREG, (64 << 32) | 64);
            gs.write_register(reg::TRXDIR, 0);
            for i in 0..(64 * 64 / 2) {
                gs.write_register(reg::HWREG, black_box(i));
            }
        })
    });
}

criterion_group!(benches, triangle, sprite, upload);
criterion_main!(benches);
