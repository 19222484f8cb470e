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

//! Pixel format conversion
//!
//! All colour math inside the rasterizer happens on packed `0xAABBGGRR`
//! values. These helpers convert between that representation and the
//! storage format of a buffer.

use crate::core::gs::registers::psm;

/// Returns true for formats stored as 16-bit half-words
#[inline(always)]
pub fn is_16bit(format: u8) -> bool {
    matches!(
        format,
        psm::PSMCT16 | psm::PSMCT16S | psm::PSMZ16 | psm::PSMZ16S
    )
}

/// Returns true for CLUT-indexed texture formats
#[inline(always)]
pub fn is_indexed(format: u8) -> bool {
    matches!(
        format,
        psm::PSMT8 | psm::PSMT4 | psm::PSMT8H | psm::PSMT4HL | psm::PSMT4HH
    )
}

/// Convert a stored pixel to RGBA32
///
/// Indexed formats are converted through `clut_format`, the format of the
/// CLUT entry the index resolved to.
///
/// # Arguments
///
/// * `c` - Raw pixel value as stored in VRAM
/// * `format` - Storage format of `c`
/// * `clut_format` - CLUT storage format (used by indexed formats only)
pub fn to_rgba32(c: u32, format: u8, clut_format: u8) -> u32 {
    match format {
        psm::PSMCT32 | psm::PSMZ32 => c,
        psm::PSMCT24 | psm::PSMZ24 => c | 0xFF00_0000,
        psm::PSMCT16 | psm::PSMCT16S | psm::PSMZ16 | psm::PSMZ16S => {
            ((c & 0x001F) << 3)
                | ((c & 0x03E0) << 6)
                | ((c & 0x7C00) << 9)
                | if c & 0x8000 != 0 { 0xFF00_0000 } else { 0 }
        }
        f if is_indexed(f) && !is_indexed(clut_format) => to_rgba32(c, clut_format, psm::PSMCT32),
        _ => 0,
    }
}

/// Convert an RGBA32 colour to a storage format
pub fn from_rgba32(c: u32, format: u8, clut_format: u8) -> u32 {
    match format {
        psm::PSMCT32 | psm::PSMZ32 => c,
        psm::PSMCT24 | psm::PSMZ24 => c & 0x00FF_FFFF,
        psm::PSMCT16 | psm::PSMCT16S | psm::PSMZ16 | psm::PSMZ16S => {
            ((c & 0x0000_00F8) >> 3)
                | ((c & 0x0000_F800) >> 6)
                | ((c & 0x00F8_0000) >> 9)
                | if c & 0x8000_0000 != 0 { 0x8000 } else { 0 }
        }
        f if is_indexed(f) && !is_indexed(clut_format) => {
            from_rgba32(c, clut_format, psm::PSMCT32)
        }
        _ => 0,
    }
}

/// Convert a buffer width in pixels to a row stride in words
pub fn pixels_to_words(format: u8, width: u32) -> u32 {
    match format {
        psm::PSMCT16 | psm::PSMCT16S | psm::PSMZ16 | psm::PSMZ16S => width >> 1,
        psm::PSMT8 => width >> 2,
        psm::PSMT4 => width >> 3,
        _ => width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ct24_forces_opaque_alpha() {
        assert_eq!(to_rgba32(0x0012_3456, psm::PSMCT24, 0), 0xFF12_3456);
        assert_eq!(from_rgba32(0x8012_3456, psm::PSMCT24, 0), 0x0012_3456);
    }

    #[test]
    fn test_ct16_expansion() {
        // r=31 g=0 b=31 a=1
        assert_eq!(to_rgba32(0xFC1F, psm::PSMCT16, 0), 0xFFF8_00F8);
        assert_eq!(to_rgba32(0x03E0, psm::PSMCT16, 0), 0x0000_F800);
    }

    #[test]
    fn test_indexed_formats_use_clut_format() {
        assert_eq!(to_rgba32(0x8000, psm::PSMT8, psm::PSMCT16), 0xFF00_0000);
        assert_eq!(to_rgba32(0x1234_5678, psm::PSMT4, psm::PSMCT32), 0x1234_5678);
    }

    #[test]
    fn test_pixels_to_words() {
        assert_eq!(pixels_to_words(psm::PSMCT32, 640), 640);
        assert_eq!(pixels_to_words(psm::PSMCT16, 640), 320);
        assert_eq!(pixels_to_words(psm::PSMT8, 640), 160);
        assert_eq!(pixels_to_words(psm::PSMT4, 640), 80);
    }

    proptest! {
        #[test]
        fn prop_ct32_round_trip(c in any::<u32>()) {
            prop_assert_eq!(from_rgba32(to_rgba32(c, psm::PSMCT32, 0), psm::PSMCT32, 0), c);
        }

        #[test]
        fn prop_ct16_round_trip(c in 0u32..0x10000) {
            prop_assert_eq!(from_rgba32(to_rgba32(c, psm::PSMCT16, 0), psm::PSMCT16, 0), c);
            prop_assert_eq!(from_rgba32(to_rgba32(c, psm::PSMCT16S, 0), psm::PSMCT16S, 0), c);
        }

        #[test]
        fn prop_ct24_round_trip_keeps_rgb(c in 0u32..0x0100_0000) {
            prop_assert_eq!(from_rgba32(to_rgba32(c, psm::PSMCT24, 0), psm::PSMCT24, 0), c);
        }
    }
}
