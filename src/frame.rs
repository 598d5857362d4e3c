// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Tiling a grid of blocks into a raw RGB pixel buffer, and sampling it back.

use crate::constants::COLOR_CHANNELS;
use crate::packer::BlockIndices;
use crate::quantize::Lut;

/// Geometry shared by every frame in a stream: pixel dimensions and block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Side length of a square block, in pixels.
    pub block_size: u8,
}

impl Geometry {
    /// Number of full blocks across the frame's width.
    #[must_use]
    pub fn grid_w(&self) -> u32 {
        self.width / u32::from(self.block_size)
    }

    /// Number of full blocks down the frame's height.
    #[must_use]
    pub fn grid_h(&self) -> u32 {
        self.height / u32::from(self.block_size)
    }

    /// Total number of blocks in the grid.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.grid_w() as usize * self.grid_h() as usize
    }

    /// Number of raw RGB bytes in one frame (`width * height * 3`).
    #[must_use]
    pub fn frame_byte_len(&self) -> usize {
        self.width as usize * self.height as usize * COLOR_CHANNELS
    }

    /// Number of payload bytes a single data frame carries, given `bpc`.
    #[must_use]
    pub fn bytes_per_frame(&self, bpc: u32) -> usize {
        (self.block_count() * 3 * bpc as usize) / 8
    }
}

/// Renders `blocks` (row-major, `grid_w * grid_h` long, each a level-index
/// triple) into a raw RGB pixel buffer using `levels` to look up the actual
/// intensity for each index. Pixels outside full blocks (partial-block
/// margins) are left zero.
///
/// # Panics
/// Panics if `blocks.len()` does not equal `geometry.block_count()`.
pub fn render_frame(geometry: &Geometry, levels: &[u8], blocks: &[BlockIndices]) -> Vec<u8> {
    assert_eq!(blocks.len(), geometry.block_count());

    let bs = u32::from(geometry.block_size);
    let width = geometry.width as usize;
    let grid_w = geometry.grid_w() as usize;
    let mut frame = vec![0u8; geometry.frame_byte_len()];

    for gy in 0..geometry.grid_h() as usize {
        let mut row = vec![0u8; width * COLOR_CHANNELS];
        let base = gy * grid_w;
        for gx in 0..grid_w {
            let (ri, gi, bi) = blocks[base + gx];
            let (r, g, b) = (levels[ri as usize], levels[gi as usize], levels[bi as usize]);
            let off = gx * bs as usize * COLOR_CHANNELS;
            for px in 0..bs as usize {
                let p = off + px * COLOR_CHANNELS;
                row[p] = r;
                row[p + 1] = g;
                row[p + 2] = b;
            }
        }

        for py in (gy * bs as usize)..((gy * bs as usize + bs as usize).min(geometry.height as usize)) {
            let start = py * width * COLOR_CHANNELS;
            frame[start..start + row.len()].copy_from_slice(&row);
        }
    }

    frame
}

/// Samples `frame` at each block's center (averaging a small symmetric
/// neighbourhood: `+-2` for `bs >= 6`, `+-1` for `bs >= 4`, exact center
/// otherwise), quantizes each channel through `lut`, and returns the
/// resulting level-index triples in row-major block order.
///
/// # Panics
/// Panics if `frame.len()` does not equal `geometry.frame_byte_len()`.
pub fn sample_frame(geometry: &Geometry, frame: &[u8], lut: &Lut) -> Vec<BlockIndices> {
    sample_frame_adjusted(geometry, frame, lut, lut, lut)
}

/// As `sample_frame`, but using independent LUTs per channel. Used when a
/// calibration-adjusted LUT has been built for each of red/green/blue.
///
/// # Panics
/// Panics if `frame.len()` does not equal `geometry.frame_byte_len()`.
pub fn sample_frame_adjusted(
    geometry: &Geometry,
    frame: &[u8],
    lut_r: &Lut,
    lut_g: &Lut,
    lut_b: &Lut,
) -> Vec<BlockIndices> {
    assert_eq!(frame.len(), geometry.frame_byte_len());

    let bs = i64::from(geometry.block_size);
    let half = bs / 2;
    let width = i64::from(geometry.width);
    let w3 = width * i64::from(COLOR_CHANNELS as u32);

    let sample_offsets: Vec<i64> = if bs >= 6 {
        (-2..=2).collect()
    } else if bs >= 4 {
        (-1..=1).collect()
    } else {
        vec![0]
    };
    let sample_count = (sample_offsets.len() * sample_offsets.len()) as i64;

    let mut blocks = Vec::with_capacity(geometry.block_count());
    for gy in 0..i64::from(geometry.grid_h()) {
        let cy = gy * bs + half;
        for gx in 0..i64::from(geometry.grid_w()) {
            let cx = gx * bs + half;
            let mut r_sum = 0i64;
            let mut g_sum = 0i64;
            let mut b_sum = 0i64;

            for &dy in &sample_offsets {
                for &dx in &sample_offsets {
                    let o = ((cy + dy) * w3 + (cx + dx) * 3) as usize;
                    r_sum += i64::from(frame[o]);
                    g_sum += i64::from(frame[o + 1]);
                    b_sum += i64::from(frame[o + 2]);
                }
            }

            let ra = (r_sum / sample_count) as usize;
            let ga = (g_sum / sample_count) as usize;
            let ba = (b_sum / sample_count) as usize;
            blocks.push((lut_r[ra], lut_g[ga], lut_b[ba]));
        }
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::YT_LEVELS;
    use crate::quantize::build_lut;

    fn geom(width: u32, height: u32, bs: u8) -> Geometry {
        Geometry {
            width,
            height,
            block_size: bs,
        }
    }

    #[test]
    fn render_then_sample_recovers_exact_indices() {
        let geometry = geom(64, 64, 8);
        let lut = build_lut(&YT_LEVELS);
        let count = geometry.block_count();
        let blocks: Vec<BlockIndices> = (0..count)
            .map(|i| ((i % 4) as u8, ((i + 1) % 4) as u8, ((i + 2) % 4) as u8))
            .collect();

        let rendered = render_frame(&geometry, &YT_LEVELS, &blocks);
        let sampled = sample_frame(&geometry, &rendered, &lut);
        assert_eq!(sampled, blocks);
    }

    #[test]
    fn partial_block_margin_is_zeroed() {
        // 70 is not a multiple of 8: a 6px strip on the right is unused.
        let geometry = geom(70, 64, 8);
        let blocks = vec![(3u8, 3u8, 3u8); geometry.block_count()];
        let rendered = render_frame(&geometry, &YT_LEVELS, &blocks);
        for y in 0..64usize {
            let margin_start = (y * 70 + 64) * 3;
            for px in 0..6usize {
                let o = margin_start + px * 3;
                assert_eq!(&rendered[o..o + 3], [0, 0, 0]);
            }
        }
    }
}
