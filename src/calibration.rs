// filevault - Store and retrieve arbitrary files through lossily re-encoded video.
// Copyright 2025 0verv0ltage
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A deterministic test-pattern frame used to estimate color drift induced
//! by a lossy video codec.

use crate::constants::COLOR_CHANNELS;
use crate::frame::Geometry;
use crate::quantize::build_lut;

/// Per-channel color offset and sampled block error rate, as measured
/// against a calibration frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationShift {
    /// Observed minus expected, averaged over the interior sample region.
    pub r_offset: i32,
    /// Observed minus expected, averaged over the interior sample region.
    pub g_offset: i32,
    /// Observed minus expected, averaged over the interior sample region.
    pub b_offset: i32,
    /// Fraction of sampled channel values whose nearest-level quantization
    /// disagreed with the expected level index.
    pub error_rate: f64,
}

impl CalibrationShift {
    /// True if any channel's offset exceeds the correction threshold.
    #[must_use]
    pub fn needs_correction(&self) -> bool {
        self.r_offset.abs() > crate::constants::OFFSET_CORRECTION_THRESHOLD
            || self.g_offset.abs() > crate::constants::OFFSET_CORRECTION_THRESHOLD
            || self.b_offset.abs() > crate::constants::OFFSET_CORRECTION_THRESHOLD
    }
}

/// Builds the deterministic calibration pattern for `geometry`/`levels`.
///
/// The outermost two block-rows and block-columns (the border) each use a
/// single grey level `levels[(gx+gy) % L]`. Every interior block `(gx,gy)`
/// with `gx,gy >= 2` encodes `(levels[ci], levels[(ci+1)%L], levels[(ci+2)%L])`
/// where `ci = ((gx-2) + (gy-2)*(grid_w-4)) % L`.
pub fn generate_calibration_frame(geometry: &Geometry, levels: &[u8]) -> Vec<u8> {
    let bs = geometry.block_size as usize;
    let grid_w = geometry.grid_w() as usize;
    let grid_h = geometry.grid_h() as usize;
    let width = geometry.width as usize;
    let l = levels.len();

    let mut frame = vec![0u8; geometry.frame_byte_len()];

    for gy in 0..grid_h {
        let mut row = vec![0u8; width * COLOR_CHANNELS];
        for gx in 0..grid_w {
            let (r, g, b) = if gy < 2 || gy >= grid_h.saturating_sub(2) || gx < 2 || gx >= grid_w.saturating_sub(2) {
                let idx = (gx + gy) % l;
                (levels[idx], levels[idx], levels[idx])
            } else {
                let span = grid_w.saturating_sub(4).max(1);
                let ci = ((gx - 2) + (gy - 2) * span) % l;
                (levels[ci], levels[(ci + 1) % l], levels[(ci + 2) % l])
            };

            let off = gx * bs * COLOR_CHANNELS;
            for px in 0..bs {
                let p = off + px * COLOR_CHANNELS;
                row[p] = r;
                row[p + 1] = g;
                row[p + 2] = b;
            }
        }

        for py in (gy * bs)..((gy * bs + bs).min(geometry.height as usize)) {
            let start = py * width * COLOR_CHANNELS;
            frame[start..start + row.len()].copy_from_slice(&row);
        }
    }

    frame
}

/// Estimates per-channel color offset and block error rate from an observed
/// calibration frame, sampling the interior region rows/cols `[2, min(10,
/// grid-2))`.
#[allow(clippy::cast_precision_loss)]
pub fn detect_calibration_shift(frame: &[u8], geometry: &Geometry, levels: &[u8]) -> CalibrationShift {
    let bs = i64::from(geometry.block_size);
    let half = bs / 2;
    let width = i64::from(geometry.width);
    let w3 = width * i64::from(COLOR_CHANNELS as u32);
    let l = levels.len();
    let lut = build_lut(levels);

    let grid_w = i64::from(geometry.grid_w());
    let grid_h = i64::from(geometry.grid_h());

    let mut errors = 0u64;
    let mut total = 0u64;
    let mut sum_r = 0i64;
    let mut sum_g = 0i64;
    let mut sum_b = 0i64;
    let mut samples = 0i64;

    let gy_hi = (grid_h - 2).min(10);
    let gx_hi = (grid_w - 2).min(10);

    for gy in 2..gy_hi {
        for gx in 2..gx_hi {
            let span = (grid_w - 4).max(1) as usize;
            let ci = (((gx - 2) as usize) + ((gy - 2) as usize) * span) % l;
            let expected_r = i32::from(levels[ci]);
            let expected_g = i32::from(levels[(ci + 1) % l]);
            let expected_b = i32::from(levels[(ci + 2) % l]);

            let cy = gy * bs + half;
            let cx = gx * bs + half;
            let o = (cy * w3 + cx * 3) as usize;
            let actual_r = i32::from(frame[o]);
            let actual_g = i32::from(frame[o + 1]);
            let actual_b = i32::from(frame[o + 2]);

            sum_r += i64::from(actual_r - expected_r);
            sum_g += i64::from(actual_g - expected_g);
            sum_b += i64::from(actual_b - expected_b);
            samples += 1;

            if usize::from(lut[actual_r as usize]) != ci {
                errors += 1;
            }
            if usize::from(lut[actual_g as usize]) != (ci + 1) % l {
                errors += 1;
            }
            if usize::from(lut[actual_b as usize]) != (ci + 2) % l {
                errors += 1;
            }
            total += 3;
        }
    }

    if samples == 0 {
        return CalibrationShift {
            r_offset: 0,
            g_offset: 0,
            b_offset: 0,
            error_rate: 0.0,
        };
    }

    #[allow(clippy::cast_possible_truncation)]
    CalibrationShift {
        r_offset: (sum_r / samples) as i32,
        g_offset: (sum_g / samples) as i32,
        b_offset: (sum_b / samples) as i32,
        error_rate: if total > 0 {
            errors as f64 / total as f64
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{LOCAL_LEVELS, YT_LEVELS};

    fn geom(width: u32, height: u32, bs: u8) -> Geometry {
        Geometry {
            width,
            height,
            block_size: bs,
        }
    }

    #[test]
    fn calibration_frame_round_trips_with_zero_offset() {
        for (levels, bs) in [(YT_LEVELS.as_slice(), 8u8), (LOCAL_LEVELS.as_slice(), 4u8)] {
            let geometry = geom(640, 480, bs);
            let frame = generate_calibration_frame(&geometry, levels);
            let shift = detect_calibration_shift(&frame, &geometry, levels);
            assert_eq!(shift.r_offset, 0);
            assert_eq!(shift.g_offset, 0);
            assert_eq!(shift.b_offset, 0);
            assert_eq!(shift.error_rate, 0.0);
        }
    }

    #[test]
    fn calibration_frame_with_uniform_shift_reports_offset() {
        // A uniform +10 red / 0 green / -5 blue offset should be recovered
        // approximately. Clamping at the 0/255 rails means a handful of
        // samples near the palette extremes don't shift by the full amount,
        // so tolerate +-1.
        let geometry = geom(640, 480, 8);
        let mut frame = generate_calibration_frame(&geometry, &YT_LEVELS);
        for px in frame.chunks_exact_mut(3) {
            px[0] = i32::from(px[0]).saturating_add(10).clamp(0, 255) as u8;
            px[2] = i32::from(px[2]).saturating_sub(5).clamp(0, 255) as u8;
        }
        let shift = detect_calibration_shift(&frame, &geometry, &YT_LEVELS);
        assert!((shift.r_offset - 10).abs() <= 1, "r_offset={}", shift.r_offset);
        assert_eq!(shift.g_offset, 0);
        assert!((shift.b_offset + 5).abs() <= 1, "b_offset={}", shift.b_offset);
    }
}
