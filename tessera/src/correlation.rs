// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    error::{Error, Result},
    frame::Frame,
};

/// Outcome of a windowed correlation search: the best Pearson score over
/// the search window and the displacement that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    pub score: f32,
    pub dx: i32,
    pub dy: i32,
}

/// Best normalized cross-correlation between `current` and `reference`
/// over all displacements in `[-seek_range, +seek_range]^2`.
///
/// The current tile is cyclically shifted: samples pushed past an edge
/// wrap around to the opposite one. Displacements are scanned `dy` outer,
/// `dx` inner, each from `-seek_range` up, and only a strictly greater
/// score replaces the running best, so ties keep the first-encountered
/// offset. A constant tile on either side has no defined correlation and
/// yields `(-inf, (0, 0))`.
pub fn best_match(current: &Frame, reference: &Frame, seek_range: u32) -> Result<Match> {
    if !current.same_shape(reference) {
        return Err(Error::TileShapeMismatch(
            current.width(),
            current.height(),
            current.channels(),
            reference.width(),
            reference.height(),
            reference.channels(),
        ));
    }
    let (width, height) = current.size();
    let channels = current.channels();

    let current_diff = centered(current);
    let reference_diff = centered(reference);
    // A cyclic shift permutes samples, so the current tile's mean and
    // variance are the same at every displacement and the denominator can
    // be computed once.
    let denominator =
        (sum_of_squares(&current_diff) * sum_of_squares(&reference_diff)).sqrt();
    // Catches both a zero denominator and NaN.
    if !(denominator > 0.0) {
        return Ok(Match {
            score: f32::NEG_INFINITY,
            dx: 0,
            dy: 0,
        });
    }

    let range = seek_range as i64;
    let row_len = width * channels;
    let mut best = Match {
        score: f32::NEG_INFINITY,
        dx: 0,
        dy: 0,
    };
    for dy in -range..=range {
        for dx in -range..=range {
            let mut numerator = 0.0f64;
            for y in 0..height {
                let sy = (y as i64 - dy).rem_euclid(height as i64) as usize;
                let ref_row = &reference_diff[y * row_len..(y + 1) * row_len];
                let cur_row = &current_diff[sy * row_len..(sy + 1) * row_len];
                for x in 0..width {
                    let sx = (x as i64 - dx).rem_euclid(width as i64) as usize;
                    for c in 0..channels {
                        numerator += cur_row[sx * channels + c] * ref_row[x * channels + c];
                    }
                }
            }
            let score = (numerator / denominator) as f32;
            if score > best.score {
                best = Match {
                    score,
                    dx: dx as i32,
                    dy: dy as i32,
                };
            }
        }
    }
    Ok(best)
}

/// Samples as `f64` with the tile mean subtracted.
fn centered(tile: &Frame) -> Vec<f64> {
    let mean = tile.as_raw().iter().map(|&s| f64::from(s)).sum::<f64>()
        / tile.as_raw().len() as f64;
    tile.as_raw().iter().map(|&s| f64::from(s) - mean).collect()
}

fn sum_of_squares(diff: &[f64]) -> f64 {
    diff.iter().map(|d| d * d).sum()
}

#[cfg(test)]
mod test {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    use super::best_match;
    use crate::{error::Result, frame::Frame};

    fn noise_tile(width: usize, height: usize, channels: usize, seed: u64) -> Frame {
        let mut rng = XorShiftRng::seed_from_u64(seed);
        let data = (0..width * height * channels)
            .map(|_| rng.random::<u8>())
            .collect();
        Frame::from_raw(width, height, channels, data).unwrap()
    }

    #[test]
    fn self_match_is_perfect() -> Result<()> {
        for seek_range in [0, 1, 3] {
            let tile = noise_tile(4, 4, 3, 9);
            let m = best_match(&tile, &tile, seek_range)?;
            assert!((m.score - 1.0).abs() < 1e-6);
            assert_eq!((m.dx, m.dy), (0, 0));
        }
        Ok(())
    }

    #[test]
    fn symmetric_at_zero_range() -> Result<()> {
        let a = noise_tile(5, 3, 3, 1);
        let b = noise_tile(5, 3, 3, 2);
        let ab = best_match(&a, &b, 0)?;
        let ba = best_match(&b, &a, 0)?;
        assert!((ab.score - ba.score).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn constant_tiles_never_correlate() -> Result<()> {
        let flat = Frame::solid(4, 4, &[100, 150, 200])?;
        let noisy = noise_tile(4, 4, 3, 3);
        for (a, b) in [(&flat, &flat), (&flat, &noisy), (&noisy, &flat)] {
            let m = best_match(a, b, 2)?;
            assert_eq!(m.score, f32::NEG_INFINITY);
            assert_eq!((m.dx, m.dy), (0, 0));
        }
        Ok(())
    }

    #[test]
    fn recovers_a_cyclic_shift() -> Result<()> {
        // reference[x] = current shifted right by one pixel; the search
        // must undo it with dx = 1.
        let current = noise_tile(6, 6, 1, 4);
        let mut shifted = Frame::new(6, 6, 1)?;
        for y in 0..6 {
            for x in 0..6 {
                shifted.row_mut(y)[(x + 1) % 6] = current.sample(x, y, 0);
            }
        }
        let m = best_match(&current, &shifted, 2)?;
        assert!((m.score - 1.0).abs() < 1e-6);
        assert_eq!((m.dx, m.dy), (1, 0));
        Ok(())
    }

    #[test]
    fn offsets_stay_in_range() {
        arbtest::arbtest(|u| {
            let seek_range = u.int_in_range(0..=3)? as u32;
            let a = noise_tile(4, 4, 1, u.arbitrary()?);
            let b = noise_tile(4, 4, 1, u.arbitrary()?);
            let m = best_match(&a, &b, seek_range).unwrap();
            assert!(m.dx.unsigned_abs() <= seek_range);
            assert!(m.dy.unsigned_abs() <= seek_range);
            Ok(())
        });
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let a = noise_tile(4, 4, 1, 0);
        let b = noise_tile(4, 3, 1, 0);
        assert!(best_match(&a, &b, 0).is_err());
    }
}
