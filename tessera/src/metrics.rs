// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::frame::{Frame, FrameMap};

/// Mean PSNR in decibels across paired frames. Higher is better.
///
/// Frames are paired by file name; pairs with mismatched shapes and pairs
/// that are byte-identical (infinite PSNR) are skipped. `None` when no
/// pair contributes.
pub fn psnr(originals: &FrameMap, reconstructions: &FrameMap) -> Option<f32> {
    let mut values = Vec::new();
    for (name, original) in originals {
        let Some(reconstruction) = reconstructions.get(name) else {
            continue;
        };
        if !original.same_shape(reconstruction) {
            continue;
        }
        let mse = mean_squared_error(original, reconstruction);
        if mse > 0.0 {
            values.push(10.0 * (255.0f32 * 255.0 / mse).log10());
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f32>() / values.len() as f32)
    }
}

fn mean_squared_error(a: &Frame, b: &Frame) -> f32 {
    let mut sum = 0.0f64;
    for (sa, sb) in a.as_raw().iter().zip(b.as_raw()) {
        let diff = f64::from(*sa) - f64::from(*sb);
        sum += diff * diff;
    }
    (sum / a.as_raw().len() as f64) as f32
}
