// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    error::{Error, Result},
    frame::{Frame, FrameMap},
    metadata::{FilterParameters, FilterRecord},
};

/// Filters that turn RGB input into something no longer RGB. At most one
/// of these may run over a session, and none of them on grayscale input.
const COLOR_SPACE_FILTERS: [&str; 2] = ["sepia", "grey"];

/// One directive from the filter registry, parameters resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Filter {
    Binarization { threshold: u8 },
    Brightness { brightness: f32, contrast: f32 },
    Negative,
    Sepia,
    Grey,
    Averaging { kernel: usize },
    Blur { kernel: usize },
    Edges,
    Embossing,
    Sharp,
}

impl Filter {
    /// Parses one `name[=value]` directive.
    pub fn parse(directive: &str) -> Result<Filter> {
        let (name, value) = match directive.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (directive.trim(), None),
        };
        let bad_value = || {
            Error::InvalidFilterParameter(name.to_string(), value.unwrap_or_default().to_string())
        };
        match name {
            "binarization" => {
                let threshold = match value {
                    Some(v) => v.parse().map_err(|_| bad_value())?,
                    None => 128,
                };
                Ok(Filter::Binarization { threshold })
            }
            "brillo" => {
                let (brightness, contrast) = match value {
                    Some(v) => {
                        let (b, c) = v.split_once(',').ok_or_else(bad_value)?;
                        (
                            b.trim().parse().map_err(|_| bad_value())?,
                            c.trim().parse().map_err(|_| bad_value())?,
                        )
                    }
                    None => (50.0, 1.5),
                };
                Ok(Filter::Brightness {
                    brightness,
                    contrast,
                })
            }
            "negative" => Ok(Filter::Negative),
            "sepia" => Ok(Filter::Sepia),
            "grey" => Ok(Filter::Grey),
            "averaging" => Ok(Filter::Averaging {
                kernel: parse_kernel_size(name, value, false)?,
            }),
            "blur" => Ok(Filter::Blur {
                kernel: parse_kernel_size(name, value, true)?,
            }),
            "edges" => Ok(Filter::Edges),
            "embossing" => Ok(Filter::Embossing),
            "sharp" => Ok(Filter::Sharp),
            _ => Err(Error::UnknownFilter(name.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Filter::Binarization { .. } => "binarization",
            Filter::Brightness { .. } => "brillo",
            Filter::Negative => "negative",
            Filter::Sepia => "sepia",
            Filter::Grey => "grey",
            Filter::Averaging { .. } => "averaging",
            Filter::Blur { .. } => "blur",
            Filter::Edges => "edges",
            Filter::Embossing => "embossing",
            Filter::Sharp => "sharp",
        }
    }

    pub fn parameters(&self) -> Option<FilterParameters> {
        match *self {
            Filter::Binarization { threshold } => {
                Some(FilterParameters::Integer(u32::from(threshold)))
            }
            Filter::Brightness {
                brightness,
                contrast,
            } => Some(FilterParameters::Pair(brightness, contrast)),
            Filter::Averaging { kernel } | Filter::Blur { kernel } => {
                Some(FilterParameters::Integer(kernel as u32))
            }
            _ => None,
        }
    }

    pub fn record(&self) -> FilterRecord {
        FilterRecord {
            filter_name: self.name().to_string(),
            parameters: self.parameters(),
        }
    }

    /// Applies the filter to one frame, returning the result.
    pub fn apply(&self, frame: &Frame) -> Frame {
        match *self {
            Filter::Binarization { threshold } => {
                map_samples(frame, |s| if s > threshold { 255 } else { 0 })
            }
            Filter::Brightness {
                brightness,
                contrast,
            } => map_samples(frame, |s| {
                (contrast * f32::from(s) + brightness).round().clamp(0.0, 255.0) as u8
            }),
            Filter::Negative => map_samples(frame, |s| 255 - s),
            Filter::Sepia => sepia(frame),
            Filter::Grey => grey(frame),
            Filter::Averaging { kernel } => {
                let weight = 1.0 / (kernel * kernel) as f32;
                convolve(frame, &vec![weight; kernel * kernel], kernel)
            }
            Filter::Blur { kernel } => convolve(frame, &gaussian_kernel(kernel), kernel),
            Filter::Edges => edges(frame),
            Filter::Embossing => convolve(
                frame,
                &[-1.0, -1.0, 0.0, -1.0, 0.0, 1.0, 0.0, 1.0, 1.0],
                3,
            ),
            Filter::Sharp => convolve(
                frame,
                &[0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0],
                3,
            ),
        }
    }
}

/// Parses a semicolon-separated directive list, e.g. `"grey;blur=5"`.
pub fn parse_directives(list: &str) -> Result<Vec<Filter>> {
    list.split(';')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .map(Filter::parse)
        .collect()
}

/// Compatibility policy: a pure function of the applied-filter history and
/// whether the session is grayscale. Violations are recoverable — callers
/// report them and skip the filter.
pub fn check_compatible(filter: &Filter, applied: &[String], grayscale: bool) -> Result<()> {
    let name = filter.name();
    if applied.iter().any(|a| a == name) {
        return Err(Error::IncompatibleFilter(
            name.to_string(),
            "already applied",
        ));
    }
    if COLOR_SPACE_FILTERS.contains(&name) {
        if grayscale {
            return Err(Error::IncompatibleFilter(
                name.to_string(),
                "input is grayscale",
            ));
        }
        if applied
            .iter()
            .any(|a| COLOR_SPACE_FILTERS.contains(&a.as_str()))
        {
            return Err(Error::IncompatibleFilter(
                name.to_string(),
                "conflicts with an earlier color-space filter",
            ));
        }
    }
    Ok(())
}

/// Applies `filter` to every frame of the session.
pub fn apply_to_all(frames: &mut FrameMap, filter: &Filter) {
    for frame in frames.values_mut() {
        *frame = filter.apply(frame);
    }
}

fn parse_kernel_size(name: &str, value: Option<&str>, must_be_odd: bool) -> Result<usize> {
    let bad = || {
        Error::InvalidFilterParameter(name.to_string(), value.unwrap_or_default().to_string())
    };
    let kernel: usize = match value {
        Some(v) => v.parse().map_err(|_| bad())?,
        None => 3,
    };
    if kernel == 0 || (must_be_odd && kernel % 2 == 0) {
        return Err(bad());
    }
    Ok(kernel)
}

fn map_samples(frame: &Frame, f: impl Fn(u8) -> u8) -> Frame {
    let (width, height) = frame.size();
    let data = frame.as_raw().iter().map(|&s| f(s)).collect();
    Frame::from_raw(width, height, frame.channels(), data)
        .expect("mapping preserves the frame's shape")
}

fn sepia(frame: &Frame) -> Frame {
    if frame.channels() != 3 {
        return frame.clone();
    }
    let (width, height) = frame.size();
    let mut data = Vec::with_capacity(frame.as_raw().len());
    for pixel in frame.as_raw().chunks_exact(3) {
        let (r, g, b) = (
            f32::from(pixel[0]),
            f32::from(pixel[1]),
            f32::from(pixel[2]),
        );
        for (wr, wg, wb) in [
            (0.393, 0.769, 0.189),
            (0.349, 0.686, 0.168),
            (0.272, 0.534, 0.131),
        ] {
            data.push((wr * r + wg * g + wb * b).round().clamp(0.0, 255.0) as u8);
        }
    }
    Frame::from_raw(width, height, 3, data).expect("sepia preserves the frame's shape")
}

fn grey(frame: &Frame) -> Frame {
    if frame.channels() != 3 {
        return frame.clone();
    }
    let (width, height) = frame.size();
    let data = frame
        .as_raw()
        .chunks_exact(3)
        .map(|pixel| {
            let luma = 0.299 * f32::from(pixel[0])
                + 0.587 * f32::from(pixel[1])
                + 0.114 * f32::from(pixel[2]);
            luma.round().clamp(0.0, 255.0) as u8
        })
        .collect();
    Frame::from_raw(width, height, 1, data).expect("one sample per pixel")
}

/// Per-channel 2-D correlation against `kernel`, edge samples replicated
/// outward, result clamped to `[0, 255]`.
fn convolve(frame: &Frame, kernel: &[f32], size: usize) -> Frame {
    let (width, height) = frame.size();
    let channels = frame.channels();
    let mut data = Vec::with_capacity(frame.as_raw().len());
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let value = correlate_at(frame, kernel, size, x, y, c);
                data.push(value.round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    Frame::from_raw(width, height, channels, data).expect("convolution preserves the frame's shape")
}

fn correlate_at(frame: &Frame, kernel: &[f32], size: usize, x: usize, y: usize, c: usize) -> f32 {
    let (width, height) = frame.size();
    let anchor = (size / 2) as i64;
    let mut acc = 0.0f32;
    for ky in 0..size {
        let sy = (y as i64 + ky as i64 - anchor).clamp(0, height as i64 - 1) as usize;
        for kx in 0..size {
            let sx = (x as i64 + kx as i64 - anchor).clamp(0, width as i64 - 1) as usize;
            acc += kernel[ky * size + kx] * f32::from(frame.sample(sx, sy, c));
        }
    }
    acc
}

fn edges(frame: &Frame) -> Frame {
    const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
    const SOBEL_Y: [f32; 9] = [1.0, 2.0, 1.0, 0.0, 0.0, 0.0, -1.0, -2.0, -1.0];
    let (width, height) = frame.size();
    let channels = frame.channels();
    let mut data = Vec::with_capacity(frame.as_raw().len());
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let gx = correlate_at(frame, &SOBEL_X, 3, x, y, c);
                let gy = correlate_at(frame, &SOBEL_Y, 3, x, y, c);
                data.push(gx.hypot(gy).round().clamp(0.0, 255.0) as u8);
            }
        }
    }
    Frame::from_raw(width, height, channels, data).expect("gradient preserves the frame's shape")
}

/// `size x size` Gaussian weights with the usual sigma-from-size rule,
/// normalized to sum 1.
fn gaussian_kernel(size: usize) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size as f32 - 1.0) / 2.0;
    let one_d: Vec<f32> = (0..size)
        .map(|i| (-(i as f32 - center).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let norm: f32 = one_d.iter().sum();
    let mut kernel = Vec::with_capacity(size * size);
    for wy in &one_d {
        for wx in &one_d {
            kernel.push(wy * wx / (norm * norm));
        }
    }
    kernel
}
