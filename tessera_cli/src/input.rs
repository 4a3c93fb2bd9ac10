// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr, eyre};
use image::{AnimationDecoder, DynamicImage, codecs::gif::GifDecoder};
use tessera::{
    error::Error,
    frame::{Frame, FrameMap},
    metadata::{EncodedBundle, METADATA_FILE_NAME},
};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const VIDEO_EXTENSIONS: [&str; 3] = ["avi", "mpeg", "mp4"];

/// What the ingester found inside the input container.
pub struct LoadedInput {
    pub frames: FrameMap,
    /// Present when the archive carried an encoder metadata document,
    /// i.e. the input is an already-encoded bundle.
    pub bundle: Option<EncodedBundle>,
}

/// Reads a zip of images or an animated GIF into a frame map.
pub fn read_input(path: &Path) -> Result<LoadedInput> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    match extension.as_str() {
        "zip" => read_zip(path),
        "gif" => read_gif(path),
        ext if VIDEO_EXTENSIONS.contains(&ext) => Err(eyre!(
            "video containers are not supported by this build; \
             repackage {path:?} as a zip of frames or an animated GIF"
        )),
        _ => Err(Error::InvalidInputFormat(path.display().to_string()).into()),
    }
}

fn read_zip(path: &Path) -> Result<LoadedInput> {
    let file = File::open(path).wrap_err_with(|| format!("Failed to open archive {path:?}"))?;
    let mut archive =
        zip::ZipArchive::new(file).wrap_err_with(|| format!("Failed to read archive {path:?}"))?;
    let mut names: Vec<String> = archive.file_names().map(str::to_owned).collect();
    names.sort();

    let mut frames = FrameMap::new();
    let mut bundle = None;
    for name in names {
        let mut entry = archive.by_name(&name)?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        if name == METADATA_FILE_NAME {
            bundle = Some(EncodedBundle::from_json(&bytes)?);
        } else if has_image_extension(&name) {
            let frame =
                decode_image(&bytes).wrap_err_with(|| format!("Failed to decode {name:?}"))?;
            frames.insert(name, frame);
        } else {
            eprintln!("Skipping {name:?}: not a supported image.");
        }
    }
    Ok(LoadedInput { frames, bundle })
}

fn has_image_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Grayscale sources stay single-channel; everything else is normalized
/// to RGB.
fn decode_image(bytes: &[u8]) -> Result<Frame> {
    let image = image::load_from_memory(bytes)?;
    Ok(match image {
        DynamicImage::ImageLuma8(gray) => {
            let (width, height) = gray.dimensions();
            Frame::from_raw(width as usize, height as usize, 1, gray.into_raw())?
        }
        other => {
            let rgb = other.to_rgb8();
            let (width, height) = rgb.dimensions();
            Frame::from_raw(width as usize, height as usize, 3, rgb.into_raw())?
        }
    })
}

fn read_gif(path: &Path) -> Result<LoadedInput> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame")
        .to_owned();
    let file = File::open(path).wrap_err_with(|| format!("Failed to open {path:?}"))?;
    let decoder = GifDecoder::new(BufReader::new(file))
        .wrap_err_with(|| format!("Failed to read {path:?} as a GIF"))?;

    let mut frames = FrameMap::new();
    for (index, frame) in decoder
        .into_frames()
        .collect_frames()
        .wrap_err("Failed to decode GIF frames")?
        .into_iter()
        .enumerate()
    {
        let rgb = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
        let (width, height) = rgb.dimensions();
        // Zero-padded so the file-name order is the frame order.
        frames.insert(
            format!("{stem}_{index:04}.gif"),
            Frame::from_raw(width as usize, height as usize, 3, rgb.into_raw())?,
        );
    }
    Ok(LoadedInput {
        frames,
        bundle: None,
    })
}
