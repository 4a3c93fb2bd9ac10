// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use tessera::{
    frame::{Frame, FrameMap},
    metadata::{EncodedBundle, METADATA_FILE_NAME},
};
use zip::{ZipWriter, write::SimpleFileOptions};

/// Writes the session as a flat zip of JPEG frames, plus the metadata
/// document when `bundle` is present. File names are rewritten to
/// `<stem>.jpeg` both in the archive and in the document, so they keep
/// matching after the conversion.
pub fn write_zip(path: &Path, frames: &FrameMap, bundle: Option<&EncodedBundle>) -> Result<()> {
    let file = File::create(path).wrap_err_with(|| format!("Failed to create {path:?}"))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, frame) in frames {
        writer.start_file(jpeg_name(name), options)?;
        writer.write_all(&encode_jpeg(frame)?)?;
    }
    if let Some(bundle) = bundle {
        let mut document = bundle.clone();
        for record in &mut document.frames {
            record.file_name = jpeg_name(&record.file_name);
        }
        writer.start_file(METADATA_FILE_NAME.to_string(), options)?;
        writer.write_all(&document.to_json()?)?;
    }
    writer.finish()?;
    Ok(())
}

/// `<stem>.jpeg`, whatever the original extension was.
fn jpeg_name(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    format!("{stem}.jpeg")
}

fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new(&mut bytes);
    let color = match frame.channels() {
        1 => ExtendedColorType::L8,
        _ => ExtendedColorType::Rgb8,
    };
    encoder.encode(
        frame.as_raw(),
        frame.width() as u32,
        frame.height() as u32,
        color,
    )?;
    Ok(bytes)
}

#[cfg(test)]
mod test {
    use tessera::frame::{Frame, FrameMap};
    use tessera::metadata::{
        EncodedBundle, EncoderParameters, FrameRecord, METADATA_FILE_NAME,
    };

    use super::write_zip;
    use crate::input::read_input;

    fn session() -> FrameMap {
        FrameMap::from([
            (
                "frame_000.png".to_string(),
                Frame::solid(8, 8, &[100, 150, 200]).unwrap(),
            ),
            (
                "frame_001.png".to_string(),
                Frame::solid(8, 8, &[90, 140, 190]).unwrap(),
            ),
        ])
    }

    #[test]
    fn archives_round_trip_through_the_ingester() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        let mut bundle = EncodedBundle::new(EncoderParameters::default());
        bundle.frames = vec![
            FrameRecord {
                file_name: "frame_000.png".into(),
                is_reference: true,
                tiles: Vec::new(),
            },
            FrameRecord {
                file_name: "frame_001.png".into(),
                is_reference: false,
                tiles: Vec::new(),
            },
        ];
        write_zip(&path, &session(), Some(&bundle)).unwrap();

        let loaded = read_input(&path).unwrap();
        let reloaded = loaded.bundle.expect("metadata should be detected");
        // Names rewritten to .jpeg consistently in archive and document.
        assert!(loaded.frames.contains_key("frame_000.jpeg"));
        assert_eq!(reloaded.frames[0].file_name, "frame_000.jpeg");
        assert_eq!(reloaded.frames[1].file_name, "frame_001.jpeg");
        // JPEG is lossy but close: a flat color survives within a few
        // code values.
        let frame = &loaded.frames["frame_000.jpeg"];
        assert_eq!(frame.size(), (8, 8));
        assert!(frame.sample(0, 0, 0).abs_diff(100) < 8);
    }

    #[test]
    fn encoded_bundles_survive_the_archive() {
        // Encode, write, reload, decode: the reconstruction should track
        // the originals within JPEG error.
        let mut gradient = Frame::new(16, 16, 3).unwrap();
        for y in 0..16 {
            for x in 0..16 {
                gradient.row_mut(y)[x * 3..x * 3 + 3].copy_from_slice(&[
                    (x * 15) as u8,
                    (y * 15) as u8,
                    100,
                ]);
            }
        }
        let originals: FrameMap = (0..4)
            .map(|i| (format!("frame_{i:03}.png"), gradient.clone()))
            .collect();
        let params = EncoderParameters {
            n_tiles_x: 2,
            n_tiles_y: 2,
            gop: 2,
            quality: 0.99,
            seek_range: 0,
        };
        let (encoded, records) =
            tessera::encoder::encode(originals.clone(), &params, |_| {}).unwrap();
        let mut bundle = EncodedBundle::new(params);
        bundle.frames = records;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        write_zip(&path, &encoded, Some(&bundle)).unwrap();

        let loaded = read_input(&path).unwrap();
        let reloaded = loaded.bundle.expect("bundle should round-trip");
        let decoded = tessera::decoder::decode(loaded.frames, &reloaded).unwrap();

        assert_eq!(decoded.len(), originals.len());
        for (decoded_frame, original) in decoded.values().zip(originals.values()) {
            assert_eq!(decoded_frame.size(), original.size());
            for (got, want) in decoded_frame.as_raw().iter().zip(original.as_raw()) {
                assert!(got.abs_diff(*want) <= 24, "JPEG drift too large");
            }
        }
    }

    #[test]
    fn raw_archives_carry_no_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.zip");
        write_zip(&path, &session(), None).unwrap();
        let mut archive =
            zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
        assert!(archive.by_name(METADATA_FILE_NAME).is_err());
        assert_eq!(archive.len(), 2);
    }
}
