// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::{Error, Result},
    frame::{Frame, FrameMap},
    gop::{self, Group},
    metadata::{EncodedBundle, EncoderParameters, FrameRecord, TileRecord},
    tile::{TileGrid, TileId},
};

/// Reconstructs one group of pictures in place.
///
/// The group's reference frame (flagged in its record) supplies the
/// pixels; each tile record of a non-reference frame copies the named
/// reference tile to its target position, clipped at the frame's right
/// and bottom edges. Within one frame's record the tile list applies in
/// order, so overlapping targets are last-write-wins.
pub fn decode_gop(
    mut group: Group,
    records: &[FrameRecord],
    params: &EncoderParameters,
) -> Result<Group> {
    let by_name: HashMap<&str, &FrameRecord> = records
        .iter()
        .map(|record| (record.file_name.as_str(), record))
        .collect();

    let mut reference = None;
    for (name, frame) in &group {
        let record = by_name
            .get(name.as_str())
            .ok_or_else(|| Error::CorruptBundle(format!("no record for frame {name:?}")))?;
        if record.is_reference {
            let grid = TileGrid::new(frame, params.n_tiles_y as usize, params.n_tiles_x as usize)?;
            reference = Some((grid, grid.split(frame)));
            break;
        }
    }

    for (name, frame) in group.iter_mut() {
        let record = by_name
            .get(name.as_str())
            .ok_or_else(|| Error::CorruptBundle(format!("no record for frame {name:?}")))?;
        if record.is_reference || record.tiles.is_empty() {
            continue;
        }
        let Some((grid, reference_tiles)) = &reference else {
            return Err(Error::MissingReference(group.len()));
        };
        for tile_record in &record.tiles {
            copy_tile(frame, grid, reference_tiles, tile_record)?;
        }
        debug!(frame = name.as_str(), tiles = record.tiles.len(), "frame reconstructed");
    }
    Ok(group)
}

/// Reconstructs a whole session from the frames of an encoded archive and
/// its metadata document.
pub fn decode(frames: FrameMap, bundle: &EncodedBundle) -> Result<FrameMap> {
    bundle.params.validate()?;
    for record in &bundle.frames {
        if !frames.contains_key(&record.file_name) {
            return Err(Error::OrphanFrameRecord(record.file_name.clone()));
        }
    }

    let groups = gop::partition(frames, bundle.params.gop as usize);
    debug!(gops = groups.len(), "decoding session");
    let mut decoded = FrameMap::new();
    for group in groups {
        decoded.extend(decode_gop(group, &bundle.frames, &bundle.params)?);
    }
    Ok(decoded)
}

fn copy_tile(
    frame: &mut Frame,
    grid: &TileGrid,
    reference_tiles: &[Frame],
    record: &TileRecord,
) -> Result<()> {
    let id: TileId = record.reference_tile;
    if !grid.contains(id) {
        return Err(Error::TileIdOutOfRange(id, grid.rows(), grid.cols()));
    }
    let tile = &reference_tiles[id.row * grid.cols() + id.col];
    let (width, height) = frame.size();
    let channels = frame.channels();
    let (x, y) = record.target_position;
    if x >= width || y >= height {
        return Ok(());
    }
    // Clip the copy to the frame; a displaced target may hang over the
    // right or bottom edge.
    let (tile_width, tile_height) = grid.tile_size();
    let copy_width = tile_width.min(width - x);
    let copy_height = tile_height.min(height - y);
    for row in 0..copy_height {
        frame.row_mut(y + row)[x * channels..(x + copy_width) * channels]
            .copy_from_slice(&tile.row(row)[..copy_width * channels]);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::decode;
    use crate::{
        encoder::encode,
        error::{Error, Result},
        frame::{Frame, FrameMap},
        metadata::{EncodedBundle, EncoderParameters, FrameRecord, TileRecord},
        tile::TileId,
    };

    fn params(n_tiles: u32, gop: u32, quality: f32, seek_range: u32) -> EncoderParameters {
        EncoderParameters {
            n_tiles_x: n_tiles,
            n_tiles_y: n_tiles,
            gop,
            quality,
            seek_range,
        }
    }

    fn gradient_frame() -> Frame {
        let mut frame = Frame::new(8, 8, 3).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                frame.row_mut(y)[x * 3..x * 3 + 3].copy_from_slice(&[
                    (x * 30) as u8,
                    (y * 30) as u8,
                    128,
                ]);
            }
        }
        frame
    }

    fn session(frames: Vec<Frame>) -> FrameMap {
        frames
            .into_iter()
            .enumerate()
            .map(|(i, f)| (format!("frame_{i:03}.jpeg"), f))
            .collect()
    }

    fn bundle(params: EncoderParameters, frames: Vec<FrameRecord>) -> EncodedBundle {
        EncodedBundle {
            params,
            frames,
            filters: Vec::new(),
        }
    }

    #[test]
    fn round_trips_an_encoded_session() -> Result<()> {
        let p = params(2, 2, 0.99, 0);
        let originals = session(vec![gradient_frame(), gradient_frame()]);
        let (encoded, records) = encode(originals.clone(), &p, |_| {})?;
        // The encoded intermediate replaced frame 1 with the mean fill...
        assert_ne!(encoded["frame_001.jpeg"], originals["frame_001.jpeg"]);
        // ...and decoding restores it byte-for-byte.
        let decoded = decode(encoded, &bundle(p, records))?;
        assert_eq!(decoded, originals);
        Ok(())
    }

    #[test]
    fn round_trips_across_gop_boundaries() -> Result<()> {
        let p = params(2, 2, 0.99, 0);
        let originals = session(vec![gradient_frame(); 5]);
        let (encoded, records) = encode(originals.clone(), &p, |_| {})?;
        let decoded = decode(encoded, &bundle(p, records))?;
        assert_eq!(decoded, originals);
        Ok(())
    }

    #[test]
    fn unmatched_regions_keep_container_pixels() -> Result<()> {
        // A record with no tiles leaves the frame exactly as delivered.
        let p = params(2, 2, 0.99, 0);
        let frames = session(vec![gradient_frame(), Frame::solid(8, 8, &[1, 2, 3])?]);
        let records = vec![
            FrameRecord {
                file_name: "frame_000.jpeg".into(),
                is_reference: true,
                tiles: Vec::new(),
            },
            FrameRecord {
                file_name: "frame_001.jpeg".into(),
                is_reference: false,
                tiles: Vec::new(),
            },
        ];
        let decoded = decode(frames.clone(), &bundle(p, records))?;
        assert_eq!(decoded, frames);
        Ok(())
    }

    #[test]
    fn overlapping_targets_are_last_write_wins() -> Result<()> {
        let p = params(2, 2, 0.99, 0);
        let frames = session(vec![gradient_frame(), Frame::new(8, 8, 3)?]);
        let records = vec![
            FrameRecord {
                file_name: "frame_000.jpeg".into(),
                is_reference: true,
                tiles: Vec::new(),
            },
            FrameRecord {
                file_name: "frame_001.jpeg".into(),
                is_reference: false,
                tiles: vec![
                    TileRecord {
                        reference_tile: TileId { row: 0, col: 0 },
                        target_position: (0, 0),
                    },
                    TileRecord {
                        reference_tile: TileId { row: 1, col: 1 },
                        target_position: (0, 0),
                    },
                ],
            },
        ];
        let decoded = decode(frames, &bundle(p, records))?;
        let reference = gradient_frame();
        // The second record overwrote the first: pixels come from tile (1,1).
        assert_eq!(
            decoded["frame_001.jpeg"].sample(0, 0, 0),
            reference.sample(4, 4, 0)
        );
        Ok(())
    }

    #[test]
    fn clips_at_the_frame_edge() -> Result<()> {
        let p = params(2, 2, 0.99, 2);
        let frames = session(vec![gradient_frame(), Frame::new(8, 8, 3)?]);
        let records = vec![
            FrameRecord {
                file_name: "frame_000.jpeg".into(),
                is_reference: true,
                tiles: Vec::new(),
            },
            FrameRecord {
                file_name: "frame_001.jpeg".into(),
                is_reference: false,
                tiles: vec![TileRecord {
                    reference_tile: TileId { row: 0, col: 0 },
                    target_position: (6, 6),
                }],
            },
        ];
        let decoded = decode(frames, &bundle(p, records))?;
        let got = &decoded["frame_001.jpeg"];
        let reference = gradient_frame();
        // Only a 2x2 corner fits.
        assert_eq!(got.sample(6, 6, 0), reference.sample(0, 0, 0));
        assert_eq!(got.sample(7, 7, 1), reference.sample(1, 1, 1));
        assert_eq!(got.sample(5, 5, 0), 0);
        Ok(())
    }

    #[test]
    fn orphan_records_are_rejected() {
        let p = params(2, 2, 0.99, 0);
        let frames = session(vec![gradient_frame()]);
        let records = vec![FrameRecord {
            file_name: "ghost.jpeg".into(),
            is_reference: true,
            tiles: Vec::new(),
        }];
        assert!(matches!(
            decode(frames, &bundle(p, records)),
            Err(Error::OrphanFrameRecord(_))
        ));
    }

    #[test]
    fn frames_without_records_are_rejected() {
        let p = params(2, 2, 0.99, 0);
        let frames = session(vec![gradient_frame(), gradient_frame()]);
        let records = vec![FrameRecord {
            file_name: "frame_000.jpeg".into(),
            is_reference: true,
            tiles: Vec::new(),
        }];
        assert!(matches!(
            decode(frames, &bundle(p, records)),
            Err(Error::CorruptBundle(_))
        ));
    }

    #[test]
    fn tile_records_without_a_reference_are_rejected() {
        let p = params(2, 2, 0.99, 0);
        let frames = session(vec![gradient_frame(), gradient_frame()]);
        let records = vec![
            FrameRecord {
                file_name: "frame_000.jpeg".into(),
                is_reference: false,
                tiles: Vec::new(),
            },
            FrameRecord {
                file_name: "frame_001.jpeg".into(),
                is_reference: false,
                tiles: vec![TileRecord {
                    reference_tile: TileId { row: 0, col: 0 },
                    target_position: (0, 0),
                }],
            },
        ];
        assert!(matches!(
            decode(frames, &bundle(p, records)),
            Err(Error::MissingReference(_))
        ));
    }

    #[test]
    fn out_of_range_tile_ids_are_rejected() {
        let p = params(2, 2, 0.99, 0);
        let frames = session(vec![gradient_frame(), gradient_frame()]);
        let records = vec![
            FrameRecord {
                file_name: "frame_000.jpeg".into(),
                is_reference: true,
                tiles: Vec::new(),
            },
            FrameRecord {
                file_name: "frame_001.jpeg".into(),
                is_reference: false,
                tiles: vec![TileRecord {
                    reference_tile: TileId { row: 5, col: 0 },
                    target_position: (0, 0),
                }],
            },
        ];
        assert!(matches!(
            decode(frames, &bundle(p, records)),
            Err(Error::TileIdOutOfRange(..))
        ));
    }
}
