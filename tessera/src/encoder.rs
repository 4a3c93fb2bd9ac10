// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::{
    correlation::best_match,
    error::{Error, Result},
    frame::{Frame, FrameMap},
    gop::{self, Group},
    metadata::{EncoderParameters, FrameRecord, TileRecord},
    tile::TileGrid,
};

/// Encodes one group of pictures in place.
///
/// The first frame is the group's reference and passes through untouched.
/// Every tile of every later frame is scanned against every reference tile
/// in row-major order; the first reference tile whose correlation reaches
/// `quality` claims the tile, which is then overwritten with the frame's
/// mean color. Matched tiles are described by the returned records.
pub fn encode_gop(
    mut group: Group,
    params: &EncoderParameters,
) -> Result<(Group, Vec<FrameRecord>)> {
    let Some((reference_name, reference)) = group.first() else {
        return Err(Error::EmptyInput);
    };
    let grid = TileGrid::new(reference, params.n_tiles_y as usize, params.n_tiles_x as usize)?;
    let reference_tiles = grid.split(reference);
    let (tile_width, tile_height) = grid.tile_size();

    let mut records = Vec::with_capacity(group.len());
    records.push(FrameRecord {
        file_name: reference_name.clone(),
        is_reference: true,
        tiles: Vec::new(),
    });
    let (reference_width, reference_height) = reference.size();
    let reference_channels = reference.channels();

    for (name, frame) in group.iter_mut().skip(1) {
        if frame.size() != (reference_width, reference_height)
            || frame.channels() != reference_channels
        {
            return Err(Error::TileShapeMismatch(
                frame.width(),
                frame.height(),
                frame.channels(),
                reference_width,
                reference_height,
                reference_channels,
            ));
        }

        let mut tiles = Vec::new();
        let mut matched = Vec::new();
        for id in grid.ids() {
            let current = grid.extract(frame, id);
            let (x0, y0) = grid.origin(id);
            for (reference_id, reference_tile) in grid.ids().zip(&reference_tiles) {
                let m = best_match(&current, reference_tile, params.seek_range)?;
                if m.score >= params.quality {
                    // The displaced position may stick out past the right or
                    // bottom edge; the decoder clips there on read.
                    let x = (x0 as i64 + i64::from(m.dx)).max(0) as usize;
                    let y = (y0 as i64 + i64::from(m.dy)).max(0) as usize;
                    tiles.push(TileRecord {
                        reference_tile: reference_id,
                        target_position: (x, y),
                    });
                    matched.push(id);
                    break;
                }
            }
        }

        debug!(frame = name.as_str(), matched = matched.len(), "frame encoded");
        if !matched.is_empty() {
            // One fill color per frame, from the frame as it was ingested.
            let fill = Frame::solid(tile_width, tile_height, &frame.mean_color())?;
            for id in &matched {
                grid.write(frame, *id, &fill)?;
            }
        }
        records.push(FrameRecord {
            file_name: name.clone(),
            is_reference: false,
            tiles,
        });
    }
    Ok((group, records))
}

/// Encodes a whole session: partitions `frames` into GOPs, encodes them
/// concurrently, and merges the results deterministically.
///
/// `progress` is invoked with the number of completed GOPs each time one
/// finishes. Records are sorted by file name after the merge, so the
/// output is bitwise-independent of scheduling.
pub fn encode<F>(
    frames: FrameMap,
    params: &EncoderParameters,
    progress: F,
) -> Result<(FrameMap, Vec<FrameRecord>)>
where
    F: Fn(usize) + Send + Sync,
{
    params.validate()?;
    if frames.is_empty() {
        return Err(Error::EmptyInput);
    }
    let groups = gop::partition(frames, params.gop as usize);
    debug!(gops = groups.len(), "encoding session");

    let completed = AtomicUsize::new(0);
    let run = |group: Group| -> Result<(Group, Vec<FrameRecord>)> {
        let result = encode_gop(group, params);
        progress(completed.fetch_add(1, Ordering::SeqCst) + 1);
        result
    };

    #[cfg(feature = "parallel")]
    let results = groups.into_par_iter().map(run).collect::<Result<Vec<_>>>()?;
    #[cfg(not(feature = "parallel"))]
    let results = groups.into_iter().map(run).collect::<Result<Vec<_>>>()?;

    let mut encoded = FrameMap::new();
    let mut records = Vec::new();
    for (group, mut group_records) in results {
        records.append(&mut group_records);
        encoded.extend(group);
    }
    records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok((encoded, records))
}
