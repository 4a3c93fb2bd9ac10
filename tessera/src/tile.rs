// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    frame::Frame,
};

/// Grid coordinate of a tile. Serialized as a `[row, col]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct TileId {
    pub row: usize,
    pub col: usize,
}

impl From<(usize, usize)> for TileId {
    fn from((row, col): (usize, usize)) -> Self {
        TileId { row, col }
    }
}

impl From<TileId> for (usize, usize) {
    fn from(id: TileId) -> Self {
        (id.row, id.col)
    }
}

/// Fixed `rows x cols` tiling of a frame.
///
/// Tile dimensions are `width div cols` by `height div rows`; the right and
/// bottom margins left over by the integer division belong to no tile and
/// are never touched by split or write-back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    rows: usize,
    cols: usize,
    tile_width: usize,
    tile_height: usize,
}

impl TileGrid {
    /// Grid over `frame` with `n_tiles_y` rows and `n_tiles_x` columns.
    pub fn new(frame: &Frame, n_tiles_y: usize, n_tiles_x: usize) -> Result<TileGrid> {
        let (width, height) = frame.size();
        if n_tiles_y == 0 || n_tiles_x == 0 || n_tiles_y > height || n_tiles_x > width {
            return Err(Error::InvalidGrid {
                rows: n_tiles_y,
                cols: n_tiles_x,
                width,
                height,
            });
        }
        Ok(TileGrid {
            rows: n_tiles_y,
            cols: n_tiles_x,
            tile_width: width / n_tiles_x,
            tile_height: height / n_tiles_y,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(width, height)` of every tile.
    pub fn tile_size(&self) -> (usize, usize) {
        (self.tile_width, self.tile_height)
    }

    pub fn contains(&self, id: TileId) -> bool {
        id.row < self.rows && id.col < self.cols
    }

    /// Top-left pixel position of a tile, `(x, y)`.
    pub fn origin(&self, id: TileId) -> (usize, usize) {
        (id.col * self.tile_width, id.row * self.tile_height)
    }

    /// All tile ids in row-major order. Every scan over tiles uses this
    /// order, which is what makes encoding deterministic.
    pub fn ids(&self) -> impl Iterator<Item = TileId> + use<> {
        let (rows, cols) = (self.rows, self.cols);
        (0..rows).flat_map(move |row| (0..cols).map(move |col| TileId { row, col }))
    }

    /// Copies one tile out of `frame`.
    pub fn extract(&self, frame: &Frame, id: TileId) -> Frame {
        debug_assert!(self.contains(id));
        let channels = frame.channels();
        let (x0, y0) = self.origin(id);
        let mut data = Vec::with_capacity(self.tile_width * self.tile_height * channels);
        for y in 0..self.tile_height {
            data.extend_from_slice(
                &frame.row(y0 + y)[x0 * channels..(x0 + self.tile_width) * channels],
            );
        }
        Frame::from_raw(self.tile_width, self.tile_height, channels, data)
            .expect("tile dimensions are a subset of the frame's")
    }

    /// All tiles of `frame`, row-major.
    pub fn split(&self, frame: &Frame) -> Vec<Frame> {
        self.ids().map(|id| self.extract(frame, id)).collect()
    }

    /// Writes `tile` back into its grid cell.
    pub fn write(&self, frame: &mut Frame, id: TileId, tile: &Frame) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::TileIdOutOfRange(id, self.rows, self.cols));
        }
        let channels = frame.channels();
        if tile.size() != (self.tile_width, self.tile_height) || tile.channels() != channels {
            return Err(Error::TileShapeMismatch(
                tile.width(),
                tile.height(),
                tile.channels(),
                self.tile_width,
                self.tile_height,
                channels,
            ));
        }
        let (x0, y0) = self.origin(id);
        for y in 0..self.tile_height {
            frame.row_mut(y0 + y)[x0 * channels..(x0 + self.tile_width) * channels]
                .copy_from_slice(tile.row(y));
        }
        Ok(())
    }
}
