// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use thiserror::Error;

use crate::tile::TileId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unrecognized input format: {0}")]
    InvalidInputFormat(String),
    #[error("Corrupt bundle: {0}")]
    CorruptBundle(String),
    #[error("Invalid {rows}x{cols} tile grid for a {width}x{height} frame")]
    InvalidGrid {
        rows: usize,
        cols: usize,
        width: usize,
        height: usize,
    },
    #[error("Tile shape mismatch: {0}x{1}x{2} vs {3}x{4}x{5}")]
    TileShapeMismatch(usize, usize, usize, usize, usize, usize),
    #[error("No frames to process")]
    EmptyInput,
    #[error("Frame record {0:?} has no matching frame")]
    OrphanFrameRecord(String),
    #[error("Group of {0} frames carries tile records but no reference frame")]
    MissingReference(usize),
    #[error("Tile id ({}, {}) outside the {}x{} grid", .0.row, .0.col, .1, .2)]
    TileIdOutOfRange(TileId, usize, usize),
    #[error("Filter {0:?} is incompatible: {1}")]
    IncompatibleFilter(String, &'static str),
    #[error("Unknown filter {0:?}")]
    UnknownFilter(String),
    #[error("Invalid parameter {1:?} for filter {0:?}")]
    InvalidFilterParameter(String, String),
    #[error("Invalid frame size: {0}x{1} with {2} channels")]
    InvalidFrameSize(usize, usize, usize),
    #[error("Frame size too large: {0}x{1}")]
    FrameSizeTooLarge(usize, usize),
    #[error("GOP size must be at least 1")]
    InvalidGopSize,
    #[error("Quality {0} outside [-1, 1]")]
    InvalidQuality(f32),
}

pub type Result<T> = std::result::Result<T, Error>;
