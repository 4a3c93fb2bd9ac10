// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    tile::TileId,
};

/// Name of the metadata document inside an encoded archive. Its presence
/// is what distinguishes an encoded bundle from raw input.
pub const METADATA_FILE_NAME: &str = "encoder_metadata.json";

/// Knobs that shape an encoding session.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncoderParameters {
    pub n_tiles_x: u32,
    pub n_tiles_y: u32,
    pub gop: u32,
    pub quality: f32,
    pub seek_range: u32,
}

impl Default for EncoderParameters {
    fn default() -> Self {
        EncoderParameters {
            n_tiles_x: 4,
            n_tiles_y: 4,
            gop: 10,
            quality: 0.9,
            seek_range: 0,
        }
    }
}

impl EncoderParameters {
    pub fn validate(&self) -> Result<()> {
        if self.gop == 0 {
            return Err(Error::InvalidGopSize);
        }
        if !(-1.0..=1.0).contains(&self.quality) {
            return Err(Error::InvalidQuality(self.quality));
        }
        Ok(())
    }
}

/// One matched tile of a non-reference frame: which reference tile
/// supplies the pixels and where its top-left corner lands in the
/// reconstructed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    #[serde(rename = "tb_id")]
    pub reference_tile: TileId,
    #[serde(rename = "td_position")]
    pub target_position: (usize, usize),
}

/// Per-frame metadata. Reference frames carry no tile records; their
/// pixels pass through the encoder untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub file_name: String,
    #[serde(rename = "reference_frame")]
    pub is_reference: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tiles: Vec<TileRecord>,
}

/// Parameter payload of an applied filter: a single integer (threshold or
/// kernel size) or a brightness/contrast pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterParameters {
    Pair(f32, f32),
    Integer(u32),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub filter_name: String,
    pub parameters: Option<FilterParameters>,
}

/// The whole metadata document stored alongside the frames. `frames` is
/// kept sorted ascending by file name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EncodedBundle {
    #[serde(rename = "encoder_parameters")]
    pub params: EncoderParameters,
    pub frames: Vec<FrameRecord>,
    #[serde(default)]
    pub filters: Vec<FilterRecord>,
}

impl EncodedBundle {
    pub fn new(params: EncoderParameters) -> EncodedBundle {
        EncodedBundle {
            params,
            frames: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<EncodedBundle> {
        serde_json::from_slice(bytes).map_err(|e| Error::CorruptBundle(e.to_string()))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::CorruptBundle(e.to_string()))
    }
}
