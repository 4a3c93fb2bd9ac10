// Copyright (c) the Tessera Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use indicatif::ProgressBar;
use tessera::{
    decoder, encoder, filters,
    frame::FrameMap,
    metadata::{EncodedBundle, EncoderParameters},
    metrics,
};
use tessera_cli::{
    input::{self, LoadedInput},
    output,
};

/// Package a frame sequence into a motion-compensated bundle, or unpack
/// one back into plain frames.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "GOP/tile motion-compensated video packager")]
struct Opt {
    /// Input container: a zip of images or an animated GIF
    #[clap(short, long)]
    input: PathBuf,

    /// Output zip; when omitted the frames would be played back instead
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Playback frame rate
    #[clap(long, default_value_t = 25)]
    fps: u32,

    /// Semicolon-separated filter directives, e.g. "grey;blur=5"
    #[clap(long)]
    filter: Option<String>,

    /// Tile grid as ROWS,COLS
    #[clap(long, default_value = "4,4", value_parser = parse_ntiles)]
    ntiles: (u32, u32),

    /// Maximum displacement searched for matching tiles
    #[clap(long, default_value_t = 0)]
    seek_range: u32,

    /// Number of frames between two reference frames
    #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    gop: u32,

    /// Correlation threshold above which two tiles are considered matching
    #[clap(long, default_value_t = 0.9, allow_negative_numbers = true)]
    quality: f32,

    /// Show the result even when an output file is written
    #[clap(long, action)]
    reproduce: bool,
}

/// `ROWS,COLS`, e.g. `4,4`.
fn parse_ntiles(s: &str) -> Result<(u32, u32), String> {
    let (rows, cols) = s
        .split_once(',')
        .ok_or_else(|| format!("expected ROWS,COLS, got {s:?}"))?;
    let rows = rows
        .trim()
        .parse()
        .map_err(|_| format!("invalid tile count {rows:?}"))?;
    let cols = cols
        .trim()
        .parse()
        .map_err(|_| format!("invalid tile count {cols:?}"))?;
    if rows == 0 || cols == 0 {
        return Err("tile counts must be positive".to_string());
    }
    Ok((rows, cols))
}

fn main() -> Result<()> {
    color_eyre::install()?;
    {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(EnvFilter::from_default_env())
            .init();
    }

    let opt = Opt::parse();
    let params = EncoderParameters {
        n_tiles_y: opt.ntiles.0,
        n_tiles_x: opt.ntiles.1,
        gop: opt.gop,
        quality: opt.quality,
        seek_range: opt.seek_range,
    };
    params.validate()?;

    let LoadedInput { mut frames, bundle } = input::read_input(&opt.input)?;
    if frames.is_empty() {
        return Err(eyre!("No frames found in {:?}", opt.input));
    }
    println!("Loaded {} frames from {:?}.", frames.len(), opt.input);

    let is_encoded = bundle.is_some();
    if let Some(bundle) = &bundle {
        println!("Input is an encoded bundle; decoding...");
        let start = Instant::now();
        frames = decoder::decode(frames, bundle)?;
        println!("Decoded in {:.2}s.", start.elapsed().as_secs_f64());
    }

    // Already-applied filters seed the compatibility history.
    let mut history: Vec<String> = bundle
        .as_ref()
        .map(|b| b.filters.iter().map(|f| f.filter_name.clone()).collect())
        .unwrap_or_default();
    let mut applied = Vec::new();
    if let Some(list) = &opt.filter {
        for filter in filters::parse_directives(list)? {
            let grayscale = frames.values().next().is_some_and(|f| f.channels() == 1);
            match filters::check_compatible(&filter, &history, grayscale) {
                Ok(()) => {
                    let start = Instant::now();
                    filters::apply_to_all(&mut frames, &filter);
                    println!(
                        "Applied filter {} in {:.2}s.",
                        filter.name(),
                        start.elapsed().as_secs_f64()
                    );
                    history.push(filter.name().to_string());
                    applied.push(filter.record());
                }
                Err(reason) => eprintln!("Skipping filter: {reason}."),
            }
        }
    }

    match &opt.output {
        Some(path) => {
            if is_encoded {
                println!("Saving decoded frames to {path:?}...");
                output::write_zip(path, &frames, None)?;
            } else {
                println!(
                    "Encoding: ntiles ({}, {}), seek range {}, GOP {}, quality {}...",
                    params.n_tiles_y,
                    params.n_tiles_x,
                    params.seek_range,
                    params.gop,
                    params.quality
                );
                let groups = frames.len().div_ceil(params.gop as usize);
                let bar = ProgressBar::new(groups as u64);
                let originals = frames.clone();
                let start = Instant::now();
                let (encoded, records) =
                    encoder::encode(frames, &params, |done| bar.set_position(done as u64))?;
                bar.finish_and_clear();
                let elapsed = start.elapsed();

                let mut document = EncodedBundle::new(params);
                document.frames = records;
                document.filters = applied;
                println!("Saving encoded bundle to {path:?}...");
                output::write_zip(path, &encoded, Some(&document))?;
                report(&opt.input, path, elapsed, &originals, &encoded)?;
            }
            if opt.reproduce {
                playback_unavailable(opt.fps);
            }
        }
        None => playback_unavailable(opt.fps),
    }
    Ok(())
}

fn report(
    input: &Path,
    output: &Path,
    elapsed: Duration,
    originals: &FrameMap,
    encoded: &FrameMap,
) -> Result<()> {
    let input_size = fs::metadata(input)?.len();
    let output_size = fs::metadata(output)?.len();
    let ratio = input_size as f64 / output_size as f64;
    let saved = (input_size as f64 - output_size as f64) / input_size as f64 * 100.0;
    println!("Compression report:");
    let seconds = elapsed.as_secs_f64();
    if seconds > 60.0 {
        println!(
            "  Total processing time: {}m {:.0}s.",
            (seconds / 60.0) as u64,
            seconds % 60.0
        );
    } else {
        println!("  Total processing time: {seconds:.2}s.");
    }
    println!("  Compression ratio: {ratio:.2}.");
    println!("  Archive space saved: {saved:.2}%.");
    match metrics::psnr(originals, encoded) {
        Some(db) => println!("  PSNR of the packaged video: {db:.2} dB."),
        None => println!("  PSNR not computable: frames are identical."),
    }
    Ok(())
}

fn playback_unavailable(fps: u32) {
    eprintln!(
        "Playback at {fps} fps is not available: this build has no display \
         backend. Use --output to save the frames instead."
    );
}
