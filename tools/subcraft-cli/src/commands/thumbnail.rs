//! Export a downsized preview still.

use std::path::PathBuf;

use subcraft_common::config::AppConfig;

use crate::demo;

pub fn run(
    config: &AppConfig,
    time: f64,
    width: u32,
    height: u32,
    output: PathBuf,
) -> anyhow::Result<()> {
    if width == 0 || height == 0 {
        anyhow::bail!("Thumbnail size must be non-zero, got {width}x{height}");
    }

    let engine = demo::demo_engine(&config.preview, 10.0, 30.0)?;
    let thumbnail = engine
        .create_preview_thumbnail(time, (width, height))
        .ok_or_else(|| anyhow::anyhow!("No preview frame at {time}s"))?;
    thumbnail.save_image(&output)?;

    println!("Wrote {width}x{height} thumbnail to {}", output.display());
    Ok(())
}
