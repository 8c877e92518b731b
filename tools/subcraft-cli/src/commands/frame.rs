//! Export one preview frame.

use std::path::PathBuf;

use subcraft_common::config::AppConfig;

use crate::demo;

pub fn run(config: &AppConfig, time: f64, output: PathBuf) -> anyhow::Result<()> {
    let engine = demo::demo_engine(&config.preview, 10.0, 30.0)?;
    engine
        .export_preview_frame(time, &output)
        .map_err(|e| anyhow::anyhow!("Failed to export frame: {e}"))?;

    let (width, height) = config.preview.resolution;
    println!(
        "Wrote {width}x{height} frame at {:.2}s to {}",
        engine.current_time(),
        output.display()
    );
    Ok(())
}
