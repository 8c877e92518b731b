//! Scrub across the demo preview and report cache effectiveness.

use std::time::Instant;

use subcraft_common::config::AppConfig;

use crate::demo;

pub fn run(config: &AppConfig, duration: f64, fps: f64, step: f64) -> anyhow::Result<()> {
    if !(step.is_finite() && step > 0.0) {
        anyhow::bail!("Seek step must be positive, got {step}");
    }

    let engine = demo::demo_engine(&config.preview, duration, fps)?;
    let seeks = (engine.duration() / step).floor() as usize + 1;
    println!(
        "Scrubbing {:.1}s preview in {step}s steps ({seeks} seeks per pass)",
        engine.duration()
    );

    for pass in 1..=2 {
        let rendered_before = engine.performance_stats().render.frame_count;
        let started = Instant::now();
        let mut missing = 0;
        for i in 0..seeks {
            if engine.seek_to_time(i as f64 * step).is_none() {
                missing += 1;
            }
        }
        let elapsed = started.elapsed();
        let rendered = engine.performance_stats().render.frame_count - rendered_before;
        println!(
            "  Pass {pass}: {:.1}ms total, {rendered} rendered, {} from cache, {missing} failed",
            elapsed.as_secs_f64() * 1000.0,
            seeks - rendered - missing
        );
    }

    let stats = engine.performance_stats();
    println!(
        "Cache: {}/{} frames, ~{:.1} MB",
        stats.cache.size,
        stats.cache.max_size,
        stats.cache.approx_memory_mb()
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
