//! Play the demo preview in real time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use subcraft_common::config::AppConfig;

use crate::demo;

pub fn run(
    config: &AppConfig,
    from: f64,
    seconds: f64,
    duration: f64,
    fast: bool,
    audio: Option<f64>,
) -> anyhow::Result<()> {
    if !(seconds.is_finite() && seconds >= 0.0) {
        anyhow::bail!("Play time must be a non-negative number of seconds, got {seconds}");
    }

    let engine = demo::demo_engine_with_audio(&config.preview, duration, 30.0, audio)?;
    if fast {
        engine.set_performance_mode(true);
    }

    let frames = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&frames);
    engine.add_frame_callback(move |_, _| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    engine.add_time_callback(|time| {
        println!("  t = {time:6.2}s");
    });

    println!(
        "Playing from {from:.2}s for {seconds:.1}s at {} fps",
        engine.playback_state().target_fps
    );
    engine.start_playback(from)?;

    let deadline = std::time::Instant::now() + Duration::from_secs_f64(seconds);
    while engine.is_playing() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    let finished = !engine.is_playing();
    let reached = engine.current_time();
    engine.stop_playback();

    if finished {
        println!("Reached the end at {reached:.2}s");
    } else {
        println!("Stopped at {reached:.2}s");
    }
    println!("Frames delivered: {}", frames.load(Ordering::Relaxed));
    println!("{}", serde_json::to_string_pretty(&engine.performance_stats())?);
    if audio.is_some() {
        println!("{}", serde_json::to_string_pretty(&engine.audio_sync_info())?);
    }
    Ok(())
}
