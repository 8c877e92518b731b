//! Frame timing utilities for preview playback.
//!
//! The playback clock is best-effort: each iteration sleeps whatever is
//! left of a fixed per-frame budget and never tries to catch up on drift
//! accumulated in earlier iterations.

use std::time::{Duration, Instant};

/// Duration of one frame at `fps`.
///
/// Non-positive or non-finite rates yield a zero interval.
pub fn frame_interval(fps: f64) -> Duration {
    if !(fps.is_finite() && fps > 0.0) {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(1.0 / fps)
}

/// Snap a time down to the start of the frame containing it.
pub fn snap_to_frame(time_secs: f64, fps: f64) -> f64 {
    if !(fps.is_finite() && fps > 0.0) || time_secs <= 0.0 {
        return time_secs.max(0.0);
    }
    // Nudge so that times already on the grid do not fall to the previous frame.
    let index = (time_secs * fps + 1e-9).floor();
    index / fps
}

/// Per-frame budget tracker for a fixed-rate loop.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    frame_start: Instant,
}

impl FramePacer {
    /// Create a pacer targeting the given frame rate.
    pub fn new(fps: f64) -> Self {
        Self {
            interval: frame_interval(fps),
            frame_start: Instant::now(),
        }
    }

    /// Change the target rate; takes effect from the next frame.
    pub fn set_fps(&mut self, fps: f64) {
        self.interval = frame_interval(fps);
    }

    /// Mark the start of a frame.
    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Time left in the current frame's budget, never negative.
    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.frame_start.elapsed())
    }

    /// Target interval between frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(10.0), Duration::from_millis(100));
        assert_eq!(frame_interval(0.0), Duration::ZERO);
        assert_eq!(frame_interval(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_snap_to_frame() {
        assert!((snap_to_frame(1.07, 10.0) - 1.0).abs() < 1e-9);
        assert!((snap_to_frame(0.3, 10.0) - 0.3).abs() < 1e-9);
        assert_eq!(snap_to_frame(-2.0, 10.0), 0.0);
        assert_eq!(snap_to_frame(1.5, 0.0), 1.5);
    }

    #[test]
    fn test_pacer_remaining_is_clamped() {
        let mut pacer = FramePacer::new(1000.0);
        pacer.begin_frame();
        std::thread::sleep(Duration::from_millis(5));
        // Budget of 1ms is long gone.
        assert_eq!(pacer.remaining(), Duration::ZERO);

        pacer.set_fps(1.0);
        pacer.begin_frame();
        assert!(pacer.remaining() > Duration::from_millis(900));
    }
}
