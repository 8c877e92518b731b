//! Background video sources and the adapters the preview applies to them.

use std::sync::Arc;

use subcraft_common::clock::snap_to_frame;
use subcraft_common::error::SubcraftResult;

use crate::frame::Frame;

/// A sampleable background (decoded video, still image, solid color).
///
/// Implementations are produced by the media loader and are read
/// concurrently by the interactive thread and the playback loop.
pub trait VideoSource: Send + Sync {
    /// Length in seconds.
    fn duration(&self) -> f64;

    /// Native (width, height).
    fn size(&self) -> (u32, u32);

    /// Native frame rate, if the source has one.
    fn fps(&self) -> Option<f64> {
        None
    }

    /// A natively resized copy of this source, when the backend can do
    /// better than resampling decoded frames.
    fn resize(&self, _width: u32, _height: u32) -> Option<Arc<dyn VideoSource>> {
        None
    }

    /// Decode the frame shown at `time`.
    fn frame_at(&self, time: f64) -> SubcraftResult<Frame>;
}

/// Resize `source`, preferring its native resize and falling back to
/// nearest-neighbour resampling of each decoded frame.
pub fn resize_source(
    source: Arc<dyn VideoSource>,
    width: u32,
    height: u32,
) -> Arc<dyn VideoSource> {
    if source.size() == (width, height) {
        return source;
    }
    match source.resize(width, height) {
        Some(resized) => resized,
        None => Arc::new(ScaledSource::new(source, width, height)),
    }
}

/// Resamples every frame of an inner source to a fixed size.
pub struct ScaledSource {
    inner: Arc<dyn VideoSource>,
    width: u32,
    height: u32,
}

impl ScaledSource {
    pub fn new(inner: Arc<dyn VideoSource>, width: u32, height: u32) -> Self {
        Self {
            inner,
            width,
            height,
        }
    }
}

impl VideoSource for ScaledSource {
    fn duration(&self) -> f64 {
        self.inner.duration()
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> Option<f64> {
        self.inner.fps()
    }

    fn frame_at(&self, time: f64) -> SubcraftResult<Frame> {
        Ok(self.inner.frame_at(time)?.resized(self.width, self.height))
    }
}

/// Presents an inner source at a lower frame rate by snapping sample times
/// down to the reduced frame grid.
pub struct FrameRateLimited {
    inner: Arc<dyn VideoSource>,
    fps: f64,
}

impl FrameRateLimited {
    pub fn new(inner: Arc<dyn VideoSource>, fps: f64) -> Self {
        Self { inner, fps }
    }
}

impl VideoSource for FrameRateLimited {
    fn duration(&self) -> f64 {
        self.inner.duration()
    }

    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn frame_at(&self, time: f64) -> SubcraftResult<Frame> {
        let snapped = snap_to_frame(time, self.fps);
        Ok(self.inner.frame_at(snapped)?.with_timestamp(time))
    }
}

/// A single-color background of fixed length.
#[derive(Debug, Clone)]
pub struct SolidColorSource {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub rgb: [u8; 3],
    pub fps: Option<f64>,
}

impl SolidColorSource {
    pub fn new(width: u32, height: u32, duration: f64, rgb: [u8; 3]) -> Self {
        Self {
            width,
            height,
            duration,
            rgb,
            fps: None,
        }
    }
}

impl VideoSource for SolidColorSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn resize(&self, width: u32, height: u32) -> Option<Arc<dyn VideoSource>> {
        Some(Arc::new(Self {
            width,
            height,
            ..self.clone()
        }))
    }

    fn frame_at(&self, time: f64) -> SubcraftResult<Frame> {
        Ok(Frame::solid(self.width, self.height, self.rgb, time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Source that records the times it is sampled at and cannot resize
    /// natively.
    struct RecordingSource {
        times: Mutex<Vec<f64>>,
    }

    impl VideoSource for RecordingSource {
        fn duration(&self) -> f64 {
            10.0
        }

        fn size(&self) -> (u32, u32) {
            (1920, 1080)
        }

        fn fps(&self) -> Option<f64> {
            Some(30.0)
        }

        fn frame_at(&self, time: f64) -> SubcraftResult<Frame> {
            self.times.lock().push(time);
            Ok(Frame::solid(16, 9, [5, 5, 5], time))
        }
    }

    #[test]
    fn test_resize_prefers_native() {
        let source: Arc<dyn VideoSource> =
            Arc::new(SolidColorSource::new(1920, 1080, 3.0, [0, 0, 255]));
        let resized = resize_source(source, 640, 360);
        assert_eq!(resized.size(), (640, 360));
        let frame = resized.frame_at(1.0).unwrap();
        assert_eq!(frame.size(), (640, 360));
        assert_eq!(frame.pixel(0, 0), Some(&[0, 0, 255][..]));
    }

    #[test]
    fn test_resize_falls_back_to_scaling() {
        let source: Arc<dyn VideoSource> = Arc::new(RecordingSource {
            times: Mutex::new(Vec::new()),
        });
        let resized = resize_source(source, 8, 4);
        assert_eq!(resized.size(), (8, 4));
        assert_eq!(resized.fps(), Some(30.0));
        assert_eq!(resized.frame_at(0.5).unwrap().size(), (8, 4));
    }

    #[test]
    fn test_frame_rate_limited_snaps_times() {
        let inner = Arc::new(RecordingSource {
            times: Mutex::new(Vec::new()),
        });
        let limited = FrameRateLimited::new(inner.clone(), 10.0);
        let frame = limited.frame_at(1.07).unwrap();
        assert_eq!(frame.timestamp(), 1.07);
        limited.frame_at(1.0).unwrap();

        let times = inner.times.lock().clone();
        assert_eq!(times.len(), 2);
        assert!((times[0] - 1.0).abs() < 1e-9);
        assert!((times[1] - 1.0).abs() < 1e-9);
    }
}
