#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use subcraft_common::config::PreviewConfig;
use subcraft_common::error::{SubcraftError, SubcraftResult};
use subcraft_project_model::{EffectKind, EffectParameters, ParamValue, SubtitleData, SubtitleLine};
use subcraft_render_engine::{Effect, Frame, Layer, PreviewEngine, VideoSource};

pub const BACKGROUND_RGB: [u8; 3] = [10, 20, 30];

pub fn fast_config() -> PreviewConfig {
    PreviewConfig {
        resolution: (64, 36),
        target_fps: 50.0,
        ..PreviewConfig::default()
    }
}

pub fn engine() -> PreviewEngine {
    PreviewEngine::new(fast_config()).expect("test config is valid")
}

pub fn subtitles() -> SubtitleData {
    SubtitleData::new(vec![
        SubtitleLine::new(0.0, 1.0, "hello there"),
        SubtitleLine::new(1.0, 2.0, "general kenobi"),
    ])
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Solid background that counts decodes, fails inside a time window and
/// can be made slow to decode.
pub struct TestSource {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub fps: Option<f64>,
    pub rgb: [u8; 3],
    pub decode_delay: Option<Duration>,
    pub fail_between: Option<(f64, f64)>,
    pub decodes: AtomicUsize,
}

impl TestSource {
    pub fn new(duration: f64) -> Self {
        Self {
            width: 1920,
            height: 1080,
            duration,
            fps: None,
            rgb: BACKGROUND_RGB,
            decode_delay: None,
            fail_between: None,
            decodes: AtomicUsize::new(0),
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    pub fn with_color(mut self, rgb: [u8; 3]) -> Self {
        self.rgb = rgb;
        self
    }

    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = Some(delay);
        self
    }

    pub fn failing_between(mut self, start: f64, end: f64) -> Self {
        self.fail_between = Some((start, end));
        self
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl VideoSource for TestSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn frame_at(&self, time: f64) -> SubcraftResult<Frame> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.decode_delay {
            std::thread::sleep(delay);
        }
        if let Some((start, end)) = self.fail_between {
            if time >= start && time <= end {
                return Err(SubcraftError::render(format!("corrupt frame at {time}")));
            }
        }
        Ok(Frame::solid(self.width, self.height, self.rgb, time))
    }
}

/// Paints one full-width row in a fixed color while subtitles are on
/// screen. Records the parameters of every preview variant built from it.
pub struct StripeEffect {
    pub name: String,
    pub kind: EffectKind,
    pub parameters: EffectParameters,
    pub fail: bool,
    pub built_with: Arc<Mutex<Vec<(String, EffectParameters)>>>,
}

impl StripeEffect {
    pub fn new(name: &str, row: i64, rgba: [u8; 4]) -> Self {
        let mut parameters = EffectParameters::new();
        parameters.insert("row".into(), ParamValue::Integer(row));
        parameters.insert("color".into(), ParamValue::Color(rgba));
        Self {
            name: name.to_string(),
            kind: EffectKind::Typography,
            parameters,
            fail: false,
            built_with: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_kind(mut self, kind: EffectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_param(mut self, key: &str, value: ParamValue) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn into_dyn(self) -> Arc<dyn Effect> {
        Arc::new(self)
    }
}

impl Effect for StripeEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EffectKind {
        self.kind
    }

    fn parameters(&self) -> &EffectParameters {
        &self.parameters
    }

    fn with_parameters(&self, name: String, parameters: EffectParameters) -> Arc<dyn Effect> {
        self.built_with.lock().push((name.clone(), parameters.clone()));
        Arc::new(StripeEffect {
            name,
            kind: self.kind,
            parameters,
            fail: self.fail,
            built_with: Arc::clone(&self.built_with),
        })
    }

    fn apply(
        &self,
        _base: &dyn VideoSource,
        subtitles: &SubtitleData,
    ) -> SubcraftResult<Option<Arc<dyn Layer>>> {
        if self.fail {
            return Err(SubcraftError::effect(format!("{} cannot be applied", self.name)));
        }
        if subtitles.is_empty() {
            return Ok(None);
        }
        let row = self
            .parameters
            .get("row")
            .and_then(ParamValue::as_i64)
            .unwrap_or(0)
            .max(0) as u32;
        let rgba = self
            .parameters
            .get("color")
            .and_then(ParamValue::as_color)
            .unwrap_or([255, 255, 255, 255]);
        Ok(Some(Arc::new(StripeLayer {
            row,
            rgba,
            until: subtitles.duration(),
        })))
    }
}

struct StripeLayer {
    row: u32,
    rgba: [u8; 4],
    until: f64,
}

impl Layer for StripeLayer {
    fn duration(&self) -> Option<f64> {
        Some(self.until)
    }

    fn render_onto(&self, frame: &mut Frame, _time: f64) -> SubcraftResult<()> {
        let width = frame.width();
        frame.fill_rect(0, self.row, width, 1, self.rgba);
        Ok(())
    }
}
