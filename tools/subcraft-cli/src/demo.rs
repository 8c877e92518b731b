//! Synthetic media for exercising the preview engine without a decoder.

use std::sync::Arc;

use subcraft_common::config::PreviewConfig;
use subcraft_common::error::{SubcraftError, SubcraftResult};
use subcraft_project_model::{
    EffectConfig, EffectKind, EffectParameters, ParamValue, SubtitleData, SubtitleLine, WordTiming,
};
use subcraft_render_engine::{
    AudioSource, Effect, Frame, Layer, PreviewEngine, SilentAudio, VideoSource,
};

/// A horizontal color gradient that scrolls over time.
#[derive(Debug, Clone)]
pub struct GradientSource {
    width: u32,
    height: u32,
    duration: f64,
    fps: f64,
}

impl GradientSource {
    pub fn new(width: u32, height: u32, duration: f64, fps: f64) -> Self {
        Self {
            width,
            height,
            duration,
            fps,
        }
    }
}

impl VideoSource for GradientSource {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn fps(&self) -> Option<f64> {
        Some(self.fps)
    }

    fn resize(&self, width: u32, height: u32) -> Option<Arc<dyn VideoSource>> {
        Some(Arc::new(Self {
            width,
            height,
            ..self.clone()
        }))
    }

    fn frame_at(&self, time: f64) -> SubcraftResult<Frame> {
        let shift = (time * 40.0) as u32;
        let mut pixels = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height {
            for x in 0..self.width {
                let r = ((x + shift) * 255 / self.width.max(1)) as u8;
                let g = (y * 255 / self.height.max(1)) as u8;
                pixels.extend_from_slice(&[r, g, 96]);
            }
        }
        Frame::new(self.width, self.height, 3, time, pixels)
    }
}

/// Lyric lines, one every two seconds, with per-word timings.
pub fn demo_subtitles(duration: f64) -> SubtitleData {
    const LYRICS: [&str; 4] = [
        "every word lights up",
        "right on the beat",
        "scrub the timeline",
        "and watch it follow",
    ];

    let mut lines = Vec::new();
    let mut start = 0.0;
    for text in LYRICS.iter().cycle() {
        let end = start + 2.0;
        if end > duration {
            break;
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        let slot = 2.0 / words.len() as f64;
        let timings = words
            .iter()
            .enumerate()
            .map(|(i, w)| WordTiming::new(*w, start + i as f64 * slot, start + (i + 1) as f64 * slot))
            .collect();
        lines.push(SubtitleLine::new(start, end, *text).with_words(timings));
        start = end;
    }
    SubtitleData::new(lines)
}

/// Effect configurations as a project would store them.
pub fn demo_effect_configs() -> Vec<EffectConfig> {
    vec![
        EffectConfig::new("karaoke_banner", EffectKind::Typography)
            .with_param("font_size", 72i64)
            .with_param("color", ParamValue::Color([255, 220, 0, 200])),
        EffectConfig::new("sparkles", EffectKind::Particle)
            .with_param("particle_count", 200i64)
            .with_param("color", ParamValue::Color([255, 255, 255, 255])),
    ]
}

/// Instantiate the demo effect for a stored configuration.
pub fn build_effect(config: &EffectConfig) -> Option<Arc<dyn Effect>> {
    if !config.enabled {
        return None;
    }
    match config.kind {
        EffectKind::Typography => Some(Arc::new(BannerEffect {
            name: config.name.clone(),
            parameters: config.parameters.clone(),
        })),
        EffectKind::Particle => Some(Arc::new(SparkleEffect {
            name: config.name.clone(),
            parameters: config.parameters.clone(),
        })),
        other => {
            tracing::warn!(effect = %config.name, kind = %other, "No demo implementation for effect kind");
            None
        }
    }
}

pub fn demo_effects() -> Vec<Arc<dyn Effect>> {
    demo_effect_configs().iter().filter_map(build_effect).collect()
}

/// An engine with the demo preview already generated.
pub fn demo_engine(config: &PreviewConfig, duration: f64, fps: f64) -> anyhow::Result<PreviewEngine> {
    demo_engine_with_audio(config, duration, fps, None)
}

/// Like [`demo_engine`], with `audio_seconds` of silence fitted to the
/// preview.
pub fn demo_engine_with_audio(
    config: &PreviewConfig,
    duration: f64,
    fps: f64,
    audio_seconds: Option<f64>,
) -> anyhow::Result<PreviewEngine> {
    let engine = PreviewEngine::new(config.clone())?;
    let background: Arc<dyn VideoSource> = Arc::new(GradientSource::new(1920, 1080, duration, fps));
    let audio = audio_seconds.map(|secs| Arc::new(SilentAudio::new(secs)) as Arc<dyn AudioSource>);
    let composition = engine.update_preview_with_audio(
        Some(background),
        &demo_subtitles(duration),
        &demo_effects(),
        audio,
    )?;
    tracing::debug!(layers = ?composition.layer_names(), "Demo preview ready");
    Ok(engine)
}

fn color_param(parameters: &EffectParameters, default: [u8; 4]) -> [u8; 4] {
    parameters
        .get("color")
        .and_then(ParamValue::as_color)
        .unwrap_or(default)
}

/// A bar under the active line with the current word highlighted.
struct BannerEffect {
    name: String,
    parameters: EffectParameters,
}

impl Effect for BannerEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Typography
    }

    fn parameters(&self) -> &EffectParameters {
        &self.parameters
    }

    fn with_parameters(&self, name: String, parameters: EffectParameters) -> Arc<dyn Effect> {
        Arc::new(BannerEffect { name, parameters })
    }

    fn apply(
        &self,
        _base: &dyn VideoSource,
        subtitles: &SubtitleData,
    ) -> SubcraftResult<Option<Arc<dyn Layer>>> {
        if subtitles.is_empty() {
            return Ok(None);
        }
        let font_size = self
            .parameters
            .get("font_size")
            .and_then(ParamValue::as_i64)
            .ok_or_else(|| SubcraftError::effect(format!("{}: font_size is required", self.name)))?;
        Ok(Some(Arc::new(BannerLayer {
            subtitles: subtitles.clone(),
            bar_height: font_size.max(1) as u32,
            rgba: color_param(&self.parameters, [255, 255, 255, 200]),
        })))
    }
}

struct BannerLayer {
    subtitles: SubtitleData,
    bar_height: u32,
    rgba: [u8; 4],
}

impl Layer for BannerLayer {
    fn duration(&self) -> Option<f64> {
        Some(self.subtitles.duration())
    }

    fn render_onto(&self, frame: &mut Frame, time: f64) -> SubcraftResult<()> {
        let Some(line) = self.subtitles.line_at(time) else {
            return Ok(());
        };
        let (width, height) = frame.size();
        let top = height.saturating_sub(self.bar_height * 2);
        frame.fill_rect(0, top, width, self.bar_height, [0, 0, 0, 160]);

        if let Some(word) = line.word_at(time) {
            let span = line.duration().max(f64::EPSILON);
            let x0 = ((word.start_time - line.start_time) / span * width as f64) as u32;
            let x1 = ((word.end_time - line.start_time) / span * width as f64) as u32;
            frame.fill_rect(x0, top, x1.saturating_sub(x0), self.bar_height, self.rgba);
        }
        Ok(())
    }
}

/// Deterministic twinkling dots.
struct SparkleEffect {
    name: String,
    parameters: EffectParameters,
}

impl Effect for SparkleEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Particle
    }

    fn parameters(&self) -> &EffectParameters {
        &self.parameters
    }

    fn with_parameters(&self, name: String, parameters: EffectParameters) -> Arc<dyn Effect> {
        Arc::new(SparkleEffect { name, parameters })
    }

    fn apply(
        &self,
        _base: &dyn VideoSource,
        _subtitles: &SubtitleData,
    ) -> SubcraftResult<Option<Arc<dyn Layer>>> {
        let count = self
            .parameters
            .get("particle_count")
            .and_then(ParamValue::as_i64)
            .unwrap_or(50)
            .max(0) as u32;
        Ok(Some(Arc::new(SparkleLayer {
            count,
            rgba: color_param(&self.parameters, [255, 255, 255, 255]),
        })))
    }
}

struct SparkleLayer {
    count: u32,
    rgba: [u8; 4],
}

impl Layer for SparkleLayer {
    fn render_onto(&self, frame: &mut Frame, time: f64) -> SubcraftResult<()> {
        let (width, height) = frame.size();
        if width == 0 || height == 0 {
            return Ok(());
        }
        let tick = (time * 10.0) as u64;
        for i in 0..self.count as u64 {
            // SplitMix64 step keyed on particle and tenth of a second.
            let mut z = (i << 32 ^ tick).wrapping_add(0x9E37_79B9_7F4A_7C15);
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^= z >> 31;
            let x = (z % width as u64) as u32;
            let y = ((z >> 32) % height as u64) as u32;
            frame.blend_pixel(x, y, self.rgba);
        }
        Ok(())
    }
}
