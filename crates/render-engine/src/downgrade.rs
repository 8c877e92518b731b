//! Builds reduced-cost compositions for interactive preview.
//!
//! The background is resized to the preview resolution and, below full
//! quality, presented at a reduced frame rate. Each effect is rebuilt with
//! a cheaper parameter set:
//!
//! | parameter                                | preview value                          |
//! |------------------------------------------|----------------------------------------|
//! | `particle_count`, `point_count`          | `floor(v * 0.3)`, at least 1           |
//! | `animation_steps`, `interpolation_steps` | `floor(v * 0.5)`, at least 1           |
//! | `font_size`, `outline_font_size`         | `floor(v * width / reference_width)`, at least the minimum font size |
//! | anything else                            | unchanged                              |

use std::sync::Arc;

use subcraft_common::config::PreviewConfig;
use subcraft_common::error::{SubcraftError, SubcraftResult};
use subcraft_project_model::{EffectParameters, ParamValue, SubtitleData};

use crate::composition::{Effect, LayeredComposition};
use crate::source::{resize_source, FrameRateLimited, VideoSource};

pub const COUNT_PARAMETERS: [&str; 2] = ["particle_count", "point_count"];
pub const COUNT_SCALE: f64 = 0.3;

pub const STEP_PARAMETERS: [&str; 2] = ["animation_steps", "interpolation_steps"];
pub const STEP_SCALE: f64 = 0.5;

pub const SIZE_PARAMETERS: [&str; 2] = ["font_size", "outline_font_size"];

// Absorbs binary representation error, e.g. 100 * 0.3 = 29.999...
const FLOOR_EPSILON: f64 = 1e-9;

fn scale_value(value: &ParamValue, factor: f64, min: i64) -> ParamValue {
    match value {
        ParamValue::Integer(v) => {
            let scaled = (*v as f64 * factor + FLOOR_EPSILON).floor() as i64;
            ParamValue::Integer(scaled.max(min))
        }
        ParamValue::Number(v) => {
            let scaled = (v * factor + FLOOR_EPSILON).floor();
            ParamValue::Number(scaled.max(min as f64))
        }
        other => other.clone(),
    }
}

/// Turns full-fidelity inputs into a [`LayeredComposition`] cheap enough to
/// sample at interactive rates.
pub struct CompositionDowngrader<'a> {
    config: &'a PreviewConfig,
}

impl<'a> CompositionDowngrader<'a> {
    pub fn new(config: &'a PreviewConfig) -> Self {
        Self { config }
    }

    /// Preview parameter set for an effect's original parameters.
    pub fn preview_parameters(&self, parameters: &EffectParameters) -> EffectParameters {
        let size_factor = self.config.resolution.0 as f64 / self.config.reference_width as f64;
        parameters
            .iter()
            .map(|(key, value)| {
                let key_str = key.as_str();
                let scaled = if COUNT_PARAMETERS.contains(&key_str) {
                    scale_value(value, COUNT_SCALE, 1)
                } else if STEP_PARAMETERS.contains(&key_str) {
                    scale_value(value, STEP_SCALE, 1)
                } else if SIZE_PARAMETERS.contains(&key_str) {
                    scale_value(value, size_factor, self.config.min_font_size)
                } else {
                    value.clone()
                };
                (key.clone(), scaled)
            })
            .collect()
    }

    /// Resize the background and, below full quality, reduce its frame rate.
    pub fn prepare_background(&self, background: Arc<dyn VideoSource>) -> Arc<dyn VideoSource> {
        let (width, height) = self.config.resolution;
        let source_fps = background.fps();
        let resized = resize_source(background, width, height);

        let quality = PreviewConfig::clamp_quality(self.config.quality_factor);
        match source_fps {
            Some(fps) if quality < 1.0 && fps.is_finite() && fps > 0.0 => {
                let reduced = (fps * quality).floor().max(1.0);
                tracing::debug!(source_fps = fps, preview_fps = reduced, "Reducing background frame rate");
                Arc::new(FrameRateLimited::new(resized, reduced))
            }
            _ => resized,
        }
    }

    fn check_background(background: &dyn VideoSource) -> SubcraftResult<()> {
        let duration = background.duration();
        if !duration.is_finite() || duration < 0.0 {
            return Err(SubcraftError::composition(format!(
                "background has invalid duration {duration}"
            )));
        }
        let (width, height) = background.size();
        if width == 0 || height == 0 {
            return Err(SubcraftError::composition(format!(
                "background has empty size {width}x{height}"
            )));
        }
        Ok(())
    }

    /// Assemble the preview composition.
    ///
    /// A missing or invalid background fails the whole build. An effect
    /// that fails to apply is left out and the build continues.
    pub fn build(
        &self,
        background: Option<Arc<dyn VideoSource>>,
        subtitles: &SubtitleData,
        effects: &[Arc<dyn Effect>],
    ) -> SubcraftResult<LayeredComposition> {
        let background = background
            .ok_or_else(|| SubcraftError::composition("background clip is required"))?;
        Self::check_background(background.as_ref())?;

        let base = self.prepare_background(background);
        let mut composition = LayeredComposition::new(Arc::clone(&base));

        for effect in effects {
            let kind = effect.kind();
            if self.config.skip_complex_effects && self.config.is_complex_kind(kind.as_str()) {
                tracing::debug!(effect = effect.name(), %kind, "Skipping complex effect in preview");
                composition.record_skipped_effect(effect.name());
                continue;
            }

            let preview_name = format!("{}_preview", effect.name());
            let preview_effect =
                effect.with_parameters(preview_name.clone(), self.preview_parameters(effect.parameters()));

            match preview_effect.apply(base.as_ref(), subtitles) {
                Ok(Some(layer)) => composition.push_layer(preview_name, layer),
                Ok(None) => {
                    tracing::trace!(effect = effect.name(), "Effect produced no layer");
                }
                Err(e) => {
                    tracing::warn!(effect = effect.name(), error = %e, "Preview effect failed; leaving it out");
                    composition.record_failed_effect(effect.name());
                }
            }
        }

        Ok(composition)
    }
}
