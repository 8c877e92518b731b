//! Effect, layer, and composition contracts.
//!
//! An [`Effect`] turns a background plus a subtitle timeline into a
//! [`Layer`] (its renderable addition). A [`LayeredComposition`] stacks
//! those layers over the background in effect order and is what the
//! preview engine samples.

use std::sync::Arc;

use subcraft_common::error::SubcraftResult;
use subcraft_project_model::{EffectKind, EffectParameters, SubtitleData};

use crate::audio::AudioTrack;
use crate::frame::Frame;
use crate::source::VideoSource;

/// A renderable addition drawn over the frames below it.
pub trait Layer: Send + Sync {
    /// How long the layer is visible; `None` means for the whole
    /// composition.
    fn duration(&self) -> Option<f64> {
        None
    }

    /// Draw this layer's contribution at `time` onto `frame`.
    fn render_onto(&self, frame: &mut Frame, time: f64) -> SubcraftResult<()>;
}

/// A named, parameterized visual effect.
pub trait Effect: Send + Sync {
    fn name(&self) -> &str;

    /// Declared category, used to filter complex effects out of previews.
    fn kind(&self) -> EffectKind;

    fn parameters(&self) -> &EffectParameters;

    /// Build another instance of the same effect with new parameters.
    fn with_parameters(&self, name: String, parameters: EffectParameters) -> Arc<dyn Effect>;

    /// Produce this effect's layer for `base`. `Ok(None)` means the effect
    /// contributes nothing (e.g. no subtitle lines to style).
    fn apply(
        &self,
        base: &dyn VideoSource,
        subtitles: &SubtitleData,
    ) -> SubcraftResult<Option<Arc<dyn Layer>>>;
}

/// Something the preview engine can sample.
pub trait Composition: Send + Sync {
    fn duration(&self) -> f64;

    fn size(&self) -> (u32, u32);

    fn sample(&self, time: f64) -> SubcraftResult<Frame>;
}

struct NamedLayer {
    name: String,
    layer: Arc<dyn Layer>,
}

/// A background with effect layers stacked in order. Immutable once built.
pub struct LayeredComposition {
    background: Arc<dyn VideoSource>,
    layers: Vec<NamedLayer>,
    duration: f64,
    failed_effects: Vec<String>,
    skipped_effects: Vec<String>,
    audio: Option<AudioTrack>,
}

impl LayeredComposition {
    pub fn new(background: Arc<dyn VideoSource>) -> Self {
        let duration = background.duration();
        Self {
            background,
            layers: Vec::new(),
            duration,
            failed_effects: Vec::new(),
            skipped_effects: Vec::new(),
            audio: None,
        }
    }

    /// Stack a layer on top. The composition lasts as long as its longest
    /// member.
    pub fn push_layer(&mut self, name: impl Into<String>, layer: Arc<dyn Layer>) {
        if let Some(d) = layer.duration() {
            if d.is_finite() {
                self.duration = self.duration.max(d);
            }
        }
        self.layers.push(NamedLayer {
            name: name.into(),
            layer,
        });
    }

    pub(crate) fn record_failed_effect(&mut self, name: &str) {
        self.failed_effects.push(name.to_string());
    }

    pub(crate) fn record_skipped_effect(&mut self, name: &str) {
        self.skipped_effects.push(name.to_string());
    }

    /// Names of the layers, bottom to top.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name.as_str()).collect()
    }

    /// Effects whose application failed and were left out.
    pub fn failed_effects(&self) -> &[String] {
        &self.failed_effects
    }

    /// Effects filtered out as too expensive for the preview.
    pub fn skipped_effects(&self) -> &[String] {
        &self.skipped_effects
    }

    pub fn background(&self) -> &Arc<dyn VideoSource> {
        &self.background
    }

    /// Attach audio that was fitted to this composition's duration.
    pub fn set_audio(&mut self, track: AudioTrack) {
        self.audio = Some(track);
    }

    pub fn audio(&self) -> Option<&AudioTrack> {
        self.audio.as_ref()
    }
}

impl Composition for LayeredComposition {
    fn duration(&self) -> f64 {
        self.duration
    }

    fn size(&self) -> (u32, u32) {
        self.background.size()
    }

    fn sample(&self, time: f64) -> SubcraftResult<Frame> {
        let background_time = time.min(self.background.duration()).max(0.0);
        let mut frame = self.background.frame_at(background_time)?;
        for named in &self.layers {
            if let Some(d) = named.layer.duration() {
                if time > d {
                    continue;
                }
            }
            named.layer.render_onto(&mut frame, time)?;
        }
        Ok(frame.with_timestamp(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SolidColorSource;
    use subcraft_common::error::SubcraftError;

    struct Stripe {
        row: u32,
        rgba: [u8; 4],
        until: Option<f64>,
    }

    impl Layer for Stripe {
        fn duration(&self) -> Option<f64> {
            self.until
        }

        fn render_onto(&self, frame: &mut Frame, _time: f64) -> SubcraftResult<()> {
            let width = frame.width();
            frame.fill_rect(0, self.row, width, 1, self.rgba);
            Ok(())
        }
    }

    struct Broken;

    impl Layer for Broken {
        fn render_onto(&self, _frame: &mut Frame, time: f64) -> SubcraftResult<()> {
            Err(SubcraftError::render(format!("cannot draw at {time}")))
        }
    }

    fn background() -> Arc<dyn VideoSource> {
        Arc::new(SolidColorSource::new(4, 4, 2.0, [0, 0, 0]))
    }

    #[test]
    fn test_layers_stack_in_order() {
        let mut comp = LayeredComposition::new(background());
        comp.push_layer(
            "red",
            Arc::new(Stripe {
                row: 0,
                rgba: [255, 0, 0, 255],
                until: None,
            }),
        );
        comp.push_layer(
            "blue",
            Arc::new(Stripe {
                row: 0,
                rgba: [0, 0, 255, 255],
                until: None,
            }),
        );
        let frame = comp.sample(1.0).unwrap();
        assert_eq!(frame.pixel(0, 0), Some(&[0, 0, 255][..]));
        assert_eq!(frame.pixel(0, 1), Some(&[0, 0, 0][..]));
        assert_eq!(comp.layer_names(), vec!["red", "blue"]);
    }

    #[test]
    fn test_duration_is_longest_member() {
        let mut comp = LayeredComposition::new(background());
        comp.push_layer(
            "long",
            Arc::new(Stripe {
                row: 1,
                rgba: [0, 255, 0, 255],
                until: Some(5.0),
            }),
        );
        assert_eq!(comp.duration(), 5.0);

        // Past the background's end the last background frame is reused.
        let frame = comp.sample(4.0).unwrap();
        assert_eq!(frame.timestamp(), 4.0);
        assert_eq!(frame.pixel(0, 1), Some(&[0, 255, 0][..]));
    }

    #[test]
    fn test_expired_layer_is_hidden() {
        let mut comp = LayeredComposition::new(background());
        comp.push_layer(
            "short",
            Arc::new(Stripe {
                row: 2,
                rgba: [255, 255, 255, 255],
                until: Some(1.0),
            }),
        );
        assert_eq!(comp.sample(0.5).unwrap().pixel(0, 2), Some(&[255, 255, 255][..]));
        assert_eq!(comp.sample(1.5).unwrap().pixel(0, 2), Some(&[0, 0, 0][..]));
    }

    #[test]
    fn test_audio_follows_composition() {
        use crate::audio::{AudioFit, AudioTrack, SilentAudio};

        let mut comp = LayeredComposition::new(background());
        assert!(comp.audio().is_none());
        let track = AudioTrack::fit(Arc::new(SilentAudio::new(0.75)), comp.duration()).unwrap();
        comp.set_audio(track);
        let audio = comp.audio().unwrap();
        assert_eq!(
            audio.fit_plan(),
            AudioFit::Loop {
                repeats: 3,
                length: 2.0
            }
        );
    }

    #[test]
    fn test_layer_failure_fails_sample() {
        let mut comp = LayeredComposition::new(background());
        comp.push_layer("broken", Arc::new(Broken));
        assert!(matches!(comp.sample(0.0), Err(SubcraftError::Render { .. })));
    }
}
