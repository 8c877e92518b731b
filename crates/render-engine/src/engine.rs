//! The preview engine façade.
//!
//! Wires the downgrader, frame cache, performance monitor, observer hub and
//! playback clock together. One interactive thread calls into the engine;
//! the playback clock renders from its own thread through the same cache.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;

use subcraft_common::clock::frame_interval;
use subcraft_common::config::PreviewConfig;
use subcraft_common::error::{SubcraftError, SubcraftResult};
use subcraft_project_model::SubtitleData;

use crate::audio::{AudioSource, AudioSyncInfo, AudioTrack};
use crate::cache::{CacheStats, FrameCache};
use crate::callbacks::{CallbackHub, SubscriptionId};
use crate::composition::{Composition, Effect, LayeredComposition};
use crate::downgrade::CompositionDowngrader;
use crate::frame::Frame;
use crate::monitor::{PerformanceMonitor, RenderStats};
use crate::playback::{CancellationToken, PlaybackClock, PlaybackState, TickHandler};
use crate::source::VideoSource;

/// Quality, complex-effect skipping and fps for each performance preset.
const HIGH_PERFORMANCE_PRESET: (f64, bool, f64) = (0.3, true, 10.0);
const BALANCED_PRESET: (f64, bool, f64) = (0.7, false, 15.0);

/// Render and cache statistics plus the active preview settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    #[serde(flatten)]
    pub render: RenderStats,
    pub cache: CacheStats,
    pub target_fps: f64,
    pub preview_resolution: (u32, u32),
    pub quality_factor: f64,
    pub skip_complex_effects: bool,
}

/// State shared between the interactive thread and the playback thread.
struct EngineCore {
    settings: RwLock<PreviewConfig>,
    cache: FrameCache,
    monitor: PerformanceMonitor,
    callbacks: CallbackHub,
    composition: RwLock<Option<Arc<LayeredComposition>>>,
}

impl EngineCore {
    fn installed(&self) -> Option<Arc<LayeredComposition>> {
        self.composition.read().clone()
    }

    /// Cache-first frame lookup; renders, records and caches on a miss.
    /// Render failures are logged and yield `None`.
    ///
    /// A render is only kept if `composition` is still the installed one
    /// and `token`, when given, has not been cancelled. The install lock is
    /// held across the check and the cache insert, so a concurrent rebuild
    /// either clears the frame or is seen by the check.
    fn frame_at(
        &self,
        composition: &Arc<LayeredComposition>,
        time: f64,
        tolerance: f64,
        token: Option<&CancellationToken>,
    ) -> Option<Frame> {
        if let Some(frame) = self.cache.get_within(time, tolerance) {
            return Some(frame);
        }

        let started = Instant::now();
        let frame = match composition.sample(time) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(time, error = %e, "Preview render failed");
                return None;
            }
        };
        let elapsed = started.elapsed();

        let installed = self.composition.read();
        let current = installed
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, composition));
        if !current || token.is_some_and(CancellationToken::is_cancelled) {
            tracing::debug!(time, "Discarding frame rendered for a replaced preview");
            return None;
        }
        self.monitor.record(elapsed);
        self.cache.put(time, &frame);
        Some(frame)
    }

    /// Make `composition` the active preview and drop every frame cached
    /// for the previous one.
    fn install(&self, composition: Arc<LayeredComposition>) {
        let mut installed = self.composition.write();
        *installed = Some(composition);
        self.cache.clear();
    }
}

fn clamp_time(time: f64, duration: f64) -> f64 {
    if time.is_nan() {
        return 0.0;
    }
    time.max(0.0).min(duration.max(0.0))
}

/// Renders one playback tick through the engine's cache.
struct PlaybackDriver {
    core: Arc<EngineCore>,
    composition: Arc<LayeredComposition>,
}

impl TickHandler for PlaybackDriver {
    fn duration(&self) -> f64 {
        self.composition.duration()
    }

    fn on_tick(&self, time: f64, token: &CancellationToken) {
        // Narrower than a frame so consecutive ticks never share one
        // cached frame.
        let (cache_tolerance, fps) = {
            let settings = self.core.settings.read();
            (settings.cache_tolerance_secs, settings.target_fps)
        };
        let tolerance = cache_tolerance.min(frame_interval(fps).as_secs_f64() / 2.0);

        let frame = self
            .core
            .frame_at(&self.composition, time, tolerance, Some(token));
        // A run stopped mid-render publishes nothing.
        if token.is_cancelled() {
            return;
        }
        if let Some(frame) = frame {
            self.core.callbacks.notify_frame(&frame, time);
        }
        self.core.callbacks.notify_time(time);
    }
}

/// Real-time preview of a subtitle composition.
pub struct PreviewEngine {
    core: Arc<EngineCore>,
    clock: PlaybackClock,
}

impl PreviewEngine {
    /// Create an engine. The configuration is validated and its quality
    /// factor clamped into range.
    pub fn new(mut config: PreviewConfig) -> SubcraftResult<Self> {
        config.validate()?;
        config.quality_factor = PreviewConfig::clamp_quality(config.quality_factor);

        let core = EngineCore {
            cache: FrameCache::with_tolerance(config.cache_capacity, config.cache_tolerance_secs),
            monitor: PerformanceMonitor::new(config.render_history_capacity),
            callbacks: CallbackHub::new(),
            composition: RwLock::new(None),
            settings: RwLock::new(config.clone()),
        };

        tracing::debug!(
            width = config.resolution.0,
            height = config.resolution.1,
            fps = config.target_fps,
            cache_capacity = config.cache_capacity,
            "Preview engine created"
        );

        Ok(Self {
            core: Arc::new(core),
            clock: PlaybackClock::new(config.target_fps),
        })
    }

    /// Current settings.
    pub fn settings(&self) -> PreviewConfig {
        self.core.settings.read().clone()
    }

    /// Build and install a preview composition.
    ///
    /// On success playback is stopped, the frame cache is cleared and the
    /// new composition replaces the old one. Render history is kept. On
    /// failure the previously installed composition stays untouched.
    pub fn generate_preview(
        &self,
        background: Option<Arc<dyn VideoSource>>,
        subtitles: &SubtitleData,
        effects: &[Arc<dyn Effect>],
    ) -> SubcraftResult<Arc<LayeredComposition>> {
        let composition = self.build(background, subtitles, effects)?;
        Ok(self.install(composition))
    }

    /// Build and install a preview with `audio` fitted to its length.
    ///
    /// Audio shorter than the preview is looped, longer audio is trimmed.
    /// If the audio cannot be fitted the preview is installed without it;
    /// only a failure to build the preview itself is an error.
    pub fn update_preview_with_audio(
        &self,
        background: Option<Arc<dyn VideoSource>>,
        subtitles: &SubtitleData,
        effects: &[Arc<dyn Effect>],
        audio: Option<Arc<dyn AudioSource>>,
    ) -> SubcraftResult<Arc<LayeredComposition>> {
        let mut composition = self.build(background, subtitles, effects)?;
        if let Some(audio) = audio {
            match AudioTrack::fit(audio, composition.duration()) {
                Ok(track) => {
                    tracing::debug!(fit = ?track.fit_plan(), "Audio fitted to preview");
                    composition.set_audio(track);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Audio sync failed; continuing without audio");
                }
            }
        }
        Ok(self.install(composition))
    }

    /// Audio synchronization status of the installed preview.
    pub fn audio_sync_info(&self) -> AudioSyncInfo {
        match self.core.installed() {
            Some(composition) => {
                AudioSyncInfo::describe(composition.duration(), composition.audio())
            }
            None => AudioSyncInfo::no_clip(),
        }
    }

    fn build(
        &self,
        background: Option<Arc<dyn VideoSource>>,
        subtitles: &SubtitleData,
        effects: &[Arc<dyn Effect>],
    ) -> SubcraftResult<LayeredComposition> {
        let settings = self.settings();
        CompositionDowngrader::new(&settings).build(background, subtitles, effects)
    }

    fn install(&self, composition: LayeredComposition) -> Arc<LayeredComposition> {
        let composition = Arc::new(composition);
        self.clock.stop();
        self.core.install(Arc::clone(&composition));

        tracing::info!(
            duration = composition.duration(),
            layers = composition.layer_names().len(),
            failed = composition.failed_effects().len(),
            skipped = composition.skipped_effects().len(),
            audio = composition.audio().is_some(),
            "Preview generated"
        );
        composition
    }

    /// The installed preview composition, if any.
    pub fn composition(&self) -> Option<Arc<LayeredComposition>> {
        self.core.installed()
    }

    /// Show the frame at `time`, clamped into the timeline.
    ///
    /// Blocks for one render on a cache miss. Returns `None` when no preview
    /// exists or rendering fails. The playhead moves even when the render
    /// fails; time observers only hear about seeks that produced a frame.
    pub fn seek_to_time(&self, time: f64) -> Option<Frame> {
        let composition = self.core.installed()?;
        let time = clamp_time(time, composition.duration());
        self.clock.seek(time);

        let tolerance = self.core.cache.tolerance();
        let frame = self.core.frame_at(&composition, time, tolerance, None)?;

        self.core.callbacks.notify_time(time);
        Some(frame)
    }

    fn require_composition(&self) -> SubcraftResult<Arc<LayeredComposition>> {
        self.core.installed().ok_or_else(|| {
            SubcraftError::composition("no preview composition; generate a preview first")
        })
    }

    pub fn start_playback(&self, from_time: f64) -> SubcraftResult<()> {
        let composition = self.require_composition()?;
        let from = clamp_time(from_time, composition.duration());
        let driver = Arc::new(PlaybackDriver {
            core: Arc::clone(&self.core),
            composition,
        });
        self.clock.start(driver, from)
    }

    /// Returns whether playback was running.
    pub fn pause_playback(&self) -> bool {
        self.clock.pause()
    }

    /// Returns whether playback restarted.
    pub fn resume_playback(&self) -> SubcraftResult<bool> {
        self.require_composition()?;
        self.clock.resume()
    }

    /// Stop playback and rewind to the start. Waits at most one second for
    /// the playback thread.
    pub fn stop_playback(&self) {
        self.clock.stop();
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// Length of the installed preview, 0 when there is none.
    pub fn duration(&self) -> f64 {
        self.core
            .installed()
            .map(|composition| composition.duration())
            .unwrap_or(0.0)
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.clock.snapshot()
    }

    /// Set the background frame-rate factor used by the next
    /// `generate_preview`. Values are clamped into `[0.1, 1.0]`.
    pub fn set_preview_quality(&self, factor: f64) -> f64 {
        let clamped = PreviewConfig::clamp_quality(factor);
        self.core.settings.write().quality_factor = clamped;
        tracing::debug!(requested = factor, applied = clamped, "Preview quality set");
        clamped
    }

    /// Whether the next `generate_preview` leaves out complex effects.
    pub fn set_skip_complex_effects(&self, skip: bool) {
        self.core.settings.write().skip_complex_effects = skip;
    }

    pub fn set_target_fps(&self, fps: f64) -> SubcraftResult<()> {
        self.clock.set_target_fps(fps)?;
        self.core.settings.write().target_fps = fps;
        Ok(())
    }

    /// Resolution used by the next `generate_preview`.
    pub fn set_preview_resolution(&self, width: u32, height: u32) -> SubcraftResult<()> {
        if width == 0 || height == 0 {
            return Err(SubcraftError::validation(format!(
                "preview resolution must be non-zero, got {width}x{height}"
            )));
        }
        self.core.settings.write().resolution = (width, height);
        Ok(())
    }

    /// Apply the high-performance preset (low quality, complex effects
    /// skipped, 10 fps) or the balanced one.
    pub fn set_performance_mode(&self, high_performance: bool) {
        let (quality, skip, fps) = if high_performance {
            HIGH_PERFORMANCE_PRESET
        } else {
            BALANCED_PRESET
        };
        {
            let mut settings = self.core.settings.write();
            settings.quality_factor = quality;
            settings.skip_complex_effects = skip;
            settings.target_fps = fps;
        }
        if let Err(e) = self.clock.set_target_fps(fps) {
            tracing::warn!(error = %e, "Failed to apply preset frame rate");
        }
        tracing::info!(high_performance, quality, skip, fps, "Performance mode set");
    }

    /// Drop every cached frame and the render history.
    pub fn clear_cache(&self) {
        self.core.cache.clear();
        self.core.monitor.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.core.cache.stats()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let settings = self.core.settings.read();
        PerformanceStats {
            render: self.core.monitor.stats(),
            cache: self.core.cache.stats(),
            target_fps: settings.target_fps,
            preview_resolution: settings.resolution,
            quality_factor: settings.quality_factor,
            skip_complex_effects: settings.skip_complex_effects,
        }
    }

    /// A small still of the preview at `time`, sharing the frame cache.
    pub fn create_preview_thumbnail(&self, time: f64, size: (u32, u32)) -> Option<Frame> {
        let composition = self.core.installed()?;
        let time = clamp_time(time, composition.duration());
        let frame = self
            .core
            .frame_at(&composition, time, self.core.cache.tolerance(), None)?;
        Some(frame.resized(size.0, size.1))
    }

    /// Seek to `time` and write the frame to `path`. The image format
    /// follows the extension, PNG by default.
    pub fn export_preview_frame(&self, time: f64, path: &Path) -> SubcraftResult<()> {
        let frame = self
            .seek_to_time(time)
            .ok_or_else(|| SubcraftError::render(format!("no preview frame at {time}s")))?;
        frame.save_image(path)?;
        tracing::info!(time, path = %path.display(), "Exported preview frame");
        Ok(())
    }

    pub fn add_frame_callback<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Frame, f64) + Send + Sync + 'static,
    {
        self.core.callbacks.add_frame_callback(callback)
    }

    pub fn add_time_callback<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.core.callbacks.add_time_callback(callback)
    }

    pub fn remove_frame_callback(&self, id: SubscriptionId) -> bool {
        self.core.callbacks.remove_frame_callback(id)
    }

    pub fn remove_time_callback(&self, id: SubscriptionId) -> bool {
        self.core.callbacks.remove_time_callback(id)
    }

    /// Observer invocations that panicked so far.
    pub fn callback_failures(&self) -> usize {
        self.core.callbacks.failure_count()
    }
}

impl Drop for PreviewEngine {
    fn drop(&mut self) {
        self.clock.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFit, SilentAudio, SyncStatus};
    use crate::source::SolidColorSource;

    fn engine() -> PreviewEngine {
        PreviewEngine::new(PreviewConfig::default()).unwrap()
    }

    fn background(duration: f64) -> Option<Arc<dyn VideoSource>> {
        Some(Arc::new(SolidColorSource::new(1920, 1080, duration, [10, 20, 30])))
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PreviewConfig {
            target_fps: 0.0,
            ..Default::default()
        };
        assert!(PreviewEngine::new(config).is_err());

        let config = PreviewConfig {
            quality_factor: 7.0,
            ..Default::default()
        };
        assert_eq!(PreviewEngine::new(config).unwrap().settings().quality_factor, 1.0);
    }

    #[test]
    fn test_no_preview_yet() {
        let engine = engine();
        assert!(engine.seek_to_time(1.0).is_none());
        assert!(engine.create_preview_thumbnail(0.0, (8, 8)).is_none());
        assert_eq!(engine.duration(), 0.0);
        assert!(matches!(
            engine.start_playback(0.0),
            Err(SubcraftError::Composition { .. })
        ));
        assert!(engine.resume_playback().is_err());
    }

    #[test]
    fn test_seek_renders_at_preview_resolution() {
        let engine = engine();
        engine
            .generate_preview(background(4.0), &SubtitleData::default(), &[])
            .unwrap();
        let frame = engine.seek_to_time(1.0).unwrap();
        assert_eq!(frame.size(), (640, 360));
        assert_eq!(frame.pixel(0, 0), Some(&[10, 20, 30][..]));
        assert_eq!(engine.current_time(), 1.0);
    }

    #[test]
    fn test_frames_for_replaced_preview_are_not_cached() {
        let engine = engine();
        let old = engine
            .generate_preview(background(2.0), &SubtitleData::default(), &[])
            .unwrap();
        engine
            .generate_preview(background(2.0), &SubtitleData::default(), &[])
            .unwrap();
        assert!(engine.core.frame_at(&old, 1.0, 0.1, None).is_none());
        assert_eq!(engine.cache_stats().size, 0);

        let current = engine.composition().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(engine.core.frame_at(&current, 1.0, 0.1, Some(&token)).is_none());
        assert_eq!(engine.cache_stats().size, 0);

        assert!(engine.core.frame_at(&current, 1.0, 0.1, None).is_some());
        assert_eq!(engine.cache_stats().size, 1);
        assert_eq!(engine.performance_stats().render.frame_count, 1);
    }

    #[test]
    fn test_audio_is_fitted_to_preview() {
        let engine = engine();
        assert_eq!(engine.audio_sync_info(), AudioSyncInfo::no_clip());

        engine
            .generate_preview(background(4.0), &SubtitleData::default(), &[])
            .unwrap();
        let info = engine.audio_sync_info();
        assert_eq!(info.sync_status, SyncStatus::NoAudio);
        assert_eq!(info.clip_duration, Some(4.0));
        assert!(!info.has_audio);

        let composition = engine
            .update_preview_with_audio(
                background(4.0),
                &SubtitleData::default(),
                &[],
                Some(Arc::new(SilentAudio::new(1.5))),
            )
            .unwrap();
        assert!(matches!(
            composition.audio().map(AudioTrack::fit_plan),
            Some(AudioFit::Loop { repeats: 3, .. })
        ));
        let info = engine.audio_sync_info();
        assert!(info.has_audio);
        assert_eq!(info.sync_status, SyncStatus::Synced);
        assert_eq!(info.audio_duration, Some(4.0));
        assert_eq!(info.duration_match, Some(true));

        engine
            .update_preview_with_audio(
                background(4.0),
                &SubtitleData::default(),
                &[],
                Some(Arc::new(SilentAudio::new(9.0))),
            )
            .unwrap();
        assert_eq!(engine.audio_sync_info().source_audio_duration, Some(9.0));
        assert_eq!(engine.audio_sync_info().audio_duration, Some(4.0));
    }

    #[test]
    fn test_unusable_audio_is_dropped() {
        let engine = engine();
        let composition = engine
            .update_preview_with_audio(
                background(3.0),
                &SubtitleData::default(),
                &[],
                Some(Arc::new(SilentAudio::new(0.0))),
            )
            .unwrap();
        assert!(composition.audio().is_none());
        assert_eq!(engine.audio_sync_info().sync_status, SyncStatus::NoAudio);

        let result = engine.update_preview_with_audio(
            None,
            &SubtitleData::default(),
            &[],
            Some(Arc::new(SilentAudio::new(2.0))),
        );
        assert!(matches!(result, Err(SubcraftError::Composition { .. })));
        assert!(Arc::ptr_eq(&engine.composition().unwrap(), &composition));
    }

    #[test]
    fn test_quality_and_presets() {
        let engine = engine();
        assert_eq!(engine.set_preview_quality(0.01), 0.1);
        assert_eq!(engine.set_preview_quality(f64::NAN), 1.0);

        engine.set_performance_mode(true);
        let stats = engine.performance_stats();
        assert_eq!(stats.quality_factor, 0.3);
        assert!(stats.skip_complex_effects);
        assert_eq!(stats.target_fps, 10.0);
        assert_eq!(engine.playback_state().target_fps, 10.0);

        engine.set_performance_mode(false);
        let stats = engine.performance_stats();
        assert_eq!(stats.quality_factor, 0.7);
        assert!(!stats.skip_complex_effects);
        assert_eq!(stats.target_fps, 15.0);

        assert!(engine.set_target_fps(-1.0).is_err());
        assert!(engine.set_preview_resolution(0, 10).is_err());
        engine.set_preview_resolution(320, 180).unwrap();
        assert_eq!(engine.settings().resolution, (320, 180));
    }

    #[test]
    fn test_thumbnail_and_stats_serialize() {
        let engine = engine();
        engine
            .generate_preview(background(2.0), &SubtitleData::default(), &[])
            .unwrap();
        let thumb = engine.create_preview_thumbnail(5.0, (32, 18)).unwrap();
        assert_eq!(thumb.size(), (32, 18));

        let json = serde_json::to_value(engine.performance_stats()).unwrap();
        assert_eq!(json["frame_count"], 1);
        assert_eq!(json["cache"]["size"], 1);
        assert_eq!(json["preview_resolution"], serde_json::json!([640, 360]));
    }
}
