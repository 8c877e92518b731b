//! Audio attached to a preview.
//!
//! Only durations are inspected here. An [`AudioTrack`] records how a
//! source is fitted to the composition's length: looped when the preview
//! runs longer, trimmed when it runs shorter. Decoding and mixing are left
//! to whoever plays the composition.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use subcraft_common::error::{SubcraftError, SubcraftResult};

/// Largest difference between clip and audio length still reported as a
/// match.
pub const DURATION_MATCH_TOLERANCE_SECS: f64 = 0.1;

/// A piece of audio that can accompany a preview.
pub trait AudioSource: Send + Sync {
    /// Length in seconds.
    fn duration(&self) -> f64;
}

/// How a source is stretched over the composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AudioFit {
    /// The source is at least as long as the clip; play its first
    /// `length` seconds.
    Trim { length: f64 },
    /// The source is shorter; play it `repeats` times, cutting the last
    /// pass at `length`.
    Loop { repeats: u32, length: f64 },
}

impl AudioFit {
    /// Plan how audio of `audio_duration` seconds covers a clip of
    /// `clip_duration` seconds.
    pub fn plan(audio_duration: f64, clip_duration: f64) -> SubcraftResult<Self> {
        if !(audio_duration.is_finite() && audio_duration > 0.0) {
            return Err(SubcraftError::validation(format!(
                "audio duration must be positive, got {audio_duration}"
            )));
        }
        if !(clip_duration.is_finite() && clip_duration > 0.0) {
            return Err(SubcraftError::validation(format!(
                "cannot fit audio to a clip of {clip_duration}s"
            )));
        }

        if clip_duration > audio_duration {
            let repeats = (clip_duration / audio_duration).ceil() as u32;
            Ok(AudioFit::Loop {
                repeats,
                length: clip_duration,
            })
        } else {
            Ok(AudioFit::Trim {
                length: clip_duration,
            })
        }
    }

    /// Length of the fitted audio.
    pub fn length(&self) -> f64 {
        match *self {
            AudioFit::Trim { length } | AudioFit::Loop { length, .. } => length,
        }
    }
}

/// An audio source fitted to one composition.
#[derive(Clone)]
pub struct AudioTrack {
    source: Arc<dyn AudioSource>,
    source_duration: f64,
    fit: AudioFit,
}

impl AudioTrack {
    /// Fit `source` to a clip of `clip_duration` seconds.
    pub fn fit(source: Arc<dyn AudioSource>, clip_duration: f64) -> SubcraftResult<Self> {
        let source_duration = source.duration();
        let fit = AudioFit::plan(source_duration, clip_duration)?;
        Ok(Self {
            source,
            source_duration,
            fit,
        })
    }

    pub fn source(&self) -> &Arc<dyn AudioSource> {
        &self.source
    }

    pub fn fit_plan(&self) -> AudioFit {
        self.fit
    }

    /// Length of the source before fitting.
    pub fn source_duration(&self) -> f64 {
        self.source_duration
    }

    /// Length after looping or trimming.
    pub fn duration(&self) -> f64 {
        self.fit.length()
    }

    /// Position in the source heard at composition time `time`, or `None`
    /// outside the fitted track.
    pub fn source_time(&self, time: f64) -> Option<f64> {
        if !(0.0..=self.duration()).contains(&time) {
            return None;
        }
        match self.fit {
            AudioFit::Trim { .. } => Some(time),
            AudioFit::Loop { .. } => {
                let offset = time % self.source_duration;
                // The last instant of a full pass is the end of the source,
                // not its start.
                if offset == 0.0 && time > 0.0 {
                    Some(self.source_duration)
                } else {
                    Some(offset)
                }
            }
        }
    }
}

impl fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioTrack")
            .field("source_duration", &self.source_duration)
            .field("fit", &self.fit)
            .finish()
    }
}

/// Whether the installed preview carries audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NoClip,
    NoAudio,
    Synced,
}

/// Audio synchronization report for the installed preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioSyncInfo {
    pub has_audio: bool,
    pub sync_status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_audio_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_match: Option<bool>,
}

impl AudioSyncInfo {
    /// Report for an engine with nothing installed.
    pub fn no_clip() -> Self {
        Self {
            has_audio: false,
            sync_status: SyncStatus::NoClip,
            clip_duration: None,
            audio_duration: None,
            source_audio_duration: None,
            duration_match: None,
        }
    }

    /// Report for a clip of `clip_duration` seconds and its track, if any.
    pub fn describe(clip_duration: f64, track: Option<&AudioTrack>) -> Self {
        match track {
            None => Self {
                has_audio: false,
                sync_status: SyncStatus::NoAudio,
                clip_duration: Some(clip_duration),
                ..Self::no_clip()
            },
            Some(track) => {
                let audio_duration = track.duration();
                Self {
                    has_audio: true,
                    sync_status: SyncStatus::Synced,
                    clip_duration: Some(clip_duration),
                    audio_duration: Some(audio_duration),
                    source_audio_duration: Some(track.source_duration()),
                    duration_match: Some(
                        (clip_duration - audio_duration).abs() < DURATION_MATCH_TOLERANCE_SECS,
                    ),
                }
            }
        }
    }
}

/// Silence of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct SilentAudio {
    pub duration: f64,
}

impl SilentAudio {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

impl AudioSource for SilentAudio {
    fn duration(&self) -> f64 {
        self.duration
    }
}
