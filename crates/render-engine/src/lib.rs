//! Subcraft Render Engine
//!
//! Real-time preview of a subtitle composition. A full-fidelity background
//! and effect stack is downgraded once into a cheap composition, which is
//! then scrubbed and played back through a time-keyed frame cache.
//!
//! # Preview Pipeline
//!
//! ```text
//! background ──┐
//! subtitles ───┼── CompositionDowngrader ── LayeredComposition
//! effects ─────┘   (resize, fps, params)           │
//!                                                  ▼
//! seek_to_time ──────────┐             FrameCache (hit?) ── sample on miss
//! PlaybackClock tick ────┘                         │        └─ PerformanceMonitor
//!                                                  ▼
//!                                             CallbackHub
//!                                        (frame / time observers)
//! ```

pub mod audio;
pub mod cache;
pub mod callbacks;
pub mod composition;
pub mod downgrade;
pub mod engine;
pub mod frame;
pub mod monitor;
pub mod playback;
pub mod source;

pub use audio::{AudioFit, AudioSource, AudioSyncInfo, AudioTrack, SilentAudio, SyncStatus};
pub use cache::{CacheStats, FrameCache};
pub use callbacks::{CallbackHub, SubscriptionId};
pub use composition::{Composition, Effect, LayeredComposition, Layer};
pub use downgrade::CompositionDowngrader;
pub use engine::{PerformanceStats, PreviewEngine};
pub use frame::Frame;
pub use monitor::{PerformanceMonitor, RenderStats};
pub use playback::{CancellationToken, ClockState, PlaybackClock, PlaybackState, TickHandler};
pub use source::{FrameRateLimited, ScaledSource, SolidColorSource, VideoSource};
