//! Subcraft Common Utilities
//!
//! Shared infrastructure for all Subcraft crates:
//! - Error types and result aliases
//! - Frame pacing utilities for the preview playback clock
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
