//! Subcraft Project Model
//!
//! Defines the data contracts consumed by the preview and export engines:
//! - **Subtitles:** Timed lines with optional word-level sub-timings
//! - **Effects:** Effect kinds and their typed parameter sets
//!
//! All times are in seconds from the start of the composition.

pub mod effect;
pub mod subtitle;

pub use effect::*;
pub use subtitle::*;
