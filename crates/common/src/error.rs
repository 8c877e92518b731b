//! Error types shared across Subcraft crates.

use std::path::PathBuf;

/// Top-level error type for Subcraft operations.
#[derive(Debug, thiserror::Error)]
pub enum SubcraftError {
    /// The preview composition could not be assembled (fatal input).
    #[error("Composition error: {message}")]
    Composition { message: String },

    /// A single effect failed to apply.
    #[error("Effect error: {message}")]
    Effect { message: String },

    /// Sampling a frame failed.
    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SubcraftError.
pub type SubcraftResult<T> = Result<T, SubcraftError>;

impl SubcraftError {
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition {
            message: msg.into(),
        }
    }

    pub fn effect(msg: impl Into<String>) -> Self {
        Self::Effect {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
