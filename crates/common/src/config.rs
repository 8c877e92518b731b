//! Application configuration.
//!
//! Configuration is passed around as explicit values; nothing in Subcraft
//! reads a process-wide settings object.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SubcraftError, SubcraftResult};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Real-time preview settings.
    pub preview: PreviewConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Preview engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Preview render resolution (width, height).
    pub resolution: (u32, u32),

    /// Playback clock rate.
    pub target_fps: f64,

    /// Maximum number of cached frames.
    pub cache_capacity: usize,

    /// Background frame-rate reduction factor in `[0.1, 1.0]`.
    pub quality_factor: f64,

    /// Drop effects of a complex kind entirely from the preview.
    pub skip_complex_effects: bool,

    /// Effect kinds dropped when `skip_complex_effects` is set.
    pub complex_effect_kinds: Vec<String>,

    /// Time window (seconds) accepted by a fuzzy cache lookup.
    pub cache_tolerance_secs: f64,

    /// Number of render durations kept for statistics.
    pub render_history_capacity: usize,

    /// Width that pixel-sized effect parameters are authored against.
    pub reference_width: u32,

    /// Smallest font size a preview effect is scaled down to.
    pub min_font_size: i64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "subcraft=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

pub const MIN_QUALITY_FACTOR: f64 = 0.1;
pub const MAX_QUALITY_FACTOR: f64 = 1.0;

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            resolution: (640, 360),
            target_fps: 15.0,
            cache_capacity: 100,
            quality_factor: 0.5,
            skip_complex_effects: false,
            complex_effect_kinds: vec!["particle".to_string()],
            cache_tolerance_secs: 0.1,
            render_history_capacity: 50,
            reference_width: 1920,
            min_font_size: 12,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl PreviewConfig {
    /// Clamp a quality factor into the supported range.
    pub fn clamp_quality(factor: f64) -> f64 {
        if factor.is_nan() {
            return MAX_QUALITY_FACTOR;
        }
        factor.clamp(MIN_QUALITY_FACTOR, MAX_QUALITY_FACTOR)
    }

    /// Reject settings the preview engine cannot run with.
    pub fn validate(&self) -> SubcraftResult<()> {
        let (width, height) = self.resolution;
        if width == 0 || height == 0 {
            return Err(SubcraftError::config(format!(
                "preview resolution must be non-zero, got {width}x{height}"
            )));
        }
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(SubcraftError::config(format!(
                "target fps must be positive, got {}",
                self.target_fps
            )));
        }
        if self.cache_capacity == 0 {
            return Err(SubcraftError::config("cache capacity must be at least 1"));
        }
        if self.render_history_capacity == 0 {
            return Err(SubcraftError::config(
                "render history capacity must be at least 1",
            ));
        }
        if !(self.cache_tolerance_secs.is_finite() && self.cache_tolerance_secs >= 0.0) {
            return Err(SubcraftError::config(format!(
                "cache tolerance must be non-negative, got {}",
                self.cache_tolerance_secs
            )));
        }
        if self.reference_width == 0 {
            return Err(SubcraftError::config("reference width must be non-zero"));
        }
        Ok(())
    }

    /// Whether an effect kind name is in the complex set.
    pub fn is_complex_kind(&self, kind: &str) -> bool {
        self.complex_effect_kinds.iter().any(|k| k == kind)
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                Self::default()
            }
        }
    }

    /// Load and validate config from an explicit path.
    pub fn load_from(path: &Path) -> SubcraftResult<Self> {
        if !path.exists() {
            return Err(SubcraftError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.preview.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> SubcraftResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> SubcraftResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("subcraft").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_defaults() {
        let config = PreviewConfig::default();
        assert_eq!(config.resolution, (640, 360));
        assert_eq!(config.target_fps, 15.0);
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.quality_factor, 0.5);
        assert!(!config.skip_complex_effects);
        assert!(config.is_complex_kind("particle"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_quality_clamp() {
        assert_eq!(PreviewConfig::clamp_quality(0.0), 0.1);
        assert_eq!(PreviewConfig::clamp_quality(5.0), 1.0);
        assert_eq!(PreviewConfig::clamp_quality(0.42), 0.42);
        assert_eq!(PreviewConfig::clamp_quality(f64::NAN), 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = PreviewConfig {
            resolution: (0, 360),
            ..PreviewConfig::default()
        };
        assert!(config.validate().is_err());

        config.resolution = (640, 360);
        config.target_fps = 0.0;
        assert!(config.validate().is_err());

        config.target_fps = 15.0;
        config.cache_capacity = 0;
        assert!(config.validate().is_err());

        config.cache_capacity = 10;
        config.cache_tolerance_secs = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"preview": {"target_fps": 24.0}}"#).unwrap();
        assert_eq!(config.preview.target_fps, 24.0);
        assert_eq!(config.preview.cache_capacity, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("subcraft_test_config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.json");

        let mut config = AppConfig::default();
        config.preview.cache_capacity = 7;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.preview.cache_capacity, 7);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("subcraft_missing_dir/config.json");
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(SubcraftError::FileNotFound { .. })
        ));
    }
}
