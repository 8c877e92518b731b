//! Effect kinds and typed effect parameters.
//!
//! Effects themselves (typography, particles, animation) are implemented
//! elsewhere; this module only carries the data every effect exposes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad category an effect declares itself as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Typography,
    Positioning,
    Background,
    Animation,
    Transition,
    Particle,
}

impl EffectKind {
    pub const ALL: [EffectKind; 6] = [
        EffectKind::Typography,
        EffectKind::Positioning,
        EffectKind::Background,
        EffectKind::Animation,
        EffectKind::Transition,
        EffectKind::Particle,
    ];

    /// Stable snake_case name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Typography => "typography",
            Self::Positioning => "positioning",
            Self::Background => "background",
            Self::Animation => "animation",
            Self::Transition => "transition",
            Self::Particle => "particle",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Integer(i64),
    Number(f64),
    Text(String),
    /// RGBA.
    Color([u8; 4]),
    Bool(bool),
    Position { x: f64, y: f64 },
}

impl ParamValue {
    /// Numeric view of integer and number values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Number(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<[u8; 4]> {
        match self {
            Self::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Parameter name to value. Ordered so iteration (and serialization) is
/// deterministic.
pub type EffectParameters = BTreeMap<String, ParamValue>;

/// Serializable description of an effect instance, as stored in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    pub name: String,
    pub kind: EffectKind,
    #[serde(default)]
    pub parameters: EffectParameters,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EffectConfig {
    pub fn new(name: impl Into<String>, kind: EffectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parameters: EffectParameters::new(),
            enabled: true,
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}
