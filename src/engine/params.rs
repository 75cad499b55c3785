//! Shared parameter types for engine operations.
//!
//! These types describe *what* to encode, not *how*. They sit between
//! configuration (which declares the target format and quality), the
//! [`registry`](super::registry) (which picks an engine), and the engines
//! themselves (which do the pixel work). Quality is clamped at construction
//! and at every serde boundary, so no engine ever sees a value outside
//! [1,100].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target encode format for conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Webp,
    Avif,
}

impl TargetFormat {
    /// All supported target formats, in display order.
    pub const ALL: [TargetFormat; 2] = [TargetFormat::Webp, TargetFormat::Avif];

    pub fn as_str(self) -> &'static str {
        match self {
            TargetFormat::Webp => "webp",
            TargetFormat::Avif => "avif",
        }
    }

    /// File extension for this format (no leading dot).
    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    pub fn mime(self) -> &'static str {
        match self {
            TargetFormat::Webp => "image/webp",
            TargetFormat::Avif => "image/avif",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown target format `{0}` (expected `webp` or `avif`)")]
pub struct ParseFormatError(String);

impl FromStr for TargetFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(TargetFormat::Webp),
            "avif" => Ok(TargetFormat::Avif),
            _ => Err(ParseFormatError(s.to_string())),
        }
    }
}

/// Quality setting for lossy encoding, clamped to 1-100 on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Quality {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Quality::new(s.trim().parse()?))
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for Quality {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Quality::new(u32::deserialize(deserializer)?))
    }
}

/// Which engine a conversion should use.
///
/// `Auto` resolves through the registry's preference order. Naming an engine
/// that turns out to be unavailable falls back to `Auto` resolution rather
/// than failing the conversion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EnginePreference {
    #[default]
    Auto,
    Named(String),
}

impl EnginePreference {
    /// Parse a preference from its configuration spelling. An empty string
    /// or `auto` (any case) means automatic resolution; anything else names
    /// an engine, lowercased.
    pub fn from_name(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
            EnginePreference::Auto
        } else {
            EnginePreference::Named(trimmed.to_ascii_lowercase())
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, EnginePreference::Auto)
    }
}

impl fmt::Display for EnginePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnginePreference::Auto => f.write_str("auto"),
            EnginePreference::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for EnginePreference {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EnginePreference::from_name(s))
    }
}

impl Serialize for EnginePreference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EnginePreference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EnginePreference::from_name(&raw))
    }
}
