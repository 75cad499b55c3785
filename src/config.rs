//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Configuration is
//! layered: stock defaults are the base, and a user config file overrides
//! only the keys it names.
//!
//! ## Config File Location
//!
//! `config.toml` in the upload root, or any path passed via `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! engine = "auto"     # auto | magick | native
//! format = "webp"     # webp | avif
//! quality = 82        # 1-100, clamped
//!
//! [[sizes]]
//! name = "thumbnail"
//! width = 150
//! height = 150
//! crop = true
//!
//! [limits]
//! max_filesize_bytes = 10485760
//! max_pixels = 25000000
//! memory_limit_bytes = 268435456
//!
//! [batch]
//! chunk_size = 10
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want. The one
//! exception is `sizes`: naming any profile replaces the whole default
//! list, because TOML arrays overlay as a unit. Unknown keys are rejected
//! to catch typos early.

use crate::convert::ResourceLimits;
use crate::engine::{EnginePreference, Quality, TargetFormat};
use crate::thumbs::SizeProfile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Engine preference: `auto` or an engine name.
    pub engine: EnginePreference,
    /// Target encode format for conversions.
    pub format: TargetFormat,
    /// Encoding quality, clamped to 1-100.
    pub quality: Quality,
    /// Derivative size profiles. Duplicated names deduplicate, last wins.
    pub sizes: Vec<SizeProfile>,
    /// Resource ceilings applied before each conversion.
    pub limits: ResourceLimits,
    /// Batch processing settings.
    pub batch: BatchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            engine: EnginePreference::Auto,
            format: TargetFormat::Webp,
            quality: Quality::default(),
            sizes: default_sizes(),
            limits: ResourceLimits::default(),
            batch: BatchConfig::default(),
        }
    }
}

/// Stock derivative profiles: a square crop plus three contain sizes.
fn default_sizes() -> Vec<SizeProfile> {
    vec![
        SizeProfile::new("thumbnail", 150, 150, true),
        SizeProfile::new("medium", 300, 300, false),
        SizeProfile::new("medium_large", 768, 0, false),
        SizeProfile::new("large", 1024, 1024, false),
    ]
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for profile in &self.sizes {
            if !profile.has_valid_name() {
                return Err(ConfigError::Validation(format!(
                    "size profile name `{}` must match [a-z0-9_]{{2,32}}",
                    profile.name
                )));
            }
        }
        if self.limits.max_filesize_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_filesize_bytes must be non-zero".into(),
            ));
        }
        if self.limits.max_pixels == 0 {
            return Err(ConfigError::Validation(
                "limits.max_pixels must be non-zero".into(),
            ));
        }
        if self.limits.memory_limit_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.memory_limit_bytes must be non-zero".into(),
            ));
        }
        if self.batch.chunk_size == 0 {
            return Err(ConfigError::Validation(
                "batch.chunk_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Size profiles ready for the generator: deduplicated by name (last
    /// write wins) with empty 0x0 profiles dropped.
    pub fn normalized_sizes(&self) -> Vec<SizeProfile> {
        let mut normalized: Vec<SizeProfile> = Vec::with_capacity(self.sizes.len());
        for profile in &self.sizes {
            if profile.is_empty() {
                debug!(profile = %profile.name, "Dropping empty size profile");
                continue;
            }
            match normalized.iter().position(|p| p.name == profile.name) {
                Some(pos) => normalized[pos] = profile.clone(),
                None => normalized.push(profile.clone()),
            }
        }
        normalized
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Items processed per orchestrator call.
    pub chunk_size: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { chunk_size: 10 }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist. Returns `Err` if it exists
/// but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PipelineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<PipelineConfig, ConfigError> {
    load_config_file(&root.join("config.toml"))
}

/// Load config from an explicit file path (absent file means all defaults).
pub fn load_config_file(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `config init` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pixelpress Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# Engine preference. "auto" picks the best available engine; naming an
# engine ("magick", "native") prefers it, falling back to auto when it is
# unavailable or cannot write the target format.
engine = "auto"

# Target format for conversions: "webp" or "avif".
format = "webp"

# Encoding quality, 1-100. Values outside the range are clamped.
# WebP switches to lossless encoding above 95.
quality = 82

# ---------------------------------------------------------------------------
# Derivative size profiles
# ---------------------------------------------------------------------------
# Each profile produces one derivative per image. Names must be lowercase
# [a-z0-9_], 2-32 characters. Width or height of 0 leaves that axis
# unbounded. crop = true center-crops to exactly width x height.
#
# Note: defining any [[sizes]] entry replaces the entire default list.

[[sizes]]
name = "thumbnail"
width = 150
height = 150
crop = true

[[sizes]]
name = "medium"
width = 300
height = 300
crop = false

[[sizes]]
name = "medium_large"
width = 768
height = 0
crop = false

[[sizes]]
name = "large"
width = 1024
height = 1024
crop = false

# ---------------------------------------------------------------------------
# Resource ceilings
# ---------------------------------------------------------------------------
# Conversions exceeding any ceiling are rejected before decoding starts.

[limits]
# Largest source file accepted (bytes). Default 10 MiB.
max_filesize_bytes = 10485760

# Largest pixel count (width x height) accepted. Default 25 megapixels.
max_pixels = 25000000

# Memory budget for one decode, including a fixed 64 MiB headroom.
# Default 256 MiB.
memory_limit_bytes = 268435456

# ---------------------------------------------------------------------------
# Batch processing
# ---------------------------------------------------------------------------

[batch]
# Items processed per chunk. Smaller chunks finish faster and resume
# more granularly; larger chunks amortize per-call overhead.
chunk_size = 10
"##
}
