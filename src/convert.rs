//! The guarded converter: one source → destination transcode.
//!
//! Every conversion passes a fixed sequence of pre-flight gates before the
//! engine is allowed near pixel data:
//!
//! 1. source readable (filesystem metadata + image header)
//! 2. requested format supported by the chosen engine
//! 3. estimated decode footprint fits under the memory ceiling
//! 4. source file size under the file-size ceiling
//! 5. pixel count under the pixel ceiling
//!
//! A gate violation reports a named failure and never starts a decode. The
//! gates only read the image header (dimensions), which is cheap for every
//! supported container.
//!
//! After the encode, the destination is verified: a failed or empty write is
//! cleaned up so a failure never leaves output behind.

use crate::engine::{Engine, Quality, TargetFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Fixed headroom reserved on top of the estimated decode buffer.
pub const MEMORY_HEADROOM_BYTES: u64 = 64 * 1024 * 1024;

/// Bytes per pixel of a decoded RGBA buffer, the worst case the engines
/// produce.
const DECODE_BYTES_PER_PIXEL: u64 = 4;

fn default_memory_limit() -> u64 {
    256 * 1024 * 1024
}

fn default_max_filesize() -> u64 {
    10 * 1024 * 1024
}

fn default_max_pixels() -> u64 {
    25_000_000
}

/// Resource ceilings applied before each conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Total memory budget for one decode, headroom included.
    #[serde(default = "default_memory_limit")]
    pub memory_limit_bytes: u64,
    /// Largest source file accepted.
    #[serde(default = "default_max_filesize")]
    pub max_filesize_bytes: u64,
    /// Largest pixel count (width × height) accepted.
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_limit_bytes: default_memory_limit(),
            max_filesize_bytes: default_max_filesize(),
            max_pixels: default_max_pixels(),
        }
    }
}

/// One requested transcode.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub format: TargetFormat,
    pub quality: Quality,
}

/// Why a conversion was rejected or failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    #[error("source unreadable: {0}")]
    SourceUnreadable(String),
    #[error("engine {engine} cannot write {format}")]
    UnsupportedFormat { engine: String, format: TargetFormat },
    #[error("decode needs {required_bytes} bytes, memory limit is {limit_bytes}")]
    InsufficientMemory { required_bytes: u64, limit_bytes: u64 },
    #[error("source is {size_bytes} bytes, limit is {limit_bytes}")]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },
    #[error("source has {pixels} pixels, limit is {limit_pixels}")]
    PixelCountTooLarge { pixels: u64, limit_pixels: u64 },
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    #[error("no available engine writes {format}")]
    NoEngineAvailable { format: TargetFormat },
    #[error("partial output removed: {0}")]
    PartialOutputRemoved(String),
}

impl FailureReason {
    /// Stable machine-readable code for batch error lists and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceUnreadable(_) => "source_unreadable",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::InsufficientMemory { .. } => "insufficient_memory",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::PixelCountTooLarge { .. } => "pixel_count_too_large",
            Self::EncodeFailed(_) => "encode_failed",
            Self::NoEngineAvailable { .. } => "no_engine_available",
            Self::PartialOutputRemoved(_) => "partial_output_removed",
        }
    }
}

/// Result of one conversion. A failure guarantees no destination file exists.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionOutcome {
    Success { bytes_written: u64 },
    Failure { reason: FailureReason },
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason } => Some(reason),
        }
    }

    fn rejected(reason: FailureReason) -> Self {
        debug!(reason = reason.code(), detail = %reason, "Conversion rejected");
        Self::Failure { reason }
    }
}

/// Convert one image under the configured ceilings.
///
/// Never panics and never leaves a partial destination file. Engine faults
/// surface as [`FailureReason::EncodeFailed`] or, when cleanup ran, as
/// [`FailureReason::PartialOutputRemoved`].
pub fn convert(
    engine: &dyn Engine,
    request: &ConversionRequest,
    limits: &ResourceLimits,
) -> ConversionOutcome {
    // Gate 1: the source must exist and be a readable file
    let file_meta = match std::fs::metadata(&request.source) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => {
            return ConversionOutcome::rejected(FailureReason::SourceUnreadable(format!(
                "{} is not a regular file",
                request.source.display()
            )));
        }
        Err(e) => {
            return ConversionOutcome::rejected(FailureReason::SourceUnreadable(format!(
                "{}: {}",
                request.source.display(),
                e
            )));
        }
    };

    if request.dest == request.source {
        return ConversionOutcome::rejected(FailureReason::EncodeFailed(
            "destination equals source, refusing to overwrite in place".to_string(),
        ));
    }

    // Gate 2: the engine must write the requested format, checked against a
    // fresh probe so capability changes between calls are seen
    let info = engine.probe();
    if !info.available || !info.writes_format(request.format) {
        return ConversionOutcome::rejected(FailureReason::UnsupportedFormat {
            engine: engine.name().to_string(),
            format: request.format,
        });
    }

    // Header read for the size gates, not a decode
    let dims = match engine.identify(&request.source) {
        Ok(dims) => dims,
        Err(e) => {
            return ConversionOutcome::rejected(FailureReason::SourceUnreadable(format!(
                "{}: {}",
                request.source.display(),
                e
            )));
        }
    };

    // Gate 3: estimated decode footprint plus headroom fits the budget
    let required_bytes = dims
        .pixel_count()
        .saturating_mul(DECODE_BYTES_PER_PIXEL)
        .saturating_add(MEMORY_HEADROOM_BYTES);
    if required_bytes > limits.memory_limit_bytes {
        return ConversionOutcome::rejected(FailureReason::InsufficientMemory {
            required_bytes,
            limit_bytes: limits.memory_limit_bytes,
        });
    }

    // Gate 4: file size ceiling
    if file_meta.len() > limits.max_filesize_bytes {
        return ConversionOutcome::rejected(FailureReason::FileTooLarge {
            size_bytes: file_meta.len(),
            limit_bytes: limits.max_filesize_bytes,
        });
    }

    // Gate 5: pixel ceiling
    if dims.pixel_count() > limits.max_pixels {
        return ConversionOutcome::rejected(FailureReason::PixelCountTooLarge {
            pixels: dims.pixel_count(),
            limit_pixels: limits.max_pixels,
        });
    }

    match engine.transcode(&request.source, &request.dest, request.format, request.quality) {
        Ok(_) => verify_output(&request.dest),
        Err(e) => ConversionOutcome::Failure {
            reason: cleanup_failed_output(&request.dest, &e.to_string()),
        },
    }
}

/// Check the postcondition: the destination exists and is nonzero length.
fn verify_output(dest: &Path) -> ConversionOutcome {
    match std::fs::metadata(dest) {
        Ok(meta) if meta.len() > 0 => ConversionOutcome::Success {
            bytes_written: meta.len(),
        },
        Ok(_) => ConversionOutcome::Failure {
            reason: cleanup_failed_output(dest, "engine wrote a zero-length file"),
        },
        Err(_) => ConversionOutcome::rejected(FailureReason::EncodeFailed(
            "engine reported success but wrote no file".to_string(),
        )),
    }
}

/// Remove whatever the failed encode left behind.
fn cleanup_failed_output(dest: &Path, detail: &str) -> FailureReason {
    if dest.exists() {
        match std::fs::remove_file(dest) {
            Ok(()) => {
                debug!(dest = %dest.display(), "Removed partial output");
                FailureReason::PartialOutputRemoved(detail.to_string())
            }
            Err(e) => FailureReason::EncodeFailed(format!(
                "{detail}; partial output at {} could not be removed: {e}",
                dest.display()
            )),
        }
    } else {
        FailureReason::EncodeFailed(detail.to_string())
    }
}
