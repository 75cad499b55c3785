//! Engine trait and shared engine types.
//!
//! An [`Engine`] is one codec backend: it can report its own capabilities
//! ([`Engine::probe`]), read image headers, transcode a file into a target
//! format, and execute a geometric [`ResizePlan`]. The two production
//! implementations are [`NativeEngine`](super::native::NativeEngine)
//! (pure Rust, in-process) and [`MagickEngine`](super::magick::MagickEngine)
//! (shells out to ImageMagick). Everything above this trait is
//! engine-agnostic.
//!
//! Probing is deliberately a live query, not a cached capability table:
//! whether AVIF can be written depends on what is compiled in or installed
//! *right now*, and callers are expected to re-probe rather than remember.

use crate::engine::params::{Quality, TargetFormat};
use crate::geometry::ResizePlan;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixels, widened so 4-gigapixel-plus inputs cannot overflow.
    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// What one probe of an engine reported.
///
/// `writes` holds target formats the engine can currently encode; `reads`
/// holds source MIME types it can decode. An engine can be `available` with
/// both sets empty — present but useless is a valid state, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
    pub writes: BTreeSet<TargetFormat>,
    pub reads: BTreeSet<String>,
}

impl EngineInfo {
    /// The result every probe falls back to when the backend cannot be
    /// reached: present in name only.
    pub fn unavailable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            version: None,
            writes: BTreeSet::new(),
            reads: BTreeSet::new(),
        }
    }

    pub fn writes_format(&self, format: TargetFormat) -> bool {
        self.available && self.writes.contains(&format)
    }

    pub fn reads_mime(&self, mime: &str) -> bool {
        self.available && self.reads.contains(mime)
    }
}

/// Trait for codec engines.
///
/// All four operations take `&self`; engines hold no per-call state. Errors
/// never panic across this boundary — callers translate [`EngineError`]
/// into their own outcome types.
pub trait Engine: Sync {
    /// Stable engine name, the key used by configuration and records.
    fn name(&self) -> &str;

    /// Live capability query. Must never fail: any internal error reports
    /// the engine as unavailable instead.
    fn probe(&self) -> EngineInfo;

    /// Read image dimensions from the header without decoding pixel data.
    fn identify(&self, path: &Path) -> Result<Dimensions, EngineError>;

    /// Re-encode `source` into `format` at `dest`. Returns bytes written.
    fn transcode(
        &self,
        source: &Path,
        dest: &Path,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<u64, EngineError>;

    /// Execute a precomputed scale/crop plan, re-encoding in the container
    /// implied by `dest`'s extension. Returns the output dimensions.
    fn render(
        &self,
        source: &Path,
        dest: &Path,
        plan: &ResizePlan,
        quality: Quality,
    ) -> Result<Dimensions, EngineError>;
}
