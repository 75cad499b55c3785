//! ImageMagick engine — shells out to the `magick` CLI.
//!
//! Capability discovery is live: availability comes from running
//! `magick -version`, and the read/write format table comes from
//! `magick -list format`. Nothing about the installed ImageMagick build is
//! assumed, so an installation compiled without WebP or HEIF delegates
//! those formats to another engine.
//!
//! All operations address `source[0]`, so multi-frame inputs (animated GIF,
//! layered TIFF) collapse to their first frame, matching the in-process
//! engine's behavior.

use super::backend::{Dimensions, Engine, EngineError, EngineInfo};
use super::params::{Quality, TargetFormat};
use crate::geometry::ResizePlan;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Registry key for this engine.
pub const MAGICK_ENGINE: &str = "magick";

/// Above this quality WebP output switches to lossless encoding.
const WEBP_LOSSLESS_ABOVE: u32 = 95;

/// ImageMagick format names mapped to the MIME types the pipeline tracks.
const FORMAT_MIMES: &[(&str, &str)] = &[
    ("JPEG", "image/jpeg"),
    ("JPG", "image/jpeg"),
    ("PNG", "image/png"),
    ("GIF", "image/gif"),
    ("WEBP", "image/webp"),
    ("AVIF", "image/avif"),
    ("HEIC", "image/heic"),
    ("TIFF", "image/tiff"),
    ("TIF", "image/tiff"),
    ("BMP", "image/bmp"),
];

/// Engine backed by the ImageMagick command line tool.
pub struct MagickEngine {
    binary: PathBuf,
}

impl MagickEngine {
    /// Use the `magick` binary from `PATH`.
    pub fn new() -> Self {
        Self::with_binary("magick")
    }

    /// Use a specific ImageMagick binary, e.g. from configuration.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run the command, collecting stderr into the error message on failure.
    fn run(&self, cmd: &mut Command) -> Result<std::process::Output, String> {
        let output = cmd
            .output()
            .map_err(|e| format!("cannot run {}: {}", self.binary.display(), e))?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }

    /// First line of `magick -version`, or `None` when the binary is missing.
    fn detect_version(&self) -> Option<String> {
        let output = Command::new(&self.binary).arg("-version").output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|s| s.to_string())
    }
}

impl Default for MagickEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Address the first frame of a file, ImageMagick style (`path[0]`).
fn first_frame(path: &Path) -> std::ffi::OsString {
    let mut arg = path.as_os_str().to_os_string();
    arg.push("[0]");
    arg
}

/// Parse a mode column token from `magick -list format` ("rw+", "r--", ...).
///
/// Returns (readable, writable), or `None` when the token is not a mode.
fn parse_mode_token(token: &str) -> Option<(bool, bool)> {
    let bytes = token.as_bytes();
    if bytes.len() != 3 {
        return None;
    }
    let read = match bytes[0] {
        b'r' => true,
        b'-' => false,
        _ => return None,
    };
    let write = match bytes[1] {
        b'w' => true,
        b'-' => false,
        _ => return None,
    };
    if bytes[2] != b'+' && bytes[2] != b'-' {
        return None;
    }
    Some((read, write))
}

/// Extract read MIME types and writable target formats from the output of
/// `magick -list format`.
fn parse_format_listing(listing: &str) -> (BTreeSet<String>, BTreeSet<TargetFormat>) {
    let mut reads = BTreeSet::new();
    let mut writes = BTreeSet::new();

    for line in listing.lines() {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else { continue };
        let name = name.trim_end_matches('*');

        let Some((readable, writable)) = tokens.find_map(parse_mode_token) else {
            continue;
        };

        if readable {
            if let Some((_, mime)) = FORMAT_MIMES.iter().find(|(f, _)| *f == name) {
                reads.insert((*mime).to_string());
            }
        }
        if writable {
            match name {
                "WEBP" => {
                    writes.insert(TargetFormat::Webp);
                }
                "AVIF" => {
                    writes.insert(TargetFormat::Avif);
                }
                _ => {}
            }
        }
    }

    (reads, writes)
}

/// Parse `identify -format "%w %h"` output.
fn parse_dimensions(raw: &str) -> Result<Dimensions, EngineError> {
    let mut parts = raw.split_whitespace();
    let width = parts
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| EngineError::Decode(format!("unparseable identify output: {raw:?}")))?;
    let height = parts
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| EngineError::Decode(format!("unparseable identify output: {raw:?}")))?;
    Ok(Dimensions { width, height })
}

impl Engine for MagickEngine {
    fn name(&self) -> &str {
        MAGICK_ENGINE
    }

    fn probe(&self) -> EngineInfo {
        let Some(version) = self.detect_version() else {
            return EngineInfo::unavailable(MAGICK_ENGINE);
        };

        let (reads, writes) = match self.run(Command::new(&self.binary).args(["-list", "format"])) {
            Ok(output) => parse_format_listing(&String::from_utf8_lossy(&output.stdout)),
            Err(_) => (BTreeSet::new(), BTreeSet::new()),
        };

        EngineInfo {
            name: MAGICK_ENGINE.to_string(),
            available: true,
            version: Some(version),
            writes,
            reads,
        }
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, EngineError> {
        // -ping reads the header without decoding pixel data
        let output = self
            .run(
                Command::new(&self.binary)
                    .args(["identify", "-ping", "-format", "%w %h"])
                    .arg(first_frame(path)),
            )
            .map_err(EngineError::Decode)?;
        parse_dimensions(&String::from_utf8_lossy(&output.stdout))
    }

    fn transcode(
        &self,
        source: &Path,
        dest: &Path,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<u64, EngineError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(first_frame(source));
        cmd.args(["-strip", "-quality", &quality.to_string()]);
        match format {
            TargetFormat::Webp => {
                if quality.value() > WEBP_LOSSLESS_ABOVE {
                    cmd.args(["-define", "webp:lossless=true"]);
                }
            }
            TargetFormat::Avif => {
                cmd.args(["-define", "heic:speed=6"]);
            }
        }
        cmd.arg(dest);

        self.run(&mut cmd).map_err(EngineError::Encode)?;
        Ok(std::fs::metadata(dest).map_err(EngineError::Io)?.len())
    }

    fn render(
        &self,
        source: &Path,
        dest: &Path,
        plan: &ResizePlan,
        quality: Quality,
    ) -> Result<Dimensions, EngineError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(first_frame(source));
        // `!` forces the exact geometry; aspect handling already happened
        cmd.args([
            "-resize",
            &format!("{}x{}!", plan.scale_width, plan.scale_height),
        ]);
        if let Some(c) = plan.crop {
            cmd.args(["-crop", &format!("{}x{}+{}+{}", c.width, c.height, c.x, c.y)]);
            cmd.arg("+repage");
        }
        cmd.args(["-strip", "-quality", &quality.to_string()]);
        cmd.arg(dest);

        self.run(&mut cmd).map_err(EngineError::Encode)?;
        let (width, height) = plan.output_size();
        Ok(Dimensions { width, height })
    }
}
