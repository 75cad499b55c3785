//! Centralized filename rules for converted files and derivatives.
//!
//! Derivatives follow the `{basename}-{suffix}.{ext}` convention, where the
//! suffix encodes the size profile that produced the file:
//! - `photo-150x150-c.webp` → 150×150, center-cropped
//! - `photo-300x300.webp` → fits within 300×300, aspect preserved
//! - `photo-768w.webp` → 768 wide, height unbounded
//! - `photo-600h.webp` → 600 tall, width unbounded
//!
//! These names are an on-disk contract. Other tools locate derivatives by
//! convention, so the suffix format must stay stable byte for byte. The
//! authoritative lookup is still the recorded path in the conversion record;
//! the convention exists so a directory listing stays legible and so records
//! from older runs that stored only sizes can be reconstructed.

use crate::engine::TargetFormat;

/// Known source extensions and their MIME types.
const EXTENSION_MIMES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("heic", "image/heic"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
];

/// Look up the MIME type for a file extension (case-insensitive).
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let lower = ext.to_lowercase();
    EXTENSION_MIMES
        .iter()
        .find(|(e, _)| *e == lower)
        .map(|(_, mime)| *mime)
}

/// Canonical extension for a MIME type (`image/jpeg` → `jpg`).
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    EXTENSION_MIMES
        .iter()
        .find(|(_, m)| *m == mime)
        .map(|(ext, _)| *ext)
}

/// Build the size suffix for a derivative.
///
/// Returns `None` when both dimensions are zero (such a profile produces no
/// file). The crop marker only ever appears when both dimensions are fixed.
pub fn size_suffix(width: u32, height: u32, cropped: bool) -> Option<String> {
    match (width, height) {
        (0, 0) => None,
        (w, 0) => Some(format!("{w}w")),
        (0, h) => Some(format!("{h}h")),
        (w, h) if cropped => Some(format!("{w}x{h}-c")),
        (w, h) => Some(format!("{w}x{h}")),
    }
}

/// Build a derivative's file name from its source file name.
///
/// The derivative keeps the source's container, so only the suffix changes:
/// `derivative_file_name("photo.webp", 150, 150, true)` →
/// `Some("photo-150x150-c.webp")`.
pub fn derivative_file_name(
    source_name: &str,
    width: u32,
    height: u32,
    cropped: bool,
) -> Option<String> {
    let suffix = size_suffix(width, height, cropped)?;
    let (stem, ext) = split_name(source_name);
    match ext {
        Some(ext) => Some(format!("{stem}-{suffix}.{ext}")),
        None => Some(format!("{stem}-{suffix}")),
    }
}

/// Build the file name a conversion writes: same basename, new container.
///
/// `converted_file_name("photo.jpg", TargetFormat::Webp)` → `"photo.webp"`.
pub fn converted_file_name(source_name: &str, format: TargetFormat) -> String {
    let (stem, _) = split_name(source_name);
    format!("{stem}.{}", format.extension())
}

/// A derivative file name decomposed back into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDerivative {
    /// Basename of the source the derivative came from.
    pub stem: String,
    /// Bounded width, 0 when the width was unbounded.
    pub width: u32,
    /// Bounded height, 0 when the height was unbounded.
    pub height: u32,
    pub cropped: bool,
}

/// Parse a conventional derivative file name.
///
/// Returns `None` for names that do not follow the convention, including
/// names whose trailing token merely resembles one (`max-width.webp`).
pub fn parse_derivative_name(file_name: &str) -> Option<ParsedDerivative> {
    let (stem, _ext) = split_name(file_name);

    let (rest, cropped) = match stem.strip_suffix("-c") {
        Some(rest) => (rest, true),
        None => (stem, false),
    };

    let dash = rest.rfind('-')?;
    let base = &rest[..dash];
    let token = &rest[dash + 1..];
    if base.is_empty() || token.is_empty() {
        return None;
    }

    if let Some((w, h)) = token.split_once('x') {
        let width: u32 = w.parse().ok()?;
        let height: u32 = h.parse().ok()?;
        if width == 0 || height == 0 {
            return None;
        }
        return Some(ParsedDerivative {
            stem: base.to_string(),
            width,
            height,
            cropped,
        });
    }

    // Single-axis suffixes never carry the crop marker
    if cropped {
        return None;
    }

    if let Some(w) = token.strip_suffix('w') {
        let width: u32 = w.parse().ok()?;
        if width == 0 || w.chars().any(|c| !c.is_ascii_digit()) {
            return None;
        }
        return Some(ParsedDerivative {
            stem: base.to_string(),
            width,
            height: 0,
            cropped: false,
        });
    }

    if let Some(h) = token.strip_suffix('h') {
        let height: u32 = h.parse().ok()?;
        if height == 0 || h.chars().any(|c| !c.is_ascii_digit()) {
            return None;
        }
        return Some(ParsedDerivative {
            stem: base.to_string(),
            width: 0,
            height,
            cropped: false,
        });
    }

    None
}

/// Split `name.ext` into stem and extension at the last dot.
fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}
