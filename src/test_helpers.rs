//! Shared test utilities for the pixelpress test suite.
//!
//! Provides synthetic image fixtures: real, decodable PNG/JPEG bytes small
//! enough to keep tests fast, plus seeding helpers that lay corpora out on
//! disk the way a store root expects them.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! seed_raster_files(tmp.path(), 5);
//! let photo = write_png(tmp.path(), "dawn.png", 64, 48);
//! assert!(photo.exists());
//! ```

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

// =========================================================================
// Synthetic image bytes
// =========================================================================

/// A real PNG with a deterministic gradient fill. Decodable by any engine.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A real baseline JPEG. RGB only, the JPEG encoder has no alpha.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 200])
    });
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

/// A minimal clean SVG document.
pub fn svg_bytes() -> Vec<u8> {
    br#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10">
  <rect width="10" height="10" fill="steelblue"/>
</svg>"#
        .to_vec()
}

// =========================================================================
// On-disk fixtures
// =========================================================================

/// Write a PNG fixture into `dir` and return its path.
pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes(width, height)).unwrap();
    path
}

/// Write a JPEG fixture into `dir` and return its path.
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, jpeg_bytes(width, height)).unwrap();
    path
}

/// Seed `count` small PNG originals named `photo_000.png`, `photo_001.png`,
/// ... so lexical order matches the numbering.
pub fn seed_raster_files(root: &Path, count: usize) {
    for i in 0..count {
        write_png(root, &format!("photo_{i:03}.png"), 8, 6);
    }
}

/// Seed one clean SVG fixture under `name`.
pub fn seed_svg_file(root: &Path, name: &str) -> PathBuf {
    let path = root.join(name);
    std::fs::write(&path, svg_bytes()).unwrap();
    path
}
