//! Pure Rust engine — every codec statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Decode (AVIF) | `avif-parse` (container) + `rav1d` (AV1 decode) + custom YUV→RGB |
//! | Encode → WebP | `webp` crate (libwebp; lossy below quality 96, lossless above) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Scale / crop | `image::DynamicImage::resize_exact` (Lanczos3) + `crop_imm` |
//!
//! ## Quality mapping
//!
//! Quality 1-100 is passed through linearly to both encoders. WebP switches
//! to lossless encoding above quality 95; AVIF keeps rav1e's speed knob
//! pinned at 6 so quality only trades against file size, not encode time.

use super::backend::{Dimensions, Engine, EngineError, EngineInfo};
use super::params::{Quality, TargetFormat};
use crate::geometry::ResizePlan;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::collections::BTreeSet;
use std::path::Path;

/// Registry key for this engine.
pub const NATIVE_ENGINE: &str = "native";

/// Above this quality WebP output switches from lossy VP8 to lossless.
const WEBP_LOSSLESS_ABOVE: u32 = 95;

/// rav1e effort level for AVIF encodes. 6 is the throughput/size knee.
const AVIF_SPEED: u8 = 6;

/// MIME types whose `image`-crate decoders may be compiled in, probed live.
///
/// AVIF is deliberately absent: the `image` crate's `"avif"` feature only
/// enables the **encoder** (rav1e), yet `ImageFormat::reading_enabled()`
/// still answers `true` for it. AVIF decoding goes through our own
/// `avif-parse` + `rav1d` path instead, so the probe adds it manually.
const DECODE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/tiff", ImageFormat::Tiff),
    ("image/webp", ImageFormat::WebP),
    ("image/gif", ImageFormat::Gif),
    ("image/bmp", ImageFormat::Bmp),
];

/// In-process engine built on the `image` crate ecosystem.
///
/// Always available (its codecs ship inside the binary), so it is the
/// registry's fallback when ImageMagick is not installed.
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn is_avif(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("avif"))
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, EngineError> {
    if is_avif(path) {
        return decode_avif(path);
    }
    ImageReader::open(path)
        .map_err(EngineError::Io)?
        .decode()
        .map_err(|e| EngineError::Decode(format!("cannot decode {}: {}", path.display(), e)))
}

/// Extract dimensions from an AVIF container without decoding the AV1 payload.
fn identify_avif(path: &Path) -> Result<Dimensions, EngineError> {
    let file_data = std::fs::read(path).map_err(EngineError::Io)?;
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(&file_data))
        .map_err(|e| EngineError::Decode(format!("bad AVIF container {}: {e:?}", path.display())))?;
    let meta = avif.primary_item_metadata().map_err(|e| {
        EngineError::Decode(format!("bad AVIF metadata {}: {e:?}", path.display()))
    })?;
    Ok(Dimensions {
        width: meta.max_frame_width.get(),
        height: meta.max_frame_height.get(),
    })
}

/// Decode an AVIF file using avif-parse (container) + rav1d (AV1 decode).
///
/// The `image` crate's `"avif"` feature only provides the encoder (rav1e);
/// decoding would need `"avif-native"` and the C dav1d library. rav1d is the
/// pure Rust port of dav1d, driven here through its C-shaped API.
fn decode_avif(path: &Path) -> Result<DynamicImage, EngineError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use std::ptr::NonNull;

    let file_data = std::fs::read(path).map_err(EngineError::Io)?;
    let avif = avif_parse::read_avif(&mut std::io::Cursor::new(&file_data))
        .map_err(|e| EngineError::Decode(format!("bad AVIF container {}: {e:?}", path.display())))?;
    let av1_bytes: &[u8] = &avif.primary_item;

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe {
        rav1d::src::lib::dav1d_default_settings(NonNull::new(settings.as_mut_ptr()).unwrap())
    };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(EngineError::Decode(format!("rav1d open failed ({})", rc.0)));
    }

    // Copy the AV1 payload into a decoder-owned buffer
    let mut data = Dav1dData::default();
    let buf_ptr =
        unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), av1_bytes.len()) };
    if buf_ptr.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(EngineError::Decode("rav1d data_create failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(av1_bytes.as_ptr(), buf_ptr, av1_bytes.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(EngineError::Decode(format!("rav1d send_data failed ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(EngineError::Decode(format!("rav1d get_picture failed ({})", rc.0)));
    }

    let w = pic.p.w as u32;
    let h = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let layout = pic.p.layout;
    let y_stride = pic.stride[0];
    let uv_stride = pic.stride[1];
    let y_ptr = pic.data[0].unwrap().as_ptr() as *const u8;

    let rgb = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        YuvView {
            y_ptr,
            u_ptr: y_ptr,
            v_ptr: y_ptr,
            y_stride,
            uv_stride: 0,
            width: w,
            height: h,
            bpc,
            ss_x: false,
            ss_y: false,
            monochrome: true,
        }
        .to_rgb()
    } else {
        let u_ptr = pic.data[1].unwrap().as_ptr() as *const u8;
        let v_ptr = pic.data[2].unwrap().as_ptr() as *const u8;
        let (ss_x, ss_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => {
                unsafe {
                    rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
                    rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
                }
                return Err(EngineError::Decode(format!(
                    "unsupported AVIF pixel layout: {layout}"
                )));
            }
        };
        YuvView {
            y_ptr,
            u_ptr,
            v_ptr,
            y_stride,
            uv_stride,
            width: w,
            height: h,
            bpc,
            ss_x,
            ss_y,
            monochrome: false,
        }
        .to_rgb()
    };

    unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic));
        rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
    }

    image::RgbImage::from_raw(w, h, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| EngineError::Decode("decoded AVIF plane size mismatch".into()))
}

/// Borrowed view over rav1d's decoded YUV planes, ready for RGB conversion.
struct YuvView {
    y_ptr: *const u8,
    u_ptr: *const u8,
    v_ptr: *const u8,
    y_stride: isize,
    uv_stride: isize,
    width: u32,
    height: u32,
    bpc: u32,
    /// Chroma subsampling: horizontal, vertical (e.g. I420 = true, true)
    ss_x: bool,
    ss_y: bool,
    monochrome: bool,
}

impl YuvView {
    /// Convert YUV planes to interleaved RGB8 using BT.601 coefficients.
    fn to_rgb(&self) -> Vec<u8> {
        let max_val = ((1u32 << self.bpc) - 1) as f32;
        let center = (1u32 << (self.bpc - 1)) as f32;
        let scale = 255.0 / max_val;

        let mut rgb = vec![0u8; (self.width * self.height * 3) as usize];

        for row in 0..self.height {
            for col in 0..self.width {
                let y_val = read_plane(self.y_ptr, self.y_stride, col, row, self.bpc);

                let (r, g, b) = if self.monochrome {
                    let v = (y_val * scale).clamp(0.0, 255.0);
                    (v, v, v)
                } else {
                    let u_col = if self.ss_x { col / 2 } else { col };
                    let u_row = if self.ss_y { row / 2 } else { row };
                    let cb = read_plane(self.u_ptr, self.uv_stride, u_col, u_row, self.bpc);
                    let cr = read_plane(self.v_ptr, self.uv_stride, u_col, u_row, self.bpc);

                    // BT.601 YCbCr -> RGB, then scale to 8-bit
                    let cb_f = cb - center;
                    let cr_f = cr - center;

                    (
                        ((y_val + 1.402 * cr_f) * scale).clamp(0.0, 255.0),
                        ((y_val - 0.344136 * cb_f - 0.714136 * cr_f) * scale).clamp(0.0, 255.0),
                        ((y_val + 1.772 * cb_f) * scale).clamp(0.0, 255.0),
                    )
                };

                let idx = ((row * self.width + col) * 3) as usize;
                rgb[idx] = r as u8;
                rgb[idx + 1] = g as u8;
                rgb[idx + 2] = b as u8;
            }
        }

        rgb
    }
}

/// Read one sample from a YUV plane, handling 8-bit and 16-bit storage.
#[inline]
fn read_plane(ptr: *const u8, stride: isize, x: u32, y: u32, bpc: u32) -> f32 {
    if bpc <= 8 {
        (unsafe { *ptr.offset(y as isize * stride + x as isize) }) as f32
    } else {
        // 10-bit and 12-bit samples are stored as u16
        let byte_offset = y as isize * stride + x as isize * 2;
        (unsafe { *(ptr.offset(byte_offset) as *const u16) }) as f32
    }
}

/// Flatten to RGB8 or RGBA8 so every encoder below sees a color type it
/// accepts. Alpha survives whenever the source had it.
fn normalize_for_encode(img: DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Encode as WebP via libwebp. Re-encoding always drops source metadata:
/// only pixels go in, only pixels come out.
fn save_webp(img: &DynamicImage, path: &Path, quality: Quality) -> Result<u64, EngineError> {
    let encoded = match img {
        DynamicImage::ImageRgb8(rgb) => {
            let encoder = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height());
            if quality.value() > WEBP_LOSSLESS_ABOVE {
                encoder.encode_lossless()
            } else {
                encoder.encode(quality.value() as f32)
            }
        }
        _ => {
            let rgba = img.to_rgba8();
            let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
            if quality.value() > WEBP_LOSSLESS_ABOVE {
                encoder.encode_lossless()
            } else {
                encoder.encode(quality.value() as f32)
            }
        }
    };
    std::fs::write(path, &*encoded).map_err(EngineError::Io)?;
    Ok(encoded.len() as u64)
}

/// Encode as AVIF via rav1e at a fixed speed.
fn save_avif(img: &DynamicImage, path: &Path, quality: Quality) -> Result<u64, EngineError> {
    let file = std::fs::File::create(path).map_err(EngineError::Io)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        writer,
        AVIF_SPEED,
        quality.value() as u8,
    );
    img.write_with_encoder(encoder)
        .map_err(|e| EngineError::Encode(format!("AVIF encode failed: {}", e)))?;
    Ok(std::fs::metadata(path).map_err(EngineError::Io)?.len())
}

/// Encode as JPEG at the given quality. JPEG has no alpha channel, so any
/// transparency is flattened here.
fn save_jpeg(img: &DynamicImage, path: &Path, quality: Quality) -> Result<u64, EngineError> {
    use image::ImageEncoder;
    let file = std::fs::File::create(path).map_err(EngineError::Io)?;
    let writer = std::io::BufWriter::new(file);
    let rgb = img.to_rgb8();
    image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.value() as u8)
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| EngineError::Encode(format!("JPEG encode failed: {}", e)))?;
    Ok(std::fs::metadata(path).map_err(EngineError::Io)?.len())
}

/// Encode losslessly in a quality-less container (PNG or TIFF).
fn save_lossless(img: &DynamicImage, path: &Path, format: ImageFormat) -> Result<u64, EngineError> {
    img.save_with_format(path, format)
        .map_err(|e| EngineError::Encode(format!("{format:?} encode failed: {}", e)))?;
    Ok(std::fs::metadata(path).map_err(EngineError::Io)?.len())
}

/// Write `img` in the container implied by `path`'s extension.
fn save_by_extension(img: &DynamicImage, path: &Path, quality: Quality) -> Result<u64, EngineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "webp" => save_webp(img, path, quality),
        "avif" => save_avif(img, path, quality),
        "jpg" | "jpeg" => save_jpeg(img, path, quality),
        "png" => save_lossless(img, path, ImageFormat::Png),
        "tif" | "tiff" => save_lossless(img, path, ImageFormat::Tiff),
        other => Err(EngineError::Encode(format!(
            "unsupported output container: {other}"
        ))),
    }
}

impl Engine for NativeEngine {
    fn name(&self) -> &str {
        NATIVE_ENGINE
    }

    fn probe(&self) -> EngineInfo {
        let mut reads: BTreeSet<String> = DECODE_CANDIDATES
            .iter()
            .filter(|(_, fmt)| fmt.reading_enabled())
            .map(|(mime, _)| mime.to_string())
            .collect();
        // Decoded by the rav1d path, not the image crate
        reads.insert("image/avif".to_string());

        let mut writes = BTreeSet::new();
        // libwebp is linked unconditionally
        writes.insert(TargetFormat::Webp);
        if ImageFormat::Avif.writing_enabled() {
            writes.insert(TargetFormat::Avif);
        }

        EngineInfo {
            name: NATIVE_ENGINE.to_string(),
            available: true,
            version: Some(format!("builtin {}", env!("CARGO_PKG_VERSION"))),
            writes,
            reads,
        }
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, EngineError> {
        if is_avif(path) {
            return identify_avif(path);
        }
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| EngineError::Decode(format!("cannot read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }

    fn transcode(
        &self,
        source: &Path,
        dest: &Path,
        format: TargetFormat,
        quality: Quality,
    ) -> Result<u64, EngineError> {
        let img = normalize_for_encode(load_image(source)?);
        match format {
            TargetFormat::Webp => save_webp(&img, dest, quality),
            TargetFormat::Avif => save_avif(&img, dest, quality),
        }
    }

    fn render(
        &self,
        source: &Path,
        dest: &Path,
        plan: &ResizePlan,
        quality: Quality,
    ) -> Result<Dimensions, EngineError> {
        let img = load_image(source)?;
        let scaled = img.resize_exact(plan.scale_width, plan.scale_height, FilterType::Lanczos3);
        let finished = match plan.crop {
            Some(c) => scaled.crop_imm(c.x, c.y, c.width, c.height),
            None => scaled,
        };
        save_by_extension(&normalize_for_encode(finished), dest, quality)?;
        let (width, height) = plan.output_size();
        Ok(Dimensions { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::plan_render;
    use image::{ImageEncoder, RgbImage, RgbaImage};

    /// Create a small valid JPEG file with the given dimensions.
    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    /// Create a PNG with a semi-transparent gradient.
    fn create_test_png_with_alpha(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 128])
        });
        img.save(path).unwrap();
    }

    /// Create a small valid AVIF by round-tripping through our encoder.
    fn create_test_avif(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        save_avif(&DynamicImage::ImageRgb8(img), path, Quality::new(85)).unwrap();
    }

    #[test]
    fn probe_reports_compiled_codecs() {
        let info = NativeEngine::new().probe();
        assert!(info.available);
        for mime in ["image/jpeg", "image/png", "image/webp", "image/avif"] {
            assert!(info.reads_mime(mime), "expected read support for {mime}");
        }
        // GIF decoding is not compiled in; the live query must say so
        assert!(!info.reads_mime("image/gif"));
        assert!(info.writes_format(TargetFormat::Webp));
        assert!(info.writes_format(TargetFormat::Avif));
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = NativeEngine::new().identify(&path).unwrap();
        assert_eq!((dims.width, dims.height), (200, 150));
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = NativeEngine::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn transcode_jpeg_to_webp_is_lossy_riff() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 64, 48);

        let dest = tmp.path().join("out.webp");
        let bytes = NativeEngine::new()
            .transcode(&source, &dest, TargetFormat::Webp, Quality::new(80))
            .unwrap();
        assert!(bytes > 0);

        let data = std::fs::read(&dest).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"WEBP");
        assert_eq!(&data[12..16], b"VP8 ", "quality 80 must use the lossy codec");
    }

    #[test]
    fn transcode_switches_to_lossless_above_95() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 64, 48);

        let dest = tmp.path().join("out.webp");
        NativeEngine::new()
            .transcode(&source, &dest, TargetFormat::Webp, Quality::new(100))
            .unwrap();

        let data = std::fs::read(&dest).unwrap();
        assert_eq!(&data[12..16], b"VP8L", "quality 100 must use the lossless codec");
    }

    #[test]
    fn transcode_jpeg_to_avif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 64, 48);

        let dest = tmp.path().join("out.avif");
        let bytes = NativeEngine::new()
            .transcode(&source, &dest, TargetFormat::Avif, Quality::new(50))
            .unwrap();
        assert!(bytes > 0);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), bytes);
    }

    #[test]
    fn transcode_preserves_alpha_channel() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.png");
        create_test_png_with_alpha(&source, 32, 32);

        let dest = tmp.path().join("out.webp");
        NativeEngine::new()
            .transcode(&source, &dest, TargetFormat::Webp, Quality::new(80))
            .unwrap();

        let decoded = image::open(&dest).unwrap();
        assert!(decoded.color().has_alpha(), "alpha must survive WebP re-encode");
    }

    #[test]
    fn render_cover_plan_yields_exact_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 800, 600);

        let dest = tmp.path().join("thumb.jpg");
        let plan = plan_render((800, 600), 150, 150, true).unwrap();
        let dims = NativeEngine::new()
            .render(&source, &dest, &plan, Quality::new(82))
            .unwrap();
        assert_eq!((dims.width, dims.height), (150, 150));

        let on_disk = NativeEngine::new().identify(&dest).unwrap();
        assert_eq!((on_disk.width, on_disk.height), (150, 150));
    }

    #[test]
    fn render_contain_plan_preserves_aspect() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        create_test_jpeg(&source, 800, 600);

        let dest = tmp.path().join("medium.jpg");
        let plan = plan_render((800, 600), 300, 300, false).unwrap();
        NativeEngine::new()
            .render(&source, &dest, &plan, Quality::new(82))
            .unwrap();

        let on_disk = NativeEngine::new().identify(&dest).unwrap();
        assert_eq!((on_disk.width, on_disk.height), (300, 225));
    }

    #[test]
    fn render_same_container_as_source_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("converted.webp");
        let img = RgbImage::from_fn(100, 80, |_, _| image::Rgb([200, 10, 10]));
        save_webp(
            &DynamicImage::ImageRgb8(img),
            &source,
            Quality::new(80),
        )
        .unwrap();

        let dest = tmp.path().join("converted-50x40.webp");
        let plan = plan_render((100, 80), 50, 40, false).unwrap();
        NativeEngine::new()
            .render(&source, &dest, &plan, Quality::new(80))
            .unwrap();

        let data = std::fs::read(&dest).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
    }

    #[test]
    fn decode_avif_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let avif_path = tmp.path().join("test.avif");
        create_test_avif(&avif_path, 64, 48);

        let decoded = decode_avif(&avif_path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn identify_avif_dimensions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let avif_path = tmp.path().join("test.avif");
        create_test_avif(&avif_path, 120, 80);

        let dims = NativeEngine::new().identify(&avif_path).unwrap();
        assert_eq!((dims.width, dims.height), (120, 80));
    }
}
