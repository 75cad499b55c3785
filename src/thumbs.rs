//! Derivative generation: every configured size from one source image.
//!
//! The generator runs downstream of conversion, so it re-encodes in whatever
//! container the source currently uses. It never upscales: profiles the
//! source cannot fill at native resolution are skipped, the same way sizes
//! larger than the source are skipped, and a skipped profile is not an error.
//!
//! Profile failures are isolated. One failed render is logged and the
//! remaining profiles still run.

use crate::engine::{Dimensions, Engine, Quality};
use crate::geometry::plan_render;
use crate::naming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// One named output size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeProfile {
    pub name: String,
    /// Bounded width, 0 for unbounded.
    pub width: u32,
    /// Bounded height, 0 for unbounded.
    pub height: u32,
    /// Cover geometry (center crop to exactly width × height).
    #[serde(default)]
    pub crop: bool,
}

impl SizeProfile {
    pub fn new(name: &str, width: u32, height: u32, crop: bool) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            crop,
        }
    }

    /// Profile names are lowercase `[a-z0-9_]`, 2 to 32 characters.
    pub fn has_valid_name(&self) -> bool {
        (2..=32).contains(&self.name.len())
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    /// A profile with no bounded axis produces nothing.
    pub fn is_empty(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

/// One generated derivative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivative {
    /// Size profile that produced this file.
    pub profile: String,
    /// File name, following the suffix convention.
    pub file: String,
    /// Resolved path, the authoritative location.
    pub path: PathBuf,
    /// Actual output width.
    pub width: u32,
    /// Actual output height.
    pub height: u32,
    pub mime: String,
}

/// Ordered set of derivatives from one generator run, keyed by profile name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivativeSet {
    derivatives: Vec<Derivative>,
}

impl DerivativeSet {
    pub fn is_empty(&self) -> bool {
        self.derivatives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.derivatives.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Derivative> {
        self.derivatives.iter()
    }

    pub fn get(&self, profile: &str) -> Option<&Derivative> {
        self.derivatives.iter().find(|d| d.profile == profile)
    }

    /// Profile names in generation order.
    pub fn names(&self) -> Vec<String> {
        self.derivatives.iter().map(|d| d.profile.clone()).collect()
    }

    /// Insert keeping mapping semantics: a repeated profile name replaces the
    /// earlier entry in place.
    fn insert(&mut self, derivative: Derivative) {
        match self
            .derivatives
            .iter()
            .position(|d| d.profile == derivative.profile)
        {
            Some(pos) => self.derivatives[pos] = derivative,
            None => self.derivatives.push(derivative),
        }
    }
}

impl IntoIterator for DerivativeSet {
    type Item = Derivative;
    type IntoIter = std::vec::IntoIter<Derivative>;

    fn into_iter(self) -> Self::IntoIter {
        self.derivatives.into_iter()
    }
}

#[derive(Debug, Error)]
pub enum ThumbError {
    #[error("cannot determine source dimensions: {0}")]
    SourceUnreadable(String),
}

/// True when the source cannot fill the profile at native resolution.
fn would_upscale(source: Dimensions, profile: &SizeProfile) -> bool {
    if profile.crop && profile.width > 0 && profile.height > 0 {
        return source.width < profile.width || source.height < profile.height;
    }
    let fits_width = profile.width == 0 || source.width <= profile.width;
    let fits_height = profile.height == 0 || source.height <= profile.height;
    fits_width && fits_height
}

/// Generate every derivative of `source` described by `profiles`.
///
/// `base_dims` is the catalogued size when the caller already knows it; when
/// absent the source header is probed. Output files land next to the source,
/// named by the suffix convention, in the source's own container.
pub fn generate(
    engine: &dyn Engine,
    source: &Path,
    base_dims: Option<Dimensions>,
    profiles: &[SizeProfile],
    quality: Quality,
) -> Result<DerivativeSet, ThumbError> {
    let dims = match base_dims {
        Some(dims) => dims,
        None => engine
            .identify(source)
            .map_err(|e| ThumbError::SourceUnreadable(e.to_string()))?,
    };

    let source_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ThumbError::SourceUnreadable("source has no file name".to_string()))?;
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    let mime = source
        .extension()
        .and_then(|e| e.to_str())
        .and_then(naming::mime_for_extension)
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut set = DerivativeSet::default();

    for profile in profiles {
        if profile.is_empty() {
            debug!(profile = %profile.name, "Skipping empty size profile");
            continue;
        }
        if would_upscale(dims, profile) {
            debug!(
                profile = %profile.name,
                source_width = dims.width,
                source_height = dims.height,
                "Source too small for profile, skipping"
            );
            continue;
        }
        let Some(plan) = plan_render(dims.as_tuple(), profile.width, profile.height, profile.crop)
        else {
            continue;
        };
        let Some(file_name) =
            naming::derivative_file_name(&source_name, profile.width, profile.height, profile.crop)
        else {
            continue;
        };
        let dest = parent.join(&file_name);

        match engine.render(source, &dest, &plan, quality) {
            Ok(out_dims) => {
                set.insert(Derivative {
                    profile: profile.name.clone(),
                    file: file_name,
                    path: dest,
                    width: out_dims.width,
                    height: out_dims.height,
                    mime: mime.clone(),
                });
            }
            Err(e) => {
                warn!(
                    profile = %profile.name,
                    source = %source.display(),
                    error = %e,
                    "Derivative failed, continuing with remaining profiles"
                );
            }
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::tests::{MockEngine, RecordedOp};

    fn profile(name: &str, width: u32, height: u32, crop: bool) -> SizeProfile {
        SizeProfile::new(name, width, height, crop)
    }

    #[test]
    fn cover_profile_from_landscape_source() {
        // 4000x3000 into 150x150: wider than target, so height pins the
        // scale and the crop centers horizontally
        let engine = MockEngine::new("mock");
        let profiles = [profile("thumbnail", 150, 150, true)];

        let set = generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            Some(Dimensions::new(4000, 3000)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        let thumb = set.get("thumbnail").unwrap();
        assert_eq!((thumb.width, thumb.height), (150, 150));
        assert_eq!(thumb.file, "photo-150x150-c.jpg");
        assert_eq!(thumb.path, Path::new("/photos/photo-150x150-c.jpg"));
        assert_eq!(thumb.mime, "image/jpeg");

        let ops = engine.recorded_ops();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            RecordedOp::Render {
                scale_width,
                scale_height,
                crop,
                ..
            } => {
                assert_eq!((*scale_width, *scale_height), (200, 150));
                assert_eq!(*crop, Some((25, 0, 150, 150)));
            }
            other => panic!("unexpected op: {other:?}"),
        }
    }

    #[test]
    fn contain_profile_reports_actual_dimensions() {
        let engine = MockEngine::new("mock");
        let profiles = [profile("medium", 300, 300, false)];

        let set = generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            Some(Dimensions::new(800, 600)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        let medium = set.get("medium").unwrap();
        // The suffix carries the profile bounds, the record the real size
        assert_eq!(medium.file, "photo-300x300.jpg");
        assert_eq!((medium.width, medium.height), (300, 225));
    }

    #[test]
    fn single_axis_profile_uses_axis_suffix() {
        let engine = MockEngine::new("mock");
        let profiles = [profile("medium_large", 768, 0, false)];

        let set = generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            Some(Dimensions::new(4000, 3000)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        let d = set.get("medium_large").unwrap();
        assert_eq!(d.file, "photo-768w.jpg");
        assert_eq!((d.width, d.height), (768, 576));
    }

    #[test]
    fn empty_profile_is_skipped_not_errored() {
        let engine = MockEngine::new("mock");
        let profiles = [
            profile("disabled", 0, 0, false),
            profile("thumbnail", 150, 150, true),
        ];

        let set = generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            Some(Dimensions::new(800, 600)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.get("disabled").is_none());
        assert!(set.get("thumbnail").is_some());
    }

    #[test]
    fn profiles_too_large_for_source_are_skipped() {
        let engine = MockEngine::new("mock");
        let profiles = [
            profile("large", 1024, 1024, false),
            profile("wide", 800, 0, false),
            profile("thumbnail", 150, 150, true),
        ];

        let set = generate(
            &engine,
            Path::new("/photos/small.jpg"),
            Some(Dimensions::new(500, 400)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        // No upscaling: only the crop the source can fill is generated
        assert_eq!(set.names(), vec!["thumbnail"]);
    }

    #[test]
    fn cover_larger_than_source_is_skipped() {
        let engine = MockEngine::new("mock");
        let profiles = [profile("banner", 1200, 400, true)];

        let set = generate(
            &engine,
            Path::new("/photos/small.jpg"),
            Some(Dimensions::new(800, 600)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        assert!(set.is_empty());
        assert!(!engine.touched_pixels());
    }

    #[test]
    fn one_failed_profile_does_not_abort_the_rest() {
        let engine = MockEngine::new("mock");
        engine.fail_renders_matching("-300x300");
        let profiles = [
            profile("thumbnail", 150, 150, true),
            profile("medium", 300, 300, false),
            profile("large", 1024, 1024, false),
        ];

        let set = generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            Some(Dimensions::new(4000, 3000)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        assert_eq!(set.names(), vec!["thumbnail", "large"]);

        // All three renders were attempted
        let renders = engine
            .recorded_ops()
            .iter()
            .filter(|op| matches!(op, RecordedOp::Render { .. }))
            .count();
        assert_eq!(renders, 3);
    }

    #[test]
    fn missing_base_dimensions_fall_back_to_probe() {
        let engine = MockEngine::with_dimensions("mock", vec![Dimensions::new(800, 600)]);
        let profiles = [profile("thumbnail", 150, 150, true)];

        let set = generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            None,
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        assert_eq!(set.len(), 1);
        let ops = engine.recorded_ops();
        assert!(matches!(&ops[0], RecordedOp::Identify(_)));
        assert!(matches!(&ops[1], RecordedOp::Render { .. }));
    }

    #[test]
    fn unreadable_source_without_dimensions_errors() {
        // No scripted dimensions, no caller-provided size
        let engine = MockEngine::new("mock");
        let profiles = [profile("thumbnail", 150, 150, true)];

        let result = generate(
            &engine,
            Path::new("/photos/broken.jpg"),
            None,
            &profiles,
            Quality::new(82),
        );

        assert!(matches!(result, Err(ThumbError::SourceUnreadable(_))));
        assert!(!engine.touched_pixels());
    }

    #[test]
    fn repeated_profile_name_keeps_last_value() {
        let engine = MockEngine::new("mock");
        let profiles = [
            profile("thumbnail", 100, 100, true),
            profile("thumbnail", 150, 150, true),
        ];

        let set = generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            Some(Dimensions::new(800, 600)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        assert_eq!(set.len(), 1);
        let thumb = set.get("thumbnail").unwrap();
        assert_eq!((thumb.width, thumb.height), (150, 150));
    }

    #[test]
    fn derivative_container_follows_source() {
        let engine = MockEngine::new("mock");
        let profiles = [profile("thumbnail", 150, 150, true)];

        let set = generate(
            &engine,
            Path::new("/photos/converted.webp"),
            Some(Dimensions::new(800, 600)),
            &profiles,
            Quality::new(82),
        )
        .unwrap();

        let thumb = set.get("thumbnail").unwrap();
        assert_eq!(thumb.file, "converted-150x150-c.webp");
        assert_eq!(thumb.mime, "image/webp");
    }

    #[test]
    fn quality_reaches_the_engine_unchanged() {
        let engine = MockEngine::new("mock");
        let profiles = [profile("thumbnail", 150, 150, true)];

        generate(
            &engine,
            Path::new("/photos/photo.jpg"),
            Some(Dimensions::new(800, 600)),
            &profiles,
            Quality::new(70),
        )
        .unwrap();

        assert!(matches!(
            engine.recorded_ops()[0],
            RecordedOp::Render { quality: 70, .. }
        ));
    }

    #[test]
    fn profile_name_validation() {
        assert!(profile("thumbnail", 1, 1, false).has_valid_name());
        assert!(profile("medium_large", 1, 1, false).has_valid_name());
        assert!(profile("a1", 1, 1, false).has_valid_name());
        assert!(!profile("x", 1, 1, false).has_valid_name());
        assert!(!profile("Thumbnail", 1, 1, false).has_valid_name());
        assert!(!profile("bad-name", 1, 1, false).has_valid_name());
        assert!(!profile(&"a".repeat(33), 1, 1, false).has_valid_name());
    }
}
