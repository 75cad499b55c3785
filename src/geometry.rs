//! Pure geometry calculations for resize and crop planning.
//!
//! Everything here is a pure function over integer dimensions — no I/O, no
//! pixels. The thumbnail generator turns a size profile into a [`ResizePlan`]
//! with [`plan_render`], and engines execute the plan verbatim. Keeping the
//! math in one place is what makes the cover-crop contract ("exactly WxH,
//! never off by one") testable without encoding a single image.

/// A centered crop window applied after scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One planned render: scale the source to `scale_width`x`scale_height`,
/// then optionally crop. Engines must not re-derive any of these numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub scale_width: u32,
    pub scale_height: u32,
    pub crop: Option<CropWindow>,
}

impl ResizePlan {
    /// Final output dimensions after scaling and any crop.
    pub fn output_size(&self) -> (u32, u32) {
        match self.crop {
            Some(c) => (c.width, c.height),
            None => (self.scale_width, self.scale_height),
        }
    }
}

/// Calculate "contain" dimensions: fit within bounds, preserving aspect.
///
/// A zero bound means "unbounded on that axis" — the image scales by the
/// other axis alone. Both bounds zero is the caller's no-op case and is not
/// accepted here.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `bounds` - Bounding box (width, height), at least one nonzero
///
/// # Returns
/// * `(width, height)` - Scaled dimensions, neither exceeding its bound
///
/// # Examples
/// ```
/// # use pixelpress::geometry::contain_dimensions;
/// // 1600x1200 into a 300x300 box → 300x225
/// assert_eq!(contain_dimensions((1600, 1200), (300, 300)), (300, 225));
///
/// // Width-only bound: 1600x1200 at 768 wide → 768x576
/// assert_eq!(contain_dimensions((1600, 1200), (768, 0)), (768, 576));
/// ```
pub fn contain_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;
    let src_aspect = src_w as f64 / src_h as f64;

    match (max_w, max_h) {
        (w, 0) => (w, ((w as f64 / src_aspect).round() as u32).max(1)),
        (0, h) => (((h as f64 * src_aspect).round() as u32).max(1), h),
        (w, h) => {
            let bounds_aspect = w as f64 / h as f64;
            if src_aspect > bounds_aspect {
                // Source is wider: width is the binding edge
                (w, ((w as f64 / src_aspect).round() as u32).max(1))
            } else {
                // Source is taller (or same shape): height is the binding edge
                (((h as f64 * src_aspect).round() as u32).max(1), h)
            }
        }
    }
}

/// Calculate "cover" fill dimensions (resize before center crop).
///
/// Returns dimensions that completely cover the target area while keeping
/// the source aspect ratio. One dimension matches the target exactly, the
/// other meets or exceeds it.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height), both nonzero
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn cover_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h)
    }
}

/// Build the render plan for one target box.
///
/// * `crop=false`: contain geometry, no crop step.
/// * `crop=true` with both dimensions nonzero: cover geometry — scale to
///   fill, then center-crop to exactly `width`x`height` with floor'd
///   origins.
/// * `crop=true` with one dimension zero: a crop makes no sense on an
///   unbounded axis, so this degrades to contain geometry.
/// * Both dimensions zero: no-op, returns `None`.
pub fn plan_render(source: (u32, u32), width: u32, height: u32, crop: bool) -> Option<ResizePlan> {
    if width == 0 && height == 0 {
        return None;
    }

    if crop && width > 0 && height > 0 {
        let (fill_w, fill_h) = cover_dimensions(source, (width, height));
        return Some(ResizePlan {
            scale_width: fill_w,
            scale_height: fill_h,
            crop: Some(CropWindow {
                x: (fill_w - width) / 2,
                y: (fill_h - height) / 2,
                width,
                height,
            }),
        });
    }

    let (out_w, out_h) = contain_dimensions(source, (width, height));
    Some(ResizePlan {
        scale_width: out_w,
        scale_height: out_h,
        crop: None,
    })
}
