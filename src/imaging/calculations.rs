//! Pure calculation functions for image dimensions and pixel values.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate thumbnail dimensions bounded by a maximum edge.
///
/// The longer side is scaled down to `max_edge` and the shorter side follows
/// the source aspect ratio. Images already inside the bound keep their size;
/// thumbnails never upscale. Neither side rounds below 1px.
///
/// # Examples
/// ```
/// # use image_vault::imaging::calculate_thumbnail_bounds;
/// // 800x600 landscape bounded at 150 → 150x113
/// assert_eq!(calculate_thumbnail_bounds((800, 600), 150), (150, 113));
///
/// // Small sources pass through untouched
/// assert_eq!(calculate_thumbnail_bounds((100, 40), 150), (100, 40));
/// ```
pub fn calculate_thumbnail_bounds(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let longer_edge = src_w.max(src_h);

    if longer_edge <= max_edge || longer_edge == 0 {
        return (src_w, src_h);
    }

    let ratio = max_edge as f64 / longer_edge as f64;
    if src_w >= src_h {
        let h = ((src_h as f64 * ratio).round() as u32).max(1);
        (max_edge, h)
    } else {
        let w = ((src_w as f64 * ratio).round() as u32).max(1);
        (w, max_edge)
    }
}

/// Scale one 8-bit channel value by `factor`, clipping at 255.
///
/// Negative factors clip at 0.
#[inline]
pub fn scale_channel(value: u8, factor: f32) -> u8 {
    (value as f32 * factor).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // calculate_thumbnail_bounds
    // =========================================================================

    #[test]
    fn thumbnail_landscape_bounded_by_width() {
        assert_eq!(calculate_thumbnail_bounds((1600, 900), 150), (150, 84));
    }

    #[test]
    fn thumbnail_portrait_bounded_by_height() {
        assert_eq!(calculate_thumbnail_bounds((600, 800), 150), (113, 150));
    }

    #[test]
    fn thumbnail_square() {
        assert_eq!(calculate_thumbnail_bounds((500, 500), 150), (150, 150));
    }

    #[test]
    fn thumbnail_never_upscales() {
        assert_eq!(calculate_thumbnail_bounds((64, 48), 150), (64, 48));
        assert_eq!(calculate_thumbnail_bounds((150, 10), 150), (150, 10));
    }

    #[test]
    fn thumbnail_extreme_aspect_keeps_one_pixel() {
        assert_eq!(calculate_thumbnail_bounds((3000, 2), 150), (150, 1));
        assert_eq!(calculate_thumbnail_bounds((1, 4000), 150), (1, 150));
    }

    #[test]
    fn thumbnail_zero_sized_source_passes_through() {
        assert_eq!(calculate_thumbnail_bounds((0, 0), 150), (0, 0));
    }

    // =========================================================================
    // scale_channel
    // =========================================================================

    #[test]
    fn brightness_scales_midtones() {
        assert_eq!(scale_channel(100, 1.5), 150);
        assert_eq!(scale_channel(0, 1.5), 0);
    }

    #[test]
    fn brightness_clips_at_max() {
        assert_eq!(scale_channel(170, 1.5), 255);
        assert_eq!(scale_channel(255, 1.5), 255);
    }

    #[test]
    fn brightness_identity_factor() {
        for v in [0u8, 1, 127, 200, 255] {
            assert_eq!(scale_channel(v, 1.0), v);
        }
    }
}
