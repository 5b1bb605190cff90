//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Dimensions;

/// Fit `source` inside `bounds`, preserving aspect ratio, never upscaling.
///
/// Both sides are scaled by `min(bounds.w / w, bounds.h / h, 1.0)` and rounded
/// to the nearest pixel. Each side is at least 1 and at most its bound.
///
/// # Examples
/// ```
/// # use mailshrink::imaging::{fit_within, Dimensions};
/// let box_ = Dimensions::new(1920, 1080);
/// assert_eq!(fit_within(Dimensions::new(4000, 2000), box_), Dimensions::new(1920, 960));
/// assert_eq!(fit_within(Dimensions::new(800, 600), box_), Dimensions::new(800, 600));
/// ```
pub fn fit_within(source: Dimensions, bounds: Dimensions) -> Dimensions {
    if source.width <= bounds.width && source.height <= bounds.height {
        return source;
    }
    if source.width == 0 || source.height == 0 {
        return source;
    }

    let scale_w = bounds.width as f64 / source.width as f64;
    let scale_h = bounds.height as f64 / source.height as f64;
    let scale = scale_w.min(scale_h).min(1.0);

    let width = ((source.width as f64 * scale).round() as u32).clamp(1, bounds.width.max(1));
    let height = ((source.height as f64 * scale).round() as u32).clamp(1, bounds.height.max(1));
    Dimensions { width, height }
}
