//! Two-pass bounded scaling.
//!
//! The width pass runs first and the height pass only corrects what the width pass
//! left too tall. Results are truncated integers and never exceed the source size.

use lumen_core::Dimension;

/// Scale `source` to fit inside `bound`, preserving aspect ratio without upscaling.
///
/// 1. If the width exceeds the bound, clamp it and derive the height from it.
/// 2. If the height then exceeds the bound, clamp it and derive the width from it.
///
/// Zero-sized inputs yield `Dimension::ZERO`.
pub fn scale(source: Dimension, bound: Dimension) -> Dimension {
    if source.is_empty() || bound.is_empty() {
        return Dimension::ZERO;
    }

    let (original_width, original_height) = (source.width as u64, source.height as u64);
    let (bound_width, bound_height) = (bound.width as u64, bound.height as u64);
    let mut width = original_width;
    let mut height = original_height;

    if width > bound_width {
        width = bound_width;
        height = width * original_height / original_width;
    }

    if height > bound_height {
        height = bound_height;
        width = height * original_width / original_height;
    }

    // Both sides are at most the source's, so they fit in u32.
    Dimension::new(width as u32, height as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(width: u32, height: u32) -> Dimension {
        Dimension::new(width, height)
    }

    #[test]
    fn test_landscape_clamped_by_width() {
        assert_eq!(scale(d(1920, 1080), d(200, 200)), d(200, 112));
    }

    #[test]
    fn test_portrait_clamped_by_height() {
        assert_eq!(scale(d(1080, 1920), d(200, 200)), d(112, 200));
    }

    #[test]
    fn test_height_pass_corrects_width_pass() {
        // Width pass gives 300x400, which is still too tall.
        assert_eq!(scale(d(600, 800), d(300, 200)), d(150, 200));
    }

    #[test]
    fn test_small_source_is_not_upscaled() {
        assert_eq!(scale(d(50, 40), d(200, 200)), d(50, 40));
        assert_eq!(scale(d(200, 200), d(200, 200)), d(200, 200));
    }

    #[test]
    fn test_zero_inputs_do_not_divide() {
        assert_eq!(scale(d(0, 100), d(200, 200)), Dimension::ZERO);
        assert_eq!(scale(d(100, 0), d(200, 200)), Dimension::ZERO);
        assert_eq!(scale(d(100, 100), d(0, 200)), Dimension::ZERO);
    }

    #[test]
    fn test_large_sides_do_not_overflow() {
        let scaled = scale(d(u32::MAX, u32::MAX - 1), d(1000, 1000));
        assert!(scaled.fits_within(d(1000, 1000)));
        assert_eq!(scaled.width, 1000);
    }

    #[test]
    fn test_result_always_fits_and_never_grows() {
        let sides = [1u32, 2, 7, 99, 100, 101, 640, 1080, 1920, 4000];
        let bounds = [1u32, 50, 100, 200, 333, 1000];
        for &w in &sides {
            for &h in &sides {
                for &bw in &bounds {
                    for &bh in &bounds {
                        let out = scale(d(w, h), d(bw, bh));
                        assert!(out.width <= bw && out.height <= bh, "{}x{} in {}x{}", w, h, bw, bh);
                        assert!(out.width <= w && out.height <= h, "{}x{} in {}x{}", w, h, bw, bh);
                        if w <= bw && h <= bh {
                            assert_eq!(out, d(w, h));
                        }
                    }
                }
            }
        }
    }
}
