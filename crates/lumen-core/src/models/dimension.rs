use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel size of a raster or a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimension {
    pub width: u32,
    pub height: u32,
}

impl Dimension {
    pub const ZERO: Dimension = Dimension {
        width: 0,
        height: 0,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn fits_within(&self, bound: Dimension) -> bool {
        self.width <= bound.width && self.height <= bound.height
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Maximum box a derivative must fit inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    pub bounding_width: u32,
    pub bounding_height: u32,
}

impl ThumbnailSpec {
    pub fn new(bounding_width: u32, bounding_height: u32) -> Self {
        Self {
            bounding_width,
            bounding_height,
        }
    }

    pub fn bound(&self) -> Dimension {
        Dimension::new(self.bounding_width, self.bounding_height)
    }

    /// Apply a per-request override on top of the configured default.
    ///
    /// Both values must be given together and each must be a positive integer.
    pub fn with_override(
        default: ThumbnailSpec,
        width: Option<&str>,
        height: Option<&str>,
    ) -> Result<ThumbnailSpec, AppError> {
        match (width, height) {
            (None, None) => Ok(default),
            (Some(w), Some(h)) => {
                let width = parse_side("thumbnailWidth", w)?;
                let height = parse_side("thumbnailHeight", h)?;
                Ok(ThumbnailSpec::new(width, height))
            }
            _ => Err(AppError::InvalidRequest(
                "thumbnailWidth and thumbnailHeight must be supplied together".to_string(),
            )),
        }
    }
}

fn parse_side(name: &str, raw: &str) -> Result<u32, AppError> {
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(AppError::InvalidRequest(format!(
            "{} must be a positive integer, got '{}'",
            name, raw
        ))),
    }
}

/// Which frames of a video feed the animated derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameWindow {
    pub start: u32,
    pub count: u32,
    /// Playback rate of the animation in frames per second.
    pub frame_rate: u32,
    /// Distance in source frames between consecutive sampled frames.
    pub sample_stride: u32,
}

impl Default for FrameWindow {
    fn default() -> Self {
        Self {
            start: 0,
            count: 2,
            frame_rate: 2,
            sample_stride: 2,
        }
    }
}

impl FrameWindow {
    /// Clamp the window to a source of `length` frames.
    ///
    /// A window that starts past the end or runs past it is replaced by
    /// `start = length / 5, count = length / 2`. Rate and stride are kept.
    pub fn fit_to(self, length: u32) -> FrameWindow {
        let overruns = self.start > length || self.start.saturating_add(self.count) > length;
        if !overruns {
            return self;
        }
        FrameWindow {
            start: length / 5,
            count: length / 2,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_absent_keeps_default() {
        let default = ThumbnailSpec::new(200, 200);
        assert_eq!(
            ThumbnailSpec::with_override(default, None, None).unwrap(),
            default
        );
    }

    #[test]
    fn test_override_applies_both_sides() {
        let spec =
            ThumbnailSpec::with_override(ThumbnailSpec::new(200, 200), Some("320"), Some("240"))
                .unwrap();
        assert_eq!(spec.bound(), Dimension::new(320, 240));
    }

    #[test]
    fn test_malformed_override_is_invalid_request() {
        let default = ThumbnailSpec::new(200, 200);
        for (w, h) in [
            (Some("abc"), Some("10")),
            (Some("10"), Some("0")),
            (Some("10"), None),
            (None, Some("10")),
            (Some("-5"), Some("10")),
        ] {
            assert!(matches!(
                ThumbnailSpec::with_override(default, w, h),
                Err(AppError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn test_window_inside_length_is_unchanged() {
        let window = FrameWindow {
            start: 0,
            count: 2,
            frame_rate: 2,
            sample_stride: 2,
        };
        assert_eq!(window.fit_to(100), window);
        // Exactly reaching the end is not an overrun.
        let edge = FrameWindow {
            start: 5,
            count: 5,
            ..window
        };
        assert_eq!(edge.fit_to(10), edge);
    }

    #[test]
    fn test_window_overrun_falls_back() {
        let window = FrameWindow {
            start: 9,
            count: 5,
            frame_rate: 2,
            sample_stride: 2,
        };
        let fitted = window.fit_to(10);
        assert_eq!(fitted.start, 2);
        assert_eq!(fitted.count, 5);
        assert_eq!(fitted.frame_rate, 2);
        assert_eq!(fitted.sample_stride, 2);
    }

    #[test]
    fn test_window_start_past_end_falls_back() {
        let window = FrameWindow {
            start: 50,
            count: 0,
            ..FrameWindow::default()
        };
        let fitted = window.fit_to(7);
        assert_eq!((fitted.start, fitted.count), (1, 3));
    }

    #[test]
    fn test_dimension_helpers() {
        assert!(Dimension::new(0, 10).is_empty());
        assert!(Dimension::new(10, 10).fits_within(Dimension::new(10, 20)));
        assert!(!Dimension::new(11, 10).fits_within(Dimension::new(10, 20)));
        assert_eq!(Dimension::new(3, 4).to_string(), "3x4");
    }
}
