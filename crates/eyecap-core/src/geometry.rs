//! Coordinate types for the two spaces the pipeline works in.
//!
//! The landmark detector reports points normalized to `[0, 1]`; everything that
//! is drawn or cropped lives in overlay pixels. The two are kept as separate
//! types so a normalized value can never be compared against a pixel value
//! without going through [`NormalizedPoint::to_pixels`].

use serde::{Deserialize, Serialize};

/// A landmark position normalized to the detector's input frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in normalized space.
    pub fn distance(&self, other: &NormalizedPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Scale into overlay pixel space.
    pub fn to_pixels(self, overlay: OverlaySize) -> PixelPoint {
        PixelPoint {
            x: self.x * f64::from(overlay.width),
            y: self.y * f64::from(overlay.height),
        }
    }
}

impl From<(f64, f64)> for NormalizedPoint {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// A position in overlay pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Dimensions of the preview overlay the landmarks are projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlaySize {
    pub width: u32,
    pub height: u32,
}

impl OverlaySize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for OverlaySize {
    /// The preview resolution the capture page requests from the camera.
    fn default() -> Self {
        Self::new(480, 360)
    }
}

/// Axis-aligned rectangle in overlay pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelBox {
    pub x_min: f64,
    pub y_min: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelBox {
    /// Tightest box around `points`. Returns `None` for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = PixelPoint>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut x_min, mut x_max, mut y_min, mut y_max) = (first.x, first.x, first.y, first.y);
        for p in iter {
            x_min = x_min.min(p.x);
            x_max = x_max.max(p.x);
            y_min = y_min.min(p.y);
            y_max = y_max.max(p.y);
        }
        Some(Self {
            x_min,
            y_min,
            width: x_max - x_min,
            height: y_max - y_min,
        })
    }

    pub fn x_max(&self) -> f64 {
        self.x_min + self.width
    }

    pub fn y_max(&self) -> f64 {
        self.y_min + self.height
    }

    /// Map this box from one pixel grid onto another of a different resolution.
    pub fn rescale(&self, from: OverlaySize, to_width: u32, to_height: u32) -> PixelBox {
        if from.width == 0 || from.height == 0 {
            return *self;
        }
        let sx = f64::from(to_width) / f64::from(from.width);
        let sy = f64::from(to_height) / f64::from(from.height);
        PixelBox {
            x_min: self.x_min * sx,
            y_min: self.y_min * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixels_scales_each_axis() {
        let p = NormalizedPoint::new(0.5, 0.25).to_pixels(OverlaySize::new(480, 360));
        assert_eq!(p, PixelPoint { x: 240.0, y: 90.0 });
    }

    #[test]
    fn test_enclosing_box() {
        let points = [
            PixelPoint { x: 10.0, y: 40.0 },
            PixelPoint { x: 30.0, y: 20.0 },
            PixelPoint { x: 20.0, y: 50.0 },
        ];
        let b = PixelBox::enclosing(points).unwrap();
        assert_eq!(b.x_min, 10.0);
        assert_eq!(b.y_min, 20.0);
        assert_eq!(b.x_max(), 30.0);
        assert_eq!(b.y_max(), 50.0);
    }

    #[test]
    fn test_enclosing_empty_is_none() {
        assert!(PixelBox::enclosing(Vec::new()).is_none());
    }

    #[test]
    fn test_rescale_identity_when_sizes_match() {
        let b = PixelBox {
            x_min: 150.0,
            y_min: 100.0,
            width: 100.0,
            height: 100.0,
        };
        assert_eq!(b.rescale(OverlaySize::new(480, 360), 480, 360), b);
    }

    #[test]
    fn test_rescale_doubles_for_double_resolution() {
        let b = PixelBox {
            x_min: 150.0,
            y_min: 100.0,
            width: 100.0,
            height: 50.0,
        };
        let r = b.rescale(OverlaySize::new(480, 360), 960, 720);
        assert_eq!(r.x_min, 300.0);
        assert_eq!(r.y_min, 200.0);
        assert_eq!(r.width, 200.0);
        assert_eq!(r.height, 100.0);
    }
}
