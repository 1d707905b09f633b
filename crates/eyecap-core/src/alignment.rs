//! Alignment of the eye bounding box inside the fixed target region.

use crate::geometry::{OverlaySize, PixelBox};

/// The sub-rectangle of the overlay the eye must sit strictly inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRegion {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl TargetRegion {
    /// 25%–75% of the width, 20%–80% of the height.
    pub fn for_overlay(overlay: OverlaySize) -> Self {
        let w = f64::from(overlay.width);
        let h = f64::from(overlay.height);
        Self {
            x_min: w * 0.25,
            x_max: w * 0.75,
            y_min: h * 0.2,
            y_max: h * 0.8,
        }
    }

    /// Strict containment: a box touching any edge is outside.
    pub fn contains(&self, bbox: &PixelBox) -> bool {
        bbox.x_min > self.x_min
            && bbox.x_max() < self.x_max
            && bbox.y_min > self.y_min
            && bbox.y_max() < self.y_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentEvent {
    BecameAligned,
    BecameMisaligned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlignmentState {
    pub is_aligned: bool,
}

impl AlignmentState {
    /// Re-test `bbox` against the target derived from `overlay`.
    pub fn step(
        self,
        bbox: &PixelBox,
        overlay: OverlaySize,
    ) -> (AlignmentState, Option<AlignmentEvent>) {
        let is_aligned = TargetRegion::for_overlay(overlay).contains(bbox);
        let event = match (self.is_aligned, is_aligned) {
            (false, true) => Some(AlignmentEvent::BecameAligned),
            (true, false) => Some(AlignmentEvent::BecameMisaligned),
            _ => None,
        };
        (AlignmentState { is_aligned }, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OVERLAY: OverlaySize = OverlaySize::new(480, 360);

    fn bbox(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> PixelBox {
        PixelBox {
            x_min,
            y_min,
            width: x_max - x_min,
            height: y_max - y_min,
        }
    }

    #[test]
    fn test_target_region_for_default_overlay() {
        let t = TargetRegion::for_overlay(OVERLAY);
        assert_eq!(t.x_min, 120.0);
        assert_eq!(t.x_max, 360.0);
        assert_eq!(t.y_min, 72.0);
        assert_eq!(t.y_max, 288.0);
    }

    #[test]
    fn test_centered_eye_is_aligned() {
        let (state, event) = AlignmentState::default().step(&bbox(150.0, 250.0, 100.0, 200.0), OVERLAY);
        assert!(state.is_aligned);
        assert_eq!(event, Some(AlignmentEvent::BecameAligned));
    }

    #[test]
    fn test_touching_left_edge_is_not_aligned() {
        let (state, _) = AlignmentState::default().step(&bbox(120.0, 250.0, 100.0, 200.0), OVERLAY);
        assert!(!state.is_aligned);
    }

    #[test]
    fn test_touching_bottom_edge_is_not_aligned() {
        let (state, _) = AlignmentState::default().step(&bbox(150.0, 250.0, 100.0, 288.0), OVERLAY);
        assert!(!state.is_aligned);
    }

    #[test]
    fn test_events_only_on_transition() {
        let inside = bbox(150.0, 250.0, 100.0, 200.0);
        let outside = bbox(10.0, 60.0, 100.0, 200.0);

        let (s, e) = AlignmentState::default().step(&outside, OVERLAY);
        assert_eq!(e, None);
        let (s, e) = s.step(&inside, OVERLAY);
        assert_eq!(e, Some(AlignmentEvent::BecameAligned));
        let (s, e) = s.step(&inside, OVERLAY);
        assert_eq!(e, None);
        let (s, e) = s.step(&outside, OVERLAY);
        assert_eq!(e, Some(AlignmentEvent::BecameMisaligned));
        assert!(!s.is_aligned);
    }

    #[test]
    fn test_target_follows_overlay_size() {
        let b = bbox(150.0, 250.0, 100.0, 200.0);
        let (state, _) = AlignmentState::default().step(&b, OverlaySize::new(1280, 720));
        // target x_min is 320 at this width
        assert!(!state.is_aligned);
    }
}
