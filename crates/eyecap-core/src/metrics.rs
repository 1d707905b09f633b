//! Per-frame eye geometry: eye aspect ratio and the eye's pixel bounding box.

use thiserror::Error;

use crate::geometry::{OverlaySize, PixelBox};
use crate::landmarks::{EyeSelection, LandmarkSet};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("landmark set has {0} points (expected at least 468)")]
    TooFewLandmarks(usize),
    #[error("eye corners coincide; aspect ratio undefined")]
    DegenerateGeometry,
}

/// Geometry derived from one frame for the selected eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeMetrics {
    /// Lid opening over corner-to-corner width, in normalized space.
    pub ear: f64,
    pub bounding_box: PixelBox,
}

/// Compute the eye aspect ratio and bounding box for `eye`.
///
/// EAR is dimension independent; the bounding box is scaled into `overlay`.
pub fn extract(
    landmarks: &LandmarkSet,
    eye: EyeSelection,
    overlay: OverlaySize,
) -> Result<EyeMetrics, MetricsError> {
    if !landmarks.is_complete() {
        return Err(MetricsError::TooFewLandmarks(landmarks.len()));
    }

    let idx = eye.landmarks();
    let point = |i: usize| {
        landmarks
            .get(i)
            .ok_or(MetricsError::TooFewLandmarks(landmarks.len()))
    };

    let vertical = point(idx.top)?.distance(&point(idx.bottom)?);
    let horizontal = point(idx.inner_corner)?.distance(&point(idx.outer_corner)?);
    if horizontal == 0.0 {
        return Err(MetricsError::DegenerateGeometry);
    }
    let ear = vertical / horizontal;
    if !ear.is_finite() {
        return Err(MetricsError::DegenerateGeometry);
    }

    let contour = idx
        .contour
        .iter()
        .map(|&i| point(i).map(|p| p.to_pixels(overlay)))
        .collect::<Result<Vec<_>, _>>()?;
    let bounding_box = PixelBox::enclosing(contour).ok_or(MetricsError::DegenerateGeometry)?;

    Ok(EyeMetrics { ear, bounding_box })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormalizedPoint;
    use crate::landmarks::FACE_MESH_POINTS;

    /// A full mesh with every point parked at the frame centre.
    fn mesh() -> Vec<NormalizedPoint> {
        vec![NormalizedPoint::new(0.5, 0.5); FACE_MESH_POINTS]
    }

    fn left_eye_open() -> LandmarkSet {
        let mut pts = mesh();
        pts[159] = NormalizedPoint::new(0.5, 0.40);
        pts[145] = NormalizedPoint::new(0.5, 0.45);
        pts[33] = NormalizedPoint::new(0.45, 0.42);
        pts[133] = NormalizedPoint::new(0.55, 0.42);
        for &i in &EyeSelection::Left.landmarks().contour {
            if ![159, 145, 33, 133].contains(&i) {
                pts[i] = NormalizedPoint::new(0.5, 0.42);
            }
        }
        LandmarkSet::new(pts)
    }

    #[test]
    fn test_left_eye_open_ear() {
        let m = extract(&left_eye_open(), EyeSelection::Left, OverlaySize::new(480, 360)).unwrap();
        assert!((m.ear - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_bounding_box_in_overlay_pixels() {
        let m = extract(&left_eye_open(), EyeSelection::Left, OverlaySize::new(480, 360)).unwrap();
        let b = m.bounding_box;
        assert!((b.x_min - 216.0).abs() < 1e-9);
        assert!((b.x_max() - 264.0).abs() < 1e-9);
        assert!((b.y_min - 144.0).abs() < 1e-9);
        assert!((b.y_max() - 162.0).abs() < 1e-9);
    }

    #[test]
    fn test_ear_independent_of_overlay_size() {
        let set = left_eye_open();
        let a = extract(&set, EyeSelection::Left, OverlaySize::new(480, 360)).unwrap();
        let b = extract(&set, EyeSelection::Left, OverlaySize::new(1920, 1080)).unwrap();
        assert_eq!(a.ear, b.ear);
    }

    #[test]
    fn test_right_eye_uses_its_own_indices() {
        let mut pts = mesh();
        pts[386] = NormalizedPoint::new(0.3, 0.40);
        pts[374] = NormalizedPoint::new(0.3, 0.41);
        pts[362] = NormalizedPoint::new(0.25, 0.40);
        pts[263] = NormalizedPoint::new(0.35, 0.40);
        let m = extract(&LandmarkSet::new(pts), EyeSelection::Right, OverlaySize::default()).unwrap();
        assert!((m.ear - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_corners_are_degenerate() {
        let err = extract(
            &LandmarkSet::new(mesh()),
            EyeSelection::Left,
            OverlaySize::default(),
        )
        .unwrap_err();
        assert_eq!(err, MetricsError::DegenerateGeometry);
    }

    #[test]
    fn test_short_landmark_set_rejected() {
        let set = LandmarkSet::new(vec![NormalizedPoint::new(0.5, 0.5); 100]);
        let err = extract(&set, EyeSelection::Left, OverlaySize::default()).unwrap_err();
        assert_eq!(err, MetricsError::TooFewLandmarks(100));
    }
}
