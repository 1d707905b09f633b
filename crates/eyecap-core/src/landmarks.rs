//! Face-mesh landmark schema and eye selection.
//!
//! The detector emits a fixed 468-point face mesh (478 with iris refinement).
//! Only the eye contour and the four EAR points per eye are consumed here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::NormalizedPoint;

/// Minimum number of points in a face-mesh result.
pub const FACE_MESH_POINTS: usize = 468;

/// Settings the landmark producer is expected to run with.
///
/// Published in the daemon status so producers can configure themselves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectorSettings {
    pub max_faces: usize,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

pub const DETECTOR_SETTINGS: DetectorSettings = DetectorSettings {
    max_faces: 1,
    refine_landmarks: true,
    min_detection_confidence: 0.7,
    min_tracking_confidence: 0.5,
};

/// Which eye the user is photographing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeSelection {
    #[default]
    Left,
    Right,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid eye selection '{0}' (expected 'left' or 'right')")]
pub struct ParseEyeError(String);

impl FromStr for EyeSelection {
    type Err = ParseEyeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(EyeSelection::Left),
            "right" => Ok(EyeSelection::Right),
            _ => Err(ParseEyeError(s.to_string())),
        }
    }
}

impl fmt::Display for EyeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EyeSelection::Left => "left",
            EyeSelection::Right => "right",
        })
    }
}

/// Mesh indices for one eye.
#[derive(Debug, Clone, Copy)]
pub struct EyeLandmarks {
    /// Upper lid midpoint.
    pub top: usize,
    /// Lower lid midpoint.
    pub bottom: usize,
    pub inner_corner: usize,
    pub outer_corner: usize,
    /// Ordered contour used for the bounding box. The closing index repeats
    /// the first corner.
    pub contour: [usize; 13],
}

const LEFT_EYE: EyeLandmarks = EyeLandmarks {
    top: 159,
    bottom: 145,
    inner_corner: 133,
    outer_corner: 33,
    contour: [33, 133, 160, 159, 158, 157, 173, 144, 145, 153, 154, 155, 133],
};

const RIGHT_EYE: EyeLandmarks = EyeLandmarks {
    top: 386,
    bottom: 374,
    inner_corner: 362,
    outer_corner: 263,
    contour: [362, 263, 387, 386, 385, 384, 398, 373, 374, 380, 381, 382, 263],
};

impl EyeSelection {
    pub fn landmarks(self) -> &'static EyeLandmarks {
        match self {
            EyeSelection::Left => &LEFT_EYE,
            EyeSelection::Right => &RIGHT_EYE,
        }
    }
}

/// One face's landmarks for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<NormalizedPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<NormalizedPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the set is long enough to address every eye index.
    pub fn is_complete(&self) -> bool {
        self.points.len() >= FACE_MESH_POINTS
    }

    pub fn get(&self, index: usize) -> Option<NormalizedPoint> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[NormalizedPoint] {
        &self.points
    }
}

impl From<Vec<(f64, f64)>> for LandmarkSet {
    fn from(raw: Vec<(f64, f64)>) -> Self {
        Self::new(raw.into_iter().map(NormalizedPoint::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eye_selection() {
        assert_eq!("left".parse::<EyeSelection>(), Ok(EyeSelection::Left));
        assert_eq!(" Right ".parse::<EyeSelection>(), Ok(EyeSelection::Right));
        assert!("both".parse::<EyeSelection>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for eye in [EyeSelection::Left, EyeSelection::Right] {
            assert_eq!(eye.to_string().parse::<EyeSelection>(), Ok(eye));
        }
    }

    #[test]
    fn test_contours_stay_within_mesh() {
        for eye in [EyeSelection::Left, EyeSelection::Right] {
            let lm = eye.landmarks();
            assert!(lm.contour.iter().all(|&i| i < FACE_MESH_POINTS));
            assert!(lm.contour.contains(&lm.top));
            assert!(lm.contour.contains(&lm.bottom));
        }
    }

    #[test]
    fn test_short_set_is_incomplete() {
        let set = LandmarkSet::from(vec![(0.5, 0.5); 10]);
        assert!(!set.is_complete());
        let set = LandmarkSet::from(vec![(0.5, 0.5); FACE_MESH_POINTS]);
        assert!(set.is_complete());
    }
}
