use serde::{Deserialize, Serialize};

use crate::blink::BlinkConfig;
use crate::crop::DEFAULT_CROP_MARGIN;
use crate::geometry::OverlaySize;
use crate::landmarks::EyeSelection;

/// Tuning for a [`CaptureSession`](crate::CaptureSession).
///
/// Values are fixed for the lifetime of a session; nothing is calibrated at
/// runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(flatten)]
    pub blink: BlinkConfig,
    /// Margin around the eye box when cropping, in frame pixels.
    pub crop_margin: f64,
    /// Overlay size assumed until the camera reports its own.
    pub overlay: OverlaySize,
    pub default_eye: EyeSelection,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            blink: BlinkConfig::default(),
            crop_margin: DEFAULT_CROP_MARGIN,
            overlay: OverlaySize::default(),
            default_eye: EyeSelection::Left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: SessionConfig = toml::from_str("min_closed_frames = 3").unwrap();
        assert_eq!(cfg.blink.min_closed_frames, 3);
        assert_eq!(cfg.blink.ear_threshold, 0.25);
        assert_eq!(cfg.crop_margin, 10.0);
        assert_eq!(cfg.overlay, OverlaySize::new(480, 360));
    }

    #[test]
    fn test_eye_and_overlay_from_toml() {
        let cfg: SessionConfig = toml::from_str(
            r#"
            default_eye = "right"
            ear_threshold = 0.2

            [overlay]
            width = 640
            height = 480
            "#,
        )
        .unwrap();
        assert_eq!(cfg.default_eye, EyeSelection::Right);
        assert_eq!(cfg.blink.ear_threshold, 0.2);
        assert_eq!(cfg.overlay, OverlaySize::new(640, 480));
    }
}
