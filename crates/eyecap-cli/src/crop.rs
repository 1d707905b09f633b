//! `eyecap crop`: cut the eye region out of a saved frame.

use std::path::Path;

use anyhow::{bail, Context, Result};
use eyecap_core::crop::CropRect;
use eyecap_core::{FrameCropper, OverlaySize, PixelBox};

/// Parse `x,y,w,h` in overlay pixels.
pub fn parse_bbox(s: &str) -> Result<PixelBox, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid box '{s}': {e}"))?;
    match parts.as_slice() {
        &[x_min, y_min, width, height] => Ok(PixelBox {
            x_min,
            y_min,
            width,
            height,
        }),
        _ => Err(format!("expected x,y,w,h, got '{s}'")),
    }
}

/// Parse `WIDTHxHEIGHT`.
pub fn parse_size(s: &str) -> Result<OverlaySize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse().map_err(|e| format!("invalid width '{w}': {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("invalid height '{h}': {e}"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got '{s}'"));
    }
    Ok(OverlaySize::new(width, height))
}

/// Crop `frame` to the eye box and write the PNG to `out`.
///
/// Without an explicit overlay the box is taken to be in frame pixels.
pub fn crop_file(
    frame: &Path,
    bbox: &PixelBox,
    overlay: Option<OverlaySize>,
    margin: f64,
    out: &Path,
) -> Result<CropRect> {
    let img = image::open(frame).with_context(|| format!("failed to open {}", frame.display()))?;
    if img.width() == 0 || img.height() == 0 {
        bail!("{} is empty", frame.display());
    }
    let overlay = overlay.unwrap_or_else(|| OverlaySize::new(img.width(), img.height()));

    let captured = FrameCropper::new(margin).crop(&img, bbox, overlay)?;
    std::fs::write(out, &captured.encoded)
        .with_context(|| format!("failed to write {}", out.display()))?;
    Ok(captured.rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};

    #[test]
    fn test_parse_bbox() {
        let b = parse_bbox("100, 50.5,40,20").unwrap();
        assert_eq!(b.x_min, 100.0);
        assert_eq!(b.y_min, 50.5);
        assert_eq!(b.width, 40.0);
        assert_eq!(b.height, 20.0);
        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("960x720").unwrap(), OverlaySize::new(960, 720));
        assert!(parse_size("960").is_err());
        assert!(parse_size("0x720").is_err());
    }

    #[test]
    fn test_crop_file_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.png");
        RgbImage::new(480, 360).save(&frame).unwrap();
        let out = dir.path().join("eye.png");

        let bbox = PixelBox {
            x_min: 100.0,
            y_min: 100.0,
            width: 50.0,
            height: 20.0,
        };
        let rect = crop_file(&frame, &bbox, None, 10.0, &out).unwrap();
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (90, 90, 70, 40));

        let written = image::open(&out).unwrap();
        assert_eq!(written.dimensions(), (70, 40));
    }

    #[test]
    fn test_crop_file_outside_frame_fails() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.png");
        RgbImage::new(100, 100).save(&frame).unwrap();
        let bbox = PixelBox {
            x_min: 500.0,
            y_min: 500.0,
            width: 10.0,
            height: 10.0,
        };
        assert!(crop_file(&frame, &bbox, None, 10.0, &dir.path().join("eye.png")).is_err());
        assert!(!dir.path().join("eye.png").exists());
    }
}
