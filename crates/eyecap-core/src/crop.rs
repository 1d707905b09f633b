//! Eye-region cropping of a captured frame.
//!
//! The crop is the eye bounding box grown by a fixed margin, clamped to the
//! frame, and encoded losslessly as PNG. No resampling or filtering is applied,
//! so the output holds the raw source pixels and identical inputs always
//! produce identical bytes.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat};
use thiserror::Error;

use crate::geometry::{OverlaySize, PixelBox};

/// Default margin added around the eye box on every side, in pixels.
pub const DEFAULT_CROP_MARGIN: f64 = 10.0;

#[derive(Error, Debug)]
pub enum CropError {
    #[error("invalid capture area: {0}")]
    InvalidCaptureArea(&'static str),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Integer pixel rectangle inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// An encoded eye crop, ready for upload.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Eye box the crop was derived from, in overlay pixels.
    pub source_bounding_box: PixelBox,
    pub rect: CropRect,
    /// PNG bytes.
    pub encoded: Vec<u8>,
}

/// Compute the clamped crop rectangle for `bbox` in a `frame_width` x
/// `frame_height` frame. `bbox` must already be in frame pixels.
pub fn crop_rect(
    bbox: &PixelBox,
    frame_width: u32,
    frame_height: u32,
    margin: f64,
) -> Result<CropRect, CropError> {
    let fw = f64::from(frame_width);
    let fh = f64::from(frame_height);

    // Written so that NaN extents are rejected as well.
    if !(bbox.width > 0.0 && bbox.height > 0.0) {
        return Err(CropError::InvalidCaptureArea("empty eye bounding box"));
    }
    if bbox.x_max() <= 0.0 || bbox.y_max() <= 0.0 || bbox.x_min >= fw || bbox.y_min >= fh {
        return Err(CropError::InvalidCaptureArea("eye bounding box outside frame"));
    }

    let x = (bbox.x_min - margin).max(0.0);
    let y = (bbox.y_min - margin).max(0.0);
    let crop_w = (bbox.width + 2.0 * margin).min(fw - x);
    let crop_h = (bbox.height + 2.0 * margin).min(fh - y);
    if crop_w <= 0.0 || crop_h <= 0.0 {
        return Err(CropError::InvalidCaptureArea("crop has no area"));
    }

    let x = x.floor() as u32;
    let y = y.floor() as u32;
    let width = (crop_w.floor() as u32).min(frame_width.saturating_sub(x));
    let height = (crop_h.floor() as u32).min(frame_height.saturating_sub(y));
    if width == 0 || height == 0 {
        return Err(CropError::InvalidCaptureArea("crop has no area"));
    }

    Ok(CropRect {
        x,
        y,
        width,
        height,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct FrameCropper {
    margin: f64,
}

impl Default for FrameCropper {
    fn default() -> Self {
        Self::new(DEFAULT_CROP_MARGIN)
    }
}

impl FrameCropper {
    pub fn new(margin: f64) -> Self {
        Self {
            margin: margin.max(0.0),
        }
    }

    /// Crop the eye region out of `frame`.
    ///
    /// `bbox` is in `overlay` pixels and is mapped onto the frame's own
    /// resolution first; for a frame captured at the overlay size the mapping
    /// is the identity.
    pub fn crop(
        &self,
        frame: &DynamicImage,
        bbox: &PixelBox,
        overlay: OverlaySize,
    ) -> Result<CapturedImage, CropError> {
        let (fw, fh) = frame.dimensions();
        let frame_box = bbox.rescale(overlay, fw, fh);
        let rect = crop_rect(&frame_box, fw, fh, self.margin)?;

        let cropped = frame.crop_imm(rect.x, rect.y, rect.width, rect.height);
        let mut buf = Cursor::new(Vec::new());
        cropped.write_to(&mut buf, ImageFormat::Png)?;

        tracing::debug!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            bytes = buf.get_ref().len(),
            "eye region cropped"
        );

        Ok(CapturedImage {
            source_bounding_box: *bbox,
            rect,
            encoded: buf.into_inner(),
        })
    }
}
