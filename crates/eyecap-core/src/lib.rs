//! Eye-state analysis and capture gating for eye-photograph capture.
//!
//! Each frame's face-mesh landmarks are reduced to an eye aspect ratio and an
//! eye bounding box, debounced into open/closed and aligned/misaligned state,
//! and combined into a single capture-enabled flag with at most one
//! user-facing notification per frame. On capture, the eye region is cropped
//! from the full frame and encoded as PNG.

pub mod alignment;
pub mod blink;
pub mod config;
pub mod crop;
pub mod gate;
pub mod geometry;
pub mod landmarks;
pub mod metrics;
pub mod ports;
pub mod session;

pub use config::SessionConfig;
pub use crop::{CapturedImage, CropError, FrameCropper};
pub use gate::{Notification, Severity};
pub use geometry::{NormalizedPoint, OverlaySize, PixelBox, PixelPoint};
pub use landmarks::{EyeSelection, LandmarkSet};
pub use ports::{
    NotificationSink, ShareReceipt, ShareRequest, Sharer, UploadReceipt, UploadRequest, Uploader,
    UpstreamError,
};
pub use session::{
    CaptureError, CaptureFinished, CaptureSession, CaptureTaken, FrameOutcome, SessionSnapshot,
};
