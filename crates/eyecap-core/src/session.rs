//! The per-camera capture session.
//!
//! A session owns every piece of state that survives between frames: the blink
//! debouncer, the alignment flag, the last good eye box and the capture flag.
//! It is reset when the user switches eyes or the camera is reinitialized.
//! Frames must be fed one at a time; callers that receive frames concurrently
//! are expected to serialize them before they reach the session.

use image::DynamicImage;
use serde::Serialize;
use thiserror::Error;

use crate::alignment::AlignmentState;
use crate::blink::BlinkState;
use crate::config::SessionConfig;
use crate::crop::{CapturedImage, CropError, FrameCropper};
use crate::gate::{self, GateDecision, Notification};
use crate::geometry::{OverlaySize, PixelBox};
use crate::landmarks::{EyeSelection, LandmarkSet};
use crate::metrics::{self, EyeMetrics, MetricsError};
use crate::ports::{NotificationSink, UploadReceipt, UpstreamError};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture is not enabled")]
    NotReady,
    #[error("a capture is already in progress")]
    AlreadyPending,
    #[error(transparent)]
    Crop(#[from] CropError),
}

impl CaptureError {
    pub fn notification(&self) -> Notification {
        match self {
            CaptureError::NotReady => {
                Notification::warning("Please align your eye within the box.")
            }
            CaptureError::AlreadyPending => {
                Notification::warning("A capture is already in progress.")
            }
            CaptureError::Crop(CropError::InvalidCaptureArea(_)) => {
                Notification::danger("Invalid capture area. Please adjust your position.")
            }
            CaptureError::Crop(e) => Notification::danger(format!("Error: {e}")),
        }
    }
}

/// What one frame did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// No face in this frame. Previous state is held.
    NoFace,
    /// Landmarks were present but unusable. Previous state is held.
    Skipped(MetricsError),
    Analysed {
        metrics: EyeMetrics,
        decision: GateDecision,
        /// New capture availability, if it changed this frame.
        available_change: Option<bool>,
    },
}

impl FrameOutcome {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            FrameOutcome::Analysed { decision, .. } => decision.notification.as_ref(),
            _ => None,
        }
    }

    /// New capture availability, if it changed this frame. Accounts for a
    /// pending capture, so it can differ from the gate's enabled flag.
    pub fn available_change(&self) -> Option<bool> {
        match self {
            FrameOutcome::Analysed {
                available_change, ..
            } => *available_change,
            _ => None,
        }
    }

    pub fn deliver_to<S: NotificationSink + ?Sized>(&self, sink: &mut S) {
        if let Some(available) = self.available_change() {
            sink.capture_enabled(available);
        }
        if let Some(n) = self.notification() {
            sink.notify(n);
        }
    }
}

/// A successful crop awaiting upload.
#[derive(Debug, Clone)]
pub struct CaptureTaken {
    /// Eye selected when the crop was taken.
    pub eye: EyeSelection,
    pub image: CapturedImage,
    /// "Capturing" then "captured", in display order.
    pub notifications: Vec<Notification>,
    /// Always `Some(false)`: capture is unavailable until the upload finishes.
    pub available_change: Option<bool>,
}

impl CaptureTaken {
    pub fn deliver_to<S: NotificationSink + ?Sized>(&self, sink: &mut S) {
        if let Some(available) = self.available_change {
            sink.capture_enabled(available);
        }
        for n in &self.notifications {
            sink.notify(n);
        }
    }
}

/// The upload outcome of a pending capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFinished {
    pub notification: Notification,
    pub available_change: Option<bool>,
}

impl CaptureFinished {
    pub fn deliver_to<S: NotificationSink + ?Sized>(&self, sink: &mut S) {
        if let Some(available) = self.available_change {
            sink.capture_enabled(available);
        }
        sink.notify(&self.notification);
    }
}

/// Post-frame view of the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub eye: EyeSelection,
    pub overlay: OverlaySize,
    pub is_blinking: bool,
    pub is_aligned: bool,
    pub enabled: bool,
    pub capture_pending: bool,
    /// `enabled` and nothing pending.
    pub capture_available: bool,
    pub bounding_box: Option<PixelBox>,
    pub frames_processed: u64,
}

pub struct CaptureSession {
    config: SessionConfig,
    cropper: FrameCropper,
    eye: EyeSelection,
    overlay: OverlaySize,
    blink: BlinkState,
    alignment: AlignmentState,
    last_box: Option<PixelBox>,
    enabled: bool,
    capture_pending: bool,
    /// Availability last reported to the notification sink.
    published_available: bool,
    frames_processed: u64,
}

impl CaptureSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            cropper: FrameCropper::new(config.crop_margin),
            eye: config.default_eye,
            overlay: config.overlay,
            blink: BlinkState::default(),
            alignment: AlignmentState::default(),
            last_box: None,
            enabled: false,
            capture_pending: false,
            published_available: false,
            frames_processed: 0,
            config,
        }
    }

    pub fn eye(&self) -> EyeSelection {
        self.eye
    }

    pub fn overlay(&self) -> OverlaySize {
        self.overlay
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Capture may be triggered: enabled and no capture awaiting upload.
    pub fn capture_available(&self) -> bool {
        self.enabled && !self.capture_pending
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            eye: self.eye,
            overlay: self.overlay,
            is_blinking: self.blink.is_blinking,
            is_aligned: self.alignment.is_aligned,
            enabled: self.enabled,
            capture_pending: self.capture_pending,
            capture_available: self.capture_available(),
            bounding_box: self.last_box,
            frames_processed: self.frames_processed,
        }
    }

    /// Capture availability, if it differs from what was last reported.
    ///
    /// Frames and the capture lifecycle call this themselves; after
    /// [`select_eye`](Self::select_eye) or [`reinitialize`](Self::reinitialize)
    /// the caller does.
    pub fn take_available_change(&mut self) -> Option<bool> {
        let now = self.capture_available();
        if now == self.published_available {
            return None;
        }
        self.published_available = now;
        Some(now)
    }

    /// Switch eyes. Resets the session only when the selection changes.
    pub fn select_eye(&mut self, eye: EyeSelection) -> bool {
        if eye == self.eye {
            return false;
        }
        tracing::info!(from = %self.eye, to = %eye, "eye selection changed; resetting session");
        self.eye = eye;
        self.reset();
        true
    }

    /// The camera restarted, possibly at a new resolution.
    pub fn reinitialize(&mut self, overlay: OverlaySize) {
        tracing::info!(
            width = overlay.width,
            height = overlay.height,
            "camera reinitialized; resetting session"
        );
        self.overlay = overlay;
        self.reset();
    }

    fn reset(&mut self) {
        self.blink = BlinkState::default();
        self.alignment = AlignmentState::default();
        self.last_box = None;
        self.enabled = false;
    }

    /// Run one frame through metrics, blink, alignment and the gate.
    ///
    /// `None` means the detector found no face. Neither that nor unusable
    /// geometry touches the persisted state.
    pub fn process_frame(&mut self, landmarks: Option<&LandmarkSet>) -> FrameOutcome {
        self.frames_processed += 1;

        let Some(landmarks) = landmarks else {
            tracing::debug!(frame = self.frames_processed, "no face detected");
            return FrameOutcome::NoFace;
        };

        let metrics = match metrics::extract(landmarks, self.eye, self.overlay) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(frame = self.frames_processed, error = %e, "frame skipped");
                return FrameOutcome::Skipped(e);
            }
        };

        let (blink, blink_event) = self.blink.step(metrics.ear, &self.config.blink);
        let (alignment, alignment_event) =
            self.alignment.step(&metrics.bounding_box, self.overlay);

        let decision = gate::evaluate(
            self.enabled,
            alignment.is_aligned,
            blink.is_blinking,
            blink_event,
            alignment_event,
        );

        self.blink = blink;
        self.alignment = alignment;
        self.last_box = Some(metrics.bounding_box);
        self.enabled = decision.enabled;

        tracing::debug!(
            frame = self.frames_processed,
            ear = metrics.ear,
            blinking = blink.is_blinking,
            aligned = alignment.is_aligned,
            enabled = decision.enabled,
            "frame analysed"
        );
        if let Some(n) = &decision.notification {
            tracing::info!(severity = %n.severity, message = %n.message, "state transition");
        }

        FrameOutcome::Analysed {
            metrics,
            decision,
            available_change: self.take_available_change(),
        }
    }

    /// Crop the current eye region out of `frame`.
    ///
    /// On success the session holds a pending capture until
    /// [`finish_capture`](Self::finish_capture). A failed crop leaves capture
    /// available so the user can try again.
    pub fn begin_capture(&mut self, frame: &DynamicImage) -> Result<CaptureTaken, CaptureError> {
        if self.capture_pending {
            return Err(CaptureError::AlreadyPending);
        }
        if !self.enabled {
            return Err(CaptureError::NotReady);
        }
        let bbox = self.last_box.ok_or(CaptureError::NotReady)?;

        let image = self.cropper.crop(frame, &bbox, self.overlay).map_err(|e| {
            tracing::warn!(error = %e, "capture aborted");
            CaptureError::from(e)
        })?;

        self.capture_pending = true;
        tracing::info!(
            eye = %self.eye,
            width = image.rect.width,
            height = image.rect.height,
            "eye image captured"
        );
        Ok(CaptureTaken {
            eye: self.eye,
            image,
            notifications: vec![
                Notification::info("Capturing eye image..."),
                Notification::success("Eye image captured successfully."),
            ],
            available_change: self.take_available_change(),
        })
    }

    /// Close out a pending capture with the uploader's answer.
    pub fn finish_capture(
        &mut self,
        result: &Result<UploadReceipt, UpstreamError>,
    ) -> CaptureFinished {
        self.capture_pending = false;
        let notification = match result {
            Ok(receipt) if receipt.success => Notification::success(receipt.message.clone()),
            Ok(receipt) => Notification::danger(receipt.message.clone()),
            Err(e) => {
                tracing::error!(error = %e, "upload failed");
                e.notification()
            }
        };
        CaptureFinished {
            notification,
            available_change: self.take_available_change(),
        }
    }
}
