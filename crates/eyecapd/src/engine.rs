use eyecap_core::{
    CaptureError, CaptureFinished, CaptureSession, CaptureTaken, EyeSelection, FrameOutcome,
    LandmarkSet, OverlaySize, SessionConfig, SessionSnapshot, UploadReceipt, UpstreamError,
};
use image::DynamicImage;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Result of analysing one frame, with the session state it left behind.
pub struct FrameReport {
    pub outcome: FrameOutcome,
    pub snapshot: SessionSnapshot,
}

/// Session state after an eye change or camera restart.
pub struct ResetReport {
    /// New capture availability, if the reset changed it.
    pub available_change: Option<bool>,
    pub snapshot: SessionSnapshot,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Frame {
        landmarks: Option<LandmarkSet>,
        reply: oneshot::Sender<FrameReport>,
    },
    SelectEye {
        eye: EyeSelection,
        reply: oneshot::Sender<ResetReport>,
    },
    Reinitialize {
        overlay: OverlaySize,
        reply: oneshot::Sender<ResetReport>,
    },
    Capture {
        frame: DynamicImage,
        reply: oneshot::Sender<Result<CaptureTaken, CaptureError>>,
    },
    FinishCapture {
        result: Result<UploadReceipt, UpstreamError>,
        reply: oneshot::Sender<CaptureFinished>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Clone-safe handle to the engine thread.
///
/// The thread owns the only [`CaptureSession`], and requests are handled one
/// at a time in arrival order, so a capture always sees the state left by the
/// last fully processed frame.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Analyse one frame. `None` means the detector saw no face.
    pub async fn process_frame(
        &self,
        landmarks: Option<LandmarkSet>,
    ) -> Result<FrameReport, EngineError> {
        self.request(|reply| EngineRequest::Frame { landmarks, reply })
            .await
    }

    pub async fn select_eye(&self, eye: EyeSelection) -> Result<ResetReport, EngineError> {
        self.request(|reply| EngineRequest::SelectEye { eye, reply })
            .await
    }

    pub async fn reinitialize(&self, overlay: OverlaySize) -> Result<ResetReport, EngineError> {
        self.request(|reply| EngineRequest::Reinitialize { overlay, reply })
            .await
    }

    /// Crop the eye region from a full-resolution frame.
    pub async fn capture(&self, frame: DynamicImage) -> Result<CaptureTaken, EngineError> {
        Ok(self
            .request(|reply| EngineRequest::Capture { frame, reply })
            .await??)
    }

    /// Report the upload outcome for the pending capture.
    pub async fn finish_capture(
        &self,
        result: Result<UploadReceipt, UpstreamError>,
    ) -> Result<CaptureFinished, EngineError> {
        self.request(|reply| EngineRequest::FinishCapture { result, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, EngineError> {
        self.request(|reply| EngineRequest::Snapshot { reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread.
pub fn spawn_engine(config: SessionConfig) -> Result<EngineHandle, EngineError> {
    tracing::info!(
        ear_threshold = config.blink.ear_threshold,
        min_closed_frames = config.blink.min_closed_frames,
        crop_margin = config.crop_margin,
        width = config.overlay.width,
        height = config.overlay.height,
        eye = %config.default_eye,
        "starting capture session"
    );
    let mut session = CaptureSession::new(config);

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("eyecap-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                handle(&mut session, req);
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn handle(session: &mut CaptureSession, req: EngineRequest) {
    // A dropped reply receiver means the caller went away; nothing to do.
    match req {
        EngineRequest::Frame { landmarks, reply } => {
            let outcome = session.process_frame(landmarks.as_ref());
            let _ = reply.send(FrameReport {
                outcome,
                snapshot: session.snapshot(),
            });
        }
        EngineRequest::SelectEye { eye, reply } => {
            session.select_eye(eye);
            let _ = reply.send(ResetReport {
                available_change: session.take_available_change(),
                snapshot: session.snapshot(),
            });
        }
        EngineRequest::Reinitialize { overlay, reply } => {
            session.reinitialize(overlay);
            let _ = reply.send(ResetReport {
                available_change: session.take_available_change(),
                snapshot: session.snapshot(),
            });
        }
        EngineRequest::Capture { frame, reply } => {
            let _ = reply.send(session.begin_capture(&frame));
        }
        EngineRequest::FinishCapture { result, reply } => {
            let _ = reply.send(session.finish_capture(&result));
        }
        EngineRequest::Snapshot { reply } => {
            let _ = reply.send(session.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyecap_core::landmarks::FACE_MESH_POINTS;
    use eyecap_core::{NormalizedPoint, Severity};
    use image::RgbImage;

    fn open_aligned_left() -> LandmarkSet {
        let mut pts = vec![NormalizedPoint::new(0.5, 0.5); FACE_MESH_POINTS];
        let lm = EyeSelection::Left.landmarks();
        pts[lm.outer_corner] = NormalizedPoint::new(0.45, 0.5);
        pts[lm.inner_corner] = NormalizedPoint::new(0.55, 0.5);
        pts[lm.top] = NormalizedPoint::new(0.5, 0.475);
        pts[lm.bottom] = NormalizedPoint::new(0.5, 0.525);
        LandmarkSet::new(pts)
    }

    #[tokio::test]
    async fn test_frame_then_capture_uses_post_frame_state() {
        let engine = spawn_engine(SessionConfig::default()).unwrap();

        let report = engine
            .process_frame(Some(open_aligned_left()))
            .await
            .unwrap();
        assert!(report.snapshot.enabled);
        assert!(report.snapshot.bounding_box.is_some());

        let frame = DynamicImage::ImageRgb8(RgbImage::new(480, 360));
        let taken = engine.capture(frame).await.unwrap();
        assert!(taken.image.rect.width > 0);
        assert_eq!(taken.available_change, Some(false));
        let snapshot = engine.snapshot().await.unwrap();
        assert!(snapshot.capture_pending);
        assert!(!snapshot.capture_available);

        let done = engine
            .finish_capture(Err(UpstreamError::Upload("disk full".into())))
            .await
            .unwrap();
        assert_eq!(done.notification.severity, Severity::Danger);
        assert_eq!(done.available_change, Some(true));
        assert!(!engine.snapshot().await.unwrap().capture_pending);
    }

    #[tokio::test]
    async fn test_capture_before_alignment_is_refused() {
        let engine = spawn_engine(SessionConfig::default()).unwrap();
        engine.process_frame(None).await.unwrap();
        let frame = DynamicImage::ImageRgb8(RgbImage::new(480, 360));
        let err = engine.capture(frame).await.unwrap_err();
        assert!(matches!(err, EngineError::Capture(CaptureError::NotReady)));
    }

    #[tokio::test]
    async fn test_select_eye_resets() {
        let engine = spawn_engine(SessionConfig::default()).unwrap();
        engine
            .process_frame(Some(open_aligned_left()))
            .await
            .unwrap();
        let report = engine.select_eye(EyeSelection::Right).await.unwrap();
        assert_eq!(report.available_change, Some(false));
        assert_eq!(report.snapshot.eye, EyeSelection::Right);
        assert!(!report.snapshot.enabled);
    }
}
