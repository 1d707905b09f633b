use std::sync::Arc;

use eyecap_core::landmarks::DETECTOR_SETTINGS;
use eyecap_core::{
    EyeSelection, FrameOutcome, LandmarkSet, Notification, OverlaySize, ShareRequest, Sharer,
    UploadRequest, Uploader,
};
use zbus::interface;
use zbus::object_server::SignalEmitter;

use crate::config::Config;
use crate::engine::{EngineError, EngineHandle};
use crate::share::OutboxSharer;
use crate::store::CaptureStore;
use crate::upload::LocalUploader;

/// Shared state accessible by D-Bus method handlers.
///
/// Everything mutable lives behind the engine thread, so handlers only need
/// shared references.
pub struct AppState {
    pub config: Config,
    pub engine: EngineHandle,
    pub store: CaptureStore,
    pub uploader: LocalUploader,
    pub sharer: OutboxSharer,
}

/// D-Bus interface for the eyecap capture daemon.
///
/// Bus name: org.eyecap.Eyecap1
/// Object path: /org/eyecap/Eyecap1
///
/// The `Notification` and `CaptureEnabledChanged` signals are the UI's
/// notification sink.
pub struct EyecapService {
    pub state: Arc<AppState>,
}

fn failed(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

/// Retrieve the UID of the D-Bus peer identified by `sender_str` (a unique bus name).
async fn get_caller_uid(sender_str: &str, conn: &zbus::Connection) -> zbus::fdo::Result<u32> {
    let dbus_proxy = zbus::fdo::DBusProxy::new(conn).await.map_err(failed)?;
    let bus_name = zbus::names::BusName::try_from(sender_str).map_err(failed)?;
    dbus_proxy
        .get_connection_unix_user(bus_name)
        .await
        .map_err(failed)
}

/// Look up the numeric UID for a local username by parsing `/etc/passwd`.
fn uid_for_name(name: &str) -> Option<u32> {
    let contents = std::fs::read_to_string("/etc/passwd").ok()?;
    for line in contents.lines() {
        let mut parts = line.split(':');
        let uname = parts.next()?;
        if uname != name {
            continue;
        }
        parts.next(); // password field
        let uid_str = parts.next()?;
        return uid_str.parse().ok();
    }
    None
}

impl EyecapService {
    /// On the system bus, only root or the named user may touch that user's
    /// images. The session bus is single-user and skips the check.
    async fn authorize(
        &self,
        user: &str,
        header: &zbus::message::Header<'_>,
        conn: &zbus::Connection,
    ) -> zbus::fdo::Result<()> {
        if self.state.config.session_bus {
            return Ok(());
        }
        let sender = header
            .sender()
            .ok_or_else(|| zbus::fdo::Error::Failed("no sender in message".to_string()))?;
        let caller_uid = get_caller_uid(sender.as_str(), conn).await?;
        if caller_uid == 0 {
            return Ok(());
        }
        match uid_for_name(user) {
            Some(expected_uid) if caller_uid == expected_uid => Ok(()),
            Some(_) => {
                tracing::warn!(user, caller_uid, "caller UID does not match target user UID");
                Err(zbus::fdo::Error::AccessDenied(format!(
                    "caller is not permitted to act for user '{user}'"
                )))
            }
            None => {
                tracing::warn!(user, "unknown user");
                Err(zbus::fdo::Error::Failed(format!("unknown user '{user}'")))
            }
        }
    }
}

/// Push a notification to listeners. Delivery failures are logged only.
async fn notify(emitter: &SignalEmitter<'_>, n: &Notification) {
    if let Err(e) =
        EyecapService::notification(emitter, &n.message, &n.severity.to_string()).await
    {
        tracing::warn!(error = %e, "failed to emit notification signal");
    }
}

async fn notify_enabled(emitter: &SignalEmitter<'_>, enabled: bool) {
    if let Err(e) = EyecapService::capture_enabled_changed(emitter, enabled).await {
        tracing::warn!(error = %e, "failed to emit capture-enabled signal");
    }
}

async fn publish_frame(emitter: &SignalEmitter<'_>, outcome: &FrameOutcome) {
    if let Some(available) = outcome.available_change() {
        notify_enabled(emitter, available).await;
    }
    if let Some(n) = outcome.notification() {
        notify(emitter, n).await;
    }
}

#[interface(name = "org.eyecap.Eyecap1")]
impl EyecapService {
    /// Analyse one frame of face-mesh landmarks (normalized `(x, y)` pairs).
    ///
    /// An empty array means no face was detected. Returns whether capture is
    /// available after the frame.
    async fn process_frame(
        &self,
        landmarks: Vec<(f64, f64)>,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<bool> {
        let landmarks = (!landmarks.is_empty()).then(|| LandmarkSet::from(landmarks));
        let report = self
            .state
            .engine
            .process_frame(landmarks)
            .await
            .map_err(failed)?;
        publish_frame(&emitter, &report.outcome).await;
        Ok(report.snapshot.capture_available)
    }

    /// Switch between `left` and `right`. Resets blink and alignment state.
    async fn select_eye(
        &self,
        eye: &str,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        let eye = eye
            .parse::<EyeSelection>()
            .map_err(|e| zbus::fdo::Error::InvalidArgs(e.to_string()))?;
        let report = self.state.engine.select_eye(eye).await.map_err(failed)?;
        if let Some(available) = report.available_change {
            notify_enabled(&emitter, available).await;
        }
        Ok(())
    }

    /// The camera (re)started at `width` x `height`. Resets the session.
    async fn reinitialize(
        &self,
        width: u32,
        height: u32,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        if width == 0 || height == 0 {
            return Err(zbus::fdo::Error::InvalidArgs(format!(
                "invalid overlay size {width}x{height}"
            )));
        }
        let report = self
            .state
            .engine
            .reinitialize(OverlaySize::new(width, height))
            .await
            .map_err(failed)?;
        if let Some(available) = report.available_change {
            notify_enabled(&emitter, available).await;
        }
        Ok(())
    }

    /// Crop the eye from an encoded full frame, save it, and return the
    /// upload receipt as JSON.
    async fn capture(
        &self,
        user: &str,
        frame: Vec<u8>,
        #[zbus(header)] header: zbus::message::Header<'_>,
        #[zbus(connection)] conn: &zbus::Connection,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(user, bytes = frame.len(), "capture requested");
        self.authorize(user, &header, conn).await?;

        let frame = image::load_from_memory(&frame).map_err(|e| {
            tracing::warn!(error = %e, "capture: undecodable frame");
            zbus::fdo::Error::InvalidArgs("Invalid image data.".to_string())
        })?;

        let engine = &self.state.engine;
        let taken = match engine.capture(frame).await {
            Ok(t) => t,
            Err(EngineError::Capture(e)) => {
                notify(&emitter, &e.notification()).await;
                return Err(failed(e));
            }
            Err(e) => return Err(failed(e)),
        };
        if let Some(available) = taken.available_change {
            notify_enabled(&emitter, available).await;
        }
        for n in &taken.notifications {
            notify(&emitter, n).await;
        }

        let result = self
            .state
            .uploader
            .upload(UploadRequest {
                user: user.to_string(),
                eye: taken.eye,
                image: taken.image,
            })
            .await;
        let response = match &result {
            Ok(receipt) => serde_json::to_string(receipt).map_err(failed),
            Err(e) => Err(failed(e)),
        };

        let done = engine.finish_capture(result).await.map_err(failed)?;
        if let Some(available) = done.available_change {
            notify_enabled(&emitter, available).await;
        }
        notify(&emitter, &done.notification).await;

        response
    }

    /// Queue a stored image for e-mail delivery. Returns the receipt as JSON.
    async fn share(
        &self,
        user: &str,
        filename: &str,
        recipient: &str,
        #[zbus(header)] header: zbus::message::Header<'_>,
        #[zbus(connection)] conn: &zbus::Connection,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(user, filename, "share requested");
        self.authorize(user, &header, conn).await?;

        let receipt = match self
            .state
            .sharer
            .share(ShareRequest {
                user: user.to_string(),
                filename: filename.to_string(),
                recipient: recipient.to_string(),
            })
            .await
        {
            Ok(r) => r,
            Err(e) => {
                notify(&emitter, &e.notification()).await;
                return Err(failed(e));
            }
        };

        let note = if receipt.success {
            Notification::success(receipt.message.clone())
        } else {
            Notification::danger(receipt.message.clone())
        };
        notify(&emitter, &note).await;
        serde_json::to_string(&receipt).map_err(failed)
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let snapshot = self.state.engine.snapshot().await.map_err(failed)?;
        let images = self.state.store.count_all().await.unwrap_or(0);

        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "session": snapshot,
            "images_stored": images,
            "save_dir": self.state.config.save_dir,
            "ear_threshold": self.state.config.session.blink.ear_threshold,
            "min_closed_frames": self.state.config.session.blink.min_closed_frames,
            "detector": DETECTOR_SETTINGS,
        })
        .to_string())
    }

    /// List a user's captured images as JSON, newest first.
    async fn list_images(
        &self,
        user: &str,
        #[zbus(header)] header: zbus::message::Header<'_>,
        #[zbus(connection)] conn: &zbus::Connection,
    ) -> zbus::fdo::Result<String> {
        tracing::info!(user, "list_images requested");
        self.authorize(user, &header, conn).await?;
        let images = self.state.store.list_by_user(user).await.map_err(failed)?;
        serde_json::to_string(&images).map_err(failed)
    }

    /// Per-eye and per-day capture counts for a user, as JSON.
    async fn analytics(
        &self,
        user: &str,
        #[zbus(header)] header: zbus::message::Header<'_>,
        #[zbus(connection)] conn: &zbus::Connection,
    ) -> zbus::fdo::Result<String> {
        self.authorize(user, &header, conn).await?;
        let analytics = self.state.store.analytics(user).await.map_err(failed)?;
        serde_json::to_string(&analytics).map_err(failed)
    }

    #[zbus(signal)]
    async fn notification(
        emitter: &SignalEmitter<'_>,
        message: &str,
        severity: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn capture_enabled_changed(emitter: &SignalEmitter<'_>, enabled: bool)
        -> zbus::Result<()>;
}
