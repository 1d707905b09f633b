//! Collaborator interfaces around the capture core.
//!
//! The core never performs IO itself. Uploading, sharing and showing messages
//! are delegated through these traits; the daemon provides the concrete
//! implementations.

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::crop::CapturedImage;
use crate::gate::Notification;
use crate::landmarks::EyeSelection;

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("share failed: {0}")]
    Share(String),
}

impl UpstreamError {
    /// Failures are surfaced to the user and never retried.
    pub fn notification(&self) -> Notification {
        Notification::danger(format!("Error: {self}"))
    }
}

pub struct UploadRequest {
    pub user: String,
    pub eye: EyeSelection,
    pub image: CapturedImage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub success: bool,
    pub message: String,
    pub filename: String,
    /// Derived downstream of the core; absent when not computed.
    pub iris_radius: Option<f64>,
    pub pupil_diameter: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub user: String,
    pub filename: String,
    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareReceipt {
    pub success: bool,
    pub message: String,
}

pub trait Uploader {
    fn upload(
        &self,
        request: UploadRequest,
    ) -> impl Future<Output = Result<UploadReceipt, UpstreamError>> + Send;
}

pub trait Sharer {
    fn share(
        &self,
        request: ShareRequest,
    ) -> impl Future<Output = Result<ShareReceipt, UpstreamError>> + Send;
}

/// Receiver for user-facing messages and the capture button state.
pub trait NotificationSink {
    fn notify(&mut self, notification: &Notification);
    fn capture_enabled(&mut self, enabled: bool);
}
