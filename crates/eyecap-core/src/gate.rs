//! Capture gating: combines blink and alignment into the capture-enabled flag
//! and picks the single notification a frame produces.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alignment::AlignmentEvent;
use crate::blink::BlinkEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        })
    }
}

/// A user-facing message for the notification sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Info)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Success)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Warning)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(message, Severity::Danger)
    }
}

/// Capture is allowed only for an aligned, open eye.
pub fn capture_enabled(is_aligned: bool, is_blinking: bool) -> bool {
    is_aligned && !is_blinking
}

/// Result of gating one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub enabled: bool,
    /// Set when `enabled` flipped this frame.
    pub enabled_changed: bool,
    pub notification: Option<Notification>,
}

/// Decide the frame's capture flag and notification.
///
/// At most one notification is produced. A blink edge outranks an alignment
/// edge arriving on the same frame.
pub fn evaluate(
    was_enabled: bool,
    is_aligned: bool,
    is_blinking: bool,
    blink: Option<BlinkEvent>,
    alignment: Option<AlignmentEvent>,
) -> GateDecision {
    let enabled = capture_enabled(is_aligned, is_blinking);

    let notification = match (blink, alignment) {
        (Some(BlinkEvent::BecameClosed), _) => {
            Some(Notification::warning("Please keep your eye open to capture."))
        }
        (Some(BlinkEvent::BecameOpen), _) if enabled => {
            Some(Notification::success("Eye is open. You can capture now."))
        }
        (Some(BlinkEvent::BecameOpen), _) => Some(Notification::info(
            "Eye is open. Please align your eye within the box.",
        )),
        (None, Some(AlignmentEvent::BecameAligned)) if enabled => Some(Notification::info(
            "Eye is properly aligned. You can capture now.",
        )),
        (None, Some(AlignmentEvent::BecameAligned)) => Some(Notification::info(
            "Eye is aligned. Keep your eye open to capture.",
        )),
        (None, Some(AlignmentEvent::BecameMisaligned)) => {
            Some(Notification::warning("Please align your eye within the box."))
        }
        (None, None) => None,
    };

    GateDecision {
        enabled,
        enabled_changed: enabled != was_enabled,
        notification,
    }
}
