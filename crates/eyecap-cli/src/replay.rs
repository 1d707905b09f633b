//! `eyecap replay`: feed a recorded landmark trace through a capture session.
//!
//! A trace is JSON lines, one frame per line. Each line is either `null` (no
//! face detected) or an array of `[x, y]` normalized landmark pairs. Blank
//! lines and lines starting with `#` are ignored.

use std::io::BufRead;

use anyhow::{Context, Result};
use eyecap_core::{CaptureSession, LandmarkSet, Notification, NotificationSink};

/// Prints each message and every capture-button change as it happens.
pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn notify(&mut self, n: &Notification) {
        println!("  [{}] {}", n.severity, n.message);
    }

    fn capture_enabled(&mut self, enabled: bool) {
        println!("  capture {}", if enabled { "enabled" } else { "disabled" });
    }
}

/// Totals for one replayed trace.
#[derive(Debug, Default, PartialEq)]
pub struct ReplaySummary {
    pub frames: u64,
    pub no_face: u64,
    pub skipped: u64,
    pub notifications: u64,
    /// Frames that ended with capture enabled.
    pub enabled_frames: u64,
}

/// Parse one trace line. `Ok(None)` for lines that carry no frame.
fn parse_line(line: &str) -> Result<Option<Option<LandmarkSet>>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let points: Option<Vec<(f64, f64)>> = serde_json::from_str(line)?;
    Ok(Some(points.map(LandmarkSet::from)))
}

pub fn replay<R: BufRead, S: NotificationSink>(
    session: &mut CaptureSession,
    reader: R,
    sink: &mut S,
    verbose: bool,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.context("failed to read trace")?;
        let Some(landmarks) =
            parse_line(&line).with_context(|| format!("bad frame on line {}", idx + 1))?
        else {
            continue;
        };

        let outcome = session.process_frame(landmarks.as_ref());
        summary.frames += 1;
        match &outcome {
            eyecap_core::FrameOutcome::NoFace => summary.no_face += 1,
            eyecap_core::FrameOutcome::Skipped(e) => {
                summary.skipped += 1;
                tracing::debug!(line = idx + 1, error = %e, "frame skipped");
            }
            eyecap_core::FrameOutcome::Analysed { metrics, .. } => {
                if verbose {
                    println!(
                        "frame {}: ear={:.3} box=({:.1}, {:.1}, {:.1}x{:.1})",
                        summary.frames,
                        metrics.ear,
                        metrics.bounding_box.x_min,
                        metrics.bounding_box.y_min,
                        metrics.bounding_box.width,
                        metrics.bounding_box.height,
                    );
                }
            }
        }
        if outcome.notification().is_some() {
            summary.notifications += 1;
        }
        outcome.deliver_to(sink);
        if session.is_enabled() {
            summary.enabled_frames += 1;
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyecap_core::landmarks::FACE_MESH_POINTS;
    use eyecap_core::{EyeSelection, SessionConfig, Severity};

    #[derive(Default)]
    struct RecordingSink {
        messages: Vec<(Severity, String)>,
        enabled: Vec<bool>,
    }

    impl NotificationSink for RecordingSink {
        fn notify(&mut self, n: &Notification) {
            self.messages.push((n.severity, n.message.clone()));
        }

        fn capture_enabled(&mut self, enabled: bool) {
            self.enabled.push(enabled);
        }
    }

    /// One trace line for a centred left eye with the given lid gap.
    fn frame_line(lid_gap: f64) -> String {
        let mut pts = vec![(0.5, 0.5); FACE_MESH_POINTS];
        let lm = EyeSelection::Left.landmarks();
        pts[lm.outer_corner] = (0.45, 0.5);
        pts[lm.inner_corner] = (0.55, 0.5);
        pts[lm.top] = (0.5, 0.5 - lid_gap / 2.0);
        pts[lm.bottom] = (0.5, 0.5 + lid_gap / 2.0);
        serde_json::to_string(&pts).unwrap()
    }

    #[test]
    fn test_parse_line_variants() {
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("# recorded 2026-03-09").unwrap().is_none());
        assert!(matches!(parse_line("null").unwrap(), Some(None)));
        let frame = parse_line("[[0.1, 0.2], [0.3, 0.4]]").unwrap().unwrap().unwrap();
        assert_eq!(frame.len(), 2);
        assert!(parse_line("{\"x\": 1}").is_err());
    }

    #[test]
    fn test_open_then_blink_then_open() {
        // Lid gap 0.05 over a 0.1-wide eye: EAR 0.5 (open). Gap 0.01: EAR 0.1.
        let trace = [
            frame_line(0.05),
            frame_line(0.01),
            "null".to_string(),
            frame_line(0.05),
        ]
        .join("\n");

        let mut session = CaptureSession::new(SessionConfig::default());
        let mut sink = RecordingSink::default();
        let summary = replay(&mut session, trace.as_bytes(), &mut sink, false).unwrap();

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.no_face, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(sink.enabled, vec![true, false, true]);
        assert_eq!(
            sink.messages,
            vec![
                (Severity::Info, "Eye is properly aligned. You can capture now.".to_string()),
                (Severity::Warning, "Please keep your eye open to capture.".to_string()),
                (Severity::Success, "Eye is open. You can capture now.".to_string()),
            ]
        );
        assert!(session.is_enabled());
        assert_eq!(summary.enabled_frames, 2);
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let trace = format!("{}\nnot json\n", frame_line(0.05));
        let mut session = CaptureSession::new(SessionConfig::default());
        let err = replay(&mut session, trace.as_bytes(), &mut StdoutSink, false).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
