//! Frame-count debounced blink detection over eye aspect ratio samples.
//!
//! There is no smoothing of the EAR signal itself. An eye counts as closed once
//! the ratio has stayed below the threshold for `min_closed_frames` consecutive
//! frames, and counts as open again on the very first frame at or above it.

use serde::{Deserialize, Serialize};

/// Default EAR below which a frame counts as "closed".
pub const DEFAULT_EAR_THRESHOLD: f64 = 0.25;

/// Default number of consecutive closed frames before a blink is reported.
pub const DEFAULT_MIN_CLOSED_FRAMES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    pub ear_threshold: f64,
    pub min_closed_frames: u32,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            min_closed_frames: DEFAULT_MIN_CLOSED_FRAMES,
        }
    }
}

/// Edge emitted when the debounced eye state flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkEvent {
    BecameClosed,
    BecameOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlinkState {
    pub is_blinking: bool,
    pub consecutive_closed_frames: u32,
}

impl BlinkState {
    /// Advance by one EAR sample.
    pub fn step(self, ear: f64, config: &BlinkConfig) -> (BlinkState, Option<BlinkEvent>) {
        let min_closed = config.min_closed_frames.max(1);

        if ear < config.ear_threshold {
            let consecutive_closed_frames = self.consecutive_closed_frames.saturating_add(1);
            if consecutive_closed_frames >= min_closed {
                let event = (!self.is_blinking).then_some(BlinkEvent::BecameClosed);
                return (
                    BlinkState {
                        is_blinking: true,
                        consecutive_closed_frames,
                    },
                    event,
                );
            }
            return (
                BlinkState {
                    is_blinking: self.is_blinking,
                    consecutive_closed_frames,
                },
                None,
            );
        }

        let event = self.is_blinking.then_some(BlinkEvent::BecameOpen);
        (BlinkState::default(), event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(config: &BlinkConfig, samples: &[f64]) -> (BlinkState, Vec<Option<BlinkEvent>>) {
        let mut state = BlinkState::default();
        let mut events = Vec::new();
        for &ear in samples {
            let (next, ev) = state.step(ear, config);
            state = next;
            events.push(ev);
        }
        (state, events)
    }

    #[test]
    fn test_single_closed_frame_blinks_with_k1() {
        let cfg = BlinkConfig::default();
        let (state, events) = run(&cfg, &[0.1]);
        assert!(state.is_blinking);
        assert_eq!(events, vec![Some(BlinkEvent::BecameClosed)]);
    }

    #[test]
    fn test_first_open_frame_clears_blink() {
        let cfg = BlinkConfig::default();
        let (state, events) = run(&cfg, &[0.1, 0.1, 0.3, 0.3]);
        assert!(!state.is_blinking);
        assert_eq!(state.consecutive_closed_frames, 0);
        assert_eq!(
            events,
            vec![Some(BlinkEvent::BecameClosed), None, Some(BlinkEvent::BecameOpen), None]
        );
    }

    #[test]
    fn test_k3_requires_three_consecutive_frames() {
        let cfg = BlinkConfig {
            min_closed_frames: 3,
            ..BlinkConfig::default()
        };
        let (state, events) = run(&cfg, &[0.1, 0.1]);
        assert!(!state.is_blinking);
        assert_eq!(state.consecutive_closed_frames, 2);
        assert_eq!(events, vec![None, None]);

        let (state, events) = run(&cfg, &[0.1, 0.1, 0.1]);
        assert!(state.is_blinking);
        assert_eq!(events[2], Some(BlinkEvent::BecameClosed));
    }

    #[test]
    fn test_k3_interrupted_run_resets_counter() {
        let cfg = BlinkConfig {
            min_closed_frames: 3,
            ..BlinkConfig::default()
        };
        let (state, events) = run(&cfg, &[0.1, 0.1, 0.4, 0.1, 0.1]);
        assert!(!state.is_blinking);
        assert_eq!(state.consecutive_closed_frames, 2);
        assert!(events.iter().all(Option::is_none));
    }

    #[test]
    fn test_k3_opens_on_first_open_frame() {
        let cfg = BlinkConfig {
            min_closed_frames: 3,
            ..BlinkConfig::default()
        };
        let (state, events) = run(&cfg, &[0.1, 0.1, 0.1, 0.1, 0.26]);
        assert!(!state.is_blinking);
        assert_eq!(events[4], Some(BlinkEvent::BecameOpen));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let cfg = BlinkConfig::default();
        let (state, events) = run(&cfg, &[DEFAULT_EAR_THRESHOLD]);
        assert!(!state.is_blinking);
        assert_eq!(events, vec![None]);
    }

    #[test]
    fn test_zero_min_frames_behaves_like_one() {
        let cfg = BlinkConfig {
            min_closed_frames: 0,
            ..BlinkConfig::default()
        };
        let (state, _) = run(&cfg, &[0.3]);
        assert!(!state.is_blinking);
        let (state, _) = run(&cfg, &[0.1]);
        assert!(state.is_blinking);
    }
}
