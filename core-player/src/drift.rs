//! # Drift Tracking
//!
//! External players only expose their current position, so seeks and
//! rate changes have to be inferred. The tracker keeps a *baseline*, the
//! wall-clock instant at which the current track would have started if it
//! had played at normal speed without interruption (`now - position`). Under
//! steady playback the baseline does not move. Each poll compares a fresh
//! baseline against the stored one:
//!
//! ```text
//!   delta = (now - position) - baseline
//!
//!   |delta| <= drift_threshold           steady        (FF/RW ends -> Playing)
//!   |delta| >  reposition_threshold      Reposition    (only after a steady poll)
//!   delta < 0                            FastForwarding
//!   delta > 0                            Rewinding
//! ```
//!
//! The baseline is replaced by the fresh value after every poll, so each
//! classification looks at the drift accumulated since the previous poll.

use chrono::{DateTime, Utc};
use core_runtime::config::TrackingConfig;

use crate::types::PlaybackState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Motion {
    Steady,
    FastForwarding,
    Rewinding,
}

/// Classifies successive position samples of one player.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    drift_threshold: f64,
    reposition_threshold: f64,
    baseline: Option<f64>,
    motion: Motion,
}

impl DriftTracker {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            drift_threshold: config.drift_threshold.as_secs_f64(),
            reposition_threshold: config.reposition_threshold.as_secs_f64(),
            baseline: None,
            motion: Motion::Steady,
        }
    }

    /// Starts a fresh observation at `position` seconds.
    pub fn rebaseline(&mut self, now: DateTime<Utc>, position: f64) {
        self.baseline = Some(start_instant(now, position));
        self.motion = Motion::Steady;
    }

    /// Forgets the baseline; the next sample only establishes a new one.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.motion = Motion::Steady;
    }

    /// Whether the last classification left the player fast-forwarding or
    /// rewinding.
    pub fn is_drifting(&self) -> bool {
        self.motion != Motion::Steady
    }

    /// Feeds one sample and returns the state change it reveals, if any.
    pub fn sample(&mut self, now: DateTime<Utc>, position: f64) -> Option<PlaybackState> {
        let actual = start_instant(now, position);
        let baseline = self.baseline.replace(actual)?;
        let delta = actual - baseline;

        if delta.abs() <= self.drift_threshold {
            return match std::mem::replace(&mut self.motion, Motion::Steady) {
                Motion::Steady => None,
                Motion::FastForwarding | Motion::Rewinding => Some(PlaybackState::Playing),
            };
        }

        if delta.abs() > self.reposition_threshold && self.motion == Motion::Steady {
            return Some(PlaybackState::Reposition);
        }

        let motion = if delta < 0.0 {
            Motion::FastForwarding
        } else {
            Motion::Rewinding
        };
        if motion == self.motion {
            return None;
        }
        self.motion = motion;
        Some(match motion {
            Motion::FastForwarding => PlaybackState::FastForwarding,
            _ => PlaybackState::Rewinding,
        })
    }
}

/// Wall-clock instant, in seconds since the epoch, at which playback of the
/// current item started.
fn start_instant(now: DateTime<Utc>, position: f64) -> f64 {
    now.timestamp_micros() as f64 / 1_000_000.0 - position
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn tracker() -> (DriftTracker, DateTime<Utc>) {
        let start = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(1_000);
        let mut tracker = DriftTracker::new(&TrackingConfig::default());
        tracker.rebaseline(start, 0.0);
        (tracker, start)
    }

    fn after(start: DateTime<Utc>, millis: i64) -> DateTime<Utc> {
        start + TimeDelta::milliseconds(millis)
    }

    #[test]
    fn test_steady_playback_is_silent() {
        let (mut tracker, start) = tracker();
        assert_eq!(tracker.sample(after(start, 500), 0.5), None);
        assert_eq!(tracker.sample(after(start, 1_000), 1.0), None);
    }

    #[test]
    fn test_small_drift_is_ignored() {
        let (mut tracker, start) = tracker();
        // delta = +0.1s
        assert_eq!(tracker.sample(after(start, 500), 0.4), None);
    }

    #[test]
    fn test_forward_drift_is_fast_forwarding() {
        let (mut tracker, start) = tracker();
        // delta = -0.4s
        assert_eq!(
            tracker.sample(after(start, 500), 0.9),
            Some(PlaybackState::FastForwarding)
        );
        assert!(tracker.is_drifting());
    }

    #[test]
    fn test_backward_drift_is_rewinding() {
        let (mut tracker, start) = tracker();
        // delta = +0.4s
        assert_eq!(
            tracker.sample(after(start, 500), 0.1),
            Some(PlaybackState::Rewinding)
        );
    }

    #[test]
    fn test_sustained_drift_reports_once_then_resumes() {
        let (mut tracker, start) = tracker();
        assert_eq!(
            tracker.sample(after(start, 500), 2.0),
            Some(PlaybackState::FastForwarding)
        );
        assert_eq!(tracker.sample(after(start, 1_000), 4.0), None);
        assert_eq!(
            tracker.sample(after(start, 1_500), 4.5),
            Some(PlaybackState::Playing)
        );
        assert!(!tracker.is_drifting());
    }

    #[test]
    fn test_large_jump_after_steady_is_reposition() {
        let (mut tracker, start) = tracker();
        assert_eq!(tracker.sample(after(start, 500), 0.5), None);
        assert_eq!(
            tracker.sample(after(start, 1_000), 61.0),
            Some(PlaybackState::Reposition)
        );
        // the jump is absorbed into the new baseline
        assert_eq!(tracker.sample(after(start, 1_500), 61.5), None);
    }

    #[test]
    fn test_large_jump_while_drifting_keeps_direction() {
        let (mut tracker, start) = tracker();
        assert_eq!(
            tracker.sample(after(start, 500), 0.1),
            Some(PlaybackState::Rewinding)
        );
        assert_eq!(tracker.sample(after(start, 1_000), 0.0), None);
        assert_eq!(
            tracker.sample(after(start, 1_500), 10.0),
            Some(PlaybackState::FastForwarding)
        );
    }

    #[test]
    fn test_reset_requires_new_baseline() {
        let (mut tracker, start) = tracker();
        tracker.reset();
        assert_eq!(tracker.sample(after(start, 500), 30.0), None);
        // Measured against the sample above, not the original baseline.
        assert_eq!(
            tracker.sample(after(start, 1_500), 40.0),
            Some(PlaybackState::Reposition)
        );
    }
}
