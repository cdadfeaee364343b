//! # Core Configuration Module
//!
//! Provides configuration management for the player core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`CoreConfig`] holding the injected host capabilities and the tuning
//! values of the tracking engine. It fails fast when a required capability is
//! missing.
//!
//! ## Required Dependencies
//!
//! - `AutomationProvider` - resolves automation handles for external players
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `TimerDispatcher` - defaults to a dispatcher on `run_loop`
//! - `RunLoop` - defaults to a fresh loop over `clock`
//! - `Clock` - defaults to [`SystemClock`]
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TrackingConfig};
//! use std::rc::Rc;
//!
//! let config = CoreConfig::builder()
//!     .automation(Rc::new(MyAutomationProvider))
//!     .tracking(TrackingConfig::default())
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Tracking values
//!
//! [`TrackingConfig`] deserializes from JSON with every field optional and
//! durations expressed in (fractional) seconds:
//!
//! ```json
//! { "poll_interval": 0.5, "drift_threshold": 0.25, "quit_check_delay": 1.5 }
//! ```

use crate::dispatcher::TimerDispatcher;
use crate::error::{Error, Result};
use crate::run_loop::RunLoop;
use bridge_traits::automation::{AutomationProvider, PlayerName};
use bridge_traits::time::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Tracking Configuration
// ============================================================================

/// Timing values of the drift-tracking engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Precision requested from the timer dispatcher for drift polls.
    #[serde(default = "default_poll_interval", with = "duration_secs")]
    pub poll_interval: Duration,

    /// Drift (in either direction) tolerated before playback is reclassified.
    #[serde(default = "default_drift_threshold", with = "duration_secs")]
    pub drift_threshold: Duration,

    /// Single-tick drift above which a jump is reported as a reposition
    /// rather than fast-forward/rewind.
    #[serde(default = "default_reposition_threshold", with = "duration_secs")]
    pub reposition_threshold: Duration,

    /// Delay before confirming that a paused/stopped player has quit.
    #[serde(default = "default_quit_check_delay", with = "duration_secs")]
    pub quit_check_delay: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_drift_threshold() -> Duration {
    Duration::from_millis(250)
}

fn default_reposition_threshold() -> Duration {
    Duration::from_secs(2)
}

fn default_quit_check_delay() -> Duration {
    Duration::from_millis(1500)
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            drift_threshold: default_drift_threshold(),
            reposition_threshold: default_reposition_threshold(),
            quit_check_delay: default_quit_check_delay(),
        }
    }
}

impl TrackingConfig {
    /// Parses a JSON document and validates the result.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid tracking config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_drift_threshold(mut self, threshold: Duration) -> Self {
        self.drift_threshold = threshold;
        self
    }

    pub fn with_reposition_threshold(mut self, threshold: Duration) -> Self {
        self.reposition_threshold = threshold;
        self
    }

    pub fn with_quit_check_delay(mut self, delay: Duration) -> Self {
        self.quit_check_delay = delay;
        self
    }

    /// Validates the timing values.
    ///
    /// This checks:
    /// - Every duration is non-zero
    /// - The reposition threshold is not tighter than the drift threshold
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("poll_interval", self.poll_interval),
            ("drift_threshold", self.drift_threshold),
            ("reposition_threshold", self.reposition_threshold),
            ("quit_check_delay", self.quit_check_delay),
        ];
        for (name, value) in values {
            if value.is_zero() {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.reposition_threshold < self.drift_threshold {
            return Err(Error::Config(
                "reposition_threshold must be greater than or equal to drift_threshold"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Core Configuration
// ============================================================================

/// Core configuration for the player core.
///
/// Holds the injected capabilities and settings required to construct a
/// `MusicPlayerManager`. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Resolves automation handles for players (required)
    pub automation: Rc<dyn AutomationProvider>,

    /// Shared poll scheduler; its run loop hosts every timer of the core
    pub dispatcher: TimerDispatcher,

    /// Timing values of the tracking engine
    pub tracking: TrackingConfig,

    /// Player that always wins tracked-player selection when present
    pub preferred_player: Option<PlayerName>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("automation", &"AutomationProvider { ... }")
            .field("dispatcher", &self.dispatcher)
            .field("tracking", &self.tracking)
            .field("preferred_player", &self.preferred_player)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn run_loop(&self) -> &RunLoop {
        self.dispatcher.run_loop()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.dispatcher.run_loop().clock()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.tracking.validate()
    }
}

fn automation_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "AutomationProvider".to_string(),
        message: "AutomationProvider implementation is required to reach external players. \
                 macOS: inject the scripting-bridge adapter. \
                 Tests: inject a fake provider."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Defaults cascade: a missing dispatcher is created on the run loop, a
/// missing run loop is created over the clock, and a missing clock is the
/// system clock.
#[derive(Default)]
pub struct CoreConfigBuilder {
    automation: Option<Rc<dyn AutomationProvider>>,
    clock: Option<Arc<dyn Clock>>,
    run_loop: Option<RunLoop>,
    dispatcher: Option<TimerDispatcher>,
    tracking: Option<TrackingConfig>,
    preferred_player: Option<PlayerName>,
}

impl CoreConfigBuilder {
    /// Sets the automation provider (required).
    pub fn automation(mut self, provider: Rc<dyn AutomationProvider>) -> Self {
        self.automation = Some(provider);
        self
    }

    /// Sets the clock used when the builder creates the run loop.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn run_loop(mut self, run_loop: RunLoop) -> Self {
        self.run_loop = Some(run_loop);
        self
    }

    /// Injects a dispatcher, e.g. one shared with other components.
    pub fn dispatcher(mut self, dispatcher: TimerDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn tracking(mut self, tracking: TrackingConfig) -> Self {
        self.tracking = Some(tracking);
        self
    }

    pub fn preferred_player(mut self, player: PlayerName) -> Self {
        self.preferred_player = Some(player);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if no automation provider was set
    /// - [`Error::Config`] if both a clock and a run loop/dispatcher were set,
    ///   if the dispatcher runs on a different loop than `run_loop`, or if
    ///   the tracking values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let automation = self.automation.ok_or_else(automation_missing_error)?;

        if self.clock.is_some() && (self.run_loop.is_some() || self.dispatcher.is_some()) {
            return Err(Error::Config(
                "A clock cannot be combined with an injected run loop or dispatcher; \
                 the run loop already owns its clock."
                    .to_string(),
            ));
        }

        let dispatcher = match (self.dispatcher, self.run_loop) {
            (Some(dispatcher), Some(run_loop)) => {
                if !dispatcher.run_loop().ptr_eq(&run_loop) {
                    return Err(Error::Config(
                        "The dispatcher must be driven by the configured run loop".to_string(),
                    ));
                }
                dispatcher
            }
            (Some(dispatcher), None) => dispatcher,
            (None, Some(run_loop)) => TimerDispatcher::new(run_loop),
            (None, None) => {
                let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
                TimerDispatcher::new(RunLoop::new(clock))
            }
        };

        let config = CoreConfig {
            automation,
            dispatcher,
            tracking: self.tracking.unwrap_or_default(),
            preferred_player: self.preferred_player,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::automation::PlayerAutomation;
    use bridge_traits::time::ManualClock;
    use mockall::mock;

    mock! {
        Provider {}

        impl AutomationProvider for Provider {
            fn resolve(&self, player: PlayerName) -> Option<Rc<dyn PlayerAutomation>>;
        }
    }

    fn provider() -> Rc<dyn AutomationProvider> {
        Rc::new(MockProvider::new())
    }

    #[test]
    fn test_tracking_defaults() {
        let tracking = TrackingConfig::default();
        assert_eq!(tracking.poll_interval, Duration::from_millis(500));
        assert_eq!(tracking.drift_threshold, Duration::from_millis(250));
        assert_eq!(tracking.reposition_threshold, Duration::from_secs(2));
        assert_eq!(tracking.quit_check_delay, Duration::from_millis(1500));
        assert!(tracking.validate().is_ok());
    }

    #[test]
    fn test_tracking_from_partial_json() {
        let tracking = TrackingConfig::from_json(r#"{ "poll_interval": 0.25 }"#).unwrap();
        assert_eq!(tracking.poll_interval, Duration::from_millis(250));
        assert_eq!(tracking.quit_check_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_tracking_json_round_trip_uses_seconds() {
        let json = serde_json::to_value(TrackingConfig::default()).unwrap();
        assert_eq!(json["drift_threshold"], serde_json::json!(0.25));
    }

    #[test]
    fn test_tracking_rejects_negative_seconds() {
        let result = TrackingConfig::from_json(r#"{ "quit_check_delay": -1.0 }"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_tracking_rejects_zero_values() {
        let tracking = TrackingConfig::default().with_poll_interval(Duration::ZERO);
        let err = tracking.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval"));
    }

    #[test]
    fn test_tracking_rejects_inverted_thresholds() {
        let tracking = TrackingConfig::default()
            .with_drift_threshold(Duration::from_secs(1))
            .with_reposition_threshold(Duration::from_millis(500));
        let err = tracking.validate().unwrap_err();
        assert!(err.to_string().contains("reposition_threshold"));
    }

    #[test]
    fn test_builder_requires_automation() {
        let result = CoreConfig::builder().build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("AutomationProvider"));
    }

    #[test]
    fn test_builder_with_defaults() {
        let config = CoreConfig::builder().automation(provider()).build().unwrap();

        assert_eq!(config.tracking, TrackingConfig::default());
        assert!(config.preferred_player.is_none());
        assert!(!config.dispatcher.is_active());
    }

    #[test]
    fn test_builder_uses_injected_clock() {
        let clock = ManualClock::default();
        let config = CoreConfig::builder()
            .automation(provider())
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();

        clock.advance(Duration::from_secs(5));
        assert_eq!(config.clock().now(), clock.now());
        assert_eq!(config.run_loop().now().timestamp(), 5);
    }

    #[test]
    fn test_builder_builds_dispatcher_on_run_loop() {
        let run_loop = RunLoop::new(Arc::new(ManualClock::default()));
        let config = CoreConfig::builder()
            .automation(provider())
            .run_loop(run_loop.clone())
            .build()
            .unwrap();

        assert!(config.run_loop().ptr_eq(&run_loop));
    }

    #[test]
    fn test_builder_rejects_mismatched_dispatcher() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let dispatcher = TimerDispatcher::new(RunLoop::new(Arc::clone(&clock)));
        let result = CoreConfig::builder()
            .automation(provider())
            .run_loop(RunLoop::new(clock))
            .dispatcher(dispatcher)
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_clock_with_run_loop() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let result = CoreConfig::builder()
            .automation(provider())
            .clock(Arc::clone(&clock))
            .run_loop(RunLoop::new(clock))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_with_preferred_player() {
        let config = CoreConfig::builder()
            .automation(provider())
            .preferred_player(PlayerName::Spotify)
            .build()
            .unwrap();

        assert_eq!(config.preferred_player, Some(PlayerName::Spotify));
    }

    #[test]
    fn test_builder_rejects_invalid_tracking() {
        let result = CoreConfig::builder()
            .automation(provider())
            .tracking(TrackingConfig::default().with_quit_check_delay(Duration::ZERO))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = CoreConfig::builder().automation(provider()).build().unwrap();
        let cloned = config.clone();
        assert!(cloned.run_loop().ptr_eq(config.run_loop()));
        assert!(format!("{:?}", cloned).contains("AutomationProvider"));
    }
}
