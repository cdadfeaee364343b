//! # Player Driver
//!
//! Wraps one external player and turns its raw signals into canonical
//! [`PlayerEvent`]s.
//!
//! ## Overview
//!
//! Two inputs feed the driver:
//!
//! - **Change notifications** posted by the player. Depending on the backend
//!   they announce play/pause/stop transitions or only track changes.
//! - **A drift poll** registered with the shared [`TimerDispatcher`]. While
//!   the player is active (or always, for backends whose notifications carry
//!   no state) each tick reads the raw state and position and feeds the
//!   [`DriftTracker`].
//!
//! A pause or stop arms a one-shot quit check on the run loop. If the player
//! process is gone when it fires, the driver reports [`PlayerEvent::Quit`].
//!
//! ```text
//!            start_tracking
//!   idle ────────────────────▶ tracking ──pause/stop──▶ halted ──quit check──▶ quit
//!    ▲                           ▲  │                     │                      │
//!    │        stop_tracking      │  └──drift poll──┐      │ play                 │ play
//!    └───────────────────────────┴─────────────────┘◀─────┘◀─────────────────────┘
//! ```
//!
//! ## Re-entrancy
//!
//! Events are collected while the tracking state is borrowed and emitted only
//! after the borrow is released, so an event sink may call back into the
//! driver (or drop it) from inside a handler.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bridge_traits::automation::{
    Notification, NotificationHandler, PlayerAutomation, PlayerName, SubscriptionId,
};
use chrono::{DateTime, Utc};
use core_runtime::config::TrackingConfig;
use core_runtime::dispatcher::{DispatchKey, TimerDispatcher};
use core_runtime::run_loop::TimerId;
use tracing::{debug, info, warn};

use crate::backend::{Backend, Capabilities, SignalKind};
use crate::drift::DriftTracker;
use crate::error::{PlayerError, Result};
use crate::events::PlayerEvent;
use crate::types::{PlaybackState, RepeatMode, ShuffleMode, Track};

/// Receives a driver's events, tagged with the driver's player name.
pub type EventSink = Rc<dyn Fn(PlayerName, PlayerEvent)>;

/// Drives one external player.
///
/// Dropping the driver stops tracking.
pub struct PlayerDriver {
    core: Rc<DriverCore>,
}

struct DriverCore {
    backend: Backend,
    automation: Rc<dyn PlayerAutomation>,
    dispatcher: TimerDispatcher,
    tracking: TrackingConfig,
    key: DispatchKey,
    sink: RefCell<Option<EventSink>>,
    state: RefCell<TrackingState>,
}

#[derive(Debug)]
struct TrackingState {
    active: bool,
    subscription: Option<SubscriptionId>,
    polling: bool,
    quit_check: Option<TimerId>,
    track: Option<Track>,
    /// Last state reported through an event.
    reported: PlaybackState,
    drift: DriftTracker,
}

impl PlayerDriver {
    /// Creates an idle driver. Call [`start_tracking`](Self::start_tracking)
    /// to begin producing events.
    pub fn new(
        player: PlayerName,
        automation: Rc<dyn PlayerAutomation>,
        dispatcher: TimerDispatcher,
        tracking: TrackingConfig,
    ) -> Self {
        let key = dispatcher.next_key();
        let drift = DriftTracker::new(&tracking);
        Self {
            core: Rc::new(DriverCore {
                backend: Backend::from(player),
                automation,
                dispatcher,
                tracking,
                key,
                sink: RefCell::new(None),
                state: RefCell::new(TrackingState {
                    active: false,
                    subscription: None,
                    polling: false,
                    quit_check: None,
                    track: None,
                    reported: PlaybackState::Stopped,
                    drift,
                }),
            }),
        }
    }

    pub fn name(&self) -> PlayerName {
        self.core.name()
    }

    pub fn backend(&self) -> Backend {
        self.core.backend
    }

    pub fn capabilities(&self) -> Capabilities {
        self.core.backend.capabilities()
    }

    /// Installs the receiver of this driver's events, replacing any previous one.
    pub fn set_event_sink(&self, sink: EventSink) {
        *self.core.sink.borrow_mut() = Some(sink);
    }

    pub fn clear_event_sink(&self) {
        self.core.sink.borrow_mut().take();
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Starts tracking the player.
    ///
    /// Emits a `TrackChanged` for the current track (if any) followed by one
    /// `PlaybackChanged` with the current state, then subscribes to the
    /// player's notifications and, if appropriate, starts the drift poll.
    /// Calling it while already tracking does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Subscription`] if the notification stream
    /// cannot be subscribed.
    pub fn start_tracking(&self) -> Result<()> {
        let core = &self.core;
        if core.state.borrow().active {
            return Ok(());
        }

        let weak = Rc::downgrade(core);
        let handler: NotificationHandler = Rc::new(move |notification: &Notification| {
            if let Some(core) = weak.upgrade() {
                core.handle_notification(notification);
            }
        });
        let subscription = core
            .automation
            .subscribe(core.backend.notification_stream(), handler)
            .map_err(|source| {
                warn!(player = %core.name(), error = %source, "Notification subscription failed");
                PlayerError::Subscription {
                    player: core.name(),
                    source,
                }
            })?;

        let mut events = Vec::new();
        {
            let mut state = core.state.borrow_mut();
            state.active = true;
            state.subscription = Some(subscription);

            let running = core.is_running();
            let position = core.position();
            let current = core.read_state();
            core.check_track(&mut state, position, &mut events);
            state.reported = current;
            state.drift.rebaseline(core.now(), position);
            events.push(PlayerEvent::PlaybackChanged {
                state: current,
                position,
            });

            if running && (current.is_active() || !core.backend.capabilities().state_notifications)
            {
                core.start_polling(&mut state);
            }
            info!(player = %core.name(), state = %current, running, "Started tracking");
        }
        core.emit(events);
        Ok(())
    }

    /// Stops tracking: unsubscribes, stops the drift poll, cancels a pending
    /// quit check and forgets the cached track. Safe to call at any time.
    pub fn stop_tracking(&self) {
        let core = &self.core;
        let Ok(mut state) = core.state.try_borrow_mut() else {
            warn!(player = %core.name(), "stop_tracking re-entered while tracking state is busy");
            return;
        };

        if let Some(subscription) = state.subscription.take() {
            core.automation.unsubscribe(subscription);
        }
        core.stop_polling(&mut state);
        core.cancel_quit_check(&mut state);
        state.track = None;
        state.reported = PlaybackState::Stopped;
        state.drift.reset();

        if std::mem::replace(&mut state.active, false) {
            info!(player = %core.name(), "Stopped tracking");
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.core.state.borrow().active
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Playback position in seconds; `0.0` when the player is not running.
    pub fn position(&self) -> f64 {
        self.core.position()
    }

    /// Current state as reported by the player; `Stopped` when not running.
    pub fn playback_state(&self) -> PlaybackState {
        self.core.read_state()
    }

    pub fn repeat_mode(&self) -> Option<RepeatMode> {
        if !self.core.backend.capabilities().repeat || !self.is_running() {
            return None;
        }
        let raw = self.core.automation.repeat_mode()?;
        self.core.backend.decode_repeat(&raw)
    }

    pub fn shuffle_mode(&self) -> Option<ShuffleMode> {
        if !self.core.backend.capabilities().shuffle || !self.is_running() {
            return None;
        }
        let raw = self.core.automation.shuffle_mode()?;
        self.core.backend.decode_shuffle(&raw)
    }

    /// The tracked track while tracking, otherwise a fresh read from the player.
    pub fn current_track(&self) -> Option<Track> {
        if !self.is_running() {
            return None;
        }
        let state = self.core.state.borrow();
        if state.active {
            state.track.clone()
        } else {
            drop(state);
            self.core.read_track()
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Brings the player application to the foreground.
    pub fn activate(&self) {
        self.core.automation.activate();
    }

    pub fn play(&self) {
        if self.is_running() {
            let current = self.core.read_state();
            self.core.backend.play(self.core.automation.as_ref(), current);
        }
    }

    pub fn pause(&self) {
        if self.is_running() {
            self.core.automation.pause();
        }
    }

    pub fn stop(&self) {
        if self.is_running() {
            self.core.backend.stop(self.core.automation.as_ref());
        }
    }

    pub fn play_pause(&self) {
        if self.is_running() {
            self.core.automation.play_pause();
        }
    }

    pub fn next_track(&self) {
        if self.is_running() {
            self.core.automation.next_track();
        }
    }

    pub fn previous_track(&self) {
        if self.is_running() {
            self.core.automation.previous_track();
        }
    }

    /// Moves the playhead to `position` seconds. Negative and non-finite
    /// positions are ignored.
    pub fn seek(&self, position: f64) {
        if !position.is_finite() || position < 0.0 {
            debug!(player = %self.name(), position, "Ignoring invalid seek position");
            return;
        }
        if self.is_running() {
            self.core.automation.set_position(position);
        }
    }

    /// Ignored when the player has no repeat setting.
    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        if !self.is_running() {
            return;
        }
        if let Some(raw) = self.core.backend.encode_repeat(mode) {
            self.core.automation.set_repeat_mode(raw);
        }
    }

    /// Ignored when the player has no shuffle setting.
    pub fn set_shuffle_mode(&self, mode: ShuffleMode) {
        if !self.is_running() {
            return;
        }
        if let Some(raw) = self.core.backend.encode_shuffle(mode) {
            self.core.automation.set_shuffle_mode(raw);
        }
    }
}

impl Drop for PlayerDriver {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}

impl fmt::Debug for PlayerDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state.try_borrow();
        f.debug_struct("PlayerDriver")
            .field("player", &self.name())
            .field("key", &self.core.key)
            .field("tracking", &state.as_ref().map(|state| state.active).ok())
            .field("reported", &state.as_ref().map(|state| state.reported).ok())
            .finish()
    }
}

// ============================================================================
// Tracking machinery
// ============================================================================

impl DriverCore {
    fn name(&self) -> PlayerName {
        self.backend.player()
    }

    fn now(&self) -> DateTime<Utc> {
        self.dispatcher.run_loop().now()
    }

    fn is_running(&self) -> bool {
        self.automation.is_running()
    }

    fn position(&self) -> f64 {
        if !self.is_running() {
            return 0.0;
        }
        self.automation
            .position()
            .filter(|position| position.is_finite())
            .map(|position| position.max(0.0))
            .unwrap_or(0.0)
    }

    fn read_state(&self) -> PlaybackState {
        if !self.is_running() {
            return PlaybackState::Stopped;
        }
        self.automation
            .playback_state()
            .and_then(|raw| self.backend.decode_state(&raw))
            .unwrap_or(PlaybackState::Stopped)
    }

    fn read_track(&self) -> Option<Track> {
        if !self.is_running() {
            return None;
        }
        let raw = self.automation.current_track()?;
        self.backend.decode_track(raw)
    }

    /// Hands collected events to the sink, stopping early if a sink call
    /// ended tracking.
    fn emit(&self, events: Vec<PlayerEvent>) {
        if events.is_empty() {
            return;
        }
        let Some(sink) = self.sink.borrow().clone() else {
            return;
        };
        let player = self.name();
        for event in events {
            if !self.state.borrow().active {
                break;
            }
            debug!(%player, event = event.description(), "Player event");
            sink(player, event);
        }
    }

    /// Replaces the cached track when the player reports a new id; merges
    /// enrichment silently when the id is unchanged.
    fn check_track(&self, state: &mut TrackingState, position: f64, events: &mut Vec<PlayerEvent>) {
        let Some(track) = self.read_track() else {
            return;
        };
        if let Some(cached) = state.track.as_mut().filter(|cached| **cached == track) {
            if cached.merge_enrichment(&track) {
                debug!(player = %self.name(), track_id = cached.id(), "Track metadata updated");
            }
            return;
        }
        state.track = Some(track.clone());
        events.push(PlayerEvent::TrackChanged { track, position });
    }

    fn start_polling(self: &Rc<Self>, state: &mut TrackingState) {
        if state.polling {
            return;
        }
        let weak = Rc::downgrade(self);
        let registered =
            self.dispatcher
                .register(self.key, self.tracking.poll_interval, move |_interval| {
                    if let Some(core) = weak.upgrade() {
                        core.handle_tick();
                    }
                });
        match registered {
            Ok(()) => state.polling = true,
            Err(error) => warn!(player = %self.name(), %error, "Could not start drift poll"),
        }
    }

    fn stop_polling(&self, state: &mut TrackingState) {
        if std::mem::replace(&mut state.polling, false) {
            self.dispatcher.unregister(self.key);
        }
    }

    fn schedule_quit_check(self: &Rc<Self>, state: &mut TrackingState) {
        self.cancel_quit_check(state);
        let weak = Rc::downgrade(self);
        let id = self
            .dispatcher
            .run_loop()
            .schedule_once(self.tracking.quit_check_delay, move || {
                if let Some(core) = weak.upgrade() {
                    core.handle_quit_check();
                }
            });
        state.quit_check = Some(id);
    }

    fn cancel_quit_check(&self, state: &mut TrackingState) {
        if let Some(id) = state.quit_check.take() {
            self.dispatcher.run_loop().cancel(id);
        }
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    fn on_playing(self: &Rc<Self>, state: &mut TrackingState, events: &mut Vec<PlayerEvent>) {
        self.cancel_quit_check(state);
        let position = self.position();
        self.check_track(state, position, events);
        state.drift.rebaseline(self.now(), position);
        if state.reported != PlaybackState::Playing {
            state.reported = PlaybackState::Playing;
            events.push(PlayerEvent::PlaybackChanged {
                state: PlaybackState::Playing,
                position,
            });
        }
        self.start_polling(state);
    }

    fn on_halted(
        self: &Rc<Self>,
        state: &mut TrackingState,
        halted: PlaybackState,
        events: &mut Vec<PlayerEvent>,
    ) {
        let position = self.position();
        if state.reported != halted {
            state.reported = halted;
            events.push(PlayerEvent::PlaybackChanged {
                state: halted,
                position,
            });
        }
        // Without state notifications the poll is the only way to see a resume.
        if halted == PlaybackState::Stopped || self.backend.capabilities().state_notifications {
            self.stop_polling(state);
        }
        state.drift.reset();
        self.schedule_quit_check(state);
    }

    fn on_track_signal(self: &Rc<Self>, state: &mut TrackingState, events: &mut Vec<PlayerEvent>) {
        let position = self.position();
        self.check_track(state, position, events);
        state.drift.rebaseline(self.now(), position);
        if self.is_running() {
            self.start_polling(state);
        }
    }

    fn on_playing_tick(
        &self,
        state: &mut TrackingState,
        position: f64,
        events: &mut Vec<PlayerEvent>,
    ) {
        let now = self.now();

        // Resumed without a state notification.
        if !state.reported.is_active() {
            self.cancel_quit_check(state);
            state.reported = PlaybackState::Playing;
            state.drift.rebaseline(now, position);
            events.push(PlayerEvent::PlaybackChanged {
                state: PlaybackState::Playing,
                position,
            });
            return;
        }

        // The player itself reported fast-forward/rewind and has now stopped.
        if state.reported != PlaybackState::Playing && !state.drift.is_drifting() {
            state.reported = PlaybackState::Playing;
            state.drift.rebaseline(now, position);
            events.push(PlayerEvent::PlaybackChanged {
                state: PlaybackState::Playing,
                position,
            });
            return;
        }

        if !self.backend.capabilities().track_notifications {
            let before = events.len();
            self.check_track(state, position, events);
            if events.len() > before {
                state.drift.rebaseline(now, position);
                return;
            }
        }

        match state.drift.sample(now, position) {
            Some(PlaybackState::Reposition) => {
                debug!(player = %self.name(), position, "Reposition detected");
                events.push(PlayerEvent::PlaybackChanged {
                    state: PlaybackState::Reposition,
                    position,
                });
            }
            Some(next) => {
                debug!(player = %self.name(), state = %next, position, "Drift reclassified");
                state.reported = next;
                events.push(PlayerEvent::PlaybackChanged {
                    state: next,
                    position,
                });
            }
            None => {}
        }
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    fn handle_notification(self: &Rc<Self>, notification: &Notification) {
        let Some(signal) = self.backend.decode_signal(notification) else {
            debug!(player = %self.name(), name = %notification.name, "Ignoring malformed notification");
            return;
        };

        let mut events = Vec::new();
        {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                return;
            };
            if !state.active {
                return;
            }

            match signal.kind {
                Some(SignalKind::Playing) => self.on_playing(&mut state, &mut events),
                Some(SignalKind::Paused) => {
                    // Fast-forward and rewind also post a pause notification.
                    if self.read_state() == PlaybackState::Paused {
                        self.on_halted(&mut state, PlaybackState::Paused, &mut events);
                    } else {
                        debug!(player = %self.name(), "Pause notification without a paused player");
                    }
                }
                Some(SignalKind::Stopped) => {
                    self.on_halted(&mut state, PlaybackState::Stopped, &mut events)
                }
                Some(SignalKind::TrackChanged) => self.on_track_signal(&mut state, &mut events),
                None => {}
            }

            if let (Some(location), Some(track)) = (signal.location, state.track.as_mut()) {
                track.url = Some(location);
            }
        }
        self.emit(events);
    }

    fn handle_tick(self: &Rc<Self>) {
        let mut events = Vec::new();
        {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                return;
            };
            if !state.active {
                return;
            }

            let current = self.read_state();
            let position = self.position();
            match current {
                PlaybackState::Playing => self.on_playing_tick(&mut state, position, &mut events),
                PlaybackState::FastForwarding | PlaybackState::Rewinding => {
                    self.cancel_quit_check(&mut state);
                    if state.reported != current {
                        state.reported = current;
                        events.push(PlayerEvent::PlaybackChanged {
                            state: current,
                            position,
                        });
                    }
                    state.drift.rebaseline(self.now(), position);
                }
                PlaybackState::Paused | PlaybackState::Stopped => {
                    if state.reported != current {
                        self.on_halted(&mut state, current, &mut events);
                    }
                }
                PlaybackState::Reposition => {}
            }
        }
        self.emit(events);
    }

    fn handle_quit_check(&self) {
        let mut events = Vec::new();
        {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                return;
            };
            state.quit_check = None;
            if !state.active || self.is_running() {
                return;
            }
            self.stop_polling(&mut state);
            state.track = None;
            state.reported = PlaybackState::Stopped;
            state.drift.reset();
            events.push(PlayerEvent::Quit);
            info!(player = %self.name(), "Player quit");
        }
        self.emit(events);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::automation::{RawTrack, ScriptValue};
    use bridge_traits::time::ManualClock;
    use core_runtime::run_loop::RunLoop;
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    /// Minimal stationary player: no notifications, fixed values.
    #[derive(Default)]
    struct StillPlayer {
        running: Cell<bool>,
        state: RefCell<Option<ScriptValue>>,
        commands: RefCell<Vec<&'static str>>,
        subscriptions: Cell<u64>,
        position_set: Cell<Option<f64>>,
    }

    impl PlayerAutomation for StillPlayer {
        fn is_running(&self) -> bool {
            self.running.get()
        }
        fn activate(&self) {
            self.commands.borrow_mut().push("activate");
        }
        fn position(&self) -> Option<f64> {
            Some(-3.0)
        }
        fn set_position(&self, seconds: f64) {
            self.position_set.set(Some(seconds));
        }
        fn playback_state(&self) -> Option<ScriptValue> {
            self.state.borrow().clone()
        }
        fn current_track(&self) -> Option<RawTrack> {
            Some(RawTrack::new("1", "One").with_duration(10.0))
        }
        fn play(&self) {
            self.commands.borrow_mut().push("play");
        }
        fn pause(&self) {
            self.commands.borrow_mut().push("pause");
        }
        fn play_pause(&self) {
            self.commands.borrow_mut().push("play_pause");
        }
        fn stop(&self) {
            self.commands.borrow_mut().push("stop");
        }
        fn next_track(&self) {
            self.commands.borrow_mut().push("next");
        }
        fn previous_track(&self) {
            self.commands.borrow_mut().push("previous");
        }
        fn subscribe(
            &self,
            _stream: &str,
            _handler: NotificationHandler,
        ) -> bridge_traits::error::Result<SubscriptionId> {
            self.subscriptions.set(self.subscriptions.get() + 1);
            Ok(SubscriptionId(self.subscriptions.get()))
        }
        fn unsubscribe(&self, _id: SubscriptionId) {
            self.subscriptions.set(self.subscriptions.get() - 1);
        }
    }

    fn driver(player: PlayerName, automation: Rc<StillPlayer>) -> PlayerDriver {
        let clock = Arc::new(ManualClock::default());
        let dispatcher = TimerDispatcher::new(RunLoop::new(clock));
        PlayerDriver::new(player, automation, dispatcher, TrackingConfig::default())
    }

    #[test]
    fn test_neutral_defaults_when_not_running() {
        let automation = Rc::new(StillPlayer::default());
        let driver = driver(PlayerName::ITunes, automation.clone());

        assert_eq!(driver.position(), 0.0);
        assert_eq!(driver.playback_state(), PlaybackState::Stopped);
        assert_eq!(driver.repeat_mode(), None);
        assert!(driver.current_track().is_none());

        driver.play();
        driver.next_track();
        driver.seek(5.0);
        assert!(automation.commands.borrow().is_empty());
        assert_eq!(automation.position_set.get(), None);
    }

    #[test]
    fn test_position_is_clamped() {
        let automation = Rc::new(StillPlayer::default());
        automation.running.set(true);
        let driver = driver(PlayerName::Vox, automation);
        assert_eq!(driver.position(), 0.0);
    }

    #[test]
    fn test_invalid_seek_is_ignored() {
        let automation = Rc::new(StillPlayer::default());
        automation.running.set(true);
        let driver = driver(PlayerName::Spotify, automation.clone());

        driver.seek(-1.0);
        driver.seek(f64::NAN);
        assert_eq!(automation.position_set.get(), None);

        driver.seek(12.5);
        assert_eq!(automation.position_set.get(), Some(12.5));
    }

    #[test]
    fn test_backend_specific_commands() {
        let automation = Rc::new(StillPlayer::default());
        automation.running.set(true);
        *automation.state.borrow_mut() = Some(ScriptValue::from("kPSP"));
        let itunes = driver(PlayerName::ITunes, automation.clone());

        itunes.play();
        itunes.stop();
        assert_eq!(*automation.commands.borrow(), vec!["stop"]);

        let spotify = driver(PlayerName::Spotify, automation.clone());
        spotify.play();
        spotify.stop();
        assert_eq!(*automation.commands.borrow(), vec!["stop", "play", "pause"]);
    }

    #[test]
    fn test_start_stop_tracking_is_idempotent() {
        let automation = Rc::new(StillPlayer::default());
        automation.running.set(true);
        let driver = driver(PlayerName::ITunes, automation.clone());

        driver.stop_tracking();
        driver.start_tracking().unwrap();
        driver.start_tracking().unwrap();
        assert_eq!(automation.subscriptions.get(), 1);
        assert!(driver.is_tracking());
        assert_eq!(driver.current_track().map(|t| t.id().to_string()), Some("1".into()));

        driver.stop_tracking();
        driver.stop_tracking();
        assert_eq!(automation.subscriptions.get(), 0);
        assert!(!driver.is_tracking());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let automation = Rc::new(StillPlayer::default());
        automation.running.set(true);
        {
            let driver = driver(PlayerName::Vox, automation.clone());
            driver.start_tracking().unwrap();
            assert_eq!(automation.subscriptions.get(), 1);
        }
        assert_eq!(automation.subscriptions.get(), 0);
    }
}
