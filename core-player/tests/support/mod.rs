//! Shared doubles for the player integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::automation::{
    AutomationProvider, Notification, NotificationHandler, PlayerAutomation, PlayerName, RawTrack,
    ScriptValue, SubscriptionId,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::time::{Clock, ManualClock};
use chrono::{DateTime, Utc};
use core_player::events::{ManagerEvent, ManagerListener, PlayerEvent};
use core_player::EventSink;
use core_runtime::config::CoreConfig;
use core_runtime::dispatcher::TimerDispatcher;
use core_runtime::run_loop::RunLoop;

// ============================================================================
// Fake player
// ============================================================================

/// A scriptable player whose position advances with the manual clock at a
/// configurable rate.
pub struct FakePlayer {
    clock: Arc<ManualClock>,
    running: Cell<bool>,
    state: RefCell<Option<ScriptValue>>,
    anchor: Cell<(f64, DateTime<Utc>)>,
    rate: Cell<f64>,
    track: RefCell<Option<RawTrack>>,
    repeat: RefCell<Option<ScriptValue>>,
    shuffle: RefCell<Option<ScriptValue>>,
    handlers: RefCell<Vec<(SubscriptionId, String, NotificationHandler)>>,
    next_subscription: Cell<u64>,
    fail_subscribe: Cell<bool>,
    commands: RefCell<Vec<String>>,
}

impl FakePlayer {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            running: Cell::new(true),
            state: RefCell::new(None),
            anchor: Cell::new((0.0, now)),
            rate: Cell::new(0.0),
            track: RefCell::new(None),
            repeat: RefCell::new(None),
            shuffle: RefCell::new(None),
            handlers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(1),
            fail_subscribe: Cell::new(false),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn set_running(&self, running: bool) {
        self.running.set(running);
    }

    pub fn set_raw_state(&self, state: impl Into<ScriptValue>) {
        *self.state.borrow_mut() = Some(state.into());
    }

    /// Playback speed from now on; `1.0` is normal playback, `0.0` frozen.
    pub fn set_rate(&self, rate: f64) {
        self.anchor.set((self.current_position(), self.clock.now()));
        self.rate.set(rate);
    }

    /// Jumps the playhead without changing the rate.
    pub fn seek_to(&self, position: f64) {
        self.anchor.set((position, self.clock.now()));
    }

    pub fn current_position(&self) -> f64 {
        let (position, at) = self.anchor.get();
        let elapsed = (self.clock.now() - at).num_microseconds().unwrap_or(0) as f64 / 1e6;
        position + self.rate.get() * elapsed
    }

    pub fn set_track(&self, track: Option<RawTrack>) {
        *self.track.borrow_mut() = track;
    }

    pub fn set_repeat(&self, value: impl Into<ScriptValue>) {
        *self.repeat.borrow_mut() = Some(value.into());
    }

    pub fn fail_subscriptions(&self) {
        self.fail_subscribe.set(true);
    }

    /// Delivers `notification` to every handler subscribed to its stream.
    pub fn post(&self, notification: Notification) {
        let handlers: Vec<NotificationHandler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(_, stream, _)| *stream == notification.name)
            .map(|(_, _, handler)| Rc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&notification);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn repeat_value(&self) -> Option<ScriptValue> {
        self.repeat.borrow().clone()
    }

    fn record(&self, command: &str) {
        self.commands.borrow_mut().push(command.to_string());
    }
}

impl PlayerAutomation for FakePlayer {
    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn activate(&self) {
        self.record("activate");
    }

    fn position(&self) -> Option<f64> {
        Some(self.current_position())
    }

    fn set_position(&self, seconds: f64) {
        self.record("set_position");
        self.seek_to(seconds);
    }

    fn playback_state(&self) -> Option<ScriptValue> {
        self.state.borrow().clone()
    }

    fn repeat_mode(&self) -> Option<ScriptValue> {
        self.repeat.borrow().clone()
    }

    fn set_repeat_mode(&self, value: ScriptValue) {
        *self.repeat.borrow_mut() = Some(value);
    }

    fn shuffle_mode(&self) -> Option<ScriptValue> {
        self.shuffle.borrow().clone()
    }

    fn set_shuffle_mode(&self, value: ScriptValue) {
        *self.shuffle.borrow_mut() = Some(value);
    }

    fn current_track(&self) -> Option<RawTrack> {
        self.track.borrow().clone()
    }

    fn play(&self) {
        self.record("play");
    }

    fn pause(&self) {
        self.record("pause");
    }

    fn play_pause(&self) {
        self.record("play_pause");
    }

    fn stop(&self) {
        self.record("stop");
    }

    fn next_track(&self) {
        self.record("next_track");
    }

    fn previous_track(&self) {
        self.record("previous_track");
    }

    fn subscribe(&self, stream: &str, handler: NotificationHandler) -> BridgeResult<SubscriptionId> {
        if self.fail_subscribe.get() {
            return Err(BridgeError::SubscriptionFailed(stream.to_string()));
        }
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.handlers
            .borrow_mut()
            .push((id, stream.to_string(), handler));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers
            .borrow_mut()
            .retain(|(subscription, _, _)| *subscription != id);
    }
}

// ============================================================================
// Provider and harness
// ============================================================================

#[derive(Default)]
pub struct FakeProvider {
    players: RefCell<HashMap<PlayerName, Rc<FakePlayer>>>,
}

impl AutomationProvider for FakeProvider {
    fn resolve(&self, player: PlayerName) -> Option<Rc<dyn PlayerAutomation>> {
        self.players
            .borrow()
            .get(&player)
            .map(|fake| Rc::clone(fake) as Rc<dyn PlayerAutomation>)
    }
}

/// Manual clock, run loop, dispatcher and provider wired together.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub run_loop: RunLoop,
    pub dispatcher: TimerDispatcher,
    pub provider: Rc<FakeProvider>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::default());
        let run_loop = RunLoop::new(clock.clone() as Arc<dyn Clock>);
        let dispatcher = TimerDispatcher::new(run_loop.clone());
        Self {
            clock,
            run_loop,
            dispatcher,
            provider: Rc::new(FakeProvider::default()),
        }
    }

    /// Installs a running but idle fake for `name`.
    pub fn player(&self, name: PlayerName) -> Rc<FakePlayer> {
        let fake = Rc::new(FakePlayer::new(Arc::clone(&self.clock)));
        self.provider
            .players
            .borrow_mut()
            .insert(name, Rc::clone(&fake));
        fake
    }

    pub fn config(&self) -> CoreConfig {
        CoreConfig::builder()
            .automation(self.provider.clone())
            .dispatcher(self.dispatcher.clone())
            .build()
            .expect("valid test config")
    }

    /// Advances time by `seconds`, firing due timers on the way.
    pub fn advance(&self, seconds: f64) -> usize {
        self.run_loop
            .advance(&self.clock, Duration::from_secs_f64(seconds))
    }
}

// ============================================================================
// Player setups
// ============================================================================

pub fn song(id: &str, title: &str) -> RawTrack {
    RawTrack::new(id, title)
        .with_artist("Test Artist")
        .with_duration(240.0)
}

/// Puts a fake into the "playing at normal speed" state for `name`'s backend.
pub fn start_playing(name: PlayerName, fake: &FakePlayer) {
    match name {
        PlayerName::Vox => fake.set_raw_state(1_i64),
        PlayerName::ITunes | PlayerName::Spotify => fake.set_raw_state("kPSP"),
    }
    fake.set_rate(1.0);
}

pub fn pause_playing(name: PlayerName, fake: &FakePlayer) {
    match name {
        PlayerName::Vox => fake.set_raw_state(0_i64),
        PlayerName::ITunes | PlayerName::Spotify => fake.set_raw_state("kPSp"),
    }
    fake.set_rate(0.0);
}

pub fn stop_playing(name: PlayerName, fake: &FakePlayer) {
    match name {
        PlayerName::Vox => fake.set_raw_state(-1_i64),
        PlayerName::ITunes | PlayerName::Spotify => fake.set_raw_state("kPSS"),
    }
    fake.set_rate(0.0);
}

/// A state notification as posted by iTunes or Spotify.
pub fn state_notification(name: PlayerName, state: &str) -> Notification {
    Notification::new(name.notification_name()).with_info("Player State", state)
}

// ============================================================================
// Recorders
// ============================================================================

pub type DriverLog = Rc<RefCell<Vec<(PlayerName, PlayerEvent)>>>;

pub fn driver_recorder() -> (EventSink, DriverLog) {
    let log: DriverLog = Rc::new(RefCell::new(Vec::new()));
    let sink_log = Rc::clone(&log);
    let sink: EventSink = Rc::new(move |player, event| sink_log.borrow_mut().push((player, event)));
    (sink, log)
}

pub type ManagerLog = Rc<RefCell<Vec<ManagerEvent>>>;

pub fn manager_recorder() -> (Rc<dyn ManagerListener>, ManagerLog) {
    let log: ManagerLog = Rc::new(RefCell::new(Vec::new()));
    let listener_log = Rc::clone(&log);
    let listener = move |event: &ManagerEvent| listener_log.borrow_mut().push(event.clone());
    (Rc::new(listener), log)
}

/// Drains and returns everything recorded so far.
pub fn take<T>(log: &Rc<RefCell<Vec<T>>>) -> Vec<T> {
    std::mem::take(&mut *log.borrow_mut())
}
