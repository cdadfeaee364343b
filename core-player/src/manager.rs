//! # Music Player Manager
//!
//! Owns a set of [`PlayerDriver`]s and keeps exactly one of them "tracked".
//!
//! ## Selection
//!
//! The tracked player is re-evaluated whenever a player changes state,
//! quits, is added or removed, or the preferred player changes. In priority
//! order the manager picks:
//!
//! 1. the preferred player, if it has been added;
//! 2. the tracked player, if it is active;
//! 3. the first active player, in insertion order;
//! 4. the tracked player, if it is running;
//! 5. the first running player;
//! 6. nothing.
//!
//! A tracked player that keeps playing is never displaced by another player
//! starting playback.
//!
//! ## Forwarding
//!
//! Only the tracked player's events reach the listener. Its events are
//! forwarded before the selection is re-evaluated, so a listener sees
//! `PlaybackChanged(X, Stopped)` before `TrackedPlayerChanged(Y)`. When the
//! tracked player changes, the manager follows `TrackedPlayerChanged` with a
//! `TrackChanged` snapshot of the new player's current track.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bridge_traits::automation::PlayerName;
use core_runtime::config::CoreConfig;
use tracing::{debug, info, warn};

use crate::driver::{EventSink, PlayerDriver};
use crate::error::Result;
use crate::events::{ManagerEvent, ManagerListener, PlayerEvent};
use crate::factory::PlayerFactory;
use crate::types::{PlaybackState, RepeatMode, ShuffleMode, Track};

/// Coordinates several players and exposes the tracked one.
///
/// Dropping the manager stops tracking every player.
pub struct MusicPlayerManager {
    inner: Rc<ManagerInner>,
}

struct ManagerInner {
    factory: PlayerFactory,
    drivers: RefCell<Vec<Rc<PlayerDriver>>>,
    tracked: Cell<Option<PlayerName>>,
    preferred: Cell<Option<PlayerName>>,
    listener: RefCell<Option<Rc<dyn ManagerListener>>>,
}

impl MusicPlayerManager {
    /// Creates a manager with no players and no listener.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Runtime`](crate::error::PlayerError::Runtime)
    /// if the configuration is invalid.
    pub fn new(config: CoreConfig) -> Result<Self> {
        let factory = PlayerFactory::new(&config)?;
        Ok(Self {
            inner: Rc::new(ManagerInner {
                factory,
                drivers: RefCell::new(Vec::new()),
                tracked: Cell::new(None),
                preferred: Cell::new(config.preferred_player),
                listener: RefCell::new(None),
            }),
        })
    }

    pub fn with_listener(config: CoreConfig, listener: Rc<dyn ManagerListener>) -> Result<Self> {
        let manager = Self::new(config)?;
        manager.set_listener(listener);
        Ok(manager)
    }

    pub fn set_listener(&self, listener: Rc<dyn ManagerListener>) {
        *self.inner.listener.borrow_mut() = Some(listener);
    }

    pub fn clear_listener(&self) {
        self.inner.listener.borrow_mut().take();
    }

    // ========================================================================
    // Player set
    // ========================================================================

    /// Adds and starts tracking `player`. Adding a player twice does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Unavailable`](crate::error::PlayerError::Unavailable)
    /// when the player cannot be reached, or
    /// [`PlayerError::Subscription`](crate::error::PlayerError::Subscription)
    /// when its notifications cannot be subscribed. The player is not added
    /// in either case.
    pub fn add(&self, player: PlayerName) -> Result<()> {
        if self.contains(player) {
            return Ok(());
        }

        let driver = Rc::new(self.inner.factory.create(player)?);
        driver.set_event_sink(self.inner.event_sink());
        self.inner.drivers.borrow_mut().push(Rc::clone(&driver));

        if let Err(error) = driver.start_tracking() {
            self.inner.detach(player);
            return Err(error);
        }
        info!(%player, "Player added");
        self.inner.reselect();
        Ok(())
    }

    /// Adds every player that can be reached and returns the ones now present.
    pub fn add_all(&self, players: impl IntoIterator<Item = PlayerName>) -> Vec<PlayerName> {
        for player in players {
            if let Err(error) = self.add(player) {
                warn!(%player, %error, "Skipping player");
            }
        }
        self.players()
    }

    /// Stops tracking and discards `player`. Returns `false` if it was not added.
    pub fn remove(&self, player: PlayerName) -> bool {
        let Some(driver) = self.inner.detach(player) else {
            return false;
        };
        driver.stop_tracking();
        info!(%player, "Player removed");

        if self.inner.tracked.get() == Some(player) {
            self.inner.reselect();
        }
        true
    }

    pub fn remove_all(&self) {
        for player in self.players() {
            self.remove(player);
        }
    }

    pub fn contains(&self, player: PlayerName) -> bool {
        self.inner.driver(player).is_some()
    }

    /// Added players, in insertion order.
    pub fn players(&self) -> Vec<PlayerName> {
        self.inner
            .drivers
            .borrow()
            .iter()
            .map(|driver| driver.name())
            .collect()
    }

    pub fn tracked_player(&self) -> Option<PlayerName> {
        self.inner.tracked.get()
    }

    pub fn preferred_player(&self) -> Option<PlayerName> {
        self.inner.preferred.get()
    }

    /// Sets the player that always wins selection while it is added.
    pub fn set_preferred_player(&self, player: Option<PlayerName>) {
        if self.inner.preferred.replace(player) != player {
            debug!(?player, "Preferred player changed");
            self.inner.reselect();
        }
    }

    /// Brings `player` to the foreground, adding it first when
    /// `add_if_needed` is set. Returns `false` if the player is not added.
    pub fn activate(&self, player: PlayerName, add_if_needed: bool) -> Result<bool> {
        if !self.contains(player) {
            if !add_if_needed {
                return Ok(false);
            }
            self.add(player)?;
        }
        match self.inner.driver(player) {
            Some(driver) => {
                driver.activate();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // Tracked-player passthrough
    // ========================================================================

    fn tracked(&self) -> Option<Rc<PlayerDriver>> {
        self.inner.tracked.get().and_then(|name| self.inner.driver(name))
    }

    pub fn play(&self) {
        if let Some(driver) = self.tracked() {
            driver.play();
        }
    }

    pub fn pause(&self) {
        if let Some(driver) = self.tracked() {
            driver.pause();
        }
    }

    pub fn stop(&self) {
        if let Some(driver) = self.tracked() {
            driver.stop();
        }
    }

    pub fn play_pause(&self) {
        if let Some(driver) = self.tracked() {
            driver.play_pause();
        }
    }

    pub fn next_track(&self) {
        if let Some(driver) = self.tracked() {
            driver.next_track();
        }
    }

    pub fn previous_track(&self) {
        if let Some(driver) = self.tracked() {
            driver.previous_track();
        }
    }

    pub fn seek(&self, position: f64) {
        if let Some(driver) = self.tracked() {
            driver.seek(position);
        }
    }

    pub fn position(&self) -> f64 {
        self.tracked().map_or(0.0, |driver| driver.position())
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.tracked()
            .map_or(PlaybackState::Stopped, |driver| driver.playback_state())
    }

    pub fn current_track(&self) -> Option<Track> {
        self.tracked().and_then(|driver| driver.current_track())
    }

    pub fn repeat_mode(&self) -> Option<RepeatMode> {
        self.tracked().and_then(|driver| driver.repeat_mode())
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        if let Some(driver) = self.tracked() {
            driver.set_repeat_mode(mode);
        }
    }

    pub fn shuffle_mode(&self) -> Option<ShuffleMode> {
        self.tracked().and_then(|driver| driver.shuffle_mode())
    }

    pub fn set_shuffle_mode(&self, mode: ShuffleMode) {
        if let Some(driver) = self.tracked() {
            driver.set_shuffle_mode(mode);
        }
    }
}

impl Drop for MusicPlayerManager {
    fn drop(&mut self) {
        let drivers: Vec<_> = self.inner.drivers.borrow_mut().drain(..).collect();
        for driver in drivers {
            driver.clear_event_sink();
            driver.stop_tracking();
        }
    }
}

impl fmt::Debug for MusicPlayerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MusicPlayerManager")
            .field("players", &self.players())
            .field("tracked", &self.inner.tracked.get())
            .field("preferred", &self.inner.preferred.get())
            .finish()
    }
}

// ============================================================================
// Selection and forwarding
// ============================================================================

impl ManagerInner {
    fn event_sink(self: &Rc<Self>) -> EventSink {
        let weak = Rc::downgrade(self);
        Rc::new(move |player, event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_player_event(player, event);
            }
        })
    }

    fn driver(&self, player: PlayerName) -> Option<Rc<PlayerDriver>> {
        self.drivers
            .borrow()
            .iter()
            .find(|driver| driver.name() == player)
            .cloned()
    }

    fn detach(&self, player: PlayerName) -> Option<Rc<PlayerDriver>> {
        let mut drivers = self.drivers.borrow_mut();
        let index = drivers.iter().position(|driver| driver.name() == player)?;
        let driver = drivers.remove(index);
        driver.clear_event_sink();
        Some(driver)
    }

    fn notify(&self, event: ManagerEvent) {
        let Some(listener) = self.listener.borrow().clone() else {
            return;
        };
        listener.on_event(&event);
    }

    fn handle_player_event(&self, player: PlayerName, event: PlayerEvent) {
        let affects_selection = match &event {
            PlayerEvent::PlaybackChanged { state, .. } => !state.is_transient(),
            _ => event.is_terminal(),
        };

        if self.tracked.get() == Some(player) {
            self.notify(ManagerEvent::from_player(player, event));
            if affects_selection {
                self.reselect();
            }
            return;
        }

        // A new track on an untracked player may mean it just started playing.
        let track_changed = matches!(event, PlayerEvent::TrackChanged { .. });
        if !affects_selection && !track_changed {
            return;
        }
        // The snapshot sent on selection already covers the track; only the
        // state change that caused the switch is forwarded.
        if self.reselect() && self.tracked.get() == Some(player) {
            if let PlayerEvent::PlaybackChanged { .. } = event {
                self.notify(ManagerEvent::from_player(player, event));
            }
        }
    }

    fn select(&self) -> Option<PlayerName> {
        let drivers: Vec<Rc<PlayerDriver>> = self.drivers.borrow().clone();
        let contains = |name: PlayerName| drivers.iter().any(|driver| driver.name() == name);

        if let Some(preferred) = self.preferred.get().filter(|name| contains(*name)) {
            return Some(preferred);
        }

        let tracked = self
            .tracked
            .get()
            .and_then(|name| drivers.iter().find(|driver| driver.name() == name));
        let is_active = |driver: &&Rc<PlayerDriver>| driver.playback_state().is_active();
        let is_running = |driver: &&Rc<PlayerDriver>| driver.is_running();

        tracked
            .filter(is_active)
            .or_else(|| drivers.iter().find(is_active))
            .or_else(|| tracked.filter(is_running))
            .or_else(|| drivers.iter().find(is_running))
            .map(|driver| driver.name())
    }

    /// Re-evaluates the tracked player. Returns `true` if it changed.
    fn reselect(&self) -> bool {
        let selected = self.select();
        let previous = self.tracked.replace(selected);
        if selected == previous {
            return false;
        }

        info!(?previous, ?selected, "Tracked player changed");
        self.notify(ManagerEvent::TrackedPlayerChanged { player: selected });

        // A listener may already have changed the selection again.
        if self.tracked.get() != selected {
            return true;
        }
        if let Some(driver) = selected.and_then(|name| self.driver(name)) {
            if let Some(track) = driver.current_track() {
                self.notify(ManagerEvent::TrackChanged {
                    player: driver.name(),
                    track,
                    position: driver.position(),
                });
            }
        }
        true
    }
}
