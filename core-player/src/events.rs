//! # Player Events
//!
//! Canonical events produced by drivers and re-published by the manager.
//!
//! ## Overview
//!
//! - [`PlayerEvent`]: what a single [`PlayerDriver`](crate::driver::PlayerDriver)
//!   reports to its owner.
//! - [`ManagerEvent`]: what the [`MusicPlayerManager`](crate::manager::MusicPlayerManager)
//!   reports to its listener, tagged with the player it concerns. Only the
//!   tracked player's events are re-published.
//! - [`EventBus`]: a `tokio::sync::broadcast` fan-out that can be installed as
//!   the manager's listener, for consumers living outside the run loop.
//!
//! ## Architecture
//!
//! ```text
//!   PlayerAutomation ──notify/poll──▶ PlayerDriver ──PlayerEvent──▶ MusicPlayerManager
//!                                                                        │
//!                                                          ManagerEvent  ▼
//!                                                   ManagerListener / EventBus ──▶ subscribers
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use core_player::events::{EventBus, ManagerEvent};
//!
//! let bus = EventBus::default();
//! let mut events = bus.subscribe();
//! let manager = MusicPlayerManager::with_listener(config, Rc::new(bus.clone()));
//!
//! while let Ok(event) = events.recv().await {
//!     println!("{}", event.description());
//! }
//! ```

use bridge_traits::automation::PlayerName;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

use crate::types::{PlaybackState, Track};

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Driver Events
// ============================================================================

/// Event emitted by one driver. Positions are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// A track with a new id started.
    TrackChanged { track: Track, position: f64 },
    /// Playback state changed, or a transient reposition was detected.
    PlaybackChanged { state: PlaybackState, position: f64 },
    /// The player process went away.
    Quit,
}

impl PlayerEvent {
    pub fn description(&self) -> &str {
        match self {
            PlayerEvent::TrackChanged { .. } => "Track changed",
            PlayerEvent::PlaybackChanged { .. } => "Playback state changed",
            PlayerEvent::Quit => "Player quit",
        }
    }

    /// Quit is terminal for the driver's current activation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlayerEvent::Quit)
    }
}

// ============================================================================
// Manager Events
// ============================================================================

/// Event emitted by the manager to its listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManagerEvent {
    TrackChanged {
        player: PlayerName,
        track: Track,
        position: f64,
    },
    PlaybackChanged {
        player: PlayerName,
        state: PlaybackState,
        position: f64,
    },
    Quit {
        player: PlayerName,
    },
    /// The tracked player changed; `None` when nothing can be tracked.
    TrackedPlayerChanged {
        player: Option<PlayerName>,
    },
}

impl ManagerEvent {
    /// Tags a driver event with the player it came from.
    pub fn from_player(player: PlayerName, event: PlayerEvent) -> Self {
        match event {
            PlayerEvent::TrackChanged { track, position } => ManagerEvent::TrackChanged {
                player,
                track,
                position,
            },
            PlayerEvent::PlaybackChanged { state, position } => ManagerEvent::PlaybackChanged {
                player,
                state,
                position,
            },
            PlayerEvent::Quit => ManagerEvent::Quit { player },
        }
    }

    /// The player the event concerns.
    pub fn player(&self) -> Option<PlayerName> {
        match self {
            ManagerEvent::TrackChanged { player, .. }
            | ManagerEvent::PlaybackChanged { player, .. }
            | ManagerEvent::Quit { player } => Some(*player),
            ManagerEvent::TrackedPlayerChanged { player } => *player,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ManagerEvent::TrackChanged { .. } => "Track changed",
            ManagerEvent::PlaybackChanged { .. } => "Playback state changed",
            ManagerEvent::Quit { .. } => "Tracked player quit",
            ManagerEvent::TrackedPlayerChanged { .. } => "Tracked player changed",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            ManagerEvent::Quit { .. } => EventSeverity::Warning,
            ManagerEvent::TrackedPlayerChanged { .. } | ManagerEvent::TrackChanged { .. } => {
                EventSeverity::Info
            }
            ManagerEvent::PlaybackChanged { .. } => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Listener
// ============================================================================

/// Receives the manager's events on the run-loop thread.
///
/// Implemented for every `Fn(&ManagerEvent)` closure and for [`EventBus`].
pub trait ManagerListener {
    fn on_event(&self, event: &ManagerEvent);
}

impl<F> ManagerListener for F
where
    F: Fn(&ManagerEvent),
{
    fn on_event(&self, event: &ManagerEvent) {
        self(event)
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel of [`ManagerEvent`]s.
///
/// The sender half is `Send + Sync`, so subscribers may live on other tasks or
/// threads even though the manager itself is confined to the run loop.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ManagerEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event. Fails when nobody is subscribed.
    pub fn emit(&self, event: ManagerEvent) -> Result<usize, SendError<ManagerEvent>> {
        self.sender.send(event)
    }

    /// Creates a receiver for all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<ManagerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl ManagerListener for EventBus {
    fn on_event(&self, event: &ManagerEvent) {
        // No subscribers is not an error for the manager.
        let _ = self.emit(event.clone());
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&ManagerEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter, e.g. one player only.
pub struct EventStream {
    receiver: Receiver<ManagerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<ManagerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ManagerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<ManagerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is queued.
    pub fn try_recv(&mut self) -> Option<Result<ManagerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn accepts(&self, event: &ManagerEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn track_changed(player: PlayerName) -> ManagerEvent {
        ManagerEvent::TrackChanged {
            player,
            track: Track::new("1", "One", 60.0),
            position: 0.0,
        }
    }

    #[test]
    fn test_from_player_tags_events() {
        let event = ManagerEvent::from_player(
            PlayerName::Vox,
            PlayerEvent::PlaybackChanged {
                state: PlaybackState::Paused,
                position: 3.5,
            },
        );
        assert_eq!(
            event,
            ManagerEvent::PlaybackChanged {
                player: PlayerName::Vox,
                state: PlaybackState::Paused,
                position: 3.5,
            }
        );
        assert_eq!(
            ManagerEvent::from_player(PlayerName::ITunes, PlayerEvent::Quit).player(),
            Some(PlayerName::ITunes)
        );
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(ManagerEvent::TrackedPlayerChanged {
            player: Some(PlayerName::Spotify),
        })
        .unwrap();
        assert_eq!(json["type"], "tracked_player_changed");
        assert_eq!(json["player"], "spotify");

        let json = serde_json::to_value(PlayerEvent::Quit).unwrap();
        assert_eq!(json["type"], "quit");
    }

    #[test]
    fn test_severity_and_description() {
        let quit = ManagerEvent::Quit {
            player: PlayerName::Vox,
        };
        assert_eq!(quit.severity(), EventSeverity::Warning);
        assert_eq!(quit.description(), "Tracked player quit");
        assert!(track_changed(PlayerName::Vox).severity() > EventSeverity::Debug);
        assert!(PlayerEvent::Quit.is_terminal());
    }

    #[test]
    fn test_closures_are_listeners() {
        let seen = RefCell::new(Vec::new());
        let listener = |event: &ManagerEvent| seen.borrow_mut().push(event.clone());
        listener.on_event(&track_changed(PlayerName::ITunes));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_event_bus_fan_out() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = track_changed(PlayerName::Spotify);
        bus.on_event(&event);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_bus_without_subscribers() {
        let bus = EventBus::default();
        assert!(bus.emit(track_changed(PlayerName::Vox)).is_err());
        // the listener path swallows the error
        bus.on_event(&track_changed(PlayerName::Vox));
    }

    #[tokio::test]
    async fn test_event_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| event.player() == Some(PlayerName::Vox));

        bus.on_event(&track_changed(PlayerName::ITunes));
        bus.on_event(&track_changed(PlayerName::Vox));

        let received = stream.recv().await.unwrap();
        assert_eq!(received.player(), Some(PlayerName::Vox));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut stream = EventStream::new(bus.subscribe());
        for _ in 0..5 {
            bus.on_event(&track_changed(PlayerName::ITunes));
        }
        assert!(matches!(stream.try_recv(), Some(Err(RecvError::Lagged(_)))));
    }
}
