//! # Player Tracking Module
//!
//! Unified, event-driven control of external media players.
//!
//! ## Overview
//!
//! This module handles:
//! - Normalizing each player's raw values and notifications ([`backend`])
//! - Inferring seeks and rate changes from position drift ([`drift`])
//! - Tracking a single player and emitting canonical events ([`driver`])
//! - Constructing drivers for known players ([`factory`])
//! - Selecting and failing over between players ([`manager`])
//! - Publishing manager events to async consumers ([`events`])
//!
//! Everything here is single-threaded and runs on the `core_runtime`
//! [`RunLoop`](core_runtime::RunLoop).

pub mod backend;
pub mod drift;
pub mod driver;
pub mod error;
pub mod events;
pub mod factory;
pub mod manager;
pub mod types;

pub use backend::{Backend, Capabilities};
pub use driver::{EventSink, PlayerDriver};
pub use error::{PlayerError, Result};
pub use events::{EventBus, EventSeverity, EventStream, ManagerEvent, ManagerListener, PlayerEvent};
pub use factory::PlayerFactory;
pub use manager::MusicPlayerManager;
pub use types::{PlaybackState, RepeatMode, ShuffleMode, Track};
