//! Workspace facade crate.
//!
//! Re-exports the individual workspace crates (`bridge-traits`, `core-runtime`,
//! `core-player`) so host applications can depend on `music-player-core` alone
//! without wiring each crate individually.

pub use bridge_traits;
pub use core_player;
pub use core_runtime;

pub use bridge_traits::{AutomationProvider, PlayerAutomation, PlayerName};
pub use core_player::{
    EventBus, ManagerEvent, ManagerListener, MusicPlayerManager, PlaybackState, PlayerDriver,
    PlayerFactory, RepeatMode, ShuffleMode, Track,
};
pub use core_runtime::{CoreConfig, RunLoop, TimerDispatcher, TrackingConfig};
