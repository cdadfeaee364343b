//! # Player Error Types
//!
//! Errors surface only at construction and registration boundaries. Once a
//! driver is tracking, failures are logged and turned into neutral defaults.

use bridge_traits::automation::PlayerName;
use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Errors that can occur while building or wiring player drivers.
#[derive(Error, Debug)]
pub enum PlayerError {
    // ========================================================================
    // Construction Errors
    // ========================================================================
    /// The automation layer could not resolve a handle for the player.
    #[error("Player unavailable: {0}")]
    Unavailable(PlayerName),

    // ========================================================================
    // Wiring Errors
    // ========================================================================
    /// Subscribing to the player's notification stream failed.
    #[error("Failed to subscribe to {player} notifications: {source}")]
    Subscription {
        player: PlayerName,
        #[source]
        source: BridgeError,
    },

    /// The runtime rejected a timer registration.
    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl PlayerError {
    /// Returns the player the error refers to, when there is one.
    pub fn player(&self) -> Option<PlayerName> {
        match self {
            PlayerError::Unavailable(player) => Some(*player),
            PlayerError::Subscription { player, .. } => Some(*player),
            PlayerError::Runtime(_) => None,
        }
    }

    /// Unavailability is expected whenever a player is not installed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PlayerError::Unavailable(_))
    }
}

/// Result type for player operations.
pub type Result<T> = std::result::Result<T, PlayerError>;
