//! # Player Factory
//!
//! The one place that maps a [`PlayerName`] to a constructible driver. A new
//! backend variant is registered here and in [`Backend`](crate::backend::Backend).

use std::fmt;
use std::rc::Rc;

use bridge_traits::automation::{AutomationProvider, PlayerName};
use core_runtime::config::{CoreConfig, TrackingConfig};
use core_runtime::dispatcher::TimerDispatcher;
use tracing::debug;

use crate::driver::PlayerDriver;
use crate::error::{PlayerError, Result};

/// Builds [`PlayerDriver`]s sharing one automation provider and dispatcher.
#[derive(Clone)]
pub struct PlayerFactory {
    automation: Rc<dyn AutomationProvider>,
    dispatcher: TimerDispatcher,
    tracking: TrackingConfig,
}

impl PlayerFactory {
    /// # Errors
    ///
    /// Returns [`PlayerError::Runtime`] if the configuration is invalid.
    pub fn new(config: &CoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            automation: Rc::clone(&config.automation),
            dispatcher: config.dispatcher.clone(),
            tracking: config.tracking,
        })
    }

    /// Players this factory knows how to drive.
    pub fn supported() -> &'static [PlayerName] {
        &PlayerName::ALL
    }

    pub fn dispatcher(&self) -> &TimerDispatcher {
        &self.dispatcher
    }

    /// Creates an idle driver for `player`.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::Unavailable`] when the automation layer cannot
    /// resolve a handle, e.g. because the application is not installed.
    pub fn create(&self, player: PlayerName) -> Result<PlayerDriver> {
        let automation = self.automation.resolve(player).ok_or_else(|| {
            debug!(%player, "Automation handle unavailable");
            PlayerError::Unavailable(player)
        })?;
        Ok(PlayerDriver::new(
            player,
            automation,
            self.dispatcher.clone(),
            self.tracking,
        ))
    }

    /// Creates a driver for every supported player that can be resolved.
    pub fn create_available(&self) -> Vec<PlayerDriver> {
        Self::supported()
            .iter()
            .filter_map(|player| self.create(*player).ok())
            .collect()
    }
}

impl fmt::Debug for PlayerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerFactory")
            .field("automation", &"AutomationProvider { ... }")
            .field("dispatcher", &self.dispatcher)
            .field("tracking", &self.tracking)
            .finish()
    }
}
