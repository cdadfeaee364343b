//! # Host Bridge Traits
//!
//! Capability traits that the host application must implement for the player core.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and the
//! platform-specific code that actually talks to external media players. Each
//! trait represents a capability the core requires but cannot implement
//! portably.
//!
//! ## Traits
//!
//! ### Player Automation
//! - [`PlayerAutomation`](automation::PlayerAutomation) - Read/write one external player's
//!   position, state, modes and now-playing metadata; subscribe to its notifications
//! - [`AutomationProvider`](automation::AutomationProvider) - Resolve a handle for a
//!   [`PlayerName`](automation::PlayerName)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let automation = builder.automation
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "AutomationProvider".to_string(),
//!         message: "Inject the host's player automation bridge.".to_string(),
//!     })?;
//! ```
//!
//! ## Threading
//!
//! Automation handles live on the host's run-loop thread and are shared with
//! `Rc`; they are not `Send`. `Clock` and `LoggerSink` are `Send + Sync`
//! because the logging layer may forward entries from any thread.

pub mod automation;
pub mod error;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use automation::{
    AutomationProvider, Notification, NotificationHandler, PlayerAutomation, PlayerName, RawTrack,
    ScriptValue, SubscriptionId,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
