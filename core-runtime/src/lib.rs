//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the player core:
//! - Cooperative run loop hosting every timer of the core
//! - Coalescing timer dispatcher for periodic polls
//! - Configuration management
//! - Logging and tracing infrastructure
//!
//! ## Overview
//!
//! Everything in the player core runs on one logical thread. The
//! [`RunLoop`](run_loop::RunLoop) is that thread's timer host; the
//! [`TimerDispatcher`](dispatcher::TimerDispatcher) multiplexes per-driver
//! polls onto a single timer on it. Both are `!Send` and are shared with `Rc`.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod run_loop;

pub use config::{CoreConfig, CoreConfigBuilder, TrackingConfig};
pub use dispatcher::{DispatchKey, TimerDispatcher};
pub use error::{Error, Result};
pub use run_loop::{RunLoop, TimerId};
