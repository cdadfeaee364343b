//! # Timer Dispatcher
//!
//! Coalesces many "call me roughly every P" requests onto a single repeating
//! timer on the [`RunLoop`].
//!
//! ## Semantics
//!
//! - The shared interval is the **minimum** precision across all current
//!   registrations. Every registered callback runs on every tick, so a
//!   registration is called at least as often as it asked for, and possibly
//!   more often.
//! - Registering an existing key replaces its precision and callback.
//! - Removing the last registration stops the shared timer; the next
//!   registration starts it again.
//! - Each tick iterates over a snapshot of the registrations and re-checks
//!   membership before every call, so a callback may register or unregister
//!   any key (itself included) mid-tick. A key removed during a tick is not
//!   called later in that tick.
//!
//! ```text
//!   idle ──register──▶ active ──register/unregister (others remain)──▶ active
//!    ▲                   │
//!    └───unregister last─┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use core_runtime::dispatcher::TimerDispatcher;
//! use std::time::Duration;
//!
//! let dispatcher = TimerDispatcher::new(run_loop.clone());
//! let key = dispatcher.next_key();
//! dispatcher.register(key, Duration::from_millis(500), |_interval| {
//!     // poll the player
//! })?;
//! dispatcher.unregister(key);
//! ```

use crate::error::{Error, Result};
use crate::run_loop::{RunLoop, TimerId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Identity of one dispatcher registration.
///
/// Keys are issued by [`TimerDispatcher::next_key`] from a per-dispatcher
/// counter and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchKey(u64);

/// Callback invoked on every tick with the current shared interval.
type TickCallback = Rc<RefCell<dyn FnMut(Duration)>>;

struct Registration {
    precision: Duration,
    callback: TickCallback,
}

#[derive(Clone, Copy)]
struct ActiveTimer {
    id: TimerId,
    interval: Duration,
}

struct DispatcherInner {
    run_loop: RunLoop,
    registrations: RefCell<HashMap<DispatchKey, Registration>>,
    timer: Cell<Option<ActiveTimer>>,
    next_key: Cell<u64>,
}

/// Coalescing periodic-callback multiplexer. Clones share the same registrations.
#[derive(Clone)]
pub struct TimerDispatcher {
    inner: Rc<DispatcherInner>,
}

impl TimerDispatcher {
    pub fn new(run_loop: RunLoop) -> Self {
        Self {
            inner: Rc::new(DispatcherInner {
                run_loop,
                registrations: RefCell::new(HashMap::new()),
                timer: Cell::new(None),
                next_key: Cell::new(1),
            }),
        }
    }

    pub fn run_loop(&self) -> &RunLoop {
        &self.inner.run_loop
    }

    /// Issues a fresh registration key.
    pub fn next_key(&self) -> DispatchKey {
        let key = DispatchKey(self.inner.next_key.get());
        self.inner.next_key.set(key.0 + 1);
        key
    }

    /// Registers (or replaces) `key` with the given precision and callback,
    /// then restarts the shared timer at the minimum precision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPrecision`] if `precision` is zero.
    pub fn register<F>(&self, key: DispatchKey, precision: Duration, callback: F) -> Result<()>
    where
        F: FnMut(Duration) + 'static,
    {
        if precision.is_zero() {
            return Err(Error::InvalidPrecision(precision));
        }

        let replaced = self
            .inner
            .registrations
            .borrow_mut()
            .insert(
                key,
                Registration {
                    precision,
                    callback: Rc::new(RefCell::new(callback)),
                },
            )
            .is_some();

        debug!(?key, ?precision, replaced, "Dispatcher registration added");
        self.inner.reschedule();
        Ok(())
    }

    /// Removes `key`. Returns `false` if it was not registered.
    pub fn unregister(&self, key: DispatchKey) -> bool {
        let removed = self
            .inner
            .registrations
            .borrow_mut()
            .remove(&key)
            .is_some();

        if removed {
            debug!(?key, "Dispatcher registration removed");
            self.inner.reschedule();
        }
        removed
    }

    pub fn is_registered(&self, key: DispatchKey) -> bool {
        self.inner.registrations.borrow().contains_key(&key)
    }

    /// Current shared interval, or `None` while idle.
    pub fn interval(&self) -> Option<Duration> {
        self.inner.timer.get().map(|active| active.interval)
    }

    /// Whether the shared timer is running.
    pub fn is_active(&self) -> bool {
        self.inner.timer.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.registrations.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DispatcherInner {
    fn reschedule(self: &Rc<Self>) {
        if let Some(active) = self.timer.take() {
            self.run_loop.cancel(active.id);
        }

        let min_precision = self
            .registrations
            .borrow()
            .values()
            .map(|registration| registration.precision)
            .min();

        let Some(interval) = min_precision else {
            debug!("Dispatcher idle");
            return;
        };

        let weak: Weak<Self> = Rc::downgrade(self);
        let id = self.run_loop.schedule_repeating(interval, move || {
            if let Some(inner) = weak.upgrade() {
                inner.tick();
            }
        });
        self.timer.set(Some(ActiveTimer { id, interval }));
        debug!(?interval, "Dispatcher timer started");
    }

    fn tick(&self) {
        let Some(interval) = self.timer.get().map(|active| active.interval) else {
            return;
        };

        let snapshot: Vec<(DispatchKey, TickCallback)> = self
            .registrations
            .borrow()
            .iter()
            .map(|(key, registration)| (*key, Rc::clone(&registration.callback)))
            .collect();

        trace!(callbacks = snapshot.len(), "Dispatcher tick");

        for (key, callback) in snapshot {
            // Skip keys removed or replaced by an earlier callback in this tick.
            let current = self
                .registrations
                .borrow()
                .get(&key)
                .map(|registration| Rc::ptr_eq(&registration.callback, &callback))
                .unwrap_or(false);
            if !current {
                continue;
            }

            if let Ok(mut callback) = callback.try_borrow_mut() {
                (*callback)(interval);
            }
        }
    }
}

impl Drop for DispatcherInner {
    fn drop(&mut self) {
        if let Some(active) = self.timer.take() {
            self.run_loop.cancel(active.id);
        }
    }
}

impl fmt::Debug for TimerDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerDispatcher")
            .field("registrations", &self.len())
            .field("interval", &self.interval())
            .finish()
    }
}
