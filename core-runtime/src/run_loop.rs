//! # Cooperative Run Loop
//!
//! A single-threaded timer host. Every timer callback, notification handler
//! and driver state transition in the player core runs on the thread that
//! drives this loop, so none of them need locks.
//!
//! ## Driving the loop
//!
//! - Production: spawn [`RunLoop::run`] on a tokio `LocalSet` (the loop is
//!   `!Send`). It sleeps until the next deadline or until a new timer is
//!   scheduled, and exits when the cancellation token fires.
//! - Tests: pair the loop with a [`ManualClock`] and call
//!   [`RunLoop::advance`], which steps the clock deadline by deadline and
//!   fires everything that comes due.
//!
//! ```ignore
//! use bridge_traits::SystemClock;
//! use core_runtime::run_loop::RunLoop;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! let run_loop = RunLoop::new(Arc::new(SystemClock));
//! let shutdown = CancellationToken::new();
//! let local = tokio::task::LocalSet::new();
//! local.spawn_local({
//!     let run_loop = run_loop.clone();
//!     let shutdown = shutdown.clone();
//!     async move { run_loop.run(shutdown).await }
//! });
//! ```

use bridge_traits::time::{Clock, ManualClock};
use chrono::{DateTime, TimeDelta, Utc};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Zero intervals would make a repeating timer due forever within one `fire_due` pass.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Identifier of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

type TimerCallback = Rc<RefCell<dyn FnMut()>>;

struct Timer {
    deadline: DateTime<Utc>,
    interval: Option<TimeDelta>,
    callback: TimerCallback,
}

struct RunLoopInner {
    clock: Arc<dyn Clock>,
    timers: RefCell<BTreeMap<TimerId, Timer>>,
    next_id: Cell<u64>,
    wake: Notify,
}

/// Handle to a cooperative run loop. Clones share the same loop.
#[derive(Clone)]
pub struct RunLoop {
    inner: Rc<RunLoopInner>,
}

impl RunLoop {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Rc::new(RunLoopInner {
                clock,
                timers: RefCell::new(BTreeMap::new()),
                next_id: Cell::new(1),
                wake: Notify::new(),
            }),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Whether both handles refer to the same loop.
    pub fn ptr_eq(&self, other: &RunLoop) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Schedules `callback` to run once after `delay`.
    pub fn schedule_once<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnMut() + 'static,
    {
        self.insert(delay, None, Rc::new(RefCell::new(callback)))
    }

    /// Schedules `callback` to run every `interval`, first firing one interval from now.
    ///
    /// A timer that falls behind fires once and is re-anchored to the current
    /// time instead of replaying every missed period.
    pub fn schedule_repeating<F>(&self, interval: Duration, callback: F) -> TimerId
    where
        F: FnMut() + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        self.insert(
            interval,
            Some(to_delta(interval)),
            Rc::new(RefCell::new(callback)),
        )
    }

    fn insert(
        &self,
        delay: Duration,
        interval: Option<TimeDelta>,
        callback: TimerCallback,
    ) -> TimerId {
        let id = TimerId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        let deadline = self.now() + to_delta(delay);
        self.inner.timers.borrow_mut().insert(
            id,
            Timer {
                deadline,
                interval,
                callback,
            },
        );
        self.inner.wake.notify_one();
        id
    }

    /// Cancels a timer. Returns `false` if it already fired (one-shot) or was cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().remove(&id).is_some()
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.inner.timers.borrow().contains_key(&id)
    }

    /// Number of timers currently scheduled.
    pub fn pending(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.inner
            .timers
            .borrow()
            .values()
            .map(|timer| timer.deadline)
            .min()
    }

    /// Fires every timer whose deadline has passed, earliest first.
    ///
    /// Callbacks may schedule or cancel timers (including themselves). The
    /// timer table is never borrowed while a callback runs.
    ///
    /// Returns the number of callbacks invoked.
    pub fn fire_due(&self) -> usize {
        let mut fired = 0;
        loop {
            let now = self.now();
            let callback = {
                let mut timers = self.inner.timers.borrow_mut();
                let next = timers
                    .iter()
                    .filter(|(_, timer)| timer.deadline <= now)
                    .min_by_key(|(id, timer)| (timer.deadline, **id))
                    .map(|(id, _)| *id);
                let Some(id) = next else {
                    break;
                };

                let interval = timers.get(&id).and_then(|timer| timer.interval);
                match interval {
                    Some(interval) => {
                        let Some(timer) = timers.get_mut(&id) else {
                            break;
                        };
                        timer.deadline += interval;
                        if timer.deadline <= now {
                            timer.deadline = now + interval;
                        }
                        Rc::clone(&timer.callback)
                    }
                    None => match timers.remove(&id) {
                        Some(timer) => timer.callback,
                        None => break,
                    },
                }
            };

            // A callback that re-enters fire_due must not be invoked recursively.
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (*callback)();
            }
            fired += 1;
        }
        fired
    }

    /// Advances `clock` by `by`, firing timers at their exact deadlines on the way.
    ///
    /// `clock` must be the clock this loop was created with.
    pub fn advance(&self, clock: &ManualClock, by: Duration) -> usize {
        let target = clock.now() + to_delta(by);
        let mut fired = 0;

        while let Some(deadline) = self.next_deadline() {
            if deadline > target {
                break;
            }
            if deadline > clock.now() {
                clock.set(deadline);
            }
            fired += self.fire_due();
        }

        clock.set(target);
        fired + self.fire_due()
    }

    /// Drives the loop until `shutdown` is cancelled.
    ///
    /// Must be polled from a `LocalSet` (or `block_on` on a current-thread
    /// runtime) because the loop is not `Send`.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Run loop started");
        loop {
            self.fire_due();

            let wait = self.next_deadline().map(|deadline| {
                (deadline - self.now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            });

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.inner.wake.notified() => {}
                _ = sleep_for(wait) => {}
            }
        }
        debug!(pending = self.pending(), "Run loop stopped");
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("pending", &self.pending())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

async fn sleep_for(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::microseconds(i64::try_from(duration.as_micros()).unwrap_or(i64::MAX))
}
