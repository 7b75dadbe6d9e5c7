//! Execution control primitives for the pipeline.
//!
//! The export poll loop is the only part of the pipeline with real timing
//! behavior, and the export name is the only place the wall clock leaks into
//! output. Both are abstracted here so tests can simulate state transitions
//! without real waiting and pin output names to a fixed timestamp:
//!
//! - [`Clock`] - source of the current UTC time
//! - [`Delay`] - source of blocking sleeps between polls
//! - [`CancelToken`] - cooperative abort flag checked each poll cycle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// The live implementation reads the system clock; tests substitute a fixed
/// timestamp so derived values (export names) are deterministic.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    timestamp: i64,
}

impl FixedClock {
    /// Create a clock that always reports the given Unix timestamp (seconds).
    pub fn at(timestamp: i64) -> Self {
        Self { timestamp }
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).expect("valid fixed timestamp")
    }
}

/// Source of blocking delays.
///
/// The poll loop sleeps through this trait instead of calling
/// `thread::sleep` directly, so tests can run the state machine without
/// wall-clock waiting.
pub trait Delay: Send + Sync {
    /// Block the calling thread for the given duration.
    fn sleep(&self, duration: Duration);
}

/// Real delay backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Cooperative cancellation flag.
///
/// Cloned tokens share the same underlying flag. The CLI wires Ctrl-C to
/// `cancel()`; the export poll loop checks `is_cancelled()` once per cycle
/// and aborts with a cancellation error instead of polling forever.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe the request.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
