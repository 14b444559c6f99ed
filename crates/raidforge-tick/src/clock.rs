//! Wall-clock sources.
//!
//! Stored deadlines are [`Timestamp`]s, so the engine needs a "now" that is
//! comparable across restarts. [`TokioClock`] anchors the wall clock once
//! and then advances with Tokio's monotonic time, which means
//! `tokio::time::pause()` freezes it and `advance()` moves it. Tests that
//! don't run a runtime use [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use raidforge_protocol::Timestamp;
use tokio::time::Instant as TokioInstant;

/// A source of the current time.
pub trait Clock: Send + Sync + 'static {
    /// The current instant as milliseconds since the UNIX epoch.
    fn now(&self) -> Timestamp;

    /// Time left until `deadline`, zero if it has passed.
    fn until(&self, deadline: Timestamp) -> Duration {
        self.now().duration_until(deadline)
    }
}

// ---------------------------------------------------------------------------
// TokioClock
// ---------------------------------------------------------------------------

/// Wall time anchored at construction, advanced by Tokio's clock.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor: Timestamp,
    origin: TokioInstant,
}

impl TokioClock {
    /// Anchors to the system clock.
    pub fn new() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let millis = u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX);
        Self::starting_at(Timestamp::from_millis(millis))
    }

    /// Anchors to a fixed timestamp. Handy with a paused runtime.
    pub fn starting_at(anchor: Timestamp) -> Self {
        Self {
            anchor,
            origin: TokioInstant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        self.anchor.saturating_add(self.origin.elapsed())
    }
}

// ---------------------------------------------------------------------------
// ManualClock
// ---------------------------------------------------------------------------

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicU64::new(start.as_millis()),
        }
    }

    /// Moves the clock forward by `d`.
    pub fn advance(&self, d: Duration) {
        let step = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        self.millis.fetch_add(step, Ordering::SeqCst);
    }

    /// Jumps to an absolute instant (may move backwards).
    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}
