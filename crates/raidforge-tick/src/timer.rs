//! Fixed-interval sweep timer.
//!
//! A [`SweepTimer`] paces one background sweep: it decides when the next
//! pass is due, notices when a pass fired late, and keeps metrics on how
//! long passes take relative to their interval.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = stop.changed() => break,
//!         info = timer.wait_for_pass() => {
//!             run_pass().await;
//!             timer.record_pass_end();
//!         }
//!     }
//! }
//! ```
//!
//! `wait_for_pass` is cancel-safe: dropping it mid-sleep leaves the timer
//! untouched.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a pass fires later than scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissedSweepPolicy {
    /// Forget the missed slots and schedule the next pass one interval
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence. Missed slots collapse into the pass that
    /// is running now; the next pass lands on the next slot in the future.
    Fixed,
}

/// Configuration for one sweep timer.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between passes.
    pub interval: Duration,
    pub policy: MissedSweepPolicy,
    /// Fire the first pass right away instead of one interval in.
    pub run_immediately: bool,
    /// Random delay (0..jitter) added to the first pass so sweeps started
    /// together don't stay in lockstep.
    pub initial_jitter: Duration,
    /// A pass that uses more than this fraction of its interval logs a
    /// warning. `0.0..=1.0`.
    pub budget_warn_threshold: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            policy: MissedSweepPolicy::default(),
            run_immediately: false,
            initial_jitter: Duration::ZERO,
            budget_warn_threshold: 0.5,
        }
    }
}

impl SweepConfig {
    /// Shortest interval accepted by [`validated`](Self::validated).
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// A config with the given interval and default settings otherwise.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`SweepTimer::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "sweep interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Pass info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`SweepTimer::wait_for_pass`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepInfo {
    /// Pass number, starting at 1.
    pub pass: u64,
    /// The pass fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals that were skipped because of the delay.
    pub passes_skipped: u64,
}

/// Running totals for a sweep timer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepMetrics {
    pub total_passes: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    pub last_pass_time: Duration,
    pub max_pass_time: Duration,
    /// `last_pass_time / interval` for the most recent pass.
    pub budget_utilization: f64,
}

// ---------------------------------------------------------------------------
// SweepTimer
// ---------------------------------------------------------------------------

/// Paces a periodic sweep.
pub struct SweepTimer {
    config: SweepConfig,
    pass_count: u64,
    next_pass: TokioInstant,
    /// Wall-clock start of the running pass, consumed by `record_pass_end`.
    pass_start: Option<Instant>,
    paused: bool,
    metrics: SweepMetrics,
}

impl SweepTimer {
    pub fn new(config: SweepConfig) -> Self {
        let config = config.validated();

        let max_jitter_us =
            u64::try_from(config.initial_jitter.as_micros()).unwrap_or(u64::MAX);
        let jitter = if max_jitter_us > 0 {
            Duration::from_micros(rand::rng().random_range(0..max_jitter_us))
        } else {
            Duration::ZERO
        };
        let first_delay = if config.run_immediately {
            Duration::ZERO
        } else {
            config.interval
        };

        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "sweep timer created"
        );

        Self {
            next_pass: TokioInstant::now() + first_delay + jitter,
            config,
            pass_count: 0,
            pass_start: None,
            paused: false,
            metrics: SweepMetrics::default(),
        }
    }

    /// A timer with the given interval and default settings.
    pub fn every(interval: Duration) -> Self {
        Self::new(SweepConfig::every(interval))
    }

    /// Waits until the next pass is due. Pends forever while paused.
    pub async fn wait_for_pass(&mut self) -> SweepInfo {
        if self.paused {
            return std::future::pending().await;
        }

        let scheduled = self.next_pass;
        time::sleep_until(scheduled).await;

        let now = TokioInstant::now();
        let interval = self.config.interval;
        self.pass_count += 1;
        self.pass_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(scheduled);
        let overrun = late_by > interval / 10;
        let mut passes_skipped = 0u64;

        self.next_pass = match self.config.policy {
            MissedSweepPolicy::Skip => {
                if overrun {
                    passes_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                }
                now + interval
            }
            MissedSweepPolicy::Fixed => {
                let mut next = scheduled + interval;
                while next <= now {
                    next += interval;
                    passes_skipped += 1;
                }
                next
            }
        };

        if passes_skipped > 0 {
            warn!(
                pass = self.pass_count,
                skipped = passes_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "sweep fired late, skipping missed passes"
            );
        }
        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += passes_skipped;
        self.metrics.total_passes += 1;

        trace!(pass = self.pass_count, overrun, "sweep pass due");

        SweepInfo {
            pass: self.pass_count,
            overrun,
            passes_skipped,
        }
    }

    /// Marks the running pass finished and updates the timing metrics.
    /// A no-op if no pass is running.
    pub fn record_pass_end(&mut self) {
        let Some(start) = self.pass_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.interval.as_secs_f64();

        self.metrics.last_pass_time = elapsed;
        self.metrics.budget_utilization = utilization;
        if elapsed > self.metrics.max_pass_time {
            self.metrics.max_pass_time = elapsed;
        }

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                pass = self.pass_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                interval_ms = self.config.interval.as_secs_f64() * 1000.0,
                "sweep pass is using most of its interval"
            );
        }
    }

    /// Stops passes from firing until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(pass = self.pass_count, "sweep timer paused");
        }
    }

    /// Resumes after a pause. The next pass is one interval from now, so
    /// time spent paused never shows up as overrun.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_pass = TokioInstant::now() + self.config.interval;
            debug!(pass = self.pass_count, "sweep timer resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pass_count(&self) -> u64 {
        self.pass_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }
}
