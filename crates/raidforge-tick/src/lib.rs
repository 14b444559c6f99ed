//! Clocks and fixed-interval sweep timers for Raidforge.
//!
//! Two background sweeps keep raids honest: one fails sessions that ran
//! past their time budget, the other settles loot auctions whose bidding
//! window has closed. This crate provides the timing pieces they run on:
//!
//! - [`Clock`] — injectable "now" ([`TokioClock`] in production,
//!   [`ManualClock`] in tests)
//! - [`SweepTimer`] — paces passes, detects late passes, keeps metrics
//! - [`spawn_sweep`] / [`SweepHandle`] — a cancellable background loop
//!
//! Everything sleeps on Tokio time, so tests run under
//! `#[tokio::test(start_paused = true)]` and never wait for real.

mod clock;
mod task;
mod timer;

pub use clock::{Clock, ManualClock, TokioClock};
pub use task::{SweepHandle, spawn_sweep};
pub use timer::{MissedSweepPolicy, SweepConfig, SweepInfo, SweepMetrics, SweepTimer};
