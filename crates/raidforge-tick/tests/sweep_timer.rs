//! Integration tests for sweep timers and background sweep tasks.
//!
//! All async tests run with `start_paused = true`: Tokio's clock only moves
//! when every task is idle, jumping straight to the next timer, so the
//! assertions below can compare exact elapsed times.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use raidforge_tick::{MissedSweepPolicy, SweepConfig, SweepTimer, spawn_sweep};
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

const INTERVAL: Duration = Duration::from_secs(10);

fn config(policy: MissedSweepPolicy) -> SweepConfig {
    SweepConfig {
        policy,
        ..SweepConfig::every(INTERVAL)
    }
}

// =========================================================================
// SweepConfig
// =========================================================================

#[test]
fn test_default_policy_is_skip() {
    assert_eq!(SweepConfig::default().policy, MissedSweepPolicy::Skip);
}

#[test]
fn test_validated_clamps_zero_interval() {
    let cfg = SweepConfig::every(Duration::ZERO).validated();
    assert_eq!(cfg.interval, SweepConfig::MIN_INTERVAL);
}

#[test]
fn test_validated_clamps_threshold() {
    let cfg = SweepConfig {
        budget_warn_threshold: 3.0,
        ..SweepConfig::default()
    }
    .validated();
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_first_pass_after_one_interval() {
    let start = Instant::now();
    let mut timer = SweepTimer::every(INTERVAL);

    let info = timer.wait_for_pass().await;

    assert_eq!(info.pass, 1);
    assert!(!info.overrun);
    assert_eq!(info.passes_skipped, 0);
    assert_eq!(start.elapsed(), INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_run_immediately_fires_at_once() {
    let start = Instant::now();
    let mut timer = SweepTimer::new(SweepConfig {
        run_immediately: true,
        ..SweepConfig::every(INTERVAL)
    });

    timer.wait_for_pass().await;
    assert_eq!(start.elapsed(), Duration::ZERO);

    timer.wait_for_pass().await;
    assert_eq!(start.elapsed(), INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn test_passes_count_monotonically() {
    let mut timer = SweepTimer::every(INTERVAL);
    for expected in 1..=4 {
        let info = timer.wait_for_pass().await;
        timer.record_pass_end();
        assert_eq!(info.pass, expected);
    }
    assert_eq!(timer.pass_count(), 4);
    assert_eq!(timer.metrics().total_passes, 4);
}

// =========================================================================
// Missed passes
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reschedules_from_now() {
    let start = Instant::now();
    let mut timer = SweepTimer::new(config(MissedSweepPolicy::Skip));
    timer.wait_for_pass().await; // t = 1i

    // Stall until t = 4.5i; the pass due at 2i is 2.5 intervals late.
    tokio::time::advance(INTERVAL * 7 / 2).await;
    let info = timer.wait_for_pass().await;
    assert!(info.overrun);
    assert_eq!(info.passes_skipped, 2);

    // Next pass lands one full interval after the late one.
    timer.wait_for_pass().await;
    assert_eq!(start.elapsed(), INTERVAL * 11 / 2);
    assert_eq!(timer.metrics().total_overruns, 1);
    assert_eq!(timer.metrics().total_skipped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_policy_keeps_cadence() {
    let start = Instant::now();
    let mut timer = SweepTimer::new(config(MissedSweepPolicy::Fixed));
    timer.wait_for_pass().await; // t = 1i

    tokio::time::advance(INTERVAL * 7 / 2).await; // t = 4.5i
    let info = timer.wait_for_pass().await;
    assert!(info.overrun);
    assert_eq!(info.passes_skipped, 2);

    // Back on the original grid: the next slot is 5i.
    timer.wait_for_pass().await;
    assert_eq!(start.elapsed(), INTERVAL * 5);
}

// =========================================================================
// Pause / resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_paused_timer_never_fires() {
    let mut timer = SweepTimer::every(INTERVAL);
    timer.pause();
    assert!(timer.is_paused());

    let result = tokio::time::timeout(INTERVAL * 5, timer.wait_for_pass()).await;
    assert!(result.is_err(), "paused timer should pend");
}

#[tokio::test(start_paused = true)]
async fn test_resume_schedules_one_interval_out() {
    let mut timer = SweepTimer::every(INTERVAL);
    timer.pause();
    tokio::time::advance(INTERVAL * 3).await;
    timer.resume();

    let resumed_at = Instant::now();
    let info = timer.wait_for_pass().await;
    assert_eq!(resumed_at.elapsed(), INTERVAL);
    assert!(!info.overrun, "time spent paused is not an overrun");
}

#[tokio::test(start_paused = true)]
async fn test_record_pass_end_without_pass_is_noop() {
    let mut timer = SweepTimer::every(INTERVAL);
    timer.record_pass_end();
    assert_eq!(timer.metrics().total_passes, 0);
    assert_eq!(timer.metrics().max_pass_time, Duration::ZERO);
}

// =========================================================================
// Background sweeps
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_spawned_sweep_runs_each_interval() {
    let passes = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&passes);

    let handle = spawn_sweep("count", SweepConfig::every(INTERVAL), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert_eq!(handle.name(), "count");

    tokio::time::sleep(INTERVAL * 7 / 2).await;
    let metrics = handle.cancel().await;

    assert_eq!(passes.load(Ordering::SeqCst), 3);
    assert_eq!(metrics.total_passes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_sweep_stops_running() {
    let passes = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&passes);

    let handle = spawn_sweep("stop", SweepConfig::every(INTERVAL), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    tokio::time::sleep(INTERVAL * 3 / 2).await;
    handle.cancel().await;
    let after_cancel = passes.load(Ordering::SeqCst);

    tokio::time::sleep(INTERVAL * 5).await;
    assert_eq!(after_cancel, 1);
    assert_eq!(passes.load(Ordering::SeqCst), after_cancel);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_stops_sweep() {
    let passes = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&passes);

    let handle = spawn_sweep("drop", SweepConfig::every(INTERVAL), move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    tokio::time::sleep(INTERVAL * 3 / 2).await;
    drop(handle);
    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(passes.load(Ordering::SeqCst), 1);
}
