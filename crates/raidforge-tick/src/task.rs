//! Background sweep tasks.
//!
//! [`spawn_sweep`] runs a pass function on a [`SweepTimer`] inside its own
//! Tokio task and hands back a [`SweepHandle`]. Cancelling (or dropping)
//! the handle stops the loop between passes; a pass that is already
//! running finishes first.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{SweepConfig, SweepMetrics, SweepTimer};

/// Handle to a running sweep.
///
/// Dropping the handle closes its stop channel, which also ends the sweep.
pub struct SweepHandle {
    name: &'static str,
    stop: watch::Sender<bool>,
    task: JoinHandle<SweepMetrics>,
}

impl SweepHandle {
    /// The name given to [`spawn_sweep`].
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the sweep loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the sweep and waits for it to exit. Returns the final metrics.
    pub async fn cancel(self) -> SweepMetrics {
        let _ = self.stop.send(true);
        match self.task.await {
            Ok(metrics) => metrics,
            Err(e) => {
                error!(sweep = self.name, error = %e, "sweep task ended abnormally");
                SweepMetrics::default()
            }
        }
    }
}

/// Spawns `pass` on a fixed interval until the returned handle is
/// cancelled or dropped.
///
/// Passes never overlap: the timer waits for the previous pass future to
/// complete before scheduling the next one.
pub fn spawn_sweep<F, Fut>(name: &'static str, config: SweepConfig, mut pass: F) -> SweepHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut timer = SweepTimer::new(config);
        info!(sweep = name, interval_ms = timer.interval().as_millis() as u64, "sweep started");

        loop {
            tokio::select! {
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
                info = timer.wait_for_pass() => {
                    debug!(sweep = name, pass = info.pass, "running sweep pass");
                    pass().await;
                    timer.record_pass_end();
                }
            }
        }

        info!(sweep = name, passes = timer.pass_count(), "sweep stopped");
        timer.metrics().clone()
    });

    SweepHandle {
        name,
        stop: stop_tx,
        task,
    }
}
