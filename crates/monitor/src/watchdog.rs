//! Periodic liveness watchdog.
//!
//! Ticks every `watchdog_poll_interval` and marks sources that have been
//! silent longer than the liveness timeout as offline. A source can therefore
//! be reported offline up to one poll interval after its timeout elapsed.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::monitor::Monitor;

/// Spawn the watchdog loop. Stops when `cancel` is triggered.
pub fn spawn_watchdog(monitor: Arc<Monitor>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(run(monitor, cancel))
}

/// Run the watchdog loop until `cancel` is triggered.
pub async fn run(monitor: Arc<Monitor>, cancel: CancellationToken) {
    let poll = monitor.config().watchdog_poll_interval;
    tracing::info!(
        interval_secs = poll.as_secs(),
        timeout_secs = monitor.config().liveness_timeout.as_secs(),
        "Liveness watchdog started"
    );

    let mut interval = tokio::time::interval(poll);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing can be stale yet.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Liveness watchdog stopping");
                break;
            }
            _ = interval.tick() => {
                let changed = monitor.evaluate_liveness();
                if changed.is_empty() {
                    tracing::trace!("Liveness watchdog: all sources current");
                } else {
                    tracing::debug!(offline = changed.len(), "Liveness watchdog: sources expired");
                }
            }
        }
    }
}
