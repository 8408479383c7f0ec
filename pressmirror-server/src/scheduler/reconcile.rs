use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::AppState;

/// Start the reconciliation loop as a background tokio task.
pub fn start(state: AppState) {
    let period = Duration::from_secs(state.config().poller.interval_secs);
    tokio::spawn(async move {
        tracing::info!("[Scheduler] Reconciler started, every {}s", period.as_secs());

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let services = state.services();
            match state.reconcile_runner().tick(|| services.reconciler.run_cycle()).await {
                None => {},
                Some(Ok(report)) => tracing::info!(
                    "[Scheduler] Reconcile cycle done: {} window(s), {} update(s), {} delete(s), {} failed, checkpoint {}",
                    report.windows.len(),
                    report.new_updates(),
                    report.new_deletes(),
                    report.failed(),
                    report.checkpoint
                ),
                Some(Err(e)) => {
                    tracing::error!("[Scheduler] Reconcile cycle failed, window will be retried: {}", e)
                },
            }
        }
    });
}
