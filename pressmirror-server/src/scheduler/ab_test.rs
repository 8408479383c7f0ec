use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::AppState;

/// Start the A/B test loop as a background tokio task.
pub fn start(state: AppState) {
    let period = Duration::from_secs(state.config().ab_test.interval_secs);
    tokio::spawn(async move {
        tracing::info!("[Scheduler] A/B test poller started, every {}s", period.as_secs());

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let services = state.services();
            match state.ab_test_runner().tick(|| services.ab_test.run_once()).await {
                None => {},
                Some(Ok(report)) => tracing::info!(
                    "[Scheduler] A/B cycle done: {} inspected, {} test, {} control, {} untestable",
                    report.inspected,
                    report.pipeline.test.len(),
                    report.pipeline.control.len(),
                    report.pipeline.untestable.len()
                ),
                Some(Err(e)) => tracing::error!("[Scheduler] A/B cycle failed: {}", e),
            }
        }
    });
}
