//! Timer-driven cycles.
//!
//! Each loop owns a [`CycleRunner`]. Timer ticks and manual triggers from the
//! admin API go through the same gate, so at most one cycle of a kind is in
//! flight at any time.

pub mod ab_test;
pub mod reconcile;

use std::future::Future;
use thiserror::Error;
use tokio::sync::Mutex;

use pressmirror_core::publish::PipelineError;
use pressmirror_core::reconcile::ReconcileError;

use crate::state::AppState;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("{0} cycle is already running")]
    AlreadyRunning(&'static str),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

pub struct CycleRunner {
    name: &'static str,
    gate: Mutex<()>,
}

impl CycleRunner {
    pub fn new(name: &'static str) -> Self {
        Self { name, gate: Mutex::new(()) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.gate.try_lock().is_err()
    }

    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Manual trigger. Runs `cycle` unless one is already in flight.
    pub async fn trigger<T, E, F, Fut>(&self, cycle: F) -> Result<T, CycleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<CycleError>,
    {
        let _guard = self.gate.try_lock().map_err(|_| CycleError::AlreadyRunning(self.name))?;
        cycle().await.map_err(Into::into)
    }

    /// Timer tick. `None` when the previous cycle has not finished yet.
    pub async fn tick<T, E, F, Fut>(&self, cycle: F) -> Option<Result<T, CycleError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<CycleError>,
    {
        match self.trigger(cycle).await {
            Err(CycleError::AlreadyRunning(_)) => {
                tracing::debug!("[Scheduler] {} still running, skipping tick", self.name);
                None
            },
            other => Some(other),
        }
    }
}

/// Start every enabled loop.
pub fn start_all(state: &AppState) {
    let config = state.config();
    if config.poller.enabled {
        reconcile::start(state.clone());
    } else {
        tracing::info!("[Scheduler] Reconciler disabled");
    }
    if config.ab_test.enabled {
        ab_test::start(state.clone());
    } else {
        tracing::info!("[Scheduler] A/B test poller disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_runs_cycle() {
        let runner = CycleRunner::new("test");
        let result: Result<u32, CycleError> =
            runner.trigger(|| async { Ok::<_, CycleError>(7) }).await;
        assert_eq!(result.expect("ran"), 7);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_trigger_rejects_overlap() {
        let runner = CycleRunner::new("reconcile");
        let _held = runner.gate.lock().await;
        assert!(runner.is_running());

        let result = runner.trigger(|| async { Ok::<_, CycleError>(()) }).await;
        assert!(matches!(result, Err(CycleError::AlreadyRunning("reconcile"))));
    }

    #[tokio::test]
    async fn test_tick_skips_while_running() {
        let runner = Arc::new(CycleRunner::new("ab_test"));
        let calls = Arc::new(AtomicU32::new(0));

        let guard = runner.gate.lock().await;
        let c = calls.clone();
        let skipped = runner
            .tick(|| async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CycleError>(())
            })
            .await;
        assert!(skipped.is_none());
        drop(guard);

        let c = calls.clone();
        let ran = runner
            .tick(|| async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CycleError>(())
            })
            .await;
        assert!(matches!(ran, Some(Ok(()))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
