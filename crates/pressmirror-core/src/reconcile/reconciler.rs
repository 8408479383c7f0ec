//! The reconciliation poll cycle.
//!
//! ```text
//! idle -> fetching windows -> merging -> resolving -> publishing -> checkpointing -> idle
//! ```
//!
//! The checkpoint moves forward one interval per processed window. A window
//! that fails before checkpointing leaves it untouched, so the next cycle
//! re-queries the same window.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;

use super::canonical::{CanonicalResolver, Resolution};
use super::window::{ChangeSets, PollWindow};
use super::ReconcileError;
use crate::feed::ChangeFeed;
use crate::remote::RemoteCatalogClient;
use crate::store::ArticleRepository;
use pressmirror_types::{ChangeType, Item, PollCheckpoint, PollerConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IdOutcome {
    Updated { canonical: String, republished: bool },
    Renamed { from: String, to: String, republished: bool },
    Deleted { canonical: String, remote_deleted: bool },
    /// Delete notification for an id the source still resolves
    Kept { canonical: String },
}

/// Result of querying one window pair.
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub last_check: i64,
    pub window: PollWindow,
    pub previous: PollWindow,
    pub new_updates: usize,
    pub new_deletes: usize,
    /// Ids from the delta that are not tracked locally
    pub untracked: usize,
    pub outcomes: Vec<IdOutcome>,
    pub failed: usize,
}

/// Every window a cycle caught up on, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub windows: Vec<WindowReport>,
    pub checkpoint: i64,
}

impl ReconcileReport {
    pub fn new_updates(&self) -> usize {
        self.windows.iter().map(|w| w.new_updates).sum()
    }

    pub fn new_deletes(&self) -> usize {
        self.windows.iter().map(|w| w.new_deletes).sum()
    }

    pub fn failed(&self) -> usize {
        self.windows.iter().map(|w| w.failed).sum()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &IdOutcome> {
        self.windows.iter().flat_map(|w| w.outcomes.iter())
    }
}

/// Upper bound on windows replayed by one cycle after downtime. The rest
/// are picked up by the following cycles.
const MAX_WINDOWS_PER_CYCLE: usize = 1440;

pub struct ChangeReconciler {
    feed: Arc<dyn ChangeFeed>,
    resolver: CanonicalResolver,
    remote: RemoteCatalogClient,
    repo: ArticleRepository,
    interval_secs: i64,
    overlap_secs: i64,
}

impl ChangeReconciler {
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        resolver: CanonicalResolver,
        remote: RemoteCatalogClient,
        repo: ArticleRepository,
        config: &PollerConfig,
    ) -> Self {
        Self {
            feed,
            resolver,
            remote,
            repo,
            interval_secs: i64::try_from(config.interval_secs).unwrap_or(i64::MAX),
            overlap_secs: i64::try_from(config.overlap_secs).unwrap_or(i64::MAX),
        }
    }

    pub async fn run_cycle(&self) -> Result<ReconcileReport, ReconcileError> {
        self.run_cycle_at(Utc::now().timestamp()).await
    }

    /// One cycle as if the clock read `now`. Replays every window that has
    /// come due since the checkpoint, advancing it by one interval per
    /// window, so late or skipped ticks lose nothing. Without a checkpoint
    /// the poller starts one interval before `now`.
    pub async fn run_cycle_at(&self, now: i64) -> Result<ReconcileReport, ReconcileError> {
        let mut last_check = match self.repo.checkpoint().await? {
            Some(checkpoint) => checkpoint.last_check,
            None => now.saturating_sub(self.interval_secs),
        };

        let mut windows = Vec::new();
        while last_check.saturating_add(self.interval_secs) <= now {
            if windows.len() == MAX_WINDOWS_PER_CYCLE {
                tracing::warn!(
                    "[Reconciler] Caught up {} windows, resuming from {} next cycle",
                    windows.len(),
                    last_check
                );
                break;
            }
            let report = self.run_window(last_check).await?;
            last_check = last_check.saturating_add(self.interval_secs);
            self.repo.save_checkpoint(&PollCheckpoint::at(last_check)).await?;
            windows.push(report);
        }

        if windows.is_empty() {
            tracing::debug!("[Reconciler] No window due yet (checkpoint {}, now {})", last_check, now);
        } else if windows.len() > 1 {
            tracing::info!("[Reconciler] Caught up {} windows, checkpoint {}", windows.len(), last_check);
        }
        Ok(ReconcileReport { windows, checkpoint: last_check })
    }

    /// Query and process the window pair for `last_check`. Errors before the
    /// ids are processed leave the checkpoint for the caller to keep.
    async fn run_window(&self, last_check: i64) -> Result<WindowReport, ReconcileError> {
        let (window, previous) = PollWindow::pair(last_check, self.interval_secs, self.overlap_secs);

        let (current_events, previous_events) = tokio::try_join!(
            self.feed.changes(window.start, window.end),
            self.feed.changes(previous.start, previous.end),
        )?;
        let delta = ChangeSets::from_events(&current_events)
            .newer_than(&ChangeSets::from_events(&previous_events));
        tracing::info!(
            "[Reconciler] Window [{}, {}]: {} new update(s), {} new delete(s)",
            window.start,
            window.end,
            delta.updates.len(),
            delta.deletes.len()
        );

        let mut tracked = Vec::with_capacity(delta.len());
        let mut untracked = 0;
        let candidates = delta
            .updates
            .iter()
            .map(|id| (ChangeType::Update, id))
            .chain(delta.deletes.iter().map(|id| (ChangeType::Delete, id)));
        for (change, id) in candidates {
            match self.repo.canonical_for_id(id).await? {
                Some(canonical) => tracked.push((change, id.clone(), canonical)),
                None => untracked += 1,
            }
        }

        let results = join_all(tracked.iter().map(|(change, id, canonical)| async move {
            match self.process(*change, id, canonical).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::warn!("[Reconciler] {} ({}) failed: {}", id, canonical, e);
                    None
                },
            }
        }))
        .await;
        let failed = results.iter().filter(|r| r.is_none()).count();
        let outcomes: Vec<IdOutcome> = results.into_iter().flatten().collect();

        tracing::info!(
            "[Reconciler] Window done: {} processed, {} failed, {} untracked",
            outcomes.len(),
            failed,
            untracked
        );

        Ok(WindowReport {
            last_check,
            window,
            previous,
            new_updates: delta.updates.len(),
            new_deletes: delta.deletes.len(),
            untracked,
            outcomes,
            failed,
        })
    }

    async fn process(
        &self,
        change: ChangeType,
        id: &str,
        cached: &str,
    ) -> Result<IdOutcome, ReconcileError> {
        match (self.resolver.resolve(id, cached).await?, change) {
            (Resolution::Gone { canonical }, _) => self.delete(&canonical).await,
            (Resolution::Renamed { from, to, republished }, _) => {
                Ok(IdOutcome::Renamed { from, to, republished })
            },
            (Resolution::Unchanged { canonical }, ChangeType::Delete) => {
                tracing::info!("[Reconciler] {} still resolves, ignoring delete notification", canonical);
                Ok(IdOutcome::Kept { canonical })
            },
            (Resolution::Unchanged { canonical }, ChangeType::Update) => self.update(&canonical).await,
        }
    }

    async fn update(&self, canonical: &str) -> Result<IdOutcome, ReconcileError> {
        let mode = self.repo.mode();
        let Some(mut item) = self.repo.item(canonical).await? else {
            return Ok(IdOutcome::Kept { canonical: canonical.to_string() });
        };
        let Some(content) = self.resolver.source().fetch(canonical).await? else {
            return self.delete(canonical).await;
        };
        item.refresh(content);

        let republished = if item.was_sent(mode) {
            let published = item.record(mode).is_published();
            self.resolver.republish(&mut item, published).await?
        } else {
            false
        };
        self.repo.save_item(&item).await?;
        Ok(IdOutcome::Updated { canonical: canonical.to_string(), republished })
    }

    async fn delete(&self, canonical: &str) -> Result<IdOutcome, ReconcileError> {
        let mode = self.repo.mode();
        let sent = self.repo.item(canonical).await?.is_some_and(|item: Item| item.was_sent(mode));
        let remote_deleted = if sent { self.remote.delete(canonical).await? } else { false };
        self.repo.remove_item(canonical).await?;
        tracing::info!("[Reconciler] Deleted {} (remote: {})", canonical, remote_deleted);
        Ok(IdOutcome::Deleted { canonical: canonical.to_string(), remote_deleted })
    }
}
