//! Candidate filtering, bucket assignment and publish.
//!
//! Each candidate passes, in order: key resolution, de-duplication,
//! hydration, render and a draft import. Survivors get a bucket drawn once
//! and persisted before anything else happens to them; only the test bucket
//! is then published live.

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::PipelineError;
use crate::remote::{ImportOutcome, RemoteCatalogClient};
use crate::source::{ArticleSource, Renderer};
use crate::store::ArticleRepository;
use pressmirror_types::{Bucket, HistoryEntry, HistoryKind, Item, RemoteRecord};

/// Source of bucket draws; uniform and independent per item in production.
pub type BucketDraw = Arc<dyn Fn() -> Bucket + Send + Sync>;

pub fn random_bucket() -> Bucket {
    if rand::random::<bool>() {
        Bucket::Test
    } else {
        Bucket::Control
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UntestableReason {
    NotAnArticle,
    AlreadySeen,
    DuplicateInBatch,
    NotFound,
    CouldNotRender,
    CouldNotPost,
}

impl UntestableReason {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::NotAnArticle => "it's not an article",
            Self::AlreadySeen => "already seen",
            Self::DuplicateInBatch => "duplicate in batch",
            Self::NotFound => "could not load article",
            Self::CouldNotRender => "could not render",
            Self::CouldNotPost => "could not post",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Untestable {
    pub url: String,
    pub canonical: Option<String>,
    pub reason: UntestableReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Set on the later occurrences of a key seen twice in one batch
    pub dupe_in_batch: bool,
}

impl Untestable {
    fn new(url: &str, canonical: Option<&str>, reason: UntestableReason) -> Self {
        Self {
            url: url.to_string(),
            canonical: canonical.map(str::to_string),
            reason,
            detail: None,
            dupe_in_batch: false,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A candidate that rendered and imported as a draft.
#[derive(Debug, Clone)]
pub struct Testable {
    pub url: String,
    pub item: Item,
    pub html: String,
    pub draft: ImportOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub testable: Vec<Testable>,
    pub untestable: Vec<Untestable>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub testable: Vec<String>,
    pub untestable: Vec<Untestable>,
    pub test: Vec<String>,
    pub control: Vec<String>,
    /// Test-bucket items whose live publish was rejected
    pub publish_failures: usize,
}

enum Step {
    Pass(Testable),
    Drop(Untestable),
}

#[derive(Clone)]
pub struct PublishPipeline {
    source: Arc<dyn ArticleSource>,
    remote: RemoteCatalogClient,
    repo: ArticleRepository,
    renderer: Arc<dyn Renderer>,
    draw: BucketDraw,
}

impl PublishPipeline {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        remote: RemoteCatalogClient,
        repo: ArticleRepository,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self { source, remote, repo, renderer, draw: Arc::new(random_bucket) }
    }

    pub fn with_draw(mut self, draw: BucketDraw) -> Self {
        self.draw = draw;
        self
    }

    pub fn remote(&self) -> &RemoteCatalogClient {
        &self.remote
    }

    /// Split `candidates` (shared URLs) into testable and untestable.
    pub async fn partition_testable(&self, candidates: &[String]) -> Result<Partition, PipelineError> {
        let mut partition = Partition::default();

        let resolved = try_join_all(candidates.iter().map(|url| self.source.resolve_url(url))).await?;

        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        let mut conflicted: HashSet<&str> = HashSet::new();
        let mut survivors: Vec<(&str, &str)> = Vec::new();
        for (url, canonical) in candidates.iter().zip(&resolved) {
            let Some(canonical) = canonical.as_deref() else {
                partition.untestable.push(Untestable::new(url, None, UntestableReason::NotAnArticle));
                continue;
            };
            if self.repo.bucket(canonical).await?.is_some() {
                partition
                    .untestable
                    .push(Untestable::new(url, Some(canonical), UntestableReason::AlreadySeen));
                continue;
            }
            if let Some(&first) = first_seen.get(canonical) {
                let mut dupe = Untestable::new(url, Some(canonical), UntestableReason::DuplicateInBatch);
                dupe.dupe_in_batch = true;
                partition.untestable.push(dupe);
                if conflicted.insert(canonical) {
                    let (original_url, _) = survivors[first];
                    partition.untestable.push(Untestable::new(
                        original_url,
                        Some(canonical),
                        UntestableReason::DuplicateInBatch,
                    ));
                    self.repo.mark_removed(canonical).await?;
                    tracing::info!("[Pipeline] {} shared more than once, marked removed", canonical);
                }
                continue;
            }
            first_seen.insert(canonical, survivors.len());
            survivors.push((url, canonical));
        }

        let checked = try_join_all(
            survivors
                .into_iter()
                .filter(|(_, canonical)| !conflicted.contains(canonical))
                .map(|(url, canonical)| self.check(url, canonical)),
        )
        .await?;
        for step in checked {
            match step {
                Step::Pass(testable) => partition.testable.push(testable),
                Step::Drop(untestable) => partition.untestable.push(untestable),
            }
        }
        Ok(partition)
    }

    /// Hydrate, render and draft-import one candidate.
    async fn check(&self, url: &str, canonical: &str) -> Result<Step, PipelineError> {
        let Some(content) = self.source.fetch(canonical).await? else {
            return Ok(Step::Drop(Untestable::new(url, Some(canonical), UntestableReason::NotFound)));
        };
        let item = match self.repo.item(canonical).await? {
            Some(mut existing) => {
                existing.refresh(content);
                existing
            },
            None => Item::from_content(content),
        };

        let rendered = match self.renderer.render(&item) {
            Ok(rendered) => rendered,
            Err(e) if e.is_validation() => {
                return Ok(Step::Drop(
                    Untestable::new(url, Some(canonical), UntestableReason::CouldNotRender)
                        .with_detail(e.to_string()),
                ));
            },
            Err(e) => return Err(e.into()),
        };

        match self.remote.post(&rendered.html, false, true).await {
            Ok(draft) => Ok(Step::Pass(Testable { url: url.to_string(), item, html: rendered.html, draft })),
            Err(e) if e.is_import_failure() => Ok(Step::Drop(
                Untestable::new(url, Some(canonical), UntestableReason::CouldNotPost).with_detail(e.to_string()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Partition, assign buckets and publish the test bucket.
    pub async fn run(&self, candidates: &[String]) -> Result<PipelineReport, PipelineError> {
        let Partition { testable, untestable } = self.partition_testable(candidates).await?;
        let mut report = PipelineReport {
            testable: testable.iter().map(|t| t.item.canonical.clone()).collect(),
            untestable,
            ..PipelineReport::default()
        };

        let assigned = join_all(testable.into_iter().map(|t| self.assign(t))).await;
        for result in assigned {
            match result? {
                Assigned::Test { canonical, published } => {
                    if !published {
                        report.publish_failures += 1;
                    }
                    report.test.push(canonical);
                },
                Assigned::Control { canonical } => report.control.push(canonical),
                Assigned::Taken(untestable) => report.untestable.push(untestable),
            }
        }

        tracing::info!(
            "[Pipeline] {} candidate(s): {} test, {} control, {} untestable",
            candidates.len(),
            report.test.len(),
            report.control.len(),
            report.untestable.len()
        );
        Ok(report)
    }

    async fn assign(&self, testable: Testable) -> Result<Assigned, PipelineError> {
        let Testable { url, mut item, html, draft } = testable;
        let mode = self.repo.mode();
        let canonical = item.canonical.clone();

        let bucket = (self.draw)();
        if !self.repo.set_with_bucket(&canonical, bucket).await? {
            return Ok(Assigned::Taken(Untestable::new(&url, Some(&canonical), UntestableReason::AlreadySeen)));
        }

        let draft_id = draft.remote_id.unwrap_or(draft.import_id);
        item.remote.set(mode, RemoteRecord::Present { remote_id: draft_id, published: false });
        item.push_history(HistoryEntry::success(HistoryKind::Import, mode).with_detail("draft"));
        self.repo.save_item(&item).await?;

        if bucket != Bucket::Test {
            return Ok(Assigned::Control { canonical });
        }

        let published = match self.remote.post(&html, true, true).await {
            Ok(outcome) => {
                let remote_id = outcome.remote_id.unwrap_or(outcome.import_id);
                item.remote.set(mode, RemoteRecord::Present { remote_id, published: true });
                item.push_history(HistoryEntry::success(HistoryKind::AbTest, mode));
                self.repo.record_published(&canonical, Utc::now()).await?;
                true
            },
            Err(e) if e.is_import_failure() => {
                tracing::warn!("[Pipeline] Live publish of {} rejected: {}", canonical, e);
                item.push_history(HistoryEntry::failure(HistoryKind::AbTest, mode, e.to_string()));
                false
            },
            Err(e) => return Err(e.into()),
        };
        self.repo.save_item(&item).await?;
        Ok(Assigned::Test { canonical, published })
    }
}

enum Assigned {
    Test { canonical: String, published: bool },
    Control { canonical: String },
    /// Another run assigned this key first
    Taken(Untestable),
}
