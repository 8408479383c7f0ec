use super::*;
use crate::remote::testing::ScriptedTransport;
use crate::remote::{CallContext, RemoteCatalogClient, RemoteError, TokenPool};
use crate::source::{ArticleSource, BasicRenderer, SourceError};
use crate::store::{ArticleRepository, MemoryStore};
use async_trait::async_trait;
use pressmirror_types::{ArticleContent, Bucket, HistoryKind, Mode, RemoteConfig, RemoteRecord};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const MODE: Mode = Mode::Development;

/// Shared URL -> article. URLs ending in `?share` resolve to the bare URL.
#[derive(Default)]
struct StaticSource {
    articles: HashMap<String, ArticleContent>,
}

impl StaticSource {
    fn with(mut self, canonical: &str, body: &str) -> Self {
        self.articles.insert(
            canonical.to_string(),
            ArticleContent {
                id: format!("id-{}", canonical.len()),
                canonical: canonical.to_string(),
                title: "Headline".to_string(),
                body: body.to_string(),
                published_at: None,
                updated_at: None,
            },
        );
        self
    }
}

#[async_trait]
impl ArticleSource for StaticSource {
    async fn canonical_for_id(&self, id: &str) -> Result<Option<String>, SourceError> {
        Ok(self.articles.values().find(|a| a.id == id).map(|a| a.canonical.clone()))
    }

    async fn resolve_url(&self, url: &str) -> Result<Option<String>, SourceError> {
        let bare = url.trim_end_matches("?share");
        Ok(self.articles.contains_key(bare).then(|| bare.to_string()))
    }

    async fn fetch(&self, canonical: &str) -> Result<Option<ArticleContent>, SourceError> {
        Ok(self.articles.get(canonical).cloned())
    }
}

struct Harness {
    transport: Arc<ScriptedTransport>,
    repo: ArticleRepository,
    pipeline: PublishPipeline,
}

fn harness(source: StaticSource, bucket: Bucket) -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let repo = ArticleRepository::new(Arc::new(MemoryStore::new()), MODE);
    let remote = RemoteCatalogClient::new(
        transport.clone(),
        Arc::new(TokenPool::from_values(["tok"])),
        MODE,
        &RemoteConfig { page_id: "1200".to_string(), ..RemoteConfig::default() },
    );
    let pipeline =
        PublishPipeline::new(Arc::new(source), remote, repo.clone(), Arc::new(BasicRenderer::new()))
            .with_draw(Arc::new(move || bucket));
    Harness { transport, repo, pipeline }
}

fn expect_import(transport: &ScriptedTransport, import_id: &str, article_id: &str) {
    transport
        .push_call(json!({"id": import_id}))
        .push_call(json!({"status": "SUCCESS", "instant_article": {"id": article_id}}));
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_duplicate_in_batch_is_untestable_and_removed() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Test);

    let partition =
        h.pipeline.partition_testable(&urls(&["https://x/a", "https://x/a?share"])).await.unwrap();

    assert!(partition.testable.is_empty());
    assert_eq!(partition.untestable.len(), 2);
    assert!(partition.untestable.iter().all(|u| u.reason == UntestableReason::DuplicateInBatch));
    let dupe = partition.untestable.iter().find(|u| u.dupe_in_batch).unwrap();
    assert_eq!(dupe.url, "https://x/a?share");
    assert_eq!(h.repo.bucket("https://x/a").await.unwrap().map(|b| b.bucket), Some(Bucket::Removed));
    assert!(h.transport.sent_calls().is_empty());
}

#[tokio::test]
async fn test_second_run_sees_item_as_already_seen() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Control);
    expect_import(&h.transport, "imp-1", "ia-1");

    let first = h.pipeline.run(&urls(&["https://x/a"])).await.unwrap();
    assert_eq!(first.control, vec!["https://x/a"]);

    let second = h.pipeline.run(&urls(&["https://x/a"])).await.unwrap();
    assert!(second.testable.is_empty());
    assert_eq!(second.untestable[0].reason, UntestableReason::AlreadySeen);
    assert_eq!(h.repo.bucket("https://x/a").await.unwrap().map(|b| b.bucket), Some(Bucket::Control));
    assert_eq!(h.transport.sent_calls().len(), 2);
}

#[tokio::test]
async fn test_unresolvable_candidate_is_not_an_article() {
    let h = harness(StaticSource::default(), Bucket::Test);
    let partition = h.pipeline.partition_testable(&urls(&["https://x/video"])).await.unwrap();
    assert_eq!(partition.untestable[0].reason, UntestableReason::NotAnArticle);
    assert_eq!(partition.untestable[0].reason.describe(), "it's not an article");
}

#[tokio::test]
async fn test_unrenderable_candidate_is_dropped() {
    let h = harness(StaticSource::default().with("https://x/a", "<script>x()</script>"), Bucket::Test);
    let partition = h.pipeline.partition_testable(&urls(&["https://x/a"])).await.unwrap();

    let dropped = &partition.untestable[0];
    assert_eq!(dropped.reason, UntestableReason::CouldNotRender);
    assert!(dropped.detail.as_deref().is_some_and(|d| d.contains("scripts")));
    assert!(h.repo.bucket("https://x/a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_import_failure_is_could_not_post() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Test);
    h.transport.push_call(json!({"id": "imp-1"})).push_call(json!({
        "status": "FAILED",
        "errors": [{"level": "ERROR", "message": "Missing canonical"}]
    }));

    let partition = h.pipeline.partition_testable(&urls(&["https://x/a"])).await.unwrap();
    assert_eq!(partition.untestable[0].reason, UntestableReason::CouldNotPost);
    assert!(partition.untestable[0].detail.as_deref().is_some_and(|d| d.contains("Missing canonical")));
}

#[tokio::test]
async fn test_generic_remote_error_is_fatal() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Test);
    h.transport.push_call_error(RemoteError::from_graph_error(
        403,
        &json!({"error": {"code": 200, "message": "Permissions error"}}),
        CallContext::new("post"),
    ));

    let result = h.pipeline.partition_testable(&urls(&["https://x/a"])).await;
    assert!(matches!(result, Err(PipelineError::Remote(RemoteError::Api { .. }))));
}

#[tokio::test]
async fn test_test_bucket_is_published_live() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Test);
    expect_import(&h.transport, "imp-draft", "ia-1");
    expect_import(&h.transport, "imp-live", "ia-1");

    let report = h.pipeline.run(&urls(&["https://x/a"])).await.unwrap();
    assert_eq!(report.test, vec!["https://x/a"]);
    assert_eq!(report.publish_failures, 0);

    let calls = h.transport.sent_calls();
    assert_eq!(calls[0].param("published"), Some("false"));
    assert_eq!(calls[2].param("published"), Some("true"));
    assert_eq!(calls[2].param("development_mode"), Some("true"));

    let item = h.repo.item("https://x/a").await.unwrap().unwrap();
    assert_eq!(item.record(MODE), &RemoteRecord::Present { remote_id: "ia-1".to_string(), published: true });
    let kinds: Vec<HistoryKind> = item.history().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![HistoryKind::Import, HistoryKind::AbTest]);
    assert_eq!(h.repo.recently_published(5).await.unwrap()[0].canonical, "https://x/a");
}

#[tokio::test]
async fn test_control_bucket_stays_draft() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Control);
    expect_import(&h.transport, "imp-draft", "ia-1");

    let report = h.pipeline.run(&urls(&["https://x/a"])).await.unwrap();
    assert_eq!(report.control, vec!["https://x/a"]);

    let item = h.repo.item("https://x/a").await.unwrap().unwrap();
    assert!(!item.record(MODE).is_published());
    assert!(h.repo.recently_published(5).await.unwrap().is_empty());
    assert_eq!(h.transport.sent_calls().len(), 2);
}

#[tokio::test]
async fn test_bucket_persists_even_if_live_publish_fails() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Test);
    expect_import(&h.transport, "imp-draft", "ia-1");
    h.transport.push_call_error(RemoteError::Transport {
        message: "connection reset".to_string(),
        context: CallContext::new("post"),
    });

    assert!(h.pipeline.run(&urls(&["https://x/a"])).await.is_err());
    assert_eq!(h.repo.bucket("https://x/a").await.unwrap().map(|b| b.bucket), Some(Bucket::Test));

    let retry = h.pipeline.run(&urls(&["https://x/a"])).await.unwrap();
    assert_eq!(retry.untestable[0].reason, UntestableReason::AlreadySeen);
}

#[tokio::test]
async fn test_ab_poller_feeds_shared_links() {
    let h = harness(StaticSource::default().with("https://x/a", "<p>a</p>"), Bucket::Control);
    h.transport.push_call(json!({
        "data": [
            {"id": "1200_1", "link": "https://x/a"},
            {"id": "1200_2", "message": "no link"},
            {"id": "1200_3", "link": "https://x/gallery"}
        ]
    }));
    expect_import(&h.transport, "imp-draft", "ia-1");

    let poller = AbTestPoller::new(h.pipeline.clone(), 25);
    let report = poller.run_once().await.unwrap();

    assert_eq!(report.inspected, 3);
    assert_eq!(report.pipeline.control, vec!["https://x/a"]);
    assert_eq!(report.pipeline.untestable[0].reason, UntestableReason::NotAnArticle);
    let list = &h.transport.sent_calls()[0];
    assert_eq!(list.path, "1200/posts");
    assert_eq!(list.param("fields"), Some("link,created_time"));
}
