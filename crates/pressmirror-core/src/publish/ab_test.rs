use serde::Serialize;

use super::pipeline::{PipelineReport, PublishPipeline};
use super::PipelineError;

#[derive(Debug, Clone, Serialize)]
pub struct AbTestReport {
    /// Shared posts inspected this cycle
    pub inspected: usize,
    #[serde(flatten)]
    pub pipeline: PipelineReport,
}

/// Feeds links recently shared on the page into the pipeline.
#[derive(Clone)]
pub struct AbTestPoller {
    pipeline: PublishPipeline,
    share_limit: usize,
}

impl AbTestPoller {
    pub fn new(pipeline: PublishPipeline, share_limit: usize) -> Self {
        Self { pipeline, share_limit }
    }

    pub async fn run_once(&self) -> Result<AbTestReport, PipelineError> {
        let remote = self.pipeline.remote();
        let path = format!("{}/posts", remote.page_id());
        let posts = remote.list(&path, &[("fields", "link,created_time")], Some(self.share_limit)).await?;

        let links: Vec<String> = posts
            .iter()
            .filter_map(|post| post.get("link").and_then(|l| l.as_str()))
            .map(str::to_string)
            .collect();
        tracing::info!("[AbTest] {} recent post(s), {} with links", posts.len(), links.len());

        let pipeline = self.pipeline.run(&links).await?;
        Ok(AbTestReport { inspected: posts.len(), pipeline })
    }
}
