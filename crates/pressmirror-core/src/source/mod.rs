//! Identifying source and renderer collaborators.

mod render;

pub use render::{BasicRenderer, RenderError, Rendered, Renderer};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use pressmirror_types::{ArticleContent, SourceConfig};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("Content API returned HTTP {status} for {path}")]
    Http { status: u16, path: String },
    #[error("Content API request failed: {0}")]
    Transport(String),
    #[error("Content API response could not be decoded: {0}")]
    Decode(String),
}

/// Where articles are identified and hydrated.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Current canonical for an internal id. `None` once the id no longer
    /// resolves.
    async fn canonical_for_id(&self, id: &str) -> Result<Option<String>, SourceError>;

    /// Canonical for an arbitrary shared URL. `None` if it is not an article.
    async fn resolve_url(&self, url: &str) -> Result<Option<String>, SourceError>;

    /// Full content under `canonical`. `None` if it is gone.
    async fn fetch(&self, canonical: &str) -> Result<Option<ArticleContent>, SourceError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(flatten)]
    content: ArticleContent,
}

/// Content API client: `GET /content/{id}` and `GET /lookup?url=`.
pub struct HttpArticleSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpArticleSource {
    pub fn new(client: Client, config: &SourceConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, SourceError> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path)).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(|e| SourceError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status if status.is_success() => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| SourceError::Decode(e.to_string())),
            status => Err(SourceError::Http { status: status.as_u16(), path: path.to_string() }),
        }
    }

    async fn lookup(&self, url: &str) -> Result<Option<ArticleContent>, SourceError> {
        let found: Option<LookupResponse> = self.get_json("/lookup", &[("url", url)]).await?;
        Ok(found.and_then(|r| match r.kind.as_deref() {
            None | Some("article") => Some(r.content),
            Some(other) => {
                tracing::debug!("[Source] {} resolved to a {}, not an article", url, other);
                None
            },
        }))
    }
}

#[async_trait]
impl ArticleSource for HttpArticleSource {
    async fn canonical_for_id(&self, id: &str) -> Result<Option<String>, SourceError> {
        let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        let content: Option<ArticleContent> = self.get_json(&format!("/content/{encoded}"), &[]).await?;
        Ok(content.map(|c| c.canonical))
    }

    async fn resolve_url(&self, url: &str) -> Result<Option<String>, SourceError> {
        Ok(self.lookup(url).await?.map(|c| c.canonical))
    }

    async fn fetch(&self, canonical: &str) -> Result<Option<ArticleContent>, SourceError> {
        self.lookup(canonical).await
    }
}
