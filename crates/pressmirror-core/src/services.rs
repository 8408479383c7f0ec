//! Wiring of the core components from an [`AppConfig`].

use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppResult;
use crate::feed::{ChangeFeed, HttpChangeFeed};
use crate::publish::{AbTestPoller, PublishPipeline};
use crate::reconcile::{CanonicalResolver, ChangeReconciler};
use crate::remote::{
    CallContext, GraphTransport, HttpGraphTransport, RemoteCatalogClient, RemoteError, TokenPool,
};
use crate::source::{ArticleSource, BasicRenderer, HttpArticleSource, Renderer};
use crate::store::{ArticleRepository, Store};
use pressmirror_types::{AppConfig, Mode};

/// Collaborators the services are built from. Tests swap in fakes.
pub struct Collaborators {
    pub transport: Arc<dyn GraphTransport>,
    pub source: Arc<dyn ArticleSource>,
    pub feed: Arc<dyn ChangeFeed>,
    pub renderer: Arc<dyn Renderer>,
    pub store: Arc<dyn Store>,
}

impl Collaborators {
    /// HTTP-backed collaborators for `config`, sharing one client.
    pub fn http(config: &AppConfig, store: Arc<dyn Store>) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.remote.request_timeout_secs))
            .build()
            .map_err(|e| RemoteError::Transport {
                message: e.to_string(),
                context: CallContext::new("build_http_client"),
            })?;
        let transport = HttpGraphTransport::new(
            client.clone(),
            &config.remote.graph_base_url,
            &config.remote.api_version,
        );
        Ok(Self {
            transport: Arc::new(transport),
            source: Arc::new(HttpArticleSource::new(client.clone(), &config.source)),
            feed: Arc::new(HttpChangeFeed::new(client, config.feed.clone())),
            renderer: Arc::new(BasicRenderer::new()),
            store,
        })
    }
}

/// Everything the schedulers and the admin surface operate on.
#[derive(Clone)]
pub struct Services {
    pub mode: Mode,
    pub tokens: Arc<TokenPool>,
    pub remote: RemoteCatalogClient,
    pub repo: ArticleRepository,
    pub reconciler: Arc<ChangeReconciler>,
    pub ab_test: AbTestPoller,
}

impl Services {
    pub fn build(config: &AppConfig, collaborators: Collaborators) -> Self {
        let mode = config.mode;
        let tokens = Arc::new(TokenPool::from_values(config.remote.access_tokens.iter().cloned()));
        let remote =
            RemoteCatalogClient::new(collaborators.transport, tokens.clone(), mode, &config.remote);
        let repo = ArticleRepository::new(collaborators.store, mode);

        let resolver = CanonicalResolver::new(
            collaborators.source.clone(),
            remote.clone(),
            repo.clone(),
            collaborators.renderer.clone(),
        );
        let reconciler = ChangeReconciler::new(
            collaborators.feed,
            resolver,
            remote.clone(),
            repo.clone(),
            &config.poller,
        );
        let pipeline = PublishPipeline::new(
            collaborators.source,
            remote.clone(),
            repo.clone(),
            collaborators.renderer,
        );

        tracing::info!("[Services] Mode {}, {} access token(s)", mode, tokens.len());
        Self {
            mode,
            tokens,
            remote,
            repo,
            reconciler: Arc::new(reconciler),
            ab_test: AbTestPoller::new(pipeline, config.ab_test.share_limit),
        }
    }
}
