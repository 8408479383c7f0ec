//! High-level operations against the publishing platform.

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::batch::{BatchClient, BatchOptions};
use super::error::{CallContext, RemoteError};
use super::sanitize::redact_secrets;
use super::token_pool::TokenPool;
use super::transport::{BatchRequest, GraphTransport, HttpMethod};
use crate::retry::RetryExecutor;
use pressmirror_types::{Mode, RemoteConfig};

/// Maximum ids per chunk in [`RemoteCatalogClient::get_many`].
pub const MAX_IDS_PER_CALL: usize = 50;

const IMPORT_STATUS_FIELDS: &str = "status,errors,instant_article";

/// How chunked `get_many` responses are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reassemble {
    /// Each chunk yields an array; results are concatenated in id order.
    Concat,
    /// Each chunk yields an object keyed by id; keys are merged.
    Union,
}

/// An article as known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteArticle {
    pub id: String,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub import_id: String,
    /// Set once the import has finished
    pub remote_id: Option<String>,
    pub status: String,
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct RemoteCatalogClient {
    transport: Arc<dyn GraphTransport>,
    tokens: Arc<TokenPool>,
    batch: BatchClient,
    retry: RetryExecutor,
    mode: Mode,
    page_id: String,
    access_token: Option<String>,
    import_wait: Duration,
    import_poll_interval: Duration,
}

impl RemoteCatalogClient {
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        tokens: Arc<TokenPool>,
        mode: Mode,
        config: &RemoteConfig,
    ) -> Self {
        let retry = RetryExecutor::new(config.max_attempts)
            .with_delay(Duration::from_millis(config.retry_delay_ms));
        Self {
            batch: BatchClient::new(transport.clone(), tokens.clone(), retry),
            transport,
            tokens,
            retry,
            mode,
            page_id: config.page_id.clone(),
            access_token: None,
            import_wait: Duration::from_secs(config.import_wait_secs),
            import_poll_interval: Duration::from_millis(config.import_poll_interval_ms),
        }
    }

    /// Use `token` for every call instead of rotating through the pool.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn tokens(&self) -> &Arc<TokenPool> {
        &self.tokens
    }

    /// Field holding the page's article for a URL in the current mode.
    pub fn article_field(&self) -> &'static str {
        match self.mode {
            Mode::Production => "instant_article",
            Mode::Development => "development_instant_article",
        }
    }

    fn batch_options(&self) -> BatchOptions {
        BatchOptions { access_token: self.access_token.clone(), error_handler: None }
    }

    async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Value, RemoteError> {
        let token = self.tokens.resolve(self.access_token.as_deref())?;
        let token_ref = token.as_str();
        let label = format!("{} {}", method, redact_secrets(path));

        let result = self
            .retry
            .execute(&label, move |_| self.transport.call(method, path, params, token_ref))
            .await;

        if let Err(e) = &result {
            if self.access_token.is_none() && e.is_invalid_token() {
                self.tokens.revoke(&token);
            }
        }
        result
    }

    /// Lazy page sequence starting at `path`, following `paging.next` links.
    ///
    /// Ends after a page without a continuation link, or after a lifetime
    /// aggregate page whose links are meaningless. Each call starts over.
    pub fn pages<'a>(
        &'a self,
        path: &'a str,
        params: Vec<(String, String)>,
    ) -> impl Stream<Item = Result<Value, RemoteError>> + 'a {
        try_stream! {
            let mut page = self.call(HttpMethod::Get, path, &params).await?;
            loop {
                let next = if is_lifetime_page(&page) { None } else { next_link(&page) };
                yield page;
                match next {
                    Some(url) => page = self.call(HttpMethod::Get, &url, &[]).await?,
                    None => break,
                }
            }
        }
    }

    /// Concatenated `data` of every page, stopping once `limit` items are
    /// collected.
    pub async fn list(
        &self,
        path: &str,
        params: &[(&str, &str)],
        limit: Option<usize>,
    ) -> Result<Vec<Value>, RemoteError> {
        let stream = self.pages(path, owned(params));
        futures::pin_mut!(stream);

        let mut items = Vec::new();
        while let Some(page) = stream.next().await {
            let page = page?;
            if let Some(data) = page.get("data").and_then(Value::as_array) {
                items.extend(data.iter().cloned());
            }
            if limit.is_some_and(|l| items.len() >= l) {
                break;
            }
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    pub async fn get(&self, id: &str, fields: Option<&str>) -> Result<Value, RemoteError> {
        let params = fields.map(|f| vec![("fields".to_string(), f.to_string())]).unwrap_or_default();
        self.call(HttpMethod::Get, id, &params).await
    }

    /// Fetch many ids in chunks of [`MAX_IDS_PER_CALL`].
    pub async fn get_many(
        &self,
        ids: &[String],
        fields: Option<&str>,
        reassemble: Reassemble,
    ) -> Result<Value, RemoteError> {
        match reassemble {
            Reassemble::Union => {
                let mut merged = Map::new();
                for chunk in ids.chunks(MAX_IDS_PER_CALL) {
                    let mut params = vec![("ids".to_string(), chunk.join(","))];
                    if let Some(fields) = fields {
                        params.push(("fields".to_string(), fields.to_string()));
                    }
                    match self.call(HttpMethod::Get, "", &params).await? {
                        Value::Object(map) => merged.extend(map),
                        other => {
                            return Err(RemoteError::decode(
                                format!("expected object keyed by id, got {other}"),
                                CallContext::new("get_many").param("chunk", chunk.len().to_string()),
                            ))
                        },
                    }
                }
                Ok(Value::Object(merged))
            },
            Reassemble::Concat => {
                let mut all = Vec::with_capacity(ids.len());
                for chunk in ids.chunks(MAX_IDS_PER_CALL) {
                    let requests: Vec<BatchRequest> = chunk
                        .iter()
                        .map(|id| match fields {
                            Some(fields) => BatchRequest::get(format!("{id}?fields={fields}")),
                            None => BatchRequest::get(id.clone()),
                        })
                        .collect();
                    all.extend(self.batch.call_batched(&requests, &self.batch_options()).await?);
                }
                Ok(Value::Array(all))
            },
        }
    }

    /// Import an article document. With `wait`, blocks until the import
    /// finishes, fails or exceeds the configured wait.
    pub async fn post(
        &self,
        html: &str,
        published: bool,
        wait: bool,
    ) -> Result<ImportOutcome, RemoteError> {
        let path = format!("{}/instant_articles", self.page_id);
        let params = vec![
            ("html_source".to_string(), html.to_string()),
            ("published".to_string(), published.to_string()),
            ("development_mode".to_string(), self.mode.is_development().to_string()),
        ];
        let response = self.call(HttpMethod::Post, &path, &params).await?;
        let import_id = response.get("id").and_then(Value::as_str).ok_or_else(|| {
            RemoteError::decode("import response without id", CallContext::new("post"))
        })?;

        if !wait {
            return Ok(ImportOutcome {
                import_id: import_id.to_string(),
                remote_id: None,
                status: "SUBMITTED".to_string(),
                warnings: Vec::new(),
            });
        }
        self.wait_for_import(import_id).await
    }

    async fn wait_for_import(&self, import_id: &str) -> Result<ImportOutcome, RemoteError> {
        let started = Instant::now();
        let params = vec![("fields".to_string(), IMPORT_STATUS_FIELDS.to_string())];
        loop {
            let status = self.call(HttpMethod::Get, import_id, &params).await?;
            match status.get("status").and_then(Value::as_str).unwrap_or_default() {
                "SUCCESS" => {
                    let remote_id = status
                        .pointer("/instant_article/id")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    tracing::debug!("[Remote] import {} finished", import_id);
                    return Ok(ImportOutcome {
                        import_id: import_id.to_string(),
                        remote_id,
                        status: "SUCCESS".to_string(),
                        warnings: import_messages(&status, |level| level != "ERROR"),
                    });
                },
                "FAILED" => {
                    return Err(RemoteError::Import {
                        import_id: import_id.to_string(),
                        errors: import_messages(&status, |level| level == "ERROR"),
                    });
                },
                "IN_PROGRESS" => {
                    let waited = started.elapsed();
                    if waited >= self.import_wait {
                        return Err(RemoteError::ImportTimeout {
                            import_id: import_id.to_string(),
                            waited_secs: waited.as_secs(),
                        });
                    }
                    tokio::time::sleep(self.import_poll_interval).await;
                },
                other => {
                    return Err(RemoteError::UnexpectedImportStatus {
                        import_id: import_id.to_string(),
                        status: other.to_string(),
                    });
                },
            }
        }
    }

    /// Look up the platform's article for `canonical`.
    pub async fn find(&self, canonical: &str) -> Result<Option<RemoteArticle>, RemoteError> {
        let field = self.article_field();
        let params = vec![
            ("id".to_string(), canonical.to_string()),
            ("fields".to_string(), format!("{field}{{id,publish_status}}")),
        ];
        let response = self.call(HttpMethod::Get, "", &params).await?;
        Ok(response.get(field).and_then(|article| {
            let id = article.get("id").and_then(Value::as_str)?;
            Some(RemoteArticle {
                id: id.to_string(),
                published: article.get("publish_status").and_then(Value::as_str) == Some("LIVE"),
            })
        }))
    }

    /// Delete the platform's article for `canonical`. Returns false when
    /// there was nothing to delete.
    pub async fn delete(&self, canonical: &str) -> Result<bool, RemoteError> {
        let field = self.article_field();
        let encoded: String = url::form_urlencoded::byte_serialize(canonical.as_bytes()).collect();
        let requests = [
            BatchRequest::get(format!("?id={encoded}&fields={field}")).named("lookup"),
            BatchRequest::delete(format!("{{result=lookup:$.{field}.id}}")).depends_on("lookup"),
        ];
        let options = self.batch_options().with_error_handler(move |previous, _| match previous {
            Some(lookup) if lookup.get(field).is_none() => Ok(json!({"success": false, "absent": true})),
            _ => Err(format!("{field} exists but could not be deleted")),
        });

        let results = self.batch.call_batched(&requests, &options).await?;
        let deleted = results
            .get(1)
            .and_then(|r| r.get("success"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !deleted {
            tracing::debug!("[Remote] nothing to delete for {}", canonical);
        }
        Ok(deleted)
    }
}

fn owned(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn next_link(page: &Value) -> Option<String> {
    page.pointer("/paging/next").and_then(Value::as_str).map(str::to_string)
}

/// Insights pages for lifetime metrics carry paging links that loop forever.
fn is_lifetime_page(page: &Value) -> bool {
    page.get("data")
        .and_then(Value::as_array)
        .is_some_and(|data| {
            data.iter().any(|m| m.get("period").and_then(Value::as_str) == Some("lifetime"))
        })
}

fn import_messages(status: &Value, keep: impl Fn(&str) -> bool) -> Vec<String> {
    status
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter(|e| keep(e.get("level").and_then(Value::as_str).unwrap_or("ERROR")))
                .filter_map(|e| e.get("message").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
