//! Upstream change-notification feed.
//!
//! Two schema versions are served side by side. v1 events already match
//! [`ChangeEvent`]; v2 events carry a type URI and an id URL whose trailing
//! segments are the change type and internal id.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use pressmirror_types::{ChangeEvent, ChangeType, FeedConfig};

/// Safety stop for feeds that keep returning continuation links.
const MAX_PAGES: usize = 500;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Transport(String),
    #[error("Feed returned HTTP {status} for {url}")]
    Http { status: u16, url: String },
    #[error("Feed response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    V1,
    V2,
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Every change in `[start, end]` (unix seconds), both schemas merged.
    async fn changes(&self, start: i64, end: i64) -> Result<Vec<ChangeEvent>, FeedError>;
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    notifications: Vec<Value>,
    #[serde(default)]
    links: Vec<FeedLink>,
}

#[derive(Debug, Deserialize)]
struct FeedLink {
    href: String,
}

/// Map one raw notification to a [`ChangeEvent`]. Unknown shapes are `None`.
pub fn normalize(schema: Schema, raw: &Value) -> Option<ChangeEvent> {
    let kind = raw.get("type").and_then(Value::as_str)?;
    let id = raw.get("id").and_then(Value::as_str)?;
    let event = match schema {
        Schema::V1 => ChangeEvent::new(ChangeType::from_label(kind)?, id),
        Schema::V2 => {
            let change_type = ChangeType::from_label(last_segment(kind))?;
            ChangeEvent::new(change_type, last_segment(id))
        },
    };
    (!event.target_id.is_empty()).then_some(event)
}

fn last_segment(text: &str) -> &str {
    text.trim_end_matches('/').rsplit('/').next().unwrap_or(text)
}

pub struct HttpChangeFeed {
    client: Client,
    config: FeedConfig,
}

impl HttpChangeFeed {
    pub fn new(client: Client, config: FeedConfig) -> Self {
        Self { client, config }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn fetch_page(&self, url: &str, query: &[(&str, String)]) -> Result<FeedPage, FeedError> {
        let mut request = self.client.get(url).query(query);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(|e| FeedError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Http { status: status.as_u16(), url: strip_query(url) });
        }
        response.json::<FeedPage>().await.map_err(|e| FeedError::Decode(e.to_string()))
    }

    async fn collect(&self, schema: Schema, start: i64, end: i64) -> Result<Vec<ChangeEvent>, FeedError> {
        let path = match schema {
            Schema::V1 => &self.config.v1_path,
            Schema::V2 => &self.config.v2_path,
        };
        let query = vec![("since", rfc3339(start)?), ("to", rfc3339(end)?)];

        let mut events = Vec::new();
        let mut url = self.url_for(path);
        let mut page = self.fetch_page(&url, &query).await?;
        for _ in 0..MAX_PAGES {
            let before = events.len();
            events.extend(page.notifications.iter().filter_map(|raw| {
                let event = normalize(schema, raw);
                if event.is_none() {
                    tracing::debug!("[Feed] Dropping unrecognised notification: {}", raw);
                }
                event
            }));

            let next = match page.links.first() {
                Some(link) if !page.notifications.is_empty() && link.href != url => link.href.clone(),
                _ => break,
            };
            tracing::debug!("[Feed] {:?} page added {} event(s), following link", schema, events.len() - before);
            url = next;
            // Continuation links carry their own cursor.
            page = self.fetch_page(&url, &[]).await?;
        }
        Ok(events)
    }
}

#[async_trait]
impl ChangeFeed for HttpChangeFeed {
    async fn changes(&self, start: i64, end: i64) -> Result<Vec<ChangeEvent>, FeedError> {
        let (v1, v2) =
            tokio::try_join!(self.collect(Schema::V1, start, end), self.collect(Schema::V2, start, end))?;
        let mut merged = v1;
        merged.extend(v2);
        Ok(merged)
    }
}

fn rfc3339(ts: i64) -> Result<String, FeedError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .ok_or_else(|| FeedError::Decode(format!("timestamp {ts} out of range")))
}

fn strip_query(url: &str) -> String {
    url.split('?').next().unwrap_or(url).to_string()
}
