//! Application-level configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::sections::{
    AbTestConfig, FeedConfig, PollerConfig, RemoteConfig, ServerConfig, SourceConfig,
};
use crate::models::Mode;

const REDACTED: &str = "[REDACTED]";

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
pub struct AppConfig {
    /// Which side of the publishing platform to write to
    #[serde(default)]
    pub mode: Mode,
    /// Publishing platform (graph API) settings
    #[serde(default)]
    #[validate(nested)]
    pub remote: RemoteConfig,
    /// Change notification feed
    #[serde(default)]
    pub feed: FeedConfig,
    /// Content API used to identify and hydrate articles
    #[serde(default)]
    pub source: SourceConfig,
    /// Reconciliation poll loop
    #[serde(default)]
    #[validate(nested)]
    pub poller: PollerConfig,
    /// A/B test poll loop
    #[serde(default)]
    #[validate(nested)]
    pub ab_test: AbTestConfig,
    /// Admin HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy with every credential replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for token in &mut copy.remote.access_tokens {
            *token = REDACTED.to_string();
        }
        if copy.feed.api_key.is_some() {
            copy.feed.api_key = Some(REDACTED.to_string());
        }
        if copy.source.api_key.is_some() {
            copy.source.api_key = Some(REDACTED.to_string());
        }
        copy
    }
}
