//! Per-component configuration sections.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Publishing platform settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct RemoteConfig {
    /// Graph API root, without version
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    /// Graph API version path segment
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Page that owns the published articles
    #[serde(default)]
    pub page_id: String,
    /// Page access tokens, used round-robin
    #[serde(default)]
    pub access_tokens: Vec<String>,
    /// Attempts per call for transient failures
    #[validate(range(min = 1_u32, max = 10_u32))]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between retry attempts (0 = immediate)
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// Maximum time to wait for an import to finish
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_import_wait_secs")]
    pub import_wait_secs: u64,
    /// Import status polling cadence
    #[validate(range(min = 10_u64))]
    #[serde(default = "default_import_poll_interval_ms")]
    pub import_poll_interval_ms: u64,
    /// Per-request HTTP timeout
    #[validate(range(min = 1_u64))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base_url(),
            api_version: default_api_version(),
            page_id: String::new(),
            access_tokens: Vec::new(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: 0,
            import_wait_secs: default_import_wait_secs(),
            import_poll_interval_ms: default_import_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Change notification feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Path of the schema v1 notifications resource
    #[serde(default = "default_v1_path")]
    pub v1_path: String,
    /// Path of the schema v2 notifications resource
    #[serde(default = "default_v2_path")]
    pub v2_path: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            v1_path: default_v1_path(),
            v2_path: default_v2_path(),
        }
    }
}

/// Content API used to identify and hydrate articles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SourceConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Reconciliation poll loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct PollerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between cycles
    #[validate(range(min = 5_u64, max = 86_400_u64))]
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    /// Seconds re-queried from the previous window
    #[serde(default = "default_overlap_secs")]
    pub overlap_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_poll_interval_secs(),
            overlap_secs: default_overlap_secs(),
        }
    }
}

/// A/B test poll loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct AbTestConfig {
    #[serde(default)]
    pub enabled: bool,
    #[validate(range(min = 5_u64, max = 86_400_u64))]
    #[serde(default = "default_ab_interval_secs")]
    pub interval_secs: u64,
    /// Maximum number of recent shares inspected per cycle
    #[validate(range(min = 1_usize, max = 1000_usize))]
    #[serde(default = "default_share_limit")]
    pub share_limit: usize,
}

impl Default for AbTestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_ab_interval_secs(),
            share_limit: default_share_limit(),
        }
    }
}

/// Admin HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), port: default_port() }
    }
}

fn default_true() -> bool {
    true
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v19.0".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_import_wait_secs() -> u64 {
    60
}

fn default_import_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_v1_path() -> String {
    "/content/notifications".to_string()
}

fn default_v2_path() -> String {
    "/content/notifications-v2".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_overlap_secs() -> u64 {
    300
}

fn default_ab_interval_secs() -> u64 {
    300
}

fn default_share_limit() -> usize {
    100
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8046
}
