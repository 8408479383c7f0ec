//! Articles and their per-mode remote state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mode::Mode;

/// Article content as returned by the identifying source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleContent {
    pub id: String,
    pub canonical: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Remote record for one mode.
///
/// `Absent -> Present` happens only after a successful publish call and
/// `Present -> Absent` only after a successful delete call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RemoteRecord {
    #[default]
    Absent,
    Present { remote_id: String, published: bool },
}

impl RemoteRecord {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Self::Present { published: true, .. })
    }

    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Present { remote_id, .. } => Some(remote_id),
            Self::Absent => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RemoteRecords {
    #[serde(default)]
    pub development: RemoteRecord,
    #[serde(default)]
    pub production: RemoteRecord,
}

impl RemoteRecords {
    pub fn get(&self, mode: Mode) -> &RemoteRecord {
        match mode {
            Mode::Development => &self.development,
            Mode::Production => &self.production,
        }
    }

    pub fn set(&mut self, mode: Mode, record: RemoteRecord) {
        match mode {
            Mode::Development => self.development = record,
            Mode::Production => self.production = record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Import,
    Update,
    Delete,
    CanonicalChanged,
    AbTest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub mode: Mode,
    pub timestamp: DateTime<Utc>,
    pub outcome: HistoryOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HistoryEntry {
    pub fn success(kind: HistoryKind, mode: Mode) -> Self {
        Self { kind, mode, timestamp: Utc::now(), outcome: HistoryOutcome::Success, detail: None }
    }

    pub fn failure(kind: HistoryKind, mode: Mode, detail: impl Into<String>) -> Self {
        Self {
            kind,
            mode,
            timestamp: Utc::now(),
            outcome: HistoryOutcome::Failure,
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// A catalogue article as tracked locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub canonical: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub remote: RemoteRecords,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl Item {
    pub fn from_content(content: ArticleContent) -> Self {
        Self {
            id: content.id,
            canonical: content.canonical,
            title: content.title,
            body: content.body,
            published_at: content.published_at,
            updated_at: content.updated_at,
            remote: RemoteRecords::default(),
            history: Vec::new(),
        }
    }

    /// Replace the content fields, keeping remote state and history.
    pub fn refresh(&mut self, content: ArticleContent) {
        self.canonical = content.canonical;
        self.title = content.title;
        self.body = content.body;
        self.published_at = content.published_at;
        self.updated_at = content.updated_at;
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// History is append-only.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    pub fn record(&self, mode: Mode) -> &RemoteRecord {
        self.remote.get(mode)
    }

    /// True if the item has ever reached the remote platform in `mode`.
    pub fn was_sent(&self, mode: Mode) -> bool {
        self.remote.get(mode).is_present()
            || self.history.iter().any(|h| {
                h.mode == mode
                    && h.outcome == HistoryOutcome::Success
                    && matches!(h.kind, HistoryKind::Import | HistoryKind::Update)
            })
    }
}
