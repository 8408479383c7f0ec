//! # Pressmirror Types
//!
//! Domain models, configuration and error definitions for pressmirror.
//!
//! - **`error`** - Typed configuration errors
//! - **`models`** - Articles, remote records, change events, buckets, checkpoints, config
//!
//! ## Architecture Role
//!
//! `pressmirror-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!        pressmirror-types (this crate)
//!                 │
//!                 ▼
//!         pressmirror-core
//!                 │
//!                 ▼
//!        pressmirror-server
//! ```
//!
//! All types are serializable via serde so they can be stored as opaque JSON
//! records and returned from the admin API.

pub mod error;
pub mod models;

pub use error::ConfigError;

pub use models::{
    AbTestConfig, AccessToken, AppConfig, ArticleContent, Bucket, BucketAssignment, ChangeEvent,
    ChangeType, FeedConfig, HistoryEntry, HistoryKind, HistoryOutcome, Item, Mode, PollCheckpoint,
    PollerConfig, RemoteConfig, RemoteRecord, RemoteRecords, ServerConfig, SourceConfig,
};
