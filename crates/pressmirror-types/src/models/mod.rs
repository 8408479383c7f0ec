//! Core domain models for pressmirror.
//!
//! Everything here is stored as opaque JSON by the storage collaborator, so
//! field renames are breaking changes for existing data directories.

mod bucket;
mod change;
mod checkpoint;
mod config;
mod item;
mod mode;
mod token;

pub use bucket::{Bucket, BucketAssignment};
pub use change::{ChangeEvent, ChangeType};
pub use checkpoint::PollCheckpoint;
pub use config::{
    AbTestConfig, AppConfig, FeedConfig, PollerConfig, RemoteConfig, ServerConfig, SourceConfig,
};
pub use item::{
    ArticleContent, HistoryEntry, HistoryKind, HistoryOutcome, Item, RemoteRecord, RemoteRecords,
};
pub use mode::Mode;
pub use token::AccessToken;
