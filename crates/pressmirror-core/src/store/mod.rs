//! Storage collaborator.
//!
//! Persisted state is addressed by string keys and holds opaque JSON records,
//! string sets and score-ordered lists. Misses are `None`, never errors.
//! Writes are last-write-wins; a single active poller is assumed.

mod memory;
mod repository;

pub use memory::MemoryStore;
pub use repository::{ArticleRepository, BucketCounts, PublishedEntry};

use async_trait::async_trait;
use serde_json::Value;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Serialization error for '{key}': {message}")]
    Serialization { key: String, message: String },
    #[error("Snapshot I/O error: {0}")]
    Io(String),
}

impl StoreError {
    pub fn serialization(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Serialization { key: key.to_string(), message: err.to_string() }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Store `value` only if `key` is unset. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: Value) -> StoreResult<bool>;

    async fn delete(&self, key: &str) -> StoreResult<bool>;

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool>;

    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool>;

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool>;

    async fn set_count(&self, set: &str) -> StoreResult<usize>;

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>>;

    /// Insert or rescore `member`.
    async fn sorted_add(&self, list: &str, member: &str, score: i64) -> StoreResult<()>;

    /// Up to `limit` members, highest score first.
    async fn sorted_range(&self, list: &str, limit: usize) -> StoreResult<Vec<(String, i64)>>;
}
