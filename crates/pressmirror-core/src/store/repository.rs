//! Typed, mode-aware facade over a [`Store`].
//!
//! Key layout:
//!
//! ```text
//! item:{canonical}               Item (shared by both modes)
//! id:{id}                        canonical currently mapped to an internal id
//! {mode}:known                   set of tracked canonicals
//! {mode}:bucket:{canonical}      BucketAssignment
//! {mode}:buckets:{bucket}        set of canonicals per bucket
//! {mode}:checkpoint              PollCheckpoint
//! {mode}:published               canonicals scored by publish time
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::{Store, StoreError, StoreResult};
use pressmirror_types::{Bucket, BucketAssignment, HistoryEntry, Item, Mode, PollCheckpoint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub test: usize,
    pub control: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedEntry {
    pub canonical: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct ArticleRepository {
    store: Arc<dyn Store>,
    mode: Mode,
}

impl ArticleRepository {
    pub fn new(store: Arc<dyn Store>, mode: Mode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn scoped(&self, suffix: &str) -> String {
        format!("{}:{}", self.mode.as_str(), suffix)
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.store.get(key).await? {
            Some(value) => {
                serde_json::from_value(value).map(Some).map_err(|e| StoreError::serialization(key, e))
            },
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_value(value).map_err(|e| StoreError::serialization(key, e))?;
        self.store.set(key, json).await
    }

    // ---- items ----

    pub async fn item(&self, canonical: &str) -> StoreResult<Option<Item>> {
        self.read(&format!("item:{canonical}")).await
    }

    pub async fn canonical_for_id(&self, id: &str) -> StoreResult<Option<String>> {
        self.read(&format!("id:{id}")).await
    }

    /// Store `item` under its canonical, map its id there and track it.
    pub async fn save_item(&self, item: &Item) -> StoreResult<()> {
        self.write(&format!("item:{}", item.canonical), item).await?;
        self.write(&format!("id:{}", item.id), &item.canonical).await?;
        self.store.set_add(&self.scoped("known"), &item.canonical).await?;
        Ok(())
    }

    /// Drop the record under `canonical`. The id mapping is removed only if
    /// it still points here.
    pub async fn remove_item(&self, canonical: &str) -> StoreResult<Option<Item>> {
        let existing = self.item(canonical).await?;
        self.store.delete(&format!("item:{canonical}")).await?;
        self.store.set_remove(&self.scoped("known"), canonical).await?;
        if let Some(item) = &existing {
            if self.canonical_for_id(&item.id).await?.as_deref() == Some(canonical) {
                self.store.delete(&format!("id:{}", item.id)).await?;
            }
        }
        Ok(existing)
    }

    pub async fn is_known(&self, canonical: &str) -> StoreResult<bool> {
        self.store.set_contains(&self.scoped("known"), canonical).await
    }

    pub async fn known_count(&self) -> StoreResult<usize> {
        self.store.set_count(&self.scoped("known")).await
    }

    /// Append to the item's history. Returns false if the item is unknown.
    pub async fn append_history(&self, canonical: &str, entry: HistoryEntry) -> StoreResult<bool> {
        let Some(mut item) = self.item(canonical).await? else {
            return Ok(false);
        };
        item.push_history(entry);
        self.write(&format!("item:{canonical}"), &item).await?;
        Ok(true)
    }

    // ---- buckets ----

    pub async fn bucket(&self, canonical: &str) -> StoreResult<Option<BucketAssignment>> {
        self.read(&self.scoped(&format!("bucket:{canonical}"))).await
    }

    /// Persist the bucket for `canonical` unless one is already stored.
    /// Returns false (and leaves the stored value alone) on a repeat.
    pub async fn set_with_bucket(&self, canonical: &str, bucket: Bucket) -> StoreResult<bool> {
        let key = self.scoped(&format!("bucket:{canonical}"));
        let assignment = BucketAssignment::new(canonical, bucket);
        let json = serde_json::to_value(&assignment).map_err(|e| StoreError::serialization(&key, e))?;
        if !self.store.set_if_absent(&key, json).await? {
            return Ok(false);
        }
        self.store.set_add(&self.bucket_set(bucket), canonical).await?;
        Ok(true)
    }

    /// Supersede any assignment with `Removed`.
    pub async fn mark_removed(&self, canonical: &str) -> StoreResult<()> {
        if let Some(previous) = self.bucket(canonical).await? {
            if previous.bucket == Bucket::Removed {
                return Ok(());
            }
            self.store.set_remove(&self.bucket_set(previous.bucket), canonical).await?;
        }
        let key = self.scoped(&format!("bucket:{canonical}"));
        self.write(&key, &BucketAssignment::new(canonical, Bucket::Removed)).await?;
        self.store.set_add(&self.bucket_set(Bucket::Removed), canonical).await?;
        Ok(())
    }

    fn bucket_set(&self, bucket: Bucket) -> String {
        self.scoped(&format!("buckets:{}", bucket.as_str()))
    }

    pub async fn bucket_counts(&self) -> StoreResult<BucketCounts> {
        Ok(BucketCounts {
            test: self.store.set_count(&self.bucket_set(Bucket::Test)).await?,
            control: self.store.set_count(&self.bucket_set(Bucket::Control)).await?,
            removed: self.store.set_count(&self.bucket_set(Bucket::Removed)).await?,
        })
    }

    // ---- checkpoint ----

    pub async fn checkpoint(&self) -> StoreResult<Option<PollCheckpoint>> {
        self.read(&self.scoped("checkpoint")).await
    }

    pub async fn save_checkpoint(&self, checkpoint: &PollCheckpoint) -> StoreResult<()> {
        self.write(&self.scoped("checkpoint"), checkpoint).await
    }

    // ---- published index ----

    pub async fn record_published(&self, canonical: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.store.sorted_add(&self.scoped("published"), canonical, at.timestamp()).await
    }

    pub async fn recently_published(&self, limit: usize) -> StoreResult<Vec<PublishedEntry>> {
        let ranked = self.store.sorted_range(&self.scoped("published"), limit).await?;
        Ok(ranked
            .into_iter()
            .map(|(canonical, score)| PublishedEntry {
                canonical,
                published_at: Utc.timestamp_opt(score, 0).single(),
            })
            .collect())
    }
}
