use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{Store, StoreError, StoreResult};

/// On-disk form of a [`MemoryStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    values: BTreeMap<String, Value>,
    #[serde(default)]
    sets: BTreeMap<String, BTreeSet<String>>,
    #[serde(default)]
    sorted: BTreeMap<String, BTreeMap<String, i64>>,
}

/// In-process store. With a snapshot path, every mutation rewrites the
/// snapshot via `<path>.tmp` + rename on the blocking pool. Writes are
/// serialized and each one captures the state at the time it runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<String, Value>,
    sets: DashMap<String, BTreeSet<String>>,
    sorted: DashMap<String, BTreeMap<String, i64>>,
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path` (empty if missing) and persist to it.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let snapshot = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str::<Snapshot>(&raw)
                .map_err(|e| StoreError::serialization(&path.display().to_string(), e))?
        } else {
            Snapshot::default()
        };

        let store = Self {
            values: snapshot.values.into_iter().collect(),
            sets: snapshot.sets.into_iter().collect(),
            sorted: snapshot.sorted.into_iter().collect(),
            path: Some(path),
            write_lock: Mutex::new(()),
        };
        tracing::debug!(
            "[Store] Loaded {} value(s), {} set(s), {} list(s)",
            store.values.len(),
            store.sets.len(),
            store.sorted.len()
        );
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let snapshot = Snapshot {
            values: self.values.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
            sets: self.sets.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
            sorted: self.sorted.iter().map(|e| (e.key().clone(), e.value().clone())).collect(),
        };
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| StoreError::serialization("snapshot", e))?;
        let path = path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &json))
            .await
            .map_err(|e| StoreError::Io(format!("snapshot writer: {e}")))?
    }
}

fn write_snapshot(path: &Path, json: &str) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| StoreError::Io(format!("{}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path).map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> StoreResult<()> {
        self.values.insert(key.to_string(), value);
        self.persist().await
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> StoreResult<bool> {
        let inserted = match self.values.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            },
        };
        if inserted {
            self.persist().await?;
        }
        Ok(inserted)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed = self.values.remove(key).is_some();
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        let added = self.sets.entry(set.to_string()).or_default().insert(member.to_string());
        if added {
            self.persist().await?;
        }
        Ok(added)
    }

    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool> {
        let removed = self.sets.get_mut(set).is_some_and(|mut s| s.remove(member));
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool> {
        Ok(self.sets.get(set).is_some_and(|s| s.contains(member)))
    }

    async fn set_count(&self, set: &str) -> StoreResult<usize> {
        Ok(self.sets.get(set).map_or(0, |s| s.len()))
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        Ok(self.sets.get(set).map(|s| s.iter().cloned().collect()).unwrap_or_default())
    }

    async fn sorted_add(&self, list: &str, member: &str, score: i64) -> StoreResult<()> {
        self.sorted.entry(list.to_string()).or_default().insert(member.to_string(), score);
        self.persist().await
    }

    async fn sorted_range(&self, list: &str, limit: usize) -> StoreResult<Vec<(String, i64)>> {
        let Some(entries) = self.sorted.get(list) else {
            return Ok(Vec::new());
        };
        let mut ranked: Vec<(String, i64)> =
            entries.iter().map(|(member, score)| (member.clone(), *score)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }
}
