//! Application State
//!
//! Holds the wired core services, the loaded configuration and the cycle
//! gates shared by the schedulers and the admin API.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use pressmirror_core::modules::config as core_config;
use pressmirror_core::remote::TokenPool;
use pressmirror_core::store::MemoryStore;
use pressmirror_core::{Collaborators, Services};
use pressmirror_types::AppConfig;

use crate::scheduler::CycleRunner;

/// Snapshot file of the store, inside the data directory.
pub const STORE_FILE: &str = "store.json";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: AppConfig,
    pub data_dir: PathBuf,
    pub services: Services,
    pub reconcile: CycleRunner,
    pub ab_test: CycleRunner,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, data_dir: PathBuf, services: Services) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                data_dir,
                services,
                reconcile: CycleRunner::new("reconcile"),
                ab_test: CycleRunner::new("ab_test"),
                started_at: Instant::now(),
            }),
        }
    }

    /// Wire HTTP collaborators and the file-backed store under `data_dir`.
    pub fn from_config(config: AppConfig, data_dir: PathBuf) -> Result<Self> {
        let store = MemoryStore::open(data_dir.join(STORE_FILE))?;
        let collaborators = Collaborators::http(&config, Arc::new(store))?;
        let services = Services::build(&config, collaborators);
        persist_revocations(&services.tokens, data_dir.clone());
        Ok(Self::new(config, data_dir, services))
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    pub fn reconcile_runner(&self) -> &CycleRunner {
        &self.inner.reconcile
    }

    pub fn ab_test_runner(&self) -> &CycleRunner {
        &self.inner.ab_test
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}

/// Drop tokens the platform rejects from the config file so they stay gone
/// after a restart.
fn persist_revocations(tokens: &TokenPool, data_dir: PathBuf) {
    tokens.on_revoke(move |value| {
        let data_dir = data_dir.clone();
        let value = value.to_string();
        let write = move || match core_config::remove_access_token_in(&data_dir, &value) {
            Ok(true) => tracing::info!("[State] Removed revoked token from the config file"),
            Ok(false) => tracing::debug!("[State] Revoked token was not in the config file"),
            Err(e) => tracing::warn!("[State] Failed to persist token revocation: {}", e),
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => drop(handle.spawn_blocking(write)),
            Err(_) => write(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::offline_config;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_revoked_token_is_removed_from_config_file() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = offline_config();
        config.remote.access_tokens = vec!["EAAGbad".to_string(), "EAAGgood".to_string()];
        core_config::save_config_to(dir.path(), &config).expect("save");

        let state = AppState::from_config(config, dir.path().to_path_buf()).expect("state");
        assert!(state.services().tokens.revoke("EAAGbad"));

        let mut stored = Vec::new();
        for _ in 0..100 {
            stored = core_config::load_config_from(dir.path()).expect("load").remote.access_tokens;
            if stored.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(stored, vec!["EAAGgood"]);
    }
}
