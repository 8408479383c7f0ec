//! Test helpers for pressmirror-server unit tests.

use tempfile::TempDir;

use pressmirror_types::AppConfig;

use crate::state::AppState;

/// Config whose remote endpoints are unroutable, so nothing leaves the host.
pub fn offline_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.remote.graph_base_url = "http://127.0.0.1:9".to_string();
    config.remote.page_id = "1200".to_string();
    config.feed.base_url = "http://127.0.0.1:9".to_string();
    config.source.base_url = "http://127.0.0.1:9".to_string();
    config
}

/// Create a minimal `AppState` for testing.
///
/// Returns `(AppState, TempDir)`; keep `TempDir` alive for the test duration.
pub fn test_app_state() -> (AppState, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let state = AppState::from_config(offline_config(), temp_dir.path().to_path_buf())
        .expect("failed to create test AppState");
    (state, temp_dir)
}
