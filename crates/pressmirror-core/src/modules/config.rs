//! Configuration file and environment overrides.
//!
//! The file lives at `<data_dir>/pressmirror.json`. Environment variables are
//! applied on top after loading and are never written back.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use pressmirror_types::{AppConfig, ConfigError, Mode};

pub const CONFIG_FILE: &str = "pressmirror.json";
const DATA_DIR: &str = ".pressmirror";

pub const ENV_DATA_DIR: &str = "PRESSMIRROR_DATA_DIR";
pub const ENV_MODE: &str = "PRESSMIRROR_MODE";
pub const ENV_GRAPH_URL: &str = "PRESSMIRROR_GRAPH_URL";
pub const ENV_PAGE_ID: &str = "PRESSMIRROR_PAGE_ID";
pub const ENV_ACCESS_TOKENS: &str = "PRESSMIRROR_ACCESS_TOKENS";
pub const ENV_FEED_URL: &str = "PRESSMIRROR_FEED_URL";
pub const ENV_SOURCE_URL: &str = "PRESSMIRROR_SOURCE_URL";
pub const ENV_PORT: &str = "PRESSMIRROR_PORT";

/// Data directory, created if missing.
///
/// 1. `PRESSMIRROR_DATA_DIR` (container deployments)
/// 2. `~/.pressmirror`
pub fn get_data_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = match std::env::var(ENV_DATA_DIR) {
        Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom),
        _ => dirs::home_dir()
            .ok_or_else(|| ConfigError::DataDir { message: "home directory not found".to_string() })?
            .join(DATA_DIR),
    };
    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)
            .map_err(|e| ConfigError::DataDir { message: format!("{}: {}", data_dir.display(), e) })?;
    }
    Ok(data_dir)
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// File config in `data_dir` with process environment overrides on top.
pub fn load_config(data_dir: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(data_dir)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

/// File contents only; defaults when the file does not exist.
pub fn load_config_from(data_dir: &Path) -> Result<AppConfig, ConfigError> {
    let path = config_path(data_dir);
    if !path.exists() {
        return Ok(AppConfig::new());
    }
    let content = fs::read_to_string(&path)
        .map_err(|e| ConfigError::ParseError { message: format!("{}: {}", path.display(), e) })?;
    let config: AppConfig = serde_json::from_str(&content).map_err(|e| ConfigError::from_json_error(&e))?;
    validate_config(&config)?;
    Ok(config)
}

/// Atomic write: `<file>.tmp` then rename.
pub fn save_config_to(data_dir: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    validate_config(config)?;
    let path = config_path(data_dir);
    let temp_path = data_dir.join(format!("{}.tmp", CONFIG_FILE));
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::WriteError { message: e.to_string() })?;
    fs::write(&temp_path, content).map_err(|e| ConfigError::from_io_error(&e))?;
    fs::rename(&temp_path, &path).map_err(|e| ConfigError::from_io_error(&e))
}

/// Read, modify and save the file in `data_dir`. Environment overrides are
/// not applied, so they never leak into the file.
pub fn update_config_in<F>(data_dir: &Path, updater: F) -> Result<AppConfig, ConfigError>
where
    F: FnOnce(&mut AppConfig),
{
    let mut config = load_config_from(data_dir)?;
    updater(&mut config);
    save_config_to(data_dir, &config)?;
    Ok(config)
}

/// Drop `value` from the stored access tokens. Returns false without
/// writing when the file does not list it.
pub fn remove_access_token_in(data_dir: &Path, value: &str) -> Result<bool, ConfigError> {
    let config = load_config_from(data_dir)?;
    if !config.remote.access_tokens.iter().any(|t| t.trim() == value) {
        return Ok(false);
    }
    update_config_in(data_dir, |config| config.remote.access_tokens.retain(|t| t.trim() != value))?;
    Ok(true)
}

/// Apply `PRESSMIRROR_*` overrides read through `lookup`. Malformed values
/// are ignored with a warning.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(raw) = read(ENV_MODE) {
        match Mode::from_str(&raw) {
            Ok(mode) => config.mode = mode,
            Err(e) => tracing::warn!("[Config] Ignoring {}: {}", ENV_MODE, e),
        }
    }
    if let Some(url) = read(ENV_GRAPH_URL).and_then(|v| checked_url(ENV_GRAPH_URL, v)) {
        config.remote.graph_base_url = url;
    }
    if let Some(page_id) = read(ENV_PAGE_ID) {
        config.remote.page_id = page_id;
    }
    if let Some(raw) = read(ENV_ACCESS_TOKENS) {
        config.remote.access_tokens = raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(url) = read(ENV_FEED_URL).and_then(|v| checked_url(ENV_FEED_URL, v)) {
        config.feed.base_url = url;
    }
    if let Some(url) = read(ENV_SOURCE_URL).and_then(|v| checked_url(ENV_SOURCE_URL, v)) {
        config.source.base_url = url;
    }
    if let Some(raw) = read(ENV_PORT) {
        match raw.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(e) => tracing::warn!("[Config] Ignoring {}='{}': {}", ENV_PORT, raw, e),
        }
    }
}

fn checked_url(key: &str, value: String) -> Option<String> {
    match url::Url::parse(&value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(value),
        Ok(parsed) => {
            tracing::warn!("[Config] Ignoring {}: unsupported scheme '{}'", key, parsed.scheme());
            None
        },
        Err(e) => {
            tracing::warn!("[Config] Ignoring {}: {}", key, e);
            None
        },
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_invalid(&errors, "")
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        ConfigError::ValidationError { field, message }
    })
}

fn first_invalid(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    for (field, kind) in fields {
        let path = if prefix.is_empty() { field.to_string() } else { format!("{prefix}.{field}") };
        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| {
                let message = e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string());
                (path, message)
            }),
            ValidationErrorsKind::Struct(inner) => first_invalid(inner, &path),
            ValidationErrorsKind::List(items) => {
                items.values().find_map(|inner| first_invalid(inner, &path))
            },
        };
        if found.is_some() {
            return found;
        }
    }
    None
}
