use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use pressmirror_core::modules::config as core_config;
use pressmirror_types::AccessToken;

use crate::cli::{ConfigCommands, TokenCommands};
use crate::router::build_router;
use crate::scheduler;
use crate::state::AppState;

pub async fn serve(data_dir: PathBuf, port: Option<u16>) -> Result<()> {
    let mut config = core_config::load_config(&data_dir)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;

    tracing::info!("Pressmirror {} starting in {} mode", env!("CARGO_PKG_VERSION"), config.mode);
    if config.remote.access_tokens.is_empty() {
        tracing::warn!("No access tokens configured; remote calls will fail until one is added");
    }

    let state = AppState::from_config(config, data_dir)?;
    scheduler::start_all(&state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Admin API listening on http://{}/api/", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

pub async fn handle_reconcile(data_dir: PathBuf) -> Result<()> {
    let state = AppState::from_config(core_config::load_config(&data_dir)?, data_dir)?;
    let services = state.services();
    let report = state.reconcile_runner().trigger(|| services.reconciler.run_cycle()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn handle_ab_test(data_dir: PathBuf) -> Result<()> {
    let state = AppState::from_config(core_config::load_config(&data_dir)?, data_dir)?;
    let services = state.services();
    let report = state.ab_test_runner().trigger(|| services.ab_test.run_once()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn handle_config_command(data_dir: &Path, cmd: ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show { json } => show_config(data_dir, json),
    }
}

fn show_config(data_dir: &Path, json: bool) -> Result<()> {
    let config = core_config::load_config(data_dir)?.redacted();

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    println!("{}", "Pressmirror Configuration:".cyan().bold());
    println!("  Data dir: {}", data_dir.display());
    println!("  Mode: {}", config.mode);
    println!("  Graph: {}/{}", config.remote.graph_base_url, config.remote.api_version);
    println!("  Page: {}", config.remote.page_id);
    println!("  Access tokens: {}", config.remote.access_tokens.len());
    println!("  Feed: {}", config.feed.base_url);
    println!("  Source: {}", config.source.base_url);
    println!(
        "  Reconciler: {} (every {}s, overlap {}s)",
        enabled(config.poller.enabled),
        config.poller.interval_secs,
        config.poller.overlap_secs
    );
    println!(
        "  A/B test: {} (every {}s, last {} shares)",
        enabled(config.ab_test.enabled),
        config.ab_test.interval_secs,
        config.ab_test.share_limit
    );
    println!("  Admin API: {}:{}", config.server.bind, config.server.port);
    Ok(())
}

fn enabled(flag: bool) -> colored::ColoredString {
    if flag {
        "enabled".green()
    } else {
        "disabled".yellow()
    }
}

pub fn handle_token_command(data_dir: &Path, cmd: TokenCommands) -> Result<()> {
    match cmd {
        TokenCommands::List => list_tokens(data_dir),
        TokenCommands::Add { value } => add_token(data_dir, &value),
        TokenCommands::Revoke { identifier } => revoke_token(data_dir, &identifier),
    }
}

fn list_tokens(data_dir: &Path) -> Result<()> {
    let config = core_config::load_config_from(data_dir)?;
    if config.remote.access_tokens.is_empty() {
        println!("No access tokens registered");
        return Ok(());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["#", "Token"]);
    for (i, value) in config.remote.access_tokens.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), AccessToken::new(value.as_str()).fingerprint()]);
    }
    println!("{table}");
    Ok(())
}

fn add_token(data_dir: &Path, value: &str) -> Result<()> {
    let value = value.trim();
    anyhow::ensure!(!value.is_empty(), "Token must not be empty");

    let mut added = false;
    core_config::update_config_in(data_dir, |config| {
        if !config.remote.access_tokens.iter().any(|t| t == value) {
            config.remote.access_tokens.push(value.to_string());
            added = true;
        }
    })?;

    let fingerprint = AccessToken::new(value).fingerprint();
    if added {
        println!("{} Token {} added", "✓".green(), fingerprint);
    } else {
        println!("Token {} is already registered", fingerprint);
    }
    Ok(())
}

fn revoke_token(data_dir: &Path, identifier: &str) -> Result<()> {
    let config = core_config::load_config_from(data_dir)?;
    let value = match_token(&config.remote.access_tokens, identifier)?;

    core_config::remove_access_token_in(data_dir, &value)?;
    println!("{} Token {} revoked", "✓".green(), AccessToken::new(value.as_str()).fingerprint());
    Ok(())
}

/// Exact value, or a unique suffix.
fn match_token(tokens: &[String], identifier: &str) -> Result<String> {
    if let Some(exact) = tokens.iter().find(|t| *t == identifier) {
        return Ok(exact.clone());
    }
    let matches: Vec<&String> = tokens.iter().filter(|t| t.ends_with(identifier)).collect();
    match matches.as_slice() {
        [single] => Ok((*single).clone()),
        [] => anyhow::bail!("No token matches '{}'", identifier),
        _ => anyhow::bail!("'{}' matches {} tokens, use more characters", identifier, matches.len()),
    }
}
