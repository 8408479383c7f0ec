//! Pressmirror Server - Headless Daemon
//!
//! Runs the reconciliation and A/B test schedulers and exposes an admin API
//! on /api/* for status and manual triggers.
//!
//! Access via: http://localhost:8046

use anyhow::Result;
use clap::Parser;

mod api;
mod cli;
mod commands;
mod router;
mod scheduler;
mod state;
#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use pressmirror_core::modules::{config as core_config, logger};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = core_config::get_data_dir()?;
    let _log_guard = logger::init_logging(&cli.log_level, Some(&data_dir.join("logs")));

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve(data_dir, port).await,
        Commands::Reconcile => commands::handle_reconcile(data_dir).await,
        Commands::AbTest => commands::handle_ab_test(data_dir).await,
        Commands::Config(cmd) => commands::handle_config_command(&data_dir, cmd),
        Commands::Token(cmd) => commands::handle_token_command(&data_dir, cmd),
    }
}
