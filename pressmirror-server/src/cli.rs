use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "pressmirror",
    about = "Pressmirror - mirrors a publisher's catalogue to a publishing platform",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the schedulers and the admin API (default if no command specified)")]
    Serve {
        #[arg(short, long, env = "PRESSMIRROR_PORT", help = "Override the configured port")]
        port: Option<u16>,
    },

    #[command(about = "Run one reconciliation cycle and print the report")]
    Reconcile,

    #[command(about = "Run one A/B test cycle and print the report")]
    AbTest,

    #[command(subcommand, about = "View configuration")]
    Config(ConfigCommands),

    #[command(subcommand, about = "Manage platform access tokens")]
    Token(TokenCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show current configuration (secrets masked)")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "List registered access tokens")]
    List,

    #[command(about = "Register a page access token")]
    Add {
        #[arg(help = "Access token value")]
        value: String,
    },

    #[command(about = "Remove an access token")]
    Revoke {
        #[arg(help = "Full token value, or its last four characters")]
        identifier: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_defaults_to_none() {
        let cli = Cli::try_parse_from(["pressmirror"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_token_revoke_parses() {
        let cli = Cli::try_parse_from(["pressmirror", "token", "revoke", "abcd"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Token(TokenCommands::Revoke { identifier })) if identifier == "abcd"
        ));
    }

    #[test]
    fn test_config_show_json_flag() {
        let cli = Cli::try_parse_from(["pressmirror", "config", "show", "--json"]).expect("parse");
        assert!(matches!(cli.command, Some(Commands::Config(ConfigCommands::Show { json: true }))));
    }
}
