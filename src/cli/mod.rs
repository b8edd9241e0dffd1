//! CLI module for the Unicorns dashboard core
//!
//! Drives the dashboard machine, the scroll calculator, the product cache and
//! the backend from the command line.

mod commands;
mod output;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

/// Unicorns - dashboard core and product cache
#[derive(Parser, Debug)]
#[command(name = "unicorns")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[command(flatten)]
    pub output: OutputOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output formatting options
#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    /// Output in JSON format (for machine parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl OutputOptions {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dashboard screen
    Dashboard {
        #[command(subcommand)]
        command: commands::dashboard::DashboardCommands,
    },

    /// Scroll animation frames
    Scroll {
        #[command(subcommand)]
        command: commands::scroll::ScrollCommands,
    },

    /// Access token inspection
    Jwt {
        #[command(subcommand)]
        command: commands::jwt::JwtCommands,
    },

    /// Backend session
    Auth {
        #[command(subcommand)]
        command: commands::auth::AuthCommands,
    },

    /// Product cache and listings
    Products {
        #[command(subcommand)]
        command: commands::products::ProductsCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output.format();
    let quiet = cli.output.quiet;

    match cli.command {
        Commands::Dashboard { command } => commands::dashboard::run(command, format, quiet).await,
        Commands::Scroll { command } => commands::scroll::run(command, format, quiet).await,
        Commands::Jwt { command } => commands::jwt::run(command, format, quiet).await,
        Commands::Auth { command } => commands::auth::run(command, format, quiet).await,
        Commands::Products { command } => commands::products::run(command, format, quiet).await,
        Commands::Config { command } => commands::config::run(command, format, quiet).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["unicorns", "scroll", "frame", "40", "--json", "-q"]).unwrap();
        assert_eq!(cli.output.format(), OutputFormat::Json);
        assert!(cli.output.quiet);
        assert!(!cli.output.verbose);
    }
}
