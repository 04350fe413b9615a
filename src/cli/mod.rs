//! CLI command definitions for household-tasks
//!
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Parser, Subcommand};

/// Household task server and graph maintenance tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Check the stored dependency graph for cycles
    Verify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::parse_from(["household-tasks"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log, "2");
        assert!(!cli.verbose);
    }

    #[test]
    fn serve_with_port_and_global_flags() {
        let cli = Cli::parse_from(["household-tasks", "serve", "--port", "9000", "-d", "x.db", "-v"]);
        assert_eq!(cli.command, Some(Command::Serve { port: Some(9000) }));
        assert_eq!(cli.database.as_deref(), Some("x.db"));
        assert!(cli.verbose);
    }

    #[test]
    fn verify_subcommand() {
        let cli = Cli::parse_from(["household-tasks", "verify"]);
        assert_eq!(cli.command, Some(Command::Verify));
    }
}
