//! Command-line interface definition for Jouster
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to serve the API, check the environment, and
//! migrate local sessions into DynamoDB.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Jouster - portfolio backend API
///
/// Serves the email archive, conversation history, and music/media
/// proxy endpoints used by the Jouster front end.
#[derive(Parser, Debug, Clone)]
#[command(name = "jouster")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml", env = "JOUSTER_CONFIG")]
    pub config: Option<String>,

    /// Override the session directory
    #[arg(long, global = true)]
    pub sessions_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "JOUSTER_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Jouster
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,

        /// Refuse to start when required environment variables are missing
        #[arg(long)]
        strict: bool,
    },

    /// Check that the environment is configured for deployment
    ValidateEnv {
        /// Treat recommended variables as required
        #[arg(long)]
        strict: bool,
    },

    /// Copy local session files into the DynamoDB table
    Migrate {
        /// Report what would be migrated without writing
        #[arg(long)]
        dry_run: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            sessions_dir: None,
            json_logs: false,
            verbose: false,
            command: Commands::Serve {
                port: None,
                strict: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);

        if let Commands::Serve { port, strict } = cli.command {
            assert_eq!(port, None);
            assert!(!strict);
        } else {
            panic!("Expected default command to be Serve");
        }
    }

    #[test]
    fn test_cli_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["jouster", "serve", "--port", "8081", "--strict"]).unwrap();
        match cli.command {
            Commands::Serve { port, strict } => {
                assert_eq!(port, Some(8081));
                assert!(strict);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_validate_env() {
        let cli = Cli::try_parse_from(["jouster", "validate-env", "--strict"]).unwrap();
        assert!(matches!(cli.command, Commands::ValidateEnv { strict: true }));
    }

    #[test]
    fn test_cli_parse_migrate_with_global_sessions_dir() {
        let cli = Cli::try_parse_from(["jouster", "migrate", "--dry-run", "--sessions-dir", "/tmp/s"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Migrate { dry_run: true }));
        assert_eq!(cli.sessions_dir, Some(PathBuf::from("/tmp/s")));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["jouster"]).is_err());
    }
}
