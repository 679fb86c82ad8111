//! Jouster - portfolio backend API
//!
#![doc = "Main entry point for the Jouster API server."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jouster::cli::{Cli, Commands};
use jouster::commands;
use jouster::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.json_logs, cli.verbose);

    // Execute command
    match cli.command.clone() {
        Commands::ValidateEnv { strict } => {
            // Reads only the environment, so a broken config file cannot hide the report
            commands::validate_env::run_validate_env(strict)?;
            Ok(())
        }
        Commands::Serve { strict, .. } => {
            let config = load_config(&cli)?;
            tracing::info!(
                host = %config.server.host,
                port = config.server.port,
                strict,
                "Starting API server"
            );
            commands::serve::run_serve(config, strict).await?;
            Ok(())
        }
        Commands::Migrate { dry_run } => {
            let config = load_config(&cli)?;
            tracing::info!(dry_run, "Starting session migration");
            commands::migrate::run_migrate(config, dry_run).await?;
            Ok(())
        }
    }
}

/// Load and validate configuration for the commands that need it
fn load_config(cli: &Cli) -> Result<Config> {
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, cli)?;
    config.validate()?;
    Ok(config)
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set; otherwise `--verbose` raises Jouster's level
/// to debug.
fn init_tracing(json: bool, verbose: bool) {
    let default_filter = if verbose {
        "jouster=debug,tower_http=debug"
    } else {
        "jouster=info,tower_http=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
