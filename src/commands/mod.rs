/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `serve`: Run the HTTP API
- `validate_env`: Check deployment environment variables
- `migrate`: Copy local session files into DynamoDB
*/

use crate::config::Config;
use crate::env_check::{check_env, EnvReport};
use crate::error::{JousterError, Result};

fn env_failure(report: &EnvReport, strict: bool) -> JousterError {
    JousterError::Config(format!(
        "Missing environment variables: {}",
        report.failing(strict).join(", ")
    ))
}

// Serve command handler
pub mod serve {
    //! Start the API server.
    //!
    //! Runs the environment check first. Missing variables are logged as
    //! warnings unless `--strict` is given, in which case startup aborts.

    use super::*;

    /// Run the server
    ///
    /// # Errors
    ///
    /// Returns error in strict mode when required variables are missing,
    /// or when the server fails to start
    pub async fn run_serve(config: Config, strict: bool) -> Result<()> {
        let report = check_env();
        if !report.is_ok(strict) {
            if strict {
                report.print();
                return Err(env_failure(&report, strict).into());
            }
            for var in &report.missing_required {
                tracing::warn!(variable = var.name, "{} is not set; {}", var.name, var.description);
            }
        }
        for var in &report.missing_recommended {
            tracing::info!(variable = var.name, "{} is not set; {}", var.name, var.description);
        }

        crate::server::serve(config).await
    }
}

// Environment validation handler
pub mod validate_env {
    //! `jouster validate-env`

    use super::*;
    use colored::Colorize;

    /// Print the environment report and fail when variables are missing
    ///
    /// # Errors
    ///
    /// Returns a `Config` error naming the missing variables
    pub fn run_validate_env(strict: bool) -> Result<()> {
        let report = check_env();
        report.print();

        if report.is_ok(strict) {
            println!("{}", "Environment looks good.".green());
            Ok(())
        } else {
            Err(env_failure(&report, strict).into())
        }
    }
}

// Migration handler
pub mod migrate {
    //! Copy every local session file into the DynamoDB mirror.

    use super::*;
    use colored::Colorize;

    /// Run a migration
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` without a DynamoDB table, or a `Storage`
    /// error when any session failed to copy
    pub async fn run_migrate(mut config: Config, dry_run: bool) -> Result<()> {
        // An explicit migration ignores the runtime mirroring switch
        config.history.mirror_to_dynamodb = true;
        let history = crate::server::build_history(&config).await?;
        let report = history.migrate(dry_run).await?;

        let verb = if dry_run { "Would migrate" } else { "Migrated" };
        println!(
            "{}",
            format!("{} {} session(s)", verb, report.migrated).green()
        );

        if report.failed > 0 {
            println!("{}", format!("{} session(s) failed:", report.failed).red());
            for error in &report.errors {
                println!("  {}", error);
            }
            return Err(JousterError::Storage(format!(
                "{} session(s) failed to migrate",
                report.failed
            ))
            .into());
        }

        Ok(())
    }
}
