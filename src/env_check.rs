//! Deployment environment check
//!
//! Reports which required and recommended environment variables are
//! missing. Used by `jouster validate-env` and at `serve` startup.

use colored::Colorize;

/// How much a variable matters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// The deployment does not work without it
    Required,
    /// A feature degrades to mock data or is disabled without it
    Recommended,
}

/// One checked variable
#[derive(Debug, Clone, Copy)]
pub struct EnvVar {
    /// Variable name
    pub name: &'static str,
    /// Importance
    pub requirement: Requirement,
    /// What it configures
    pub description: &'static str,
}

/// Variables checked, in report order
pub const CHECKED_VARS: &[EnvVar] = &[
    EnvVar {
        name: "AWS_REGION",
        requirement: Requirement::Required,
        description: "AWS region for S3 and DynamoDB",
    },
    EnvVar {
        name: "S3_BUCKET_NAME",
        requirement: Requirement::Required,
        description: "bucket holding the email archive",
    },
    EnvVar {
        name: "AWS_ACCESS_KEY_ID",
        requirement: Requirement::Recommended,
        description: "AWS credentials (an instance role also works)",
    },
    EnvVar {
        name: "AWS_SECRET_ACCESS_KEY",
        requirement: Requirement::Recommended,
        description: "AWS credentials (an instance role also works)",
    },
    EnvVar {
        name: "DYNAMODB_TABLE_NAME",
        requirement: Requirement::Recommended,
        description: "conversation history mirror",
    },
    EnvVar {
        name: "LASTFM_API_KEY",
        requirement: Requirement::Recommended,
        description: "live Last.fm data instead of mock data",
    },
    EnvVar {
        name: "INSTAGRAM_ACCESS_TOKEN",
        requirement: Requirement::Recommended,
        description: "live Instagram data instead of mock data",
    },
];

/// Result of an environment check
#[derive(Debug, Clone, Default)]
pub struct EnvReport {
    /// Variables that are set and non-empty
    pub present: Vec<EnvVar>,
    /// Required variables that are missing
    pub missing_required: Vec<EnvVar>,
    /// Recommended variables that are missing
    pub missing_recommended: Vec<EnvVar>,
}

impl EnvReport {
    /// Whether the deployment passes
    ///
    /// In strict mode recommended variables are required too.
    pub fn is_ok(&self, strict: bool) -> bool {
        self.missing_required.is_empty() && (!strict || self.missing_recommended.is_empty())
    }

    /// Names of the variables that fail the check
    pub fn failing(&self, strict: bool) -> Vec<&'static str> {
        let mut names: Vec<_> = self.missing_required.iter().map(|v| v.name).collect();
        if strict {
            names.extend(self.missing_recommended.iter().map(|v| v.name));
        }
        names
    }

    /// Print a colored report to stdout
    pub fn print(&self) {
        println!("\nEnvironment check:");
        for var in &self.present {
            println!("  {} {}", "✓".green(), var.name);
        }
        for var in &self.missing_required {
            println!(
                "  {} {} {}",
                "✗".red(),
                var.name.bold(),
                format!("(required: {})", var.description).red()
            );
        }
        for var in &self.missing_recommended {
            println!(
                "  {} {} {}",
                "!".yellow(),
                var.name,
                format!("(recommended: {})", var.description).yellow()
            );
        }
        println!();
    }
}

/// Check the process environment
pub fn check_env() -> EnvReport {
    check_env_from(|name| std::env::var(name).ok())
}

/// Check an arbitrary variable source
pub fn check_env_from<F>(var: F) -> EnvReport
where
    F: Fn(&str) -> Option<String>,
{
    let mut report = EnvReport::default();
    for entry in CHECKED_VARS {
        let set = var(entry.name).is_some_and(|v| !v.trim().is_empty());
        match (set, entry.requirement) {
            (true, _) => report.present.push(*entry),
            (false, Requirement::Required) => report.missing_required.push(*entry),
            (false, Requirement::Recommended) => report.missing_recommended.push(*entry),
        }
    }
    report
}
