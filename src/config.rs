//! Configuration management for Jouster
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{JousterError, Result};
use crate::security::validate_url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Jouster
///
/// Every section has defaults so an empty (or missing) file yields a
/// server that runs entirely on local files and mock data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Shared AWS settings
    #[serde(default)]
    pub aws: AwsConfig,
    /// S3 email archive settings
    #[serde(default)]
    pub emails: EmailsConfig,
    /// Conversation history settings
    #[serde(default)]
    pub history: HistoryConfig,
    /// Last.fm proxy settings
    #[serde(default)]
    pub lastfm: LastfmConfig,
    /// Instagram proxy settings
    #[serde(default)]
    pub instagram: InstagramConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty means same-origin only.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Requests per minute allowed per client
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Maximum accepted request body (bytes)
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:4200".to_string()]
}

fn default_rate_limit() -> u32 {
    100
}

fn default_body_limit() -> usize {
    1_048_576 // 1 MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            rate_limit_per_minute: default_rate_limit(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// AWS configuration shared by the S3 and DynamoDB clients
///
/// Credentials are not stored here; `aws-config` resolves them from the
/// default provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Optional endpoint override (LocalStack, MinIO)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
        }
    }
}

/// S3 email archive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailsConfig {
    /// Bucket holding raw emails. Email routes are disabled when unset.
    #[serde(default)]
    pub bucket: Option<String>,

    /// Key prefix all email objects live under
    #[serde(default = "default_email_prefix")]
    pub prefix: String,

    /// Upper bound for `maxKeys` on listings
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i32,
}

fn default_email_prefix() -> String {
    "emails/".to_string()
}

fn default_max_page_size() -> i32 {
    1000
}

impl Default for EmailsConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: default_email_prefix(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Conversation history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Root of the JSON session tree
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,

    /// DynamoDB table for the mirror. Mirroring is off when unset.
    #[serde(default)]
    pub dynamodb_table: Option<String>,

    /// Endpoint override for DynamoDB Local
    #[serde(default)]
    pub dynamodb_endpoint: Option<String>,

    /// Mirror every write into DynamoDB
    #[serde(default = "default_mirror")]
    pub mirror_to_dynamodb: bool,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_mirror() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
            dynamodb_table: None,
            dynamodb_endpoint: None,
            mirror_to_dynamodb: default_mirror(),
        }
    }
}

/// Last.fm proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastfmConfig {
    /// API key. Mock data is served when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Username used for `/api/lastfm/me/...`
    #[serde(default = "default_lastfm_user")]
    pub default_user: String,

    /// API base URL (overridable for tests)
    #[serde(default = "default_lastfm_base_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
}

fn default_lastfm_user() -> String {
    "jouster".to_string()
}

fn default_lastfm_base_url() -> String {
    "https://ws.audioscrobbler.com/2.0".to_string()
}

fn default_upstream_timeout() -> u64 {
    10
}

impl Default for LastfmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_user: default_lastfm_user(),
            base_url: default_lastfm_base_url(),
            timeout_seconds: default_upstream_timeout(),
        }
    }
}

/// Instagram Graph API proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    /// Long-lived access token. Mock data is served when unset.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Graph API base URL (overridable for tests)
    #[serde(default = "default_instagram_base_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(default = "default_upstream_timeout")]
    pub timeout_seconds: u64,
}

fn default_instagram_base_url() -> String {
    "https://graph.instagram.com".to_string()
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            base_url: default_instagram_base_url(),
            timeout_seconds: default_upstream_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| JousterError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| JousterError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source
    ///
    /// Split out from `apply_env_vars` so tests can feed a map instead of
    /// mutating the process environment. Blank values count as unset.
    pub(crate) fn apply_env_from<F>(&mut self, source: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| source(key).filter(|v| !v.trim().is_empty());

        // Server overrides
        if let Some(host) = var("HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("PORT") {
            match port.parse() {
                Ok(value) => self.server.port = value,
                Err(_) => tracing::warn!("Invalid PORT: {}", port),
            }
        }

        if let Some(origins) = var("CORS_ORIGIN") {
            let list: Vec<String> = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            tracing::debug!(?list, "Env override: CORS_ORIGIN");
            self.server.cors_origins = list;
        }

        if let Some(limit) = var("JOUSTER_RATE_LIMIT") {
            match limit.parse() {
                Ok(value) => self.server.rate_limit_per_minute = value,
                Err(_) => tracing::warn!("Invalid JOUSTER_RATE_LIMIT: {}", limit),
            }
        }

        // AWS overrides
        if let Some(region) = var("AWS_REGION") {
            self.aws.region = region;
        }

        if let Some(endpoint) = var("AWS_ENDPOINT_URL") {
            self.aws.endpoint_url = Some(endpoint);
        }

        if let Some(bucket) = var("S3_BUCKET_NAME") {
            self.emails.bucket = Some(bucket);
        }

        if let Some(prefix) = var("S3_EMAIL_PREFIX") {
            self.emails.prefix = prefix;
        }

        // History overrides
        if let Some(dir) = var("JOUSTER_SESSIONS_DIR") {
            self.history.sessions_dir = PathBuf::from(dir);
        }

        if let Some(table) = var("DYNAMODB_TABLE_NAME") {
            self.history.dynamodb_table = Some(table);
        }

        if let Some(endpoint) = var("DYNAMODB_ENDPOINT") {
            self.history.dynamodb_endpoint = Some(endpoint);
        }

        if let Some(mirror) = var("JOUSTER_MIRROR_DYNAMODB") {
            match mirror.parse::<bool>() {
                Ok(v) => {
                    self.history.mirror_to_dynamodb = v;
                    tracing::debug!(mirror = v, "Env override: JOUSTER_MIRROR_DYNAMODB");
                }
                Err(_) => tracing::warn!("Invalid value for JOUSTER_MIRROR_DYNAMODB: {}", mirror),
            }
        }

        // Third-party overrides
        if let Some(key) = var("LASTFM_API_KEY") {
            self.lastfm.api_key = Some(key);
        }

        if let Some(user) = var("LASTFM_USERNAME") {
            self.lastfm.default_user = user;
        }

        if let Some(base) = var("LASTFM_BASE_URL") {
            self.lastfm.base_url = base;
        }

        if let Some(token) = var("INSTAGRAM_ACCESS_TOKEN") {
            self.instagram.access_token = Some(token);
        }

        if let Some(base) = var("INSTAGRAM_BASE_URL") {
            self.instagram.base_url = base;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let crate::cli::Commands::Serve { port: Some(port), .. } = &cli.command {
            tracing::debug!(port, "CLI override: --port");
            self.server.port = *port;
        }

        if let Some(dir) = &cli.sessions_dir {
            self.history.sessions_dir = dir.clone();
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(JousterError::Config("server.port must be greater than 0".to_string()).into());
        }

        if self.server.rate_limit_per_minute == 0 {
            return Err(JousterError::Config(
                "server.rate_limit_per_minute must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.body_limit_bytes == 0 {
            return Err(JousterError::Config(
                "server.body_limit_bytes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.aws.region.trim().is_empty() {
            return Err(JousterError::Config("aws.region cannot be empty".to_string()).into());
        }

        if let Some(bucket) = &self.emails.bucket {
            if bucket.trim().is_empty() {
                return Err(JousterError::Config("emails.bucket cannot be empty".to_string()).into());
            }
        }

        if self.emails.max_page_size < 1 || self.emails.max_page_size > 1000 {
            return Err(JousterError::Config(
                "emails.max_page_size must be between 1 and 1000".to_string(),
            )
            .into());
        }

        if self.history.sessions_dir.as_os_str().is_empty() {
            return Err(
                JousterError::Config("history.sessions_dir cannot be empty".to_string()).into(),
            );
        }

        // Base URLs may point at a local mock server, so private hosts are fine here.
        for (name, url) in [
            ("lastfm.base_url", &self.lastfm.base_url),
            ("instagram.base_url", &self.instagram.base_url),
        ] {
            validate_url(url, true)
                .map_err(|e| JousterError::Config(format!("{} is invalid: {}", name, e)))?;
        }

        Ok(())
    }
}
