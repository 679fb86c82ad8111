//! Jouster - portfolio backend library
//!
//! This library provides the HTTP API behind the Jouster portfolio site:
//! an S3 email archive, conversation history stored as local JSON files
//! with an optional DynamoDB mirror, and Last.fm / Instagram proxies that
//! fall back to mock data.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `server`: Router assembly, shared state, and the serve loop
//! - `api`: Route handlers
//! - `emails`: S3 listing, fetching, and MIME parsing
//! - `storage`: Session stores (files, DynamoDB)
//! - `history`: Conversation history service with mirroring
//! - `providers`: Last.fm and Instagram clients with mock fallback
//! - `security`: Validators, rate limiting, and security middleware
//! - `config`: Configuration management and validation
//! - `error`: Error types, result aliases, and HTTP error mapping
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use jouster::{server, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!     server::serve(config).await
//! }
//! ```

pub mod api;
pub mod aws;
pub mod cli;
pub mod commands;
pub mod config;
pub mod emails;
pub mod env_check;
pub mod error;
pub mod history;
pub mod providers;
pub mod security;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, JousterError, Result};
pub use history::HistoryService;
pub use server::{build_router, AppState};

#[cfg(test)]
pub mod test_utils;
