//! Third-party API proxies for Jouster
//!
//! This module contains the Last.fm and Instagram Graph API clients. Both
//! degrade to deterministic mock data when they are unconfigured or the
//! upstream call fails, so the front end always has something to render.

pub mod instagram;
pub mod lastfm;
pub mod mock;

pub use instagram::InstagramClient;
pub use lastfm::{LastfmClient, Period};

use crate::error::{JousterError, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Where a proxied payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Live Last.fm data
    Lastfm,
    /// Live Instagram data
    Instagram,
    /// Generated fallback data
    Mock,
}

/// Envelope returned by every proxy endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProxyResponse {
    /// Origin of `data`
    pub source: Source,
    /// Upstream payload, passed through unchanged
    pub data: Value,
}

impl ProxyResponse {
    /// Wrap live upstream data
    pub fn live(source: Source, data: Value) -> Self {
        Self { source, data }
    }

    /// Wrap fallback data
    pub fn mock(data: Value) -> Self {
        Self {
            source: Source::Mock,
            data,
        }
    }

    /// Whether this response carries mock data
    pub fn is_mock(&self) -> bool {
        self.source == Source::Mock
    }
}

/// Build the HTTP client shared by the proxies
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised
pub(crate) fn http_client(timeout_seconds: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds.max(1)))
        .user_agent(concat!("jouster/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| JousterError::Upstream(format!("Failed to create HTTP client: {}", e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_serializes_lowercase() {
        let live = ProxyResponse::live(Source::Lastfm, serde_json::json!({"a": 1}));
        let json = serde_json::to_value(&live).unwrap();
        assert_eq!(json["source"], "lastfm");
        assert_eq!(json["data"]["a"], 1);

        let mock = ProxyResponse::mock(Value::Null);
        assert!(mock.is_mock());
        assert_eq!(serde_json::to_value(&mock).unwrap()["source"], "mock");
    }

    #[test]
    fn test_http_client_builds() {
        assert!(http_client(5).is_ok());
        assert!(http_client(0).is_ok());
    }
}
