//! Instagram Graph API proxy

use super::{http_client, mock, ProxyResponse, Source};
use crate::config::InstagramConfig;
use crate::error::Result;
use crate::security::validate_url;
use reqwest::Client;
use serde_json::Value;

/// Default number of media items
pub const DEFAULT_MEDIA_LIMIT: u32 = 12;

/// Largest media page requested
pub const MAX_MEDIA_LIMIT: u32 = 50;

const PROFILE_FIELDS: &str = "id,username,account_type,media_count";
const MEDIA_FIELDS: &str =
    "id,caption,media_type,media_url,permalink,thumbnail_url,timestamp,username";

/// Clamp a media page size into `1..=MAX_MEDIA_LIMIT`
pub fn clamp_media_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_MEDIA_LIMIT).clamp(1, MAX_MEDIA_LIMIT)
}

/// Instagram client with mock fallback
#[derive(Debug, Clone)]
pub struct InstagramClient {
    client: Client,
    config: InstagramConfig,
}

impl InstagramClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: InstagramConfig) -> Result<Self> {
        let client = http_client(config.timeout_seconds)?;
        tracing::info!(
            base_url = %config.base_url,
            configured = config.access_token.is_some(),
            "Initialized Instagram client"
        );
        Ok(Self { client, config })
    }

    /// Whether an access token is present
    pub fn is_configured(&self) -> bool {
        self.config
            .access_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Account profile
    pub async fn profile(&self) -> ProxyResponse {
        match self.call("me", &[("fields", PROFILE_FIELDS.to_string())]).await {
            Some(data) => ProxyResponse::live(Source::Instagram, data),
            None => ProxyResponse::mock(mock::instagram_profile()),
        }
    }

    /// Recent media, with unsafe URLs filtered out
    pub async fn media(&self, limit: Option<u32>) -> ProxyResponse {
        let limit = clamp_media_limit(limit);
        let params = [
            ("fields", MEDIA_FIELDS.to_string()),
            ("limit", limit.to_string()),
        ];
        match self.call("me/media", &params).await {
            Some(data) => ProxyResponse::live(Source::Instagram, filter_media(data)),
            None => ProxyResponse::mock(mock::instagram_media(limit)),
        }
    }

    async fn call(&self, path: &str, extra: &[(&str, String)]) -> Option<Value> {
        let Some(token) = self.config.access_token.as_deref().filter(|t| !t.is_empty()) else {
            tracing::debug!(path, "No Instagram access token; serving mock data");
            return None;
        };

        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let mut query: Vec<(&str, String)> = extra.to_vec();
        query.push(("access_token", token.to_string()));

        let response = match self.client.get(&url).query(&query).send().await {
            Ok(response) => response,
            Err(e) => {
                // reqwest includes the URL (and so the token) in its errors
                tracing::warn!(path, "Instagram request failed: {}", e.without_url());
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path, %status, "Instagram returned an error status");
            return None;
        }

        match response.json::<Value>().await {
            Ok(body) if body.get("error").is_some() => {
                tracing::warn!(path, error = %body["error"], "Instagram reported an error");
                None
            }
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(path, "Instagram returned invalid JSON: {}", e.without_url());
                None
            }
        }
    }
}

fn is_safe_url(item: &Value, field: &str) -> bool {
    item.get(field)
        .and_then(Value::as_str)
        .and_then(|url| validate_url(url, false).ok())
        .is_some_and(|parsed| parsed.scheme() == "https")
}

/// Drop media items whose `media_url` or `permalink` is missing, not
/// HTTPS, or points at a private host
pub fn filter_media(mut data: Value) -> Value {
    if let Some(items) = data.get_mut("data").and_then(Value::as_array_mut) {
        let before = items.len();
        items.retain(|item| is_safe_url(item, "media_url") && is_safe_url(item, "permalink"));
        let dropped = before - items.len();
        if dropped > 0 {
            tracing::warn!(dropped, "Dropped Instagram media with unsafe URLs");
        }
    }
    data
}
