//! Last.fm API proxy
//!
//! Calls the `user.*` methods of the Last.fm REST API and passes the JSON
//! through unchanged. Without an API key, or when Last.fm misbehaves, the
//! mock payloads from [`super::mock`] are served instead.

use super::{http_client, mock, ProxyResponse, Source};
use crate::config::LastfmConfig;
use crate::error::{JousterError, Result};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Default number of items per listing
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest listing size Last.fm is asked for
pub const MAX_LIMIT: u32 = 200;

/// Path segment that resolves to the configured user
pub const SELF_ALIAS: &str = "me";

static USERNAME_RE: OnceLock<Regex> = OnceLock::new();

fn username_regex() -> &'static Regex {
    USERNAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{1,14}$").expect("username pattern is valid")
    })
}

/// Time window for `user.gettop*` calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    /// All time
    #[default]
    Overall,
    /// Last 7 days
    SevenDay,
    /// Last month
    OneMonth,
    /// Last 3 months
    ThreeMonth,
    /// Last 6 months
    SixMonth,
    /// Last 12 months
    TwelveMonth,
}

impl Period {
    /// Value sent to Last.fm
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Overall => "overall",
            Period::SevenDay => "7day",
            Period::OneMonth => "1month",
            Period::ThreeMonth => "3month",
            Period::SixMonth => "6month",
            Period::TwelveMonth => "12month",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = JousterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "overall" => Ok(Period::Overall),
            "7day" => Ok(Period::SevenDay),
            "1month" => Ok(Period::OneMonth),
            "3month" => Ok(Period::ThreeMonth),
            "6month" => Ok(Period::SixMonth),
            "12month" => Ok(Period::TwelveMonth),
            other => Err(JousterError::Validation(format!(
                "Invalid period {:?}; expected one of overall, 7day, 1month, 3month, 6month, 12month",
                other
            ))),
        }
    }
}

/// Check a Last.fm username
///
/// # Errors
///
/// Returns a `Validation` error unless the name is 2-15 characters, starts
/// with a letter, and contains only letters, digits, `_` and `-`
pub fn validate_username(user: &str) -> Result<()> {
    if username_regex().is_match(user) {
        Ok(())
    } else {
        Err(JousterError::Validation(format!("Invalid Last.fm username: {:?}", user)).into())
    }
}

/// Clamp a listing size into `1..=MAX_LIMIT`
pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Last.fm client with mock fallback
#[derive(Debug, Clone)]
pub struct LastfmClient {
    client: Client,
    config: LastfmConfig,
}

impl LastfmClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: LastfmConfig) -> Result<Self> {
        let client = http_client(config.timeout_seconds)?;

        tracing::info!(
            base_url = %config.base_url,
            configured = config.api_key.is_some(),
            "Initialized Last.fm client"
        );

        Ok(Self { client, config })
    }

    /// Whether an API key is present
    pub fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Resolve the `me` alias and validate the name
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for a malformed username
    pub fn resolve_user(&self, user: &str) -> Result<String> {
        let user = if user == SELF_ALIAS {
            self.config.default_user.as_str()
        } else {
            user
        };
        validate_username(user)?;
        Ok(user.to_string())
    }

    /// `user.getinfo`
    pub async fn user_info(&self, user: &str) -> Result<ProxyResponse> {
        let user = self.resolve_user(user)?;
        let live = self.call("user.getinfo", &user, &[]).await;
        Ok(wrap(live, || mock::lastfm_user_info(&user)))
    }

    /// `user.getrecenttracks`
    pub async fn recent_tracks(&self, user: &str, limit: Option<u32>) -> Result<ProxyResponse> {
        let user = self.resolve_user(user)?;
        let limit = clamp_limit(limit);
        let live = self
            .call("user.getrecenttracks", &user, &[("limit", limit.to_string())])
            .await;
        Ok(wrap(live, || mock::lastfm_recent_tracks(&user, limit)))
    }

    /// `user.gettopartists`
    pub async fn top_artists(
        &self,
        user: &str,
        period: Period,
        limit: Option<u32>,
    ) -> Result<ProxyResponse> {
        self.top("user.gettopartists", user, period, limit, mock::lastfm_top_artists)
            .await
    }

    /// `user.gettoptracks`
    pub async fn top_tracks(
        &self,
        user: &str,
        period: Period,
        limit: Option<u32>,
    ) -> Result<ProxyResponse> {
        self.top("user.gettoptracks", user, period, limit, mock::lastfm_top_tracks)
            .await
    }

    /// `user.gettopalbums`
    pub async fn top_albums(
        &self,
        user: &str,
        period: Period,
        limit: Option<u32>,
    ) -> Result<ProxyResponse> {
        self.top("user.gettopalbums", user, period, limit, mock::lastfm_top_albums)
            .await
    }

    async fn top(
        &self,
        method: &str,
        user: &str,
        period: Period,
        limit: Option<u32>,
        fallback: fn(&str, &str, u32) -> Value,
    ) -> Result<ProxyResponse> {
        let user = self.resolve_user(user)?;
        let limit = clamp_limit(limit);
        let params = [
            ("period", period.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        let live = self.call(method, &user, &params).await;
        Ok(wrap(live, || fallback(&user, period.as_str(), limit)))
    }

    /// Perform one API call, returning `None` whenever mock data should be
    /// served instead
    async fn call(&self, method: &str, user: &str, extra: &[(&str, String)]) -> Option<Value> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            tracing::debug!(method, "No Last.fm API key; serving mock data");
            return None;
        };

        let url = format!("{}/", self.config.base_url.trim_end_matches('/'));
        let mut query: Vec<(&str, String)> = vec![
            ("method", method.to_string()),
            ("user", user.to_string()),
            ("api_key", api_key.to_string()),
            ("format", "json".to_string()),
        ];
        query.extend(extra.iter().cloned());

        let response = match self.client.get(&url).query(&query).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method, "Last.fm request failed: {}", e.without_url());
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(method, %status, "Last.fm returned an error status");
            return None;
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(method, "Last.fm returned invalid JSON: {}", e.without_url());
                return None;
            }
        };

        if let Some(code) = body.get("error") {
            let message = body
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("");
            tracing::warn!(method, code = %code, message, "Last.fm reported an error");
            return None;
        }

        Some(body)
    }
}

fn wrap(live: Option<Value>, fallback: impl FnOnce() -> Value) -> ProxyResponse {
    match live {
        Some(data) => ProxyResponse::live(Source::Lastfm, data),
        None => ProxyResponse::mock(fallback()),
    }
}
