//! Request hardening for the public API
//!
//! This module provides:
//! - Security response headers (the helmet defaults the front end expects)
//! - Per-client rate limiting
//! - Suspicious-input filtering on request URIs
//! - Validators for URLs, email addresses, and S3 object keys

use crate::error::{ApiError, JousterError, Result};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::OnceLock;
use url::Url;

/// Maximum accepted S3 object key length (bytes)
pub const MAX_KEY_LENGTH: usize = 1024;

/// Maximum accepted email address length
const MAX_EMAIL_LENGTH: usize = 254;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static SUSPICIOUS_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
            .expect("email pattern is valid")
    })
}

fn suspicious_regex() -> &'static Regex {
    SUSPICIOUS_RE.get_or_init(|| {
        Regex::new(r"(?i)(\.\./|\.\.%2f|%2e%2e|%00|\x00|<script|%3cscript)")
            .expect("suspicious-input pattern is valid")
    })
}

/// Check an email address for basic syntactic validity
///
/// # Examples
///
/// ```
/// use jouster::security::validate_email_address;
///
/// assert!(validate_email_address("ada@example.com"));
/// assert!(!validate_email_address("not-an-address"));
/// ```
pub fn validate_email_address(address: &str) -> bool {
    address.len() <= MAX_EMAIL_LENGTH && email_regex().is_match(address)
}

/// Validate an outbound URL
///
/// Only `http` and `https` are accepted. Unless `allow_private` is set,
/// hosts that are loopback, private, link-local, or unspecified are
/// rejected.
///
/// # Errors
///
/// Returns a `Validation` error describing the first failed check
pub fn validate_url(url: &str, allow_private: bool) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| JousterError::Validation(format!("Invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(
                JousterError::Validation(format!("Unsupported URL scheme: {}", other)).into(),
            )
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| JousterError::Validation("URL has no host".to_string()))?;

    if !allow_private {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(JousterError::Validation("URLs to localhost are not allowed".into()).into());
        }
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = IpAddr::from_str(bare) {
            if is_private_ip(ip) {
                return Err(JousterError::Validation(format!(
                    "URLs to private addresses are not allowed: {}",
                    ip
                ))
                .into());
            }
        }
    }

    Ok(parsed)
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate an S3 object key requested by a client
///
/// # Errors
///
/// Returns `Validation` for malformed keys and `Forbidden` for keys
/// outside `prefix`.
pub fn validate_object_key(key: &str, prefix: &str) -> Result<()> {
    if key.is_empty() {
        return Err(JousterError::Validation("Object key cannot be empty".into()).into());
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(JousterError::Validation(format!(
            "Object key exceeds {} bytes",
            MAX_KEY_LENGTH
        ))
        .into());
    }

    if key.chars().any(char::is_control) {
        return Err(
            JousterError::Validation("Object key contains control characters".into()).into(),
        );
    }

    if key.split('/').any(|segment| segment == "..") {
        return Err(JousterError::Validation("Object key contains '..'".into()).into());
    }

    if !key.starts_with(prefix) {
        return Err(JousterError::Forbidden(format!("Key is outside '{}'", prefix)).into());
    }

    Ok(())
}

/// Per-client request limiter
///
/// Clients are keyed by [`client_key`]. The keyed state is internally
/// synchronised, so one instance is shared by every request.
pub struct ClientRateLimiter {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    per_minute: u32,
}

impl ClientRateLimiter {
    /// Create a limiter allowing `per_minute` requests per client
    ///
    /// A zero limit is treated as one request per minute.
    pub fn new(per_minute: u32) -> Self {
        let quota = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(quota)),
            per_minute: quota.get(),
        }
    }

    /// Record a request for `client`
    ///
    /// # Errors
    ///
    /// Returns `RateLimitExceeded` once the client's quota is used up
    pub fn check(&self, client: &str) -> Result<()> {
        self.limiter.check_key(&client.to_string()).map_err(|_| {
            JousterError::RateLimitExceeded {
                limit: self.per_minute,
            }
            .into()
        })
    }

    /// Drop state for clients whose quota has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

/// Identify the client behind a request
///
/// Uses the first `X-Forwarded-For` entry (the app runs behind a proxy in
/// production), then the socket peer address, then `"unknown"`.
pub fn client_key(req: &Request) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing [`ClientRateLimiter`]
pub async fn rate_limit(
    State(limiter): State<std::sync::Arc<ClientRateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(&req);
    if let Err(e) = limiter.check(&client) {
        tracing::warn!(client = %client, path = %req.uri().path(), "rate limit exceeded");
        return ApiError::from(e).into_response();
    }
    next.run(req).await
}

/// Middleware rejecting URIs that carry traversal, null-byte, or script payloads
pub async fn reject_suspicious_input(req: Request, next: Next) -> Response {
    let uri = req.uri().to_string();
    if suspicious_regex().is_match(&uri) {
        tracing::warn!(uri = %uri, "rejected suspicious request");
        return ApiError::from(JousterError::Validation(
            "Request contains disallowed characters".to_string(),
        ))
        .into_response();
    }
    next.run(req).await
}

const SECURITY_HEADERS: [(HeaderName, &str); 6] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::REFERRER_POLICY, "no-referrer"),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=15552000; includeSubDomains",
    ),
    (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
    (header::X_XSS_PROTECTION, "0"),
];

/// Middleware adding the standard security headers to every response
///
/// Headers a handler already set are left alone.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        if !headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_validate_email_address() {
        assert!(validate_email_address("ada@example.com"));
        assert!(validate_email_address("first.last+tag@mail.example.co.uk"));
        assert!(!validate_email_address("ada@"));
        assert!(!validate_email_address("@example.com"));
        assert!(!validate_email_address("ada example@example.com"));
        assert!(!validate_email_address("ada@example"));
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(!validate_email_address(&long));
    }

    #[test]
    fn test_validate_url_schemes() {
        assert!(validate_url("https://scontent.cdninstagram.com/x.jpg", false).is_ok());
        assert!(validate_url("http://example.com", false).is_ok());
        assert!(validate_url("javascript:alert(1)", false).is_err());
        assert!(validate_url("file:///etc/passwd", false).is_err());
        assert!(validate_url("not a url", false).is_err());
    }

    #[test]
    fn test_validate_url_private_hosts() {
        assert!(validate_url("http://localhost/", false).is_err());
        assert!(validate_url("http://127.0.0.1/", false).is_err());
        assert!(validate_url("http://10.1.2.3/", false).is_err());
        assert!(validate_url("http://192.168.0.10/", false).is_err());
        assert!(validate_url("http://169.254.169.254/latest/meta-data", false).is_err());
        assert!(validate_url("http://[::1]/", false).is_err());
        assert!(validate_url("http://[fd00::1]/", false).is_err());
        assert!(validate_url("http://127.0.0.1:9000/", true).is_ok());
    }

    #[test]
    fn test_validate_object_key() {
        assert!(validate_object_key("emails/2024/msg.eml", "emails/").is_ok());
        assert!(validate_object_key("anything", "").is_ok());

        let err = validate_object_key("", "emails/").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JousterError>(),
            Some(JousterError::Validation(_))
        ));

        let err = validate_object_key("emails/../secrets", "emails/").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JousterError>(),
            Some(JousterError::Validation(_))
        ));

        let err = validate_object_key("emails/a\u{0}b", "emails/").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JousterError>(),
            Some(JousterError::Validation(_))
        ));

        let err = validate_object_key("private/msg.eml", "emails/").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JousterError>(),
            Some(JousterError::Forbidden(_))
        ));

        let long = format!("emails/{}", "x".repeat(MAX_KEY_LENGTH));
        assert!(validate_object_key(&long, "emails/").is_err());
    }

    #[test]
    fn test_dotted_names_are_not_traversal() {
        assert!(validate_object_key("emails/re..fwd.eml", "emails/").is_ok());
    }

    #[test]
    fn test_rate_limiter_blocks_after_quota() {
        let limiter = ClientRateLimiter::new(2);
        assert!(limiter.check("1.2.3.4").is_ok());
        assert!(limiter.check("1.2.3.4").is_ok());
        let err = limiter.check("1.2.3.4").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JousterError>(),
            Some(JousterError::RateLimitExceeded { limit: 2 })
        ));
        // Other clients have their own quota
        assert!(limiter.check("5.6.7.8").is_ok());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let req = Request::builder()
            .uri("/api/health")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "203.0.113.9");
    }

    #[test]
    fn test_client_key_falls_back_to_connect_info() {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 4], 5555))));
        assert_eq!(client_key(&req), "198.51.100.4");

        let bare = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }

    #[test]
    fn test_suspicious_patterns() {
        let re = suspicious_regex();
        assert!(re.is_match("/api/emails/..%2Fetc"));
        assert!(re.is_match("/api/emails/%2e%2e/parse"));
        assert!(re.is_match("/api/x?q=%3Cscript%3E"));
        assert!(re.is_match("/api/x%00"));
        assert!(!re.is_match("/api/emails/emails%2F2024%2Fmsg.eml/parse"));
    }
}
