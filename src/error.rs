//! Error types for Jouster
//!
//! This module defines all error types used throughout the service,
//! using `thiserror` for ergonomic error handling, plus the HTTP mapping
//! that turns them into JSON error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Main error type for Jouster operations
///
/// Every failure a route can surface is one of these variants. The variant
/// decides the HTTP status code; the display string becomes the message.
#[derive(Error, Debug)]
pub enum JousterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request input failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request is well-formed but not permitted
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A backend the route depends on has not been configured
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    /// Rate limit exceeded for a client
    #[error("Rate limit exceeded: limit={limit} requests per minute")]
    RateLimitExceeded {
        /// The configured limit that was exceeded
        limit: u32,
    },

    /// Session or object storage errors (filesystem, S3, DynamoDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Third-party API errors (Last.fm, Instagram)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl JousterError {
    /// HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            JousterError::Validation(_) => StatusCode::BAD_REQUEST,
            JousterError::Forbidden(_) => StatusCode::FORBIDDEN,
            JousterError::NotFound(_) => StatusCode::NOT_FOUND,
            JousterError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            JousterError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            JousterError::Upstream(_) => StatusCode::BAD_GATEWAY,
            JousterError::Config(_)
            | JousterError::Storage(_)
            | JousterError::Io(_)
            | JousterError::Serialization(_)
            | JousterError::Yaml(_)
            | JousterError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable code used in the `error` field of responses
    pub fn code(&self) -> &'static str {
        match self {
            JousterError::Validation(_) => "bad_request",
            JousterError::Forbidden(_) => "forbidden",
            JousterError::NotFound(_) => "not_found",
            JousterError::RateLimitExceeded { .. } => "rate_limited",
            JousterError::NotConfigured(_) => "not_configured",
            JousterError::Upstream(_) => "upstream",
            _ => "internal",
        }
    }
}

/// Result type alias for Jouster operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Error returned from axum handlers
///
/// Wraps an `anyhow::Error` and, when the root cause is a [`JousterError`],
/// uses it to pick the status. Anything else is an opaque 500.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0.downcast_ref::<JousterError>() {
            Some(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!(error = %self.0, "request failed");
                } else {
                    tracing::debug!(error = %err, "request rejected");
                }
                let mut response =
                    (status, Json(json!({ "error": err.code(), "message": err.to_string() })))
                        .into_response();
                if let JousterError::RateLimitExceeded { .. } = err {
                    response.headers_mut().insert(
                        axum::http::header::RETRY_AFTER,
                        axum::http::HeaderValue::from_static("60"),
                    );
                }
                response
            }
            None => {
                tracing::error!(error = ?self.0, "unhandled request error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal", "message": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Result type for axum handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let error = JousterError::Validation("bad key".to_string());
        assert_eq!(error.to_string(), "Validation error: bad key");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_forbidden_error_status() {
        let error = JousterError::Forbidden("outside prefix".to_string());
        assert_eq!(error.status(), StatusCode::FORBIDDEN);
        assert_eq!(error.code(), "forbidden");
    }

    #[test]
    fn test_not_found_error_status() {
        let error = JousterError::NotFound("session abc".to_string());
        assert_eq!(error.to_string(), "Not found: session abc");
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rate_limit_exceeded_display() {
        let error = JousterError::RateLimitExceeded { limit: 100 };
        assert!(error.to_string().contains("limit=100"));
        assert_eq!(error.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_storage_error_is_internal() {
        let error = JousterError::Storage("disk full".to_string());
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.code(), "internal");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: JousterError = io_error.into();
        assert!(matches!(error, JousterError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: JousterError = json_error.into();
        assert!(matches!(error, JousterError::Serialization(_)));
    }

    #[test]
    fn test_api_error_uses_typed_status() {
        let err: ApiError = anyhow::Error::from(JousterError::NotFound("x".into())).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_api_error_untyped_is_500() {
        let err: ApiError = anyhow::anyhow!("boom").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_rate_limit_response_sets_retry_after() {
        let err: ApiError = JousterError::RateLimitExceeded { limit: 5 }.into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JousterError>();
    }
}
