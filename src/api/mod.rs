//! HTTP route handlers
//!
//! Handlers take [`AppState`](crate::server::AppState) and return
//! [`ApiResult`](crate::error::ApiResult); error mapping lives in
//! [`crate::error`].

pub mod emails;
pub mod health;
pub mod history;
pub mod instagram;
pub mod lastfm;

use crate::error::{ApiError, JousterError, Result};
use axum::http::Uri;
use serde::de::DeserializeOwned;

/// Decode a JSON request body
///
/// Unlike axum's `Json` extractor, malformed or mistyped bodies surface as
/// a 400 with the usual error envelope.
///
/// # Errors
///
/// Returns a `Validation` error describing where decoding failed
pub(crate) fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.is_empty() {
        return Err(JousterError::Validation("Request body is required".to_string()).into());
    }
    serde_json::from_slice(body)
        .map_err(|e| JousterError::Validation(format!("Invalid request body: {}", e)).into())
}

/// Fallback for unknown routes
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::from(JousterError::NotFound(format!("No route for {}", uri.path())))
}
