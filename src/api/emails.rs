//! `/api/emails` handlers

use crate::emails::{clamp_page_size, parse_email, types::display_name, EmailPage, ParsedEmail};
use crate::error::{ApiResult, JousterError};
use crate::security::validate_object_key;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;

/// Query string for listings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Page size
    pub max_keys: Option<i32>,
    /// Cursor from the previous page
    pub continuation_token: Option<String>,
}

/// GET /api/emails
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<EmailPage>> {
    let store = state.email_store()?;
    let max_keys = clamp_page_size(params.max_keys, state.config.emails.max_page_size);
    let page = store.list(max_keys, params.continuation_token).await?;
    Ok(Json(page))
}

async fn load(state: &AppState, key: &str) -> ApiResult<Bytes> {
    let store = state.email_store()?;
    validate_object_key(key, store.prefix())?;
    let raw = store
        .fetch(key)
        .await?
        .ok_or_else(|| JousterError::NotFound(format!("Email {}", key)))?;
    Ok(raw)
}

/// GET /api/emails/:key/parse
pub async fn parse(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<ParsedEmail>> {
    let raw = load(&state, &key).await?;
    let parsed = tokio::task::spawn_blocking(move || parse_email(&raw))
        .await
        .map_err(|e| JousterError::Storage(format!("email parse task failed: {}", e)))?;
    tracing::debug!(key = %key, subject = %parsed.subject, "Parsed email");
    Ok(Json(parsed))
}

/// GET /api/emails/:key/download
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Response> {
    let raw = load(&state, &key).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_filename(display_name(&key))
    );
    let disposition = HeaderValue::from_str(&disposition)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("message/rfc822")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        raw,
    )
        .into_response())
}

/// Make a name safe for a quoted `filename=` parameter
fn attachment_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || c.is_control() || !c.is_ascii() {
                '_'
            } else {
                c
            }
        })
        .collect();
    if cleaned.is_empty() {
        "email.eml".to_string()
    } else {
        cleaned
    }
}
