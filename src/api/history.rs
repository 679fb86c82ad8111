//! `/api/conversation-history` handlers

use super::decode_body;
use crate::error::{ApiResult, JousterError};
use crate::history::{clamp_list_limit, ListSource, NewSession};
use crate::server::AppState;
use crate::storage::{ConversationMessage, ConversationSession, ListQuery, MigrationReport, SessionPage};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

/// Query string for listings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Only sessions from this project
    pub project: Option<String>,
    /// Page size
    pub limit: Option<usize>,
    /// Cursor from the previous page
    pub next_token: Option<String>,
    /// `local` (default) or `dynamodb`
    #[serde(default)]
    pub source: ListSource,
}

/// Body for appending messages
#[derive(Debug, Deserialize)]
pub struct AppendBody {
    /// Messages to append, in order
    pub messages: Vec<ConversationMessage>,
}

/// Query string for migration
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateParams {
    /// Count sessions without writing
    #[serde(default)]
    pub dry_run: bool,
}

/// GET /api/conversation-history?source=local|dynamodb
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<SessionPage>> {
    let query = ListQuery {
        project: params.project.filter(|p| !p.is_empty()),
        limit: clamp_list_limit(params.limit),
        next_token: params.next_token.filter(|t| !t.is_empty()),
    };
    Ok(Json(state.history.list(&query, params.source).await?))
}

/// GET /api/conversation-history/:id
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationSession>> {
    let session = state
        .history
        .get(&id)
        .await?
        .ok_or_else(|| JousterError::NotFound(format!("Conversation {}", id)))?;
    Ok(Json(session))
}

/// POST /api/conversation-history
pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ConversationSession>)> {
    let new: NewSession = decode_body(&body)?;
    let session = state.history.create(new).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/conversation-history/:id/messages
pub async fn append(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ConversationSession>> {
    let body: AppendBody = decode_body(&body)?;
    Ok(Json(state.history.append_messages(&id, body.messages).await?))
}

/// DELETE /api/conversation-history/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    if state.history.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JousterError::NotFound(format!("Conversation {}", id)).into())
    }
}

/// POST /api/conversation-history/migrate
pub async fn migrate(
    State(state): State<AppState>,
    Query(params): Query<MigrateParams>,
) -> ApiResult<Json<MigrationReport>> {
    Ok(Json(state.history.migrate(params.dry_run).await?))
}
