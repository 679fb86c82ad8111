//! `/api/instagram` handlers

use crate::providers::ProxyResponse;
use crate::server::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

/// Query string for media listings
#[derive(Debug, Default, Deserialize)]
pub struct MediaParams {
    /// Number of items
    pub limit: Option<u32>,
}

/// GET /api/instagram/profile
pub async fn profile(State(state): State<AppState>) -> Json<ProxyResponse> {
    Json(state.instagram.profile().await)
}

/// GET /api/instagram/media
pub async fn media(
    State(state): State<AppState>,
    Query(params): Query<MediaParams>,
) -> Json<ProxyResponse> {
    Json(state.instagram.media(params.limit).await)
}
