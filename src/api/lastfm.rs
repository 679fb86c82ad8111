//! `/api/lastfm/:user/*` handlers
//!
//! `:user` may be `me`, which resolves to the configured default user.

use crate::error::ApiResult;
use crate::providers::{Period, ProxyResponse};
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

/// Query string shared by the Last.fm routes
#[derive(Debug, Default, Deserialize)]
pub struct LastfmParams {
    /// `overall`, `7day`, `1month`, `3month`, `6month` or `12month`
    pub period: Option<String>,
    /// Number of items
    pub limit: Option<u32>,
}

impl LastfmParams {
    fn period(&self) -> ApiResult<Period> {
        match self.period.as_deref() {
            Some(p) if !p.is_empty() => Ok(p.parse()?),
            _ => Ok(Period::default()),
        }
    }
}

/// GET /api/lastfm/:user/info
pub async fn info(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> ApiResult<Json<ProxyResponse>> {
    Ok(Json(state.lastfm.user_info(&user).await?))
}

/// GET /api/lastfm/:user/recent-tracks
pub async fn recent_tracks(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<LastfmParams>,
) -> ApiResult<Json<ProxyResponse>> {
    Ok(Json(state.lastfm.recent_tracks(&user, params.limit).await?))
}

/// GET /api/lastfm/:user/top-artists
pub async fn top_artists(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<LastfmParams>,
) -> ApiResult<Json<ProxyResponse>> {
    let period = params.period()?;
    Ok(Json(
        state.lastfm.top_artists(&user, period, params.limit).await?,
    ))
}

/// GET /api/lastfm/:user/top-tracks
pub async fn top_tracks(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<LastfmParams>,
) -> ApiResult<Json<ProxyResponse>> {
    let period = params.period()?;
    Ok(Json(
        state.lastfm.top_tracks(&user, period, params.limit).await?,
    ))
}

/// GET /api/lastfm/:user/top-albums
pub async fn top_albums(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(params): Query<LastfmParams>,
) -> ApiResult<Json<ProxyResponse>> {
    let period = params.period()?;
    Ok(Json(
        state.lastfm.top_albums(&user, period, params.limit).await?,
    ))
}
