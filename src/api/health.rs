//! `/api/health`

use crate::server::AppState;
use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// State of one backing service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Credentials or endpoint present
    Configured,
    /// Serving fallback data
    Mock,
    /// Endpoints answer 503
    Disabled,
}

/// Per-service status map
#[derive(Debug, Clone, Serialize)]
pub struct Services {
    /// S3 email archive
    pub emails: ServiceStatus,
    /// DynamoDB session mirror
    pub dynamodb: ServiceStatus,
    /// Last.fm proxy
    pub lastfm: ServiceStatus,
    /// Instagram proxy
    pub instagram: ServiceStatus,
}

/// Health response body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Always `"ok"` while the process answers
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// RFC-3339 time of the check
    pub timestamp: String,
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// Backing service status
    pub services: Services,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(report(&state))
}

/// Build the health report for `state`
pub fn report(state: &AppState) -> HealthReport {
    let configured_or = |on: bool, otherwise: ServiceStatus| {
        if on {
            ServiceStatus::Configured
        } else {
            otherwise
        }
    };

    HealthReport {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        services: Services {
            emails: configured_or(state.emails.is_some(), ServiceStatus::Disabled),
            dynamodb: configured_or(state.history.has_mirror(), ServiceStatus::Disabled),
            lastfm: configured_or(state.lastfm.is_configured(), ServiceStatus::Mock),
            instagram: configured_or(state.instagram.is_configured(), ServiceStatus::Mock),
        },
    }
}
