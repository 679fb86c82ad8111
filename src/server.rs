//! HTTP server assembly
//!
//! Builds the shared [`AppState`], wires routes and middleware, and runs
//! the axum server until Ctrl-C or SIGTERM.

use crate::api;
use crate::config::{Config, ServerConfig};
use crate::emails::{EmailStore, S3EmailStore};
use crate::error::{JousterError, Result};
use crate::history::HistoryService;
use crate::providers::{InstagramClient, LastfmClient};
use crate::security::{self, ClientRateLimiter};
use crate::storage::{DynamoSessionStore, FileSessionStore, SessionStore};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// How often idle rate-limit state is pruned
const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// State shared by every handler
///
/// Cheap to clone; every field is reference-counted.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<Config>,
    /// Email archive, `None` when no bucket is configured
    pub emails: Option<Arc<dyn EmailStore>>,
    /// Conversation history
    pub history: Arc<HistoryService>,
    /// Last.fm proxy
    pub lastfm: Arc<LastfmClient>,
    /// Instagram proxy
    pub instagram: Arc<InstagramClient>,
    /// Per-client rate limiter
    pub limiter: Arc<ClientRateLimiter>,
    /// Process start, for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Assemble state from already-built backends
    ///
    /// The HTTP proxies and rate limiter are built from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be created
    pub fn new(
        config: Config,
        emails: Option<Arc<dyn EmailStore>>,
        history: HistoryService,
    ) -> Result<Self> {
        Ok(Self {
            lastfm: Arc::new(LastfmClient::new(config.lastfm.clone())?),
            instagram: Arc::new(InstagramClient::new(config.instagram.clone())?),
            limiter: Arc::new(ClientRateLimiter::new(config.server.rate_limit_per_minute)),
            config: Arc::new(config),
            emails,
            history: Arc::new(history),
            started_at: Instant::now(),
        })
    }

    /// Build state with AWS-backed stores
    ///
    /// S3 is used when a bucket is configured; DynamoDB mirroring when a
    /// table is configured and mirroring is enabled.
    ///
    /// # Errors
    ///
    /// Returns error if the session directory cannot be created
    pub async fn from_config(config: Config) -> Result<Self> {
        let history = build_history(&config).await?;

        let emails: Option<Arc<dyn EmailStore>> = match &config.emails.bucket {
            Some(bucket) => {
                let sdk = crate::aws::load_sdk_config(&config.aws).await;
                tracing::info!(bucket = %bucket, prefix = %config.emails.prefix, "Email archive enabled");
                Some(Arc::new(S3EmailStore::new(
                    &sdk,
                    bucket.clone(),
                    config.emails.prefix.clone(),
                )))
            }
            None => {
                tracing::warn!("S3_BUCKET_NAME not set; email endpoints will answer 503");
                None
            }
        };

        Self::new(config, emails, history)
    }

    /// The email store, or a 503-mapped error when none is configured
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when no bucket is set
    pub fn email_store(&self) -> Result<&Arc<dyn EmailStore>> {
        self.emails
            .as_ref()
            .ok_or_else(|| JousterError::NotConfigured("S3 email bucket".to_string()).into())
    }
}

/// Build the history service described by `config`
///
/// # Errors
///
/// Returns error if the session directory cannot be created
pub async fn build_history(config: &Config) -> Result<HistoryService> {
    let files = FileSessionStore::new(&config.history.sessions_dir)?;

    let mirror: Option<Arc<dyn SessionStore>> = match &config.history.dynamodb_table {
        Some(table) if config.history.mirror_to_dynamodb => {
            let sdk = crate::aws::load_sdk_config(&config.aws).await;
            let store = DynamoSessionStore::new(
                &sdk,
                table.clone(),
                config.history.dynamodb_endpoint.as_deref(),
            );
            tracing::info!(table = %store.table(), "Mirroring sessions to DynamoDB");
            Some(Arc::new(store))
        }
        Some(_) => {
            tracing::info!("DynamoDB mirroring disabled by configuration");
            None
        }
        None => None,
    };

    tracing::info!(
        sessions_dir = %files.root().display(),
        mirror = mirror.is_some(),
        "Conversation history ready"
    );
    Ok(HistoryService::new(files, mirror))
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if server.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let cors = cors_layer(&state.config.server);
    let limiter = state.limiter.clone();

    Router::new()
        .route("/api/health", get(api::health::health))
        // Email archive
        .route("/api/emails", get(api::emails::list))
        .route("/api/emails/:key/parse", get(api::emails::parse))
        .route("/api/emails/:key/download", get(api::emails::download))
        // Conversation history
        .route(
            "/api/conversation-history",
            get(api::history::list).post(api::history::create),
        )
        .route("/api/conversation-history/migrate", post(api::history::migrate))
        .route(
            "/api/conversation-history/:id",
            get(api::history::get).delete(api::history::delete),
        )
        .route(
            "/api/conversation-history/:id/messages",
            post(api::history::append),
        )
        // Last.fm
        .route("/api/lastfm/:user/info", get(api::lastfm::info))
        .route("/api/lastfm/:user/recent-tracks", get(api::lastfm::recent_tracks))
        .route("/api/lastfm/:user/top-artists", get(api::lastfm::top_artists))
        .route("/api/lastfm/:user/top-tracks", get(api::lastfm::top_tracks))
        .route("/api/lastfm/:user/top-albums", get(api::lastfm::top_albums))
        // Instagram
        .route("/api/instagram/profile", get(api::instagram::profile))
        .route("/api/instagram/media", get(api::instagram::media))
        .fallback(api::not_found)
        // Innermost first
        .layer(middleware::from_fn_with_state(limiter, security::rate_limit))
        .layer(middleware::from_fn(security::reject_suspicious_input))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(middleware::from_fn(security::security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the API server until a shutdown signal arrives
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails
pub async fn serve(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config).await?;

    let limiter = state.limiter.clone();
    let pruner = tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter.prune();
            tracing::trace!(clients = limiter.tracked_clients(), "Pruned rate limiter");
        }
    });

    let router = build_router(state);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| JousterError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(%addr, "Jouster API listening");

    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    pruner.abort();
    result?;

    tracing::info!("Jouster API shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
