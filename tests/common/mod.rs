use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jouster::emails::{EmailStore, MemoryEmailStore};
use jouster::storage::{FileSessionStore, MemorySessionStore, SessionStore};
use jouster::{build_router, AppState, Config, HistoryService};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Router plus the handles tests inspect afterwards
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub mirror: Option<Arc<MemorySessionStore>>,
    pub dir: TempDir,
}

/// Configuration rooted in a fresh temp dir with every service unconfigured
#[allow(dead_code)]
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.history.sessions_dir = dir.path().join("sessions");
    config.history.dynamodb_table = None;
    config.emails.bucket = None;
    config.lastfm.api_key = None;
    config.instagram.access_token = None;
    config
}

/// Build an app from a config tweak, an optional email store and an
/// optional in-memory mirror
#[allow(dead_code)]
pub fn build_app<F>(
    tweak: F,
    emails: Option<MemoryEmailStore>,
    mirror: Option<Arc<MemorySessionStore>>,
) -> TestApp
where
    F: FnOnce(&mut Config),
{
    let dir = TempDir::new().expect("failed to create tempdir");
    let mut config = test_config(&dir);
    tweak(&mut config);

    let files =
        FileSessionStore::new(&config.history.sessions_dir).expect("failed to create sessions dir");
    let history = HistoryService::new(
        files,
        mirror.clone().map(|m| m as Arc<dyn SessionStore>),
    );
    let emails = emails.map(|e| Arc::new(e) as Arc<dyn EmailStore>);
    let state = AppState::new(config, emails, history).expect("failed to build state");

    TestApp {
        router: build_router(state),
        mirror,
        dir,
    }
}

/// Default app: no email bucket, no mirror, mock providers
#[allow(dead_code)]
pub fn default_app() -> TestApp {
    build_app(|_| {}, None, None)
}

/// Send a request and collect status, headers and body bytes
#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("failed to read body")
        .to_bytes()
        .to_vec();
    (status, headers, body)
}

/// Send a request and decode the body as JSON (`Null` for an empty body)
#[allow(dead_code)]
pub async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(router, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("response body is not JSON")
    };
    (status, value)
}

/// GET `uri`
#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

/// Request with a JSON body
#[allow(dead_code)]
pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// Request with no body
#[allow(dead_code)]
pub fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
