//! Security middleware behaviour through the full router

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
mod common;

fn from_client(uri: &str, client: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = common::default_app();
    for uri in ["/api/health", "/api/does-not-exist"] {
        let (_, headers, _) = common::send(&app.router, common::get(uri)).await;
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
        assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "default-src 'self'");
        assert_eq!(headers[header::X_XSS_PROTECTION], "0");
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = common::default_app();
    let (status, body) = common::send_json(&app.router, common::get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let app = common::build_app(|c| c.server.rate_limit_per_minute = 2, None, None);

    for _ in 0..2 {
        let (status, _, _) =
            common::send(&app.router, from_client("/api/health", "203.0.113.7")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) = common::send(
        &app.router,
        from_client("/api/health", "203.0.113.7, 10.0.0.1"),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers[header::RETRY_AFTER], "60");
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "rate_limited");

    // A different client still has its own quota
    let (status, _, _) =
        common::send(&app.router, from_client("/api/health", "198.51.100.4")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_suspicious_uris_are_rejected() {
    let app = common::default_app();
    for uri in [
        "/api/health?q=%3Cscript%3Ealert(1)%3C/script%3E",
        "/api/conversation-history?project=%00",
        "/api/emails/..%2F..%2Fetc%2Fpasswd/parse",
        "/api/conversation-history?nextToken=%2e%2e",
    ] {
        let (status, body) = common::send_json(&app.router, common::get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri: {}", uri);
        assert_eq!(body["error"], "bad_request");
    }
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let app = common::build_app(|c| c.server.body_limit_bytes = 64, None, None);
    let big = json!({ "title": "x".repeat(500) });
    let (status, _, _) = common::send(
        &app.router,
        common::json_request(Method::POST, "/api/conversation-history", &big),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_cors_preflight_for_allowed_origin() {
    let app = common::default_app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/conversation-history")
        .header(header::ORIGIN, "http://localhost:4200")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = common::send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:4200"
    );
    let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
    assert!(methods.contains("DELETE"));
}

#[tokio::test]
async fn test_cors_ignores_unknown_origin() {
    let app = common::default_app();
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();

    let (status, headers, _) = common::send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
