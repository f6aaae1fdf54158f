//! Request pipeline behaviour against the fully layered router.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::Router;
use tower::ServiceExt;

use fusion_ingress::routing::{HealthCheck, RouterTable};
use fusion_ingress::security::rate_limit::{RATELIMIT_LIMIT, RATELIMIT_REMAINING};

mod common;
use common::*;

fn spy_app() -> (Router, Arc<std::sync::atomic::AtomicUsize>, Arc<RecordingSink>) {
    let (spy, calls) = SpyGroup::new("feature");
    let sink = Arc::new(RecordingSink::default());
    let app = app(test_config(), spy_table(spy), sink.clone());
    (app, calls, sink)
}

#[tokio::test]
async fn allowed_origin_is_echoed() {
    let (app, _, _) = spy_app();
    let response = app
        .oneshot(
            request(Method::GET, "/")
                .header(header::ORIGIN, ALLOWED_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(body_text(response).await, "Server is running");
}

#[tokio::test]
async fn denied_origin_never_reaches_handler() {
    let (app, calls, sink) = spy_app();
    let response = app
        .oneshot(
            request(Method::GET, "/profile/view")
                .header(header::ORIGIN, DENIED_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    // Rejected before the telemetry layer.
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn non_ascii_origin_is_denied() {
    let (app, calls, _) = spy_app();
    let response = app
        .oneshot(
            request(Method::GET, "/profile/view")
                .header(
                    header::ORIGIN,
                    HeaderValue::from_bytes(b"http://\xe9vil.example").unwrap(),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_origin_is_allowed_without_cors_headers() {
    let (app, calls, _) = spy_app();
    let response = app
        .oneshot(request(Method::GET, "/user/feed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(body_text(response).await, "feature /user/feed");
}

#[tokio::test]
async fn preflight_is_answered_by_ingress() {
    let (app, calls, _) = spy_app();
    let response = app
        .oneshot(
            request(Method::OPTIONS, "/profile/edit")
                .header(header::ORIGIN, ALLOWED_ORIGIN)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ALLOWED_ORIGIN);
    assert!(headers[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .contains("PATCH"));
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "content-type");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn default_policy_admits_5000_and_rejects_5001() {
    let mut config = test_config();
    config.listener.trust_forwarded_for = true;
    let (spy, calls) = SpyGroup::new("feature");
    let app = app(config, spy_table(spy), Arc::new(RecordingSink::default()));

    let send = |client: &'static str| {
        app.clone().oneshot(
            request(Method::GET, "/feed")
                .header(header::ORIGIN, ALLOWED_ORIGIN)
                .header("x-forwarded-for", client)
                .body(Body::empty())
                .unwrap(),
        )
    };

    for n in 1..=5000u64 {
        let response = send("203.0.113.7").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {n}");
        if n == 5000 {
            assert_eq!(response.headers()[RATELIMIT_LIMIT], "5000");
            assert_eq!(response.headers()[RATELIMIT_REMAINING], "0");
        }
    }

    let rejected = send("203.0.113.7").await.unwrap();
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(rejected.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(
        rejected.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ALLOWED_ORIGIN
    );
    assert_eq!(
        body_text(rejected).await,
        "Too many requests, please try again later."
    );
    assert_eq!(calls.load(Ordering::SeqCst), 5000);

    let other = send("198.51.100.20").await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn telemetry_records_every_dispatched_request_even_on_panic() {
    let (app, calls, sink) = spy_app();

    let mut statuses = Vec::new();
    for path in ["/", "/profile", PANIC_PATH, "/user/connections"] {
        let response = app
            .clone()
            .oneshot(request(Method::GET, path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        statuses.push(response.status().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 500, 200]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(sink.count(), 4);
    assert_eq!(sink.statuses(), statuses);
}

#[tokio::test]
async fn unmatched_route_is_404() {
    let mut table = RouterTable::new();
    table.bind("/", Arc::new(HealthCheck)).unwrap();
    let sink = Arc::new(RecordingSink::default());
    let response = app(test_config(), table, sink.clone())
        .oneshot(request(Method::POST, "/nowhere").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Cannot POST /nowhere");
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn malformed_json_is_rejected_before_dispatch() {
    let (app, calls, _) = spy_app();
    let response = app
        .oneshot(
            request(Method::POST, "/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"email\":"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let mut config = test_config();
    config.body.max_bytes = 16;
    let (spy, calls) = SpyGroup::new("feature");
    let app = app(config, spy_table(spy), Arc::new(RecordingSink::default()));

    let response = app
        .oneshot(
            request(Method::POST, "/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"email":"someone@example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn api_prefix_is_stripped_for_mounted_group() {
    let mut table = RouterTable::new();
    table.bind("/", Arc::new(HealthCheck)).unwrap();
    table.bind("/api/", Arc::new(cache_group())).unwrap();

    let response = app(test_config(), table, Arc::new(RecordingSink::default()))
        .oneshot(request(Method::GET, "/api/feed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "fresh");
}
