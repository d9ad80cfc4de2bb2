use super::*;
use crate::error::{ApiError, ExtractionError};
use crate::test_helpers::{FakeExtractor, create_test_service};
use axum::body::Body;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;


/// Helper to create a router over a service backed by `extractor`
async fn create_test_app(
    extractor: FakeExtractor,
) -> (Router, Arc<MediaService>, tempfile::TempDir) {
    let (service, temp_dir) = create_test_service(extractor).await;
    let service = Arc::new(service);
    let config = Arc::new(service.config().clone());
    let app = create_router(service.clone(), config);
    (app, service, temp_dir)
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let (service, _temp_dir) = create_test_service(FakeExtractor::succeeding("clip")).await;
    let service = Arc::new(service);

    let mut config = service.config().clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let api_handle = tokio::spawn(start_api_server(service, config, async move {
        stop_rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), api_handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_health_served_at_root_and_under_api() {
    let (app, _service, _temp_dir) = create_test_app(FakeExtractor::succeeding("clip")).await;

    for uri in ["/health", "/api/health"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
    }
}

#[tokio::test]
async fn test_capabilities() {
    let (app, _service, _temp_dir) = create_test_app(FakeExtractor::succeeding("clip")).await;

    let response = app.oneshot(get("/api/capabilities")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["extractor"], "fake");
    assert_eq!(json["can_download"], true);
    assert_eq!(json["tracked_jobs"], 0);
}

#[tokio::test]
async fn test_openapi_endpoint() {
    let (app, _service, _temp_dir) = create_test_app(FakeExtractor::succeeding("clip")).await;

    let response = app.oneshot(get("/api/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["paths"]["/api/download"].is_object());
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _service, _temp_dir) = create_test_app(FakeExtractor::succeeding("clip")).await;

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present"
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let (service, _temp_dir) = create_test_service(FakeExtractor::succeeding("clip")).await;
    let mut config = service.config().clone();
    config.server.api.cors_enabled = false;
    let app = create_router(Arc::new(service), Arc::new(config));

    let request = Request::builder()
        .uri("/api/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_get_info_success() {
    let (app, _service, _temp_dir) =
        create_test_app(FakeExtractor::succeeding("Some Title")).await;

    let response = app
        .oneshot(post_json(
            "/api/get_info",
            r#"{"url": "https://example.com/watch/1"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["title"], "Some Title");
    assert_eq!(json["duration"], 42.0);
    assert_eq!(json["uploader"], "Tester");
}

#[tokio::test]
async fn test_get_info_failure_is_classified() {
    let (app, _service, _temp_dir) = create_test_app(FakeExtractor::failing(
        ExtractionError::Forbidden("HTTP Error 403".into()),
    ))
    .await;

    let response = app
        .oneshot(post_json(
            "/api/get_info",
            r#"{"url": "https://example.com/watch/1"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let api_error: ApiError = serde_json::from_value(json_body(response).await).unwrap();
    assert_eq!(api_error.error.code, "access_forbidden");
    assert!(api_error.error.message.contains("private"));
}

#[tokio::test]
async fn test_get_info_rejects_missing_url() {
    let (app, _service, _temp_dir) = create_test_app(FakeExtractor::succeeding("clip")).await;

    let response = app
        .oneshot(post_json("/api/get_info", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"]["code"], "validation_error");
}
