//! Integration tests for stage ordering: static assets, body parsing,
//! method override and the not-found terminal.
//!
//! Run with: cargo test -p hearth-integration-tests

#![allow(clippy::unwrap_used)]

use hearth_integration_tests::{CapturedLogs, TestApp, TestOptions};
use reqwest::StatusCode;

#[tokio::test]
async fn test_static_asset_served_without_later_stages() {
    let app = TestApp::spawn().await;

    // A malformed JSON body would fail the body parser; the asset wins first.
    let response = app
        .client
        .get(app.url("/robots.txt"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_none());
    assert!(response.headers().get("set-cookie").is_none());
    assert!(response.text().await.unwrap().contains("User-agent"));
}

#[tokio::test]
async fn test_static_asset_not_access_logged() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let app = TestApp::spawn().await;

    let (status, _) = app.get("/css/main.css").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(logs.contents().matches("request completed").count(), 1);
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/definitely/not/here").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Not Found"));
}

#[tokio::test]
async fn test_wrong_method_on_known_path_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app.client.put(app.url("/login")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.text().await.unwrap().contains("invalid JSON body"));
}

#[tokio::test]
async fn test_malformed_body_never_reaches_routes() {
    let app = TestApp::spawn().await;
    app.users.add("ada");

    // Valid credentials, but the body is not valid per its content type.
    let response = app
        .client
        .post(app.url("/login"))
        .header("content-type", "application/json")
        .body("\"username=ada\"")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_oversized_body_is_payload_too_large() {
    let app = TestApp::spawn_with(TestOptions {
        body_limit_bytes: 64,
        ..TestOptions::default()
    })
    .await;

    let response = app
        .client
        .post(app.url("/login"))
        .form(&[("username", "ada"), ("password", &"x".repeat(200))])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_method_override_from_form_field() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/override-probe"))
        .form(&[("_method", "DELETE")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "DELETE via POST");
}

#[tokio::test]
async fn test_method_override_from_query_and_header() {
    let app = TestApp::spawn().await;

    let (status, body) = {
        let response = app
            .client
            .post(app.url("/override-probe?_method=delete"))
            .send()
            .await
            .unwrap();
        (response.status(), response.text().await.unwrap())
    };
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "DELETE via POST");

    let response = app
        .client
        .post(app.url("/override-probe"))
        .header("x-http-method-override", "DELETE")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_post_without_override_does_not_match_delete_route() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(app.url("/override-probe"))
        .form(&[("other", "field")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_echoed() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/health"))
        .header("x-request-id", "req-1234")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-1234");
}

#[tokio::test]
async fn test_method_override_ignored_for_get() {
    let app = TestApp::spawn().await;

    let (status, _) = app.get("/override-probe?_method=DELETE").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
