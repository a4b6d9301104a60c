//! Integration tests for the central error page.
//!
//! Run with: cargo test -p hearth-integration-tests

#![allow(clippy::unwrap_used)]

use hearth_core::OperatingMode;
use hearth_integration_tests::{DB_FAIL_DETAIL, FAIL_MESSAGE, TestApp};
use reqwest::StatusCode;

#[tokio::test]
async fn test_failure_detail_in_development() {
    let app = TestApp::spawn_in(OperatingMode::Development).await;

    let (status, body) = app.get("/fail").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains(FAIL_MESSAGE));
    assert!(body.contains("error-detail"));
    assert!(body.contains("Unhandled error: db write failed"));
}

#[tokio::test]
async fn test_failure_detail_hidden_in_production() {
    let app = TestApp::spawn_in(OperatingMode::Production).await;

    let (status, body) = app.get("/fail").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains(FAIL_MESSAGE));
    assert!(!body.contains("error-detail"));
    assert!(!body.contains("Unhandled error"));
}

#[tokio::test]
async fn test_failure_detail_hidden_in_other_modes() {
    let app = TestApp::spawn_in(OperatingMode::Other("staging".to_owned())).await;

    let (_, body) = app.get("/fail").await;

    assert!(body.contains(FAIL_MESSAGE));
    assert!(!body.contains("error-detail"));
}

#[tokio::test]
async fn test_panic_rendered_as_server_error() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/panic").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("boom"));

    // The server keeps serving after a panic.
    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_error_page_keeps_navigation_for_logged_in_user() {
    let app = TestApp::spawn().await;
    app.users.add("ada");
    app.login("ada").await;

    let (status, body) = app.get("/nowhere").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Signed in as ada"));
}

#[tokio::test]
async fn test_database_failure_hidden_in_production() {
    let app = TestApp::spawn_in(OperatingMode::Production).await;

    let (status, body) = app.get("/db-fail").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("error-message"));
    assert!(body.contains("Internal Server Error"));
    assert!(!body.contains(DB_FAIL_DETAIL));
    assert!(!body.contains("data corruption"));
}

#[tokio::test]
async fn test_database_failure_detail_in_development() {
    let app = TestApp::spawn_in(OperatingMode::Development).await;

    let (status, body) = app.get("/db-fail").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("error-detail"));
    assert!(body.contains(DB_FAIL_DETAIL));
}

#[tokio::test]
async fn test_bare_error_status_rendered() {
    let app = TestApp::spawn_in(OperatingMode::Production).await;

    let (status, body) = app.get("/unavailable").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("error-message"));
    assert!(body.contains("Service Unavailable"));
}
