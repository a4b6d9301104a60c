//! Integration tests for sessions, principal binding and flash messages.
//!
//! Run with: cargo test -p hearth-integration-tests

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use hearth_core::OperatingMode;
use hearth_integration_tests::{TEST_PASSWORD, TestApp};
use reqwest::StatusCode;

fn location(response: &reqwest::Response) -> &str {
    response.headers()["location"].to_str().unwrap()
}

#[tokio::test]
async fn test_anonymous_request_has_no_user() {
    let app = TestApp::spawn().await;

    let (status, body) = app.get("/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Welcome to Hearth"));
    assert!(body.contains("Log in"));
}

#[tokio::test]
async fn test_login_binds_principal() {
    let app = TestApp::spawn().await;
    app.users.add("ada");

    let response = app.login("ada").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let (_, body) = app.get("/").await;
    assert!(body.contains("Hello, ada"));
    assert!(body.contains("Signed in as ada"));
}

#[tokio::test]
async fn test_deleted_user_is_anonymous() {
    let app = TestApp::spawn().await;
    let user = app.users.add("ada");
    app.login("ada").await;

    app.users.remove(user.id);

    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Welcome to Hearth"));
}

#[tokio::test]
async fn test_wrong_password_redirects_back() {
    let app = TestApp::spawn().await;
    app.users.add("ada");

    let response = app
        .client
        .post(app.url("/login"))
        .form(&[("username", "ada"), ("password", "not the password")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_flash_shown_once_in_production() {
    let app = TestApp::spawn_in(OperatingMode::Production).await;

    app.client
        .post(app.url("/login"))
        .form(&[("username", "nobody"), ("password", TEST_PASSWORD)])
        .send()
        .await
        .unwrap();

    let (_, first) = app.get("/login").await;
    assert!(first.contains("Invalid username or password"));

    let (_, second) = app.get("/login").await;
    assert!(!second.contains("Invalid username or password"));
}

#[tokio::test]
async fn test_flash_not_exposed_in_development() {
    let app = TestApp::spawn().await;

    app.client
        .post(app.url("/login"))
        .form(&[("username", "nobody"), ("password", TEST_PASSWORD)])
        .send()
        .await
        .unwrap();

    let (status, body) = app.get("/login").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("Invalid username or password"));
}

#[tokio::test]
async fn test_register_logs_in() {
    let app = TestApp::spawn_in(OperatingMode::Production).await;

    let response = app
        .client
        .post(app.url("/register"))
        .form(&[
            ("username", "Grace"),
            ("password", TEST_PASSWORD),
            ("password_confirm", TEST_PASSWORD),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let (_, body) = app.get("/").await;
    assert!(body.contains("Hello, grace"));
    assert!(body.contains("Welcome, grace!"));
}

#[tokio::test]
async fn test_register_password_mismatch() {
    let app = TestApp::spawn_in(OperatingMode::Production).await;

    let response = app
        .client
        .post(app.url("/register"))
        .form(&[
            ("username", "grace"),
            ("password", TEST_PASSWORD),
            ("password_confirm", "something else"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(location(&response), "/register");

    let (_, body) = app.get("/register").await;
    assert!(body.contains("Passwords do not match"));
}

#[tokio::test]
async fn test_logout_via_method_override() {
    let app = TestApp::spawn().await;
    app.users.add("ada");
    app.login("ada").await;

    let response = app
        .client
        .post(app.url("/logout?_method=DELETE"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let (_, body) = app.get("/").await;
    assert!(body.contains("Welcome to Hearth"));
}

#[tokio::test]
async fn test_login_with_json_body() {
    let app = TestApp::spawn().await;
    app.users.add("ada");

    let credentials = HashMap::from([("username", "ada"), ("password", TEST_PASSWORD)]);
    let response = app
        .client
        .post(app.url("/login"))
        .json(&credentials)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let (_, body) = app.get("/").await;
    assert!(body.contains("Hello, ada"));
}

#[tokio::test]
async fn test_login_missing_field_renders_error_page() {
    let app = TestApp::spawn().await;
    app.users.add("ada");

    let response = app
        .client
        .post(app.url("/login"))
        .form(&[("username", "ada")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("error-message"));
    assert!(body.contains("missing field"));
    assert!(body.contains("password"));
}
