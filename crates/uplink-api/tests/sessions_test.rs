mod helpers;

use axum::http::StatusCode;
use helpers::{api_path, setup_test_app};
use serde_json::Value;
use uplink_api::constants::{HEADER_API_KEY, HEADER_USERNAME};
use uplink_core::models::{fields, session_key};
use uplink_store::WriteBatch;

#[tokio::test]
async fn test_issue_session_returns_hex_token() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/uploads/meta"))
        .add_header(HEADER_API_KEY, app.api_key())
        .add_header(HEADER_USERNAME, "alice")
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(body["expires_in"], 900);
}

#[tokio::test]
async fn test_resume_issued_session_is_in_progress() {
    let app = setup_test_app().await;
    let token = app.issue_token(app.api_key(), "alice").await;

    let response = app
        .client()
        .put(&api_path(&format!("/uploads/meta/{}", token)))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["token"], token.as_str());
    assert_eq!(body["status"], "in_progress");
    assert!(body["created_at"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_issue_session_requires_headers() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/uploads/meta"))
        .add_header(HEADER_API_KEY, app.api_key())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "missing X-Username header");

    // The identity limiter rejects a missing key before the handler runs.
    let response = app
        .client()
        .post(&api_path("/uploads/meta"))
        .add_header(HEADER_USERNAME, "alice")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_issue_session_rejects_unknown_api_key() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post(&api_path("/uploads/meta"))
        .add_header(HEADER_API_KEY, "not-a-real-key")
        .add_header(HEADER_USERNAME, "alice")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let app = setup_test_app().await;
    let unknown = "0".repeat(64);

    app.client()
        .put(&api_path(&format!("/uploads/meta/{}", unknown)))
        .await
        .assert_status_not_found();

    let response = app
        .client()
        .get(&api_path(&format!("/uploads/meta/{}/status", unknown)))
        .await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["error"], "upload not found");
}

#[tokio::test]
async fn test_completed_session_cannot_resume() {
    let app = setup_test_app().await;
    let token = app.issue_token(app.api_key(), "alice").await;

    app.state
        .store
        .apply(WriteBatch::new().hset(session_key(&token), [(fields::STATUS, "completed")]))
        .await
        .unwrap();

    let response = app
        .client()
        .put(&api_path(&format!("/uploads/meta/{}", token)))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"], "upload not in progress");
}

#[tokio::test]
async fn test_status_of_fresh_session() {
    let app = setup_test_app().await;
    let token = app.issue_token(app.api_key(), "alice").await;

    let response = app
        .client()
        .get(&api_path(&format!("/uploads/meta/{}/status", token)))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "in_progress");
    assert_eq!(body["offset"], 0);
    assert_eq!(body["size"], 0);
    assert_eq!(body["progress"], 0.0);
    assert!(body.get("created_at").is_some());
    assert!(body.get("completed_at").is_none());
    assert!(body.get("filename").is_none());
}
