mod helpers;

use axum::http::StatusCode;
use helpers::{api_path, setup_test_app, setup_test_app_with};
use serde_json::Value;
use uplink_api::constants::{HEADER_API_KEY, HEADER_UPLOAD_TOKEN, HEADER_USERNAME};

fn header_u32(response: &axum_test::TestResponse, name: &str) -> u32 {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("{name} header should be present"))
        .to_str()
        .unwrap()
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_rate_limit_headers_present() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get(&api_path("/business/uploads"))
        .add_header(HEADER_API_KEY, app.api_key())
        .await;

    response.assert_status_ok();
    assert_eq!(header_u32(&response, "X-RateLimit-Limit"), 10);
    assert_eq!(header_u32(&response, "X-RateLimit-Remaining"), 9);
}

#[tokio::test]
async fn test_session_issue_limited_per_identity() {
    let app = setup_test_app_with(&[("SESSION_RATE_LIMIT", "2")], false).await;

    for expected_remaining in [1, 0] {
        let response = app
            .client()
            .post(&api_path("/uploads/meta"))
            .add_header(HEADER_API_KEY, app.api_key())
            .add_header(HEADER_USERNAME, "alice")
            .await;
        response.assert_status(StatusCode::CREATED);
        assert_eq!(header_u32(&response, "X-RateLimit-Remaining"), expected_remaining);
    }

    let response = app
        .client()
        .post(&api_path("/uploads/meta"))
        .add_header(HEADER_API_KEY, app.api_key())
        .add_header(HEADER_USERNAME, "alice")
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_u32(&response, "X-RateLimit-Limit"), 2);
    assert_eq!(header_u32(&response, "X-RateLimit-Remaining"), 0);
    let body: Value = response.json();
    assert_eq!(body["code"], "RATE_LIMITED");

    // A different username is a different identity.
    app.client()
        .post(&api_path("/uploads/meta"))
        .add_header(HEADER_API_KEY, app.api_key())
        .add_header(HEADER_USERNAME, "bob")
        .await
        .assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_token_routes_limited_per_token() {
    let app = setup_test_app_with(&[("TOKEN_RATE_LIMIT", "1")], false).await;
    let token = app.issue_token(app.api_key(), "alice").await;
    let status_path = api_path(&format!("/uploads/meta/{}/status", token));

    app.client().get(&status_path).await.assert_status_ok();
    app.client()
        .get(&status_path)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    // Resume is a separate route with its own window.
    app.client()
        .put(&api_path(&format!("/uploads/meta/{}", token)))
        .await
        .assert_status_ok();

    // A header cannot move the path token into a fresh window.
    for i in 0..5 {
        app.client()
            .get(&status_path)
            .add_header(HEADER_UPLOAD_TOKEN, format!("other-token-{i}"))
            .await
            .assert_status(StatusCode::TOO_MANY_REQUESTS);
    }
}
