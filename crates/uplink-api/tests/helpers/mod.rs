//! Test helpers: build AppState and router for integration tests.
//!
//! The app runs against the in-memory store and an in-memory SQLite registry,
//! so no external services are needed.

#![allow(dead_code)]

use axum_test::TestServer;
use sqlx::sqlite::SqlitePoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use uplink_api::constants::{self, HEADER_API_KEY, HEADER_USERNAME};
use uplink_api::setup::{routes, services};
use uplink_api::state::AppState;
use uplink_core::models::Business;
use uplink_core::{Config, IdentityLookup};
use uplink_db::BusinessRepository;

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server, state, registry, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub businesses: BusinessRepository,
    pub business: Business,
    pub upload_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub fn api_key(&self) -> &str {
        &self.business.api_key
    }

    /// Issue a session through the API and return its token.
    pub async fn issue_token(&self, api_key: &str, username: &str) -> String {
        let response = self
            .server
            .post(&api_path("/uploads/meta"))
            .add_header(HEADER_API_KEY, api_key)
            .add_header(HEADER_USERNAME, username)
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        body["token"].as_str().expect("token").to_string()
    }
}

fn create_test_config(upload_dir: &TempDir, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("ENVIRONMENT", "test"),
        ("STORE_BACKEND", "memory"),
        ("DATABASE_URL", "sqlite::memory:"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    vars.insert(
        "UPLOAD_DIR".to_string(),
        upload_dir.path().to_string_lossy().into_owned(),
    );
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }

    let config = Config::from_lookup(|name| vars.get(name).cloned()).expect("test config");
    config.validate().expect("valid test config");
    config
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[], false).await
}

/// Build the app with config overrides. WebSocket tests need `http_transport`.
pub async fn setup_test_app_with(overrides: &[(&str, &str)], http_transport: bool) -> TestApp {
    let upload_dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&upload_dir, overrides);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(&config.database_url)
        .await
        .expect("Failed to open in-memory registry");
    uplink_db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let businesses = BusinessRepository::new(pool);
    let business = businesses
        .create("Acme", "ops@acme.test")
        .await
        .expect("Failed to register business");

    let store: Arc<dyn uplink_store::KvStore> = Arc::new(uplink_store::MemoryStore::new());
    let identity: Arc<dyn IdentityLookup> = Arc::new(businesses.clone());
    let state = services::initialize_services(&config, store, identity);

    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = if http_transport {
        TestServer::builder()
            .http_transport()
            .build(app.into_make_service())
            .expect("Failed to create test server")
    } else {
        TestServer::new(app.into_make_service()).expect("Failed to create test server")
    };

    TestApp {
        server,
        state,
        businesses,
        business,
        upload_dir,
    }
}
