//! Route configuration and setup

use crate::constants::{API_PREFIX, HTTP_CONCURRENCY_LIMIT};
use crate::handlers;
use crate::middleware::{rate_limit_middleware, RateLimitGuard, RateLimitStrategy};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uplink_core::{Config, RateLimitClass};

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let guard = |strategy: RateLimitStrategy, class: RateLimitClass| {
        RateLimitGuard::new(
            state.limiter.clone(),
            strategy,
            class,
            config.trusted_proxy_count,
        )
    };

    let session_routes = Router::new()
        .route(
            &format!("{}/uploads/meta", API_PREFIX),
            post(handlers::uploads::issue_session),
        )
        .route_layer(from_fn_with_state(
            guard(RateLimitStrategy::PerIdentity, config.session_rate_limit),
            rate_limit_middleware,
        ));

    let token_routes = Router::new()
        .route(
            &format!("{}/uploads/meta/{{token}}", API_PREFIX),
            put(handlers::uploads::resume_session),
        )
        .route(
            &format!("{}/uploads/meta/{{token}}/status", API_PREFIX),
            get(handlers::uploads::upload_status),
        )
        .route_layer(from_fn_with_state(
            guard(RateLimitStrategy::PerToken, config.token_rate_limit),
            rate_limit_middleware,
        ));

    let business_routes = Router::new()
        .route(
            &format!("{}/business/uploads", API_PREFIX),
            get(handlers::business::list_uploads),
        )
        .route_layer(from_fn_with_state(
            guard(RateLimitStrategy::PerIp, config.business_rate_limit),
            rate_limit_middleware,
        ));

    let ws_routes = Router::new()
        .route(
            &format!("{}/ws/{{id}}", API_PREFIX),
            get(handlers::progress_ws::progress_ws),
        )
        .route_layer(from_fn_with_state(
            guard(RateLimitStrategy::PerIp, config.ws_rate_limit),
            rate_limit_middleware,
        ));

    tracing::info!(
        http_concurrency_limit = HTTP_CONCURRENCY_LIMIT,
        "HTTP concurrency limit layer enabled"
    );

    let app = session_routes
        .merge(token_routes)
        .merge(business_routes)
        .merge(ws_routes)
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
