//! Per-route rate limiting
//!
//! Each route group is wrapped with a [`RateLimitGuard`] naming how callers
//! are told apart and which quota applies. Counting itself happens in the
//! shared store through [`FixedWindowRateLimiter`].

use axum::{
    extract::{ConnectInfo, FromRequestParts, MatchedPath, RawPathParams, Request, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use uplink_core::{AppError, RateLimitClass};

use crate::constants::{
    HEADER_API_KEY, HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING, HEADER_UPLOAD_TOKEN,
    HEADER_USERNAME,
};
use crate::error::HttpAppError;
use crate::services::FixedWindowRateLimiter;
use crate::utils::extract_client_ip;

/// How callers are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitStrategy {
    PerIp,
    /// API key plus username; requires `X-API-KEY`.
    PerIdentity,
    /// The `{token}` path segment when the route has one, else `X-Upload-Token`.
    PerToken,
}

/// Request facts a strategy derives its key from.
#[derive(Debug, Clone, Default)]
pub struct RateLimitContext {
    pub method: String,
    pub route: String,
    pub client_ip: String,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
}

impl RateLimitStrategy {
    pub fn tag(&self) -> &'static str {
        match self {
            RateLimitStrategy::PerIp => "ip",
            RateLimitStrategy::PerIdentity => "identity",
            RateLimitStrategy::PerToken => "token",
        }
    }

    pub fn key(&self, ctx: &RateLimitContext) -> Result<String, AppError> {
        let subject = match self {
            RateLimitStrategy::PerIp => ctx.client_ip.clone(),
            RateLimitStrategy::PerIdentity => {
                let api_key = ctx.api_key.as_deref().ok_or_else(|| {
                    AppError::InvalidInput("missing X-API-KEY header".to_string())
                })?;
                format!("{}:{}", api_key, ctx.username.as_deref().unwrap_or_default())
            }
            RateLimitStrategy::PerToken => ctx
                .token
                .clone()
                .ok_or_else(|| AppError::InvalidInput("missing X-Upload-Token header".to_string()))?,
        };

        Ok(format!(
            "rate:{}:{}:{}:{}",
            self.tag(),
            subject,
            ctx.method,
            ctx.route
        ))
    }
}

/// Middleware state for one route group.
#[derive(Clone)]
pub struct RateLimitGuard {
    limiter: FixedWindowRateLimiter,
    strategy: RateLimitStrategy,
    class: RateLimitClass,
    trusted_proxy_count: usize,
}

impl RateLimitGuard {
    pub fn new(
        limiter: FixedWindowRateLimiter,
        strategy: RateLimitStrategy,
        class: RateLimitClass,
        trusted_proxy_count: usize,
    ) -> Self {
        Self {
            limiter,
            strategy,
            class,
            trusted_proxy_count,
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn set_header(response: &mut Response, name: &'static str, value: u32) {
    if let Ok(header_value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, header_value);
    }
}

async fn path_token(request: Request) -> (Request, Option<String>) {
    let (mut parts, body) = request.into_parts();
    let token = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(name, _)| *name == "token")
                .map(|(_, value)| value.to_string())
        });
    (Request::from_parts(parts, body), token)
}

fn context(
    guard: &RateLimitGuard,
    request: &Request,
    method: &Method,
    path_token: Option<String>,
) -> RateLimitContext {
    let headers = request.headers();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    RateLimitContext {
        method: method.as_str().to_string(),
        route,
        client_ip: extract_client_ip(headers, peer.as_ref(), guard.trusted_proxy_count),
        api_key: header_string(headers, HEADER_API_KEY),
        username: header_string(headers, HEADER_USERNAME),
        token: path_token.or_else(|| header_string(headers, HEADER_UPLOAD_TOKEN)),
    }
}

pub async fn rate_limit_middleware(
    State(guard): State<RateLimitGuard>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let (request, token) = if guard.strategy == RateLimitStrategy::PerToken {
        path_token(request).await
    } else {
        (request, None)
    };

    let ctx = context(&guard, &request, &method, token);
    let key = match guard.strategy.key(&ctx) {
        Ok(key) => key,
        Err(e) => return HttpAppError(e).into_response(),
    };

    match guard.limiter.allow(&key, guard.class).await {
        Ok(permit) => {
            let mut response = next.run(request).await;
            set_header(&mut response, HEADER_RATE_LIMIT_LIMIT, guard.class.limit);
            set_header(&mut response, HEADER_RATE_LIMIT_REMAINING, permit.remaining);
            response
        }
        Err(e @ AppError::RateLimited { .. }) => {
            let mut response = HttpAppError(e).into_response();
            set_header(&mut response, HEADER_RATE_LIMIT_LIMIT, guard.class.limit);
            set_header(&mut response, HEADER_RATE_LIMIT_REMAINING, 0);
            response
        }
        Err(e) => HttpAppError(e).into_response(),
    }
}
