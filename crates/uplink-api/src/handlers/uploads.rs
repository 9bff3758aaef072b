use crate::constants::{HEADER_API_KEY, HEADER_USERNAME};
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
}

/// Issue an upload session for the business owning `X-API-KEY`.
#[tracing::instrument(skip(state, headers), fields(operation = "issue_upload_session"))]
pub async fn issue_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpAppError> {
    let issued = state
        .sessions
        .issue(
            header_str(&headers, HEADER_API_KEY),
            header_str(&headers, HEADER_USERNAME),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

#[tracing::instrument(skip(state, token), fields(operation = "resume_upload_session"))]
pub async fn resume_session(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let resumed = state.sessions.resume(&token).await?;
    Ok(Json(resumed))
}

#[tracing::instrument(skip(state, token), fields(operation = "get_upload_status"))]
pub async fn upload_status(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let report = state.sessions.status(&token).await?;
    Ok(Json(report))
}
