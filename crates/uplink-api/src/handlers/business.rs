use crate::constants::HEADER_API_KEY;
use crate::error::HttpAppError;
use crate::handlers::uploads::header_str;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ListUploadsQuery {
    pub username: Option<String>,
}

/// List the calling business's uploads, optionally for one username.
#[tracing::instrument(skip(state, headers, query), fields(operation = "list_business_uploads"))]
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListUploadsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let business = state
        .sessions
        .authenticate(header_str(&headers, HEADER_API_KEY))
        .await?;

    let listing = state
        .sessions
        .list_uploads(business.id, query.username.as_deref())
        .await?;

    tracing::debug!(business_id = business.id, count = listing.count, "Listed business uploads");
    Ok(Json(listing))
}
