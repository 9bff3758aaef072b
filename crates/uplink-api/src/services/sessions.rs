//! Upload session and token lifecycle

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uplink_core::models::{
    business_index_key, fields, format_timestamp, generate_token, session_key, token_key,
    Business, BusinessUploads, IssuedSession, ResumedSession, TokenStatus, UploadSession,
    UploadStatus, UploadStatusReport, UploadSummary,
};
use uplink_core::{AppError, IdentityLookup};
use uplink_store::{KvStore, WriteBatch};

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn KvStore>,
    identity: Arc<dyn IdentityLookup>,
    token_ttl: Duration,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn KvStore>,
        identity: Arc<dyn IdentityLookup>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            token_ttl,
        }
    }

    /// Resolve an API key to its business.
    pub async fn authenticate(&self, api_key: &str) -> Result<Business, AppError> {
        if api_key.is_empty() {
            return Err(AppError::InvalidInput(
                "missing X-API-KEY header".to_string(),
            ));
        }

        self.identity
            .business_by_api_key(api_key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid api key".to_string()))
    }

    /// Issue a new upload token for `username` within the key's business.
    #[tracing::instrument(skip(self, api_key))]
    pub async fn issue(&self, api_key: &str, username: &str) -> Result<IssuedSession, AppError> {
        if api_key.is_empty() {
            return Err(AppError::InvalidInput(
                "missing X-API-KEY header".to_string(),
            ));
        }
        if username.is_empty() {
            return Err(AppError::InvalidInput(
                "missing X-Username header".to_string(),
            ));
        }

        let business = self.authenticate(api_key).await?;
        let token = generate_token();
        let now = format_timestamp(Utc::now());
        let business_id = business.id.to_string();

        // Session record, index entry and token record land together or not at all.
        // The token is written as `used` at issuance.
        let batch = WriteBatch::new()
            .hset(
                session_key(&token),
                [
                    (fields::STATUS, UploadStatus::InProgress.as_str()),
                    (fields::BUSINESS_ID, business_id.as_str()),
                    (fields::USERNAME, username),
                    (fields::CREATED_AT, now.as_str()),
                ],
            )
            .sadd(business_index_key(business.id), token.as_str())
            .hset(
                token_key(&token),
                [
                    (fields::BUSINESS_ID, business_id.as_str()),
                    (fields::USERNAME, username),
                    (fields::STATUS, TokenStatus::Used.as_str()),
                    (fields::CREATED_AT, now.as_str()),
                    (fields::USED_AT, now.as_str()),
                ],
            )
            .expire(token_key(&token), self.token_ttl);

        self.store.apply(batch).await?;

        tracing::info!(business_id = business.id, "Upload session issued");

        Ok(IssuedSession {
            token,
            expires_in: self.token_ttl.as_secs(),
        })
    }

    async fn load(&self, token: &str) -> Result<UploadSession, AppError> {
        let raw = self.store.hgetall(&session_key(token)).await?;
        UploadSession::from_fields(token, &raw)
            .ok_or_else(|| AppError::NotFound("upload not found".to_string()))
    }

    pub async fn resume(&self, token: &str) -> Result<ResumedSession, AppError> {
        let session = self.load(token).await?;

        if !session.is_in_progress() {
            return Err(AppError::Conflict("upload not in progress".to_string()));
        }

        Ok(ResumedSession {
            token: session.id.clone(),
            status: session.status_str().to_string(),
            created_at: session
                .created_at
                .map(format_timestamp)
                .unwrap_or_default(),
        })
    }

    pub async fn status(&self, token: &str) -> Result<UploadStatusReport, AppError> {
        let session = self.load(token).await?;

        Ok(UploadStatusReport {
            token: session.id.clone(),
            status: session.status_str().to_string(),
            progress: session.progress,
            offset: session.offset,
            size: session.size,
            created_at: session.created_at.map(format_timestamp),
            updated_at: session.updated_at.map(format_timestamp),
            completed_at: session.completed_at.map(format_timestamp),
            filename: session.filename,
        })
    }

    /// Uploads of a business, optionally narrowed to one username, ordered by
    /// creation time then token.
    ///
    /// Index members whose session has expired are skipped and dropped from
    /// the index.
    pub async fn list_uploads(
        &self,
        business_id: i64,
        username: Option<&str>,
    ) -> Result<BusinessUploads, AppError> {
        let index_key = business_index_key(business_id);
        let members = self.store.smembers(&index_key).await?;

        let mut sessions = Vec::with_capacity(members.len());
        let mut stale = WriteBatch::new();

        for id in members {
            let raw = self.store.hgetall(&session_key(&id)).await?;
            match UploadSession::from_fields(&id, &raw) {
                Some(session) => sessions.push(session),
                None => stale = stale.srem(index_key.as_str(), id),
            }
        }

        if !stale.is_empty() {
            let removed = stale.ops().len();
            if let Err(e) = self.store.apply(stale).await {
                tracing::warn!(business_id = business_id, error = %e, "Failed to prune upload index");
            } else {
                tracing::debug!(business_id = business_id, removed = removed, "Pruned expired uploads from index");
            }
        }

        if let Some(username) = username.filter(|u| !u.is_empty()) {
            sessions.retain(|s| s.username == username);
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let uploads: Vec<UploadSummary> = sessions
            .into_iter()
            .map(|s| UploadSummary {
                status: s.status_str().to_string(),
                created_at: s.created_at.map(format_timestamp).unwrap_or_default(),
                username: s.username,
                token: s.id,
            })
            .collect();

        Ok(BusinessUploads {
            business_id,
            count: uploads.len(),
            uploads,
        })
    }
}
