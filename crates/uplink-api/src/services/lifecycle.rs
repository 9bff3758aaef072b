//! Upload lifecycle adapter
//!
//! Bridges the upload engine's hooks and event streams into session record
//! writes and progress broadcasts.

use axum::http::HeaderMap;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uplink_core::models::{
    business_index_key, fields, format_timestamp, progress_percent, session_key, ProgressMessage,
    UploadStatus,
};
use uplink_core::{AppError, IdentityLookup};
use uplink_store::{KvStore, WriteBatch};

use crate::constants::{metadata, HEADER_API_KEY, HEADER_USERNAME};
use crate::engine::{EngineEvents, UploadInfo};
use crate::services::broadcast::ProgressHub;

#[derive(Clone)]
pub struct UploadLifecycleAdapter {
    store: Arc<dyn KvStore>,
    identity: Arc<dyn IdentityLookup>,
    hub: ProgressHub,
    upload_dir: PathBuf,
    session_ttl: Duration,
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl UploadLifecycleAdapter {
    pub fn new(
        store: Arc<dyn KvStore>,
        identity: Arc<dyn IdentityLookup>,
        hub: ProgressHub,
        upload_dir: impl Into<PathBuf>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            identity,
            hub,
            upload_dir: upload_dir.into(),
            session_ttl,
        }
    }

    /// Authenticate an upload before the engine creates it and stamp the
    /// caller's identity into its metadata. An error aborts the creation.
    pub async fn pre_create(
        &self,
        headers: &HeaderMap,
        info: &mut UploadInfo,
    ) -> Result<(), AppError> {
        let (Some(api_key), Some(username)) = (
            header_value(headers, HEADER_API_KEY),
            header_value(headers, HEADER_USERNAME),
        ) else {
            return Err(AppError::InvalidInput("missing auth headers".to_string()));
        };

        let business = self
            .identity
            .business_by_api_key(api_key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("invalid api key".to_string()))?;

        info.metadata
            .insert(metadata::BUSINESS_ID.to_string(), business.id.to_string());
        info.metadata
            .insert(metadata::USERNAME.to_string(), username.to_string());

        tracing::debug!(business_id = business.id, username = %username, "Upload creation authorized");
        Ok(())
    }

    /// Record that the engine has received every byte. Races with
    /// [`on_completed`](Self::on_completed); the later write wins.
    pub async fn pre_finish(&self, info: &UploadInfo) -> Result<(), AppError> {
        let key = session_key(&info.id);
        let size = info.size.to_string();
        let now = format_timestamp(Utc::now());

        let mut record = vec![
            (fields::STATUS, UploadStatus::Uploaded.as_str().to_string()),
            (fields::SIZE, size),
            (fields::UPDATED_AT, now),
        ];
        for (field, meta) in [
            (fields::BUSINESS_ID, metadata::BUSINESS_ID),
            (fields::USERNAME, metadata::USERNAME),
            (fields::FILENAME, metadata::FILENAME),
        ] {
            if let Some(value) = info.metadata_value(meta) {
                record.push((field, value.to_string()));
            }
        }

        self.store
            .apply(
                WriteBatch::new()
                    .hset(key.as_str(), record)
                    .expire(key.as_str(), self.session_ttl),
            )
            .await?;

        tracing::debug!(upload_id = %info.id, "Upload marked as uploaded");
        Ok(())
    }

    pub async fn on_created(&self, info: &UploadInfo) -> Result<(), AppError> {
        let key = session_key(&info.id);
        let now = format_timestamp(Utc::now());

        let mut record = vec![
            (fields::STATUS, UploadStatus::Created.as_str().to_string()),
            (fields::SIZE, info.size.to_string()),
            (fields::OFFSET, "0".to_string()),
            (fields::PROGRESS, "0".to_string()),
            (fields::CREATED_AT, now),
        ];

        let business_id = info
            .metadata_value(metadata::BUSINESS_ID)
            .and_then(|v| v.parse::<i64>().ok());
        if let Some(business_id) = business_id {
            record.push((fields::BUSINESS_ID, business_id.to_string()));
        }
        if let Some(username) = info.metadata_value(metadata::USERNAME) {
            record.push((fields::USERNAME, username.to_string()));
        }

        let mut batch = WriteBatch::new()
            .hset(key.as_str(), record)
            .expire(key.as_str(), self.session_ttl);
        if let Some(business_id) = business_id {
            batch = batch.sadd(business_index_key(business_id), info.id.as_str());
        }
        self.store.apply(batch).await?;

        tracing::info!(upload_id = %info.id, size = info.size, "Upload created");
        self.hub
            .broadcast(&info.id, &ProgressMessage::created(&info.id, info.size))
            .await;
        Ok(())
    }

    /// Uploads of unknown size produce no progress record and no frame.
    pub async fn on_progress(&self, info: &UploadInfo) -> Result<(), AppError> {
        let Some(percent) = progress_percent(info.offset, info.size) else {
            return Ok(());
        };

        self.store
            .apply(WriteBatch::new().hset(
                session_key(&info.id),
                [
                    (fields::STATUS, UploadStatus::Uploading.as_str().to_string()),
                    (fields::OFFSET, info.offset.to_string()),
                    (fields::PROGRESS, percent.to_string()),
                    (fields::UPDATED_AT, format_timestamp(Utc::now())),
                ],
            ))
            .await?;

        tracing::debug!(upload_id = %info.id, offset = info.offset, progress = percent, "Upload progress");
        self.hub
            .broadcast(
                &info.id,
                &ProgressMessage::progress(&info.id, info.offset, info.size, percent),
            )
            .await;
        Ok(())
    }

    pub async fn on_completed(&self, info: &UploadInfo) -> Result<(), AppError> {
        self.store
            .apply(WriteBatch::new().hset(
                session_key(&info.id),
                [
                    (fields::STATUS, UploadStatus::Completed.as_str().to_string()),
                    (fields::OFFSET, info.size.to_string()),
                    (fields::PROGRESS, "100".to_string()),
                    (fields::COMPLETED_AT, format_timestamp(Utc::now())),
                ],
            ))
            .await?;

        tracing::info!(upload_id = %info.id, size = info.size, "Upload completed");
        self.hub
            .broadcast(&info.id, &ProgressMessage::complete(&info.id, info.size))
            .await;

        if let Some(filename) = info.metadata_value(metadata::FILENAME) {
            if let Err(e) = relocate_artifact(&self.upload_dir, &info.id, filename).await {
                tracing::error!(
                    upload_id = %info.id,
                    filename = %filename,
                    error = %e,
                    "Failed to relocate uploaded file"
                );
            }
        }
        Ok(())
    }
}

/// Move `{upload_dir}/{id}` to `{upload_dir}/{filename}`, keeping only the
/// final component of `filename`. Falls back to copy-then-remove when a
/// rename is not possible.
pub async fn relocate_artifact(
    upload_dir: &Path,
    upload_id: &str,
    filename: &str,
) -> Result<PathBuf, AppError> {
    let name = Path::new(filename)
        .file_name()
        .ok_or_else(|| AppError::InvalidInput(format!("unusable filename: {}", filename)))?;

    let source = upload_dir.join(upload_id);
    let target = upload_dir.join(name);

    if tokio::fs::rename(&source, &target).await.is_err() {
        tokio::fs::copy(&source, &target).await?;
        tokio::fs::remove_file(&source).await?;
    }

    tracing::debug!(upload_id = %upload_id, target = %target.display(), "Uploaded file relocated");
    Ok(target)
}

/// Consecutive events taken from one stream before the next stream is
/// polled first.
pub const EVENT_BURST: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStage {
    Created,
    Progress,
    Completed,
}

impl EventStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStage::Created => "created",
            EventStage::Progress => "progress",
            EventStage::Completed => "completed",
        }
    }

    fn next(self) -> Self {
        match self {
            EventStage::Created => EventStage::Progress,
            EventStage::Progress => EventStage::Completed,
            EventStage::Completed => EventStage::Created,
        }
    }
}

/// Picks the next engine event.
///
/// Ready streams are taken in lifecycle order (created, progress,
/// completed), except that after [`EVENT_BURST`] consecutive events from one
/// stream the following stream is polled first once, so a busy stream cannot
/// starve the others.
pub struct EventScheduler {
    events: EngineEvents,
    first: EventStage,
    last: Option<EventStage>,
    streak: usize,
}

impl EventScheduler {
    pub fn new(events: EngineEvents) -> Self {
        Self {
            events,
            first: EventStage::Created,
            last: None,
            streak: 0,
        }
    }

    /// `None` once every stream is closed.
    pub async fn next(&mut self) -> Option<(EventStage, UploadInfo)> {
        let events = &mut self.events;
        let next = match self.first {
            EventStage::Created => tokio::select! {
                biased;
                Some(info) = events.created.recv() => Some((EventStage::Created, info)),
                Some(info) = events.progress.recv() => Some((EventStage::Progress, info)),
                Some(info) = events.completed.recv() => Some((EventStage::Completed, info)),
                else => None,
            },
            EventStage::Progress => tokio::select! {
                biased;
                Some(info) = events.progress.recv() => Some((EventStage::Progress, info)),
                Some(info) = events.completed.recv() => Some((EventStage::Completed, info)),
                Some(info) = events.created.recv() => Some((EventStage::Created, info)),
                else => None,
            },
            EventStage::Completed => tokio::select! {
                biased;
                Some(info) = events.completed.recv() => Some((EventStage::Completed, info)),
                Some(info) = events.created.recv() => Some((EventStage::Created, info)),
                Some(info) = events.progress.recv() => Some((EventStage::Progress, info)),
                else => None,
            },
        };

        if let Some((stage, _)) = &next {
            self.record(*stage);
        }
        next
    }

    fn record(&mut self, stage: EventStage) {
        if self.last == Some(stage) {
            self.streak += 1;
        } else {
            self.last = Some(stage);
            self.streak = 1;
        }

        self.first = if self.streak >= EVENT_BURST {
            self.streak = 0;
            stage.next()
        } else {
            EventStage::Created
        };
    }
}

/// Consume engine events one at a time until `shutdown` fires or every
/// stream closes. A failed event is logged and skipped.
pub async fn run_event_loop(
    adapter: UploadLifecycleAdapter,
    events: EngineEvents,
    shutdown: CancellationToken,
) {
    tracing::info!("Upload event loop started");
    let mut scheduler = EventScheduler::new(events);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = scheduler.next() => next,
        };

        let Some((stage, info)) = next else {
            tracing::info!("Upload event streams closed");
            break;
        };

        let result = match stage {
            EventStage::Created => adapter.on_created(&info).await,
            EventStage::Progress => adapter.on_progress(&info).await,
            EventStage::Completed => adapter.on_completed(&info).await,
        };

        if let Err(e) = result {
            tracing::error!(upload_id = %info.id, stage = stage.as_str(), error = %e, "Failed to handle upload event");
        }
    }

    tracing::info!("Upload event loop stopped");
}
