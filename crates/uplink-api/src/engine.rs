//! Seam to the external resumable-upload engine.
//!
//! The engine owns chunk storage and offset negotiation. It reports lifecycle
//! changes on three bounded streams (created, progress, completed) and calls
//! the pre-create / pre-finish hooks on
//! [`UploadLifecycleAdapter`](crate::services::lifecycle::UploadLifecycleAdapter).

use std::collections::HashMap;
use tokio::sync::mpsc;
use uplink_core::AppError;

/// Free-form metadata the engine carries alongside an upload.
pub type UploadMetadata = HashMap<String, String>;

/// Snapshot of an engine upload at the time of an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadInfo {
    pub id: String,
    /// Declared total size in bytes; 0 when not yet known.
    pub size: i64,
    /// Bytes received so far.
    pub offset: i64,
    pub metadata: UploadMetadata,
}

impl UploadInfo {
    pub fn new(id: impl Into<String>, size: i64) -> Self {
        Self {
            id: id.into(),
            size,
            ..Self::default()
        }
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Receiving half, consumed by the lifecycle event loop.
pub struct EngineEvents {
    pub created: mpsc::Receiver<UploadInfo>,
    pub progress: mpsc::Receiver<UploadInfo>,
    pub completed: mpsc::Receiver<UploadInfo>,
}

/// Sending half, handed to the engine.
#[derive(Clone)]
pub struct EngineEventSender {
    created: mpsc::Sender<UploadInfo>,
    progress: mpsc::Sender<UploadInfo>,
    completed: mpsc::Sender<UploadInfo>,
}

fn loop_stopped() -> AppError {
    AppError::Internal("upload event loop is not running".to_string())
}

impl EngineEventSender {
    pub async fn created(&self, info: UploadInfo) -> Result<(), AppError> {
        self.created.send(info).await.map_err(|_| loop_stopped())
    }

    pub async fn progress(&self, info: UploadInfo) -> Result<(), AppError> {
        self.progress.send(info).await.map_err(|_| loop_stopped())
    }

    pub async fn completed(&self, info: UploadInfo) -> Result<(), AppError> {
        self.completed.send(info).await.map_err(|_| loop_stopped())
    }
}

/// Create the three event streams, each buffering up to `capacity` events.
pub fn event_channels(capacity: usize) -> (EngineEventSender, EngineEvents) {
    let (created_tx, created_rx) = mpsc::channel(capacity);
    let (progress_tx, progress_rx) = mpsc::channel(capacity);
    let (completed_tx, completed_rx) = mpsc::channel(capacity);

    (
        EngineEventSender {
            created: created_tx,
            progress: progress_tx,
            completed: completed_tx,
        },
        EngineEvents {
            created: created_rx,
            progress: progress_rx,
            completed: completed_rx,
        },
    )
}
