//! Frames pushed to progress subscribers over WebSocket.

use serde::{Deserialize, Serialize};

use super::session::{UploadSession, UploadStatus};

/// Kind of a lifecycle frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Created,
    Progress,
    Complete,
    /// Snapshot of the persisted record, sent once when a subscriber attaches.
    Status,
}

/// Lifecycle frame broadcast to every subscriber of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressMessage {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub upload_id: String,
    /// Percentage in `0..=100`.
    pub progress: f64,
    pub bytes_sent: i64,
    pub total_size: i64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressMessage {
    pub fn created(upload_id: &str, size: i64) -> Self {
        Self {
            kind: ProgressKind::Created,
            upload_id: upload_id.to_string(),
            progress: 0.0,
            bytes_sent: 0,
            total_size: size,
            status: UploadStatus::Created.as_str().to_string(),
            message: Some("Upload created".to_string()),
        }
    }

    pub fn progress(upload_id: &str, offset: i64, size: i64, percent: f64) -> Self {
        Self {
            kind: ProgressKind::Progress,
            upload_id: upload_id.to_string(),
            progress: percent,
            bytes_sent: offset,
            total_size: size,
            status: UploadStatus::Uploading.as_str().to_string(),
            message: None,
        }
    }

    pub fn complete(upload_id: &str, size: i64) -> Self {
        Self {
            kind: ProgressKind::Complete,
            upload_id: upload_id.to_string(),
            progress: 100.0,
            bytes_sent: size,
            total_size: size,
            status: UploadStatus::Completed.as_str().to_string(),
            message: Some("Upload completed successfully".to_string()),
        }
    }

    pub fn snapshot(session: &UploadSession) -> Self {
        Self {
            kind: ProgressKind::Status,
            upload_id: session.id.clone(),
            progress: session.progress,
            bytes_sent: session.offset,
            total_size: session.size,
            status: session.status_str().to_string(),
            message: None,
        }
    }
}

/// Connection-level frames that are not part of the upload lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    Connected { upload_id: String },
    Echo { upload_id: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_frame_shape() {
        let frame = ProgressMessage::progress("up-1", 100, 400, 25.0);
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "progress",
                "upload_id": "up-1",
                "progress": 25.0,
                "bytes_sent": 100,
                "total_size": 400,
                "status": "uploading",
            })
        );
    }

    #[test]
    fn test_complete_frame_carries_message() {
        let value = serde_json::to_value(ProgressMessage::complete("up-1", 400)).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["progress"], 100.0);
        assert_eq!(value["bytes_sent"], 400);
        assert_eq!(value["message"], "Upload completed successfully");
    }

    #[test]
    fn test_control_frames() {
        let connected = ControlFrame::Connected {
            upload_id: "abc".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&connected).unwrap(),
            json!({"type": "connected", "upload_id": "abc"})
        );

        let echo = ControlFrame::Echo {
            upload_id: "abc".to_string(),
            message: "ping".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&echo).unwrap(),
            json!({"type": "echo", "upload_id": "abc", "message": "ping"})
        );
    }
}
