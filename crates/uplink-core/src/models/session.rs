//! Upload session records as persisted in the key-value store.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Hash field names of an `upload:{id}` record.
pub mod fields {
    pub const BUSINESS_ID: &str = "business_id";
    pub const USERNAME: &str = "username";
    pub const STATUS: &str = "status";
    pub const OFFSET: &str = "offset";
    pub const SIZE: &str = "size";
    pub const PROGRESS: &str = "progress";
    pub const FILENAME: &str = "filename";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const COMPLETED_AT: &str = "completed_at";
    pub const USED_AT: &str = "used_at";
}

/// Store key of the session record for an upload id or token.
pub fn session_key(id: &str) -> String {
    format!("upload:{}", id)
}

/// Store key of the per-business set of upload ids.
pub fn business_index_key(business_id: i64) -> String {
    format!("business_uploads:{}", business_id)
}

/// Formats a timestamp the way every record stores it (RFC 3339, seconds, `Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Lifecycle status of an upload session.
///
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Created,
    InProgress,
    Uploading,
    /// Coarse status written by the engine's pre-finish hook.
    Uploaded,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Created => "created",
            UploadStatus::InProgress => "in_progress",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Completed => "completed",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Failed)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(UploadStatus::Created),
            "in_progress" => Ok(UploadStatus::InProgress),
            "uploading" => Ok(UploadStatus::Uploading),
            "uploaded" => Ok(UploadStatus::Uploaded),
            "completed" => Ok(UploadStatus::Completed),
            "failed" => Ok(UploadStatus::Failed),
            other => Err(format!("unknown upload status: {}", other)),
        }
    }
}

/// A session record decoded from its hash fields.
///
/// Fields the record does not carry yet decode to their zero value; the
/// optional timestamps stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSession {
    pub id: String,
    pub business_id: Option<i64>,
    pub username: String,
    pub status: Option<UploadStatus>,
    pub offset: i64,
    pub size: i64,
    pub progress: f64,
    pub filename: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadSession {
    /// Decode a record. Returns `None` for an empty hash, which is how the
    /// store reports a missing or expired key.
    pub fn from_fields(id: &str, raw: &HashMap<String, String>) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let get = |name: &str| raw.get(name).map(String::as_str).filter(|v| !v.is_empty());

        Some(Self {
            id: id.to_string(),
            business_id: get(fields::BUSINESS_ID).and_then(|v| v.parse().ok()),
            username: get(fields::USERNAME).unwrap_or_default().to_string(),
            status: get(fields::STATUS).and_then(|v| v.parse().ok()),
            offset: get(fields::OFFSET).and_then(|v| v.parse().ok()).unwrap_or(0),
            size: get(fields::SIZE).and_then(|v| v.parse().ok()).unwrap_or(0),
            progress: get(fields::PROGRESS)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.0),
            filename: get(fields::FILENAME).map(str::to_string),
            created_at: get(fields::CREATED_AT).and_then(parse_timestamp),
            updated_at: get(fields::UPDATED_AT).and_then(parse_timestamp),
            completed_at: get(fields::COMPLETED_AT).and_then(parse_timestamp),
        })
    }

    pub fn status_str(&self) -> &'static str {
        self.status.map(|s| s.as_str()).unwrap_or("")
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == Some(UploadStatus::InProgress)
    }
}

/// Upload percentage, or `None` when the total size is unknown (zero).
pub fn progress_percent(offset: i64, size: i64) -> Option<f64> {
    if size <= 0 {
        return None;
    }
    Some(offset as f64 / size as f64 * 100.0)
}
