use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A registered business client. Read-only from the upload service's
/// point of view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Business {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub created_at: NaiveDateTime,
}
