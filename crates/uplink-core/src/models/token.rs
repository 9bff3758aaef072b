use serde::{Deserialize, Serialize};

/// Random bytes behind every upload token and API key.
pub const TOKEN_BYTES: usize = 32;

/// Generate an opaque secret: 32 random bytes as 64 lowercase hex chars.
pub fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let random_bytes: Vec<u8> = (0..TOKEN_BYTES).map(|_| rng.random()).collect();
    hex::encode(random_bytes)
}

/// Store key of the token record.
pub fn token_key(token: &str) -> String {
    format!("upload_token:{}", token)
}

/// Token status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Issued,
    Used,
    Expired,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Issued => "issued",
            TokenStatus::Used => "used",
            TokenStatus::Expired => "expired",
        }
    }
}

/// Response body of a successful session issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_in: u64,
}

/// Response body of a successful resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumedSession {
    pub token: String,
    pub status: String,
    pub created_at: String,
}

/// Status report of a single upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStatusReport {
    pub token: String,
    pub status: String,
    pub progress: f64,
    pub offset: i64,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// One row of a business listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub token: String,
    pub username: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessUploads {
    pub business_id: i64,
    pub uploads: Vec<UploadSummary>,
    pub count: usize,
}
