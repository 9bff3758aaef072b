//! API-wide constants

/// Prefix of every route served by this API.
pub const API_PREFIX: &str = "/api/v1";

/// Business API key.
pub const HEADER_API_KEY: &str = "x-api-key";

/// End-user name within the business.
pub const HEADER_USERNAME: &str = "x-username";

/// Upload token presented on continuation requests.
pub const HEADER_UPLOAD_TOKEN: &str = "x-upload-token";

pub const HEADER_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Engine metadata keys written by the pre-create hook and read back by the
/// lifecycle handlers.
pub mod metadata {
    pub const BUSINESS_ID: &str = "business_id";
    pub const USERNAME: &str = "username";
    pub const FILENAME: &str = "filename";
}

/// Server-wide cap on in-flight requests.
pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
