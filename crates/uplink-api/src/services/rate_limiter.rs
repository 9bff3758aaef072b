//! Fixed-window rate limiting backed by the shared key-value store.

use std::sync::Arc;
use uplink_core::{AppError, RateLimitClass};
use uplink_store::KvStore;

/// Result of a permitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPermit {
    /// Calls counted in the current window, this one included.
    pub count: i64,
    pub remaining: u32,
}

#[derive(Clone)]
pub struct FixedWindowRateLimiter {
    store: Arc<dyn KvStore>,
}

impl FixedWindowRateLimiter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Count one call against `key`.
    ///
    /// The window TTL is set only on the first call of a window and is never
    /// extended by later calls.
    pub async fn allow(
        &self,
        key: &str,
        class: RateLimitClass,
    ) -> Result<RateLimitPermit, AppError> {
        let count = self.store.incr(key).await?;

        if count == 1 {
            self.store.expire(key, class.window).await?;
        }

        if count > i64::from(class.limit) {
            tracing::warn!(key = %key, count = count, limit = class.limit, "Rate limit exceeded");
            return Err(AppError::RateLimited { limit: class.limit });
        }

        Ok(RateLimitPermit {
            count,
            remaining: (i64::from(class.limit) - count).max(0) as u32,
        })
    }
}
