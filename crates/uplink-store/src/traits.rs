//! Key-value store abstraction
//!
//! Everything the service persists about uploads and rate-limit windows goes
//! through [`KvStore`]. The command set is deliberately Redis-shaped: counters,
//! hashes, sets and TTLs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use uplink_core::AppError;

/// Store operation errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Store command failed: {0}")]
    Command(String),

    #[error("Operation against a key holding the wrong kind of value: {0}")]
    WrongType(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    HSet {
        key: String,
        fields: Vec<(String, String)>,
    },
    Expire {
        key: String,
        ttl: Duration,
    },
    SAdd {
        key: String,
        member: String,
    },
    SRem {
        key: String,
        member: String,
    },
}

/// Ordered list of writes applied all-or-nothing by [`KvStore::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set hash fields, keeping any fields not named here.
    pub fn hset<K, F, V>(mut self, key: K, fields: impl IntoIterator<Item = (F, V)>) -> Self
    where
        K: Into<String>,
        F: Into<String>,
        V: Into<String>,
    {
        self.ops.push(BatchOp::HSet {
            key: key.into(),
            fields: fields
                .into_iter()
                .map(|(f, v)| (f.into(), v.into()))
                .collect(),
        });
        self
    }

    pub fn expire(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.ops.push(BatchOp::Expire {
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn sadd(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(BatchOp::SAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn srem(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(BatchOp::SRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Ephemeral key-value store.
///
/// Missing and expired keys are indistinguishable: `hgetall` returns an empty
/// map and `smembers` an empty list for both.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Increment a counter, creating it at 0 first. Returns the new value.
    /// An existing TTL is left untouched.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Set a key's TTL. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Apply every write in the batch atomically.
    async fn apply(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Round-trip check used at startup.
    async fn ping(&self) -> StoreResult<()>;

    /// Backend name, for logs.
    fn backend_name(&self) -> &'static str;
}
