//! Redis-backed store
//!
//! Batches are sent as one `MULTI`/`EXEC` pipeline.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;

use crate::traits::{BatchOp, KvStore, StoreResult, WriteBatch};

#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://:password@host:6379`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis");
        Ok(Self { manager })
    }

    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

/// Redis TTLs are whole seconds; anything shorter rounds up to one.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KvStore for RedisStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn();
        let count = redis::cmd("INCR")
            .arg(key)
            .query_async::<_, i64>(&mut conn)
            .await?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn();
        let applied = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_secs(ttl))
            .query_async::<_, bool>(&mut conn)
            .await?;
        Ok(applied)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn();
        let fields = redis::cmd("HGETALL")
            .arg(key)
            .query_async::<_, HashMap<String, String>>(&mut conn)
            .await?;
        Ok(fields)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn();
        let members = redis::cmd("SMEMBERS")
            .arg(key)
            .query_async::<_, Vec<String>>(&mut conn)
            .await?;
        Ok(members)
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in batch.into_ops() {
            match op {
                BatchOp::HSet { key, fields } => {
                    if fields.is_empty() {
                        continue;
                    }
                    pipe.cmd("HSET").arg(key);
                    for (field, value) in fields {
                        pipe.arg(field).arg(value);
                    }
                    pipe.ignore();
                }
                BatchOp::Expire { key, ttl } => {
                    pipe.cmd("EXPIRE").arg(key).arg(ttl_secs(ttl)).ignore();
                }
                BatchOp::SAdd { key, member } => {
                    pipe.cmd("SADD").arg(key).arg(member).ignore();
                }
                BatchOp::SRem { key, member } => {
                    pipe.cmd("SREM").arg(key).arg(member).ignore();
                }
            }
        }

        let mut conn = self.conn();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_rounds_to_whole_seconds() {
        assert_eq!(ttl_secs(Duration::from_secs(900)), 900);
        assert_eq!(ttl_secs(Duration::from_millis(200)), 1);
    }
}
