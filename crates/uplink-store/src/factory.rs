use std::sync::Arc;
use uplink_core::{Config, StoreBackend};

use crate::{KvStore, MemoryStore, RedisStore, StoreResult};

/// Create the key-value store named by configuration and check it answers.
pub async fn create_store(config: &Config) -> StoreResult<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config.store_backend {
        StoreBackend::Redis => Arc::new(RedisStore::connect(&config.redis_url()).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; upload state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    store.ping().await?;
    tracing::info!(backend = store.backend_name(), "Key-value store ready");
    Ok(store)
}
