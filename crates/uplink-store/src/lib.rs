//! Uplink Store Library
//!
//! Ephemeral key-value storage for upload sessions, tokens and rate-limit
//! counters, with a Redis backend and an in-process backend.
//!
//! # Key layout
//!
//! - `upload:{id}`: session hash
//! - `upload_token:{token}`: token hash
//! - `business_uploads:{business_id}`: set of upload ids
//! - `rate:{strategy}:...`: fixed-window counters

pub mod factory;
pub mod memory;
pub mod redis_store;
pub mod traits;

// Re-export commonly used types
pub use factory::create_store;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use traits::{BatchOp, KvStore, StoreError, StoreResult, WriteBatch};
