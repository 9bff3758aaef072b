//! In-process store
//!
//! Used for tests and single-node development. All keys live behind one
//! mutex, which is also what makes [`KvStore::apply`] atomic. Expiry is
//! checked lazily on access against `tokio::time::Instant`, so paused-clock
//! tests can advance through TTLs. Writes also sweep every expired key at
//! most once per [`SWEEP_INTERVAL`], so keys that are never touched again
//! (one-off rate counters) do not pile up.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::traits::{BatchOp, KvStore, StoreError, StoreResult, WriteBatch};

#[derive(Debug, Clone)]
enum Value {
    Counter(i64),
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Minimum time between two full sweeps of expired keys.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: Instant,
}

impl Entries {
    /// Drop every expired key once the sweep interval has elapsed.
    fn sweep_if_due(&mut self) {
        let now = Instant::now();
        if now < self.next_sweep {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired(now));
        self.next_sweep = now + SWEEP_INTERVAL;

        let swept = before - self.map.len();
        if swept > 0 {
            tracing::debug!(swept = swept, remaining = self.map.len(), "Swept expired keys");
        }
    }
}

pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                next_sweep: Instant::now() + SWEEP_INTERVAL,
            }),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently held, expired ones not yet swept included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn purge_expired(entries: &mut HashMap<String, Entry>, key: &str) {
    let now = Instant::now();
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
}

/// Returns the live entry for `key`, dropping it first if it has expired.
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    purge_expired(entries, key);
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

/// Applies a single write. `apply` runs `check_op` over the whole batch first
/// so a batch with a type clash writes nothing.
fn apply_op(entries: &mut HashMap<String, Entry>, op: BatchOp) -> StoreResult<()> {
    match op {
        BatchOp::HSet { key, fields } => {
            purge_expired(entries, &key);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(Value::Hash(HashMap::new())));
            match &mut entry.value {
                Value::Hash(map) => {
                    map.extend(fields);
                    Ok(())
                }
                _ => Err(wrong_type(&key)),
            }
        }
        BatchOp::Expire { key, ttl } => {
            set_expiry(entries, &key, ttl);
            Ok(())
        }
        BatchOp::SAdd { key, member } => {
            purge_expired(entries, &key);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(Value::Set(BTreeSet::new())));
            match &mut entry.value {
                Value::Set(set) => {
                    set.insert(member);
                    Ok(())
                }
                _ => Err(wrong_type(&key)),
            }
        }
        BatchOp::SRem { key, member } => {
            let now_empty = match live(entries, &key) {
                None => return Ok(()),
                Some(Entry {
                    value: Value::Set(set),
                    ..
                }) => {
                    set.remove(&member);
                    set.is_empty()
                }
                Some(_) => return Err(wrong_type(&key)),
            };
            if now_empty {
                entries.remove(&key);
            }
            Ok(())
        }
    }
}

fn set_expiry(entries: &mut HashMap<String, Entry>, key: &str, ttl: Duration) -> bool {
    if ttl.is_zero() {
        return entries.remove(key).is_some();
    }
    match live(entries, key) {
        Some(entry) => {
            entry.expires_at = Some(Instant::now() + ttl);
            true
        }
        None => false,
    }
}

fn check_op(entries: &mut HashMap<String, Entry>, op: &BatchOp) -> StoreResult<()> {
    let (key, ok) = match op {
        BatchOp::HSet { key, .. } => (
            key,
            live(entries, key).map_or(true, |e| matches!(e.value, Value::Hash(_))),
        ),
        BatchOp::SAdd { key, .. } | BatchOp::SRem { key, .. } => (
            key,
            live(entries, key).map_or(true, |e| matches!(e.value, Value::Set(_))),
        ),
        BatchOp::Expire { .. } => return Ok(()),
    };
    if ok {
        Ok(())
    } else {
        Err(wrong_type(key))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut guard = self.entries.lock().await;
        guard.sweep_if_due();
        let entries = &mut guard.map;
        match live(entries, key) {
            Some(Entry {
                value: Value::Counter(count),
                ..
            }) => {
                *count += 1;
                Ok(*count)
            }
            Some(_) => Err(wrong_type(key)),
            None => {
                entries.insert(key.to_string(), Entry::new(Value::Counter(1)));
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut guard = self.entries.lock().await;
        Ok(set_expiry(&mut guard.map, key, ttl))
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut guard = self.entries.lock().await;
        match live(&mut guard.map, key) {
            Some(Entry {
                value: Value::Hash(map),
                ..
            }) => Ok(map.clone()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(HashMap::new()),
        }
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut guard = self.entries.lock().await;
        match live(&mut guard.map, key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut guard = self.entries.lock().await;
        guard.sweep_if_due();
        let entries = &mut guard.map;
        for op in batch.ops() {
            check_op(entries, op)?;
        }
        for op in batch.into_ops() {
            apply_op(entries, op)?;
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_counter_expires_after_ttl() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("rate:k").await.unwrap(), 1);
        assert!(store
            .expire("rate:k", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(store.incr("rate:k").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.incr("rate:k").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incr_keeps_existing_ttl() {
        let store = MemoryStore::new();
        store.incr("rate:k").await.unwrap();
        store
            .expire("rate:k", Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.incr("rate:k").await.unwrap(), 2);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.incr("rate:k").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untouched_expired_counters_are_swept() {
        let store = MemoryStore::new();
        for i in 0..1000 {
            let key = format!("rate:ip:10.0.{}.{}:GET:/x", i / 256, i % 256);
            store.incr(&key).await.unwrap();
            store.expire(&key, Duration::from_secs(60)).await.unwrap();
        }
        store.incr("rate:persistent").await.unwrap();
        assert_eq!(store.len().await, 1001);

        tokio::time::advance(Duration::from_secs(3600)).await;
        store.incr("rate:fresh").await.unwrap();

        // Only the key without a TTL and the new one survive.
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_waits_for_interval() {
        let store = MemoryStore::new();
        store.incr("rate:a").await.unwrap();
        store.expire("rate:a", Duration::from_secs(1)).await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        store.incr("rate:b").await.unwrap();
        assert_eq!(store.len().await, 2);

        tokio::time::advance(SWEEP_INTERVAL).await;
        store.incr("rate:b").await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = MemoryStore::new();
        assert!(!store
            .expire("nothing", Duration::from_secs(5))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_hset_merges_fields() {
        let store = MemoryStore::new();
        store
            .apply(WriteBatch::new().hset("upload:a", [("status", "created"), ("size", "10")]))
            .await
            .unwrap();
        store
            .apply(WriteBatch::new().hset("upload:a", [("status", "uploading")]))
            .await
            .unwrap();

        let fields = store.hgetall("upload:a").await.unwrap();
        assert_eq!(fields.get("status").map(String::as_str), Some("uploading"));
        assert_eq!(fields.get("size").map(String::as_str), Some("10"));
        assert!(store.hgetall("upload:missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sets() {
        let store = MemoryStore::new();
        store
            .apply(
                WriteBatch::new()
                    .sadd("business_uploads:1", "b")
                    .sadd("business_uploads:1", "a")
                    .sadd("business_uploads:1", "a"),
            )
            .await
            .unwrap();
        assert_eq!(
            store.smembers("business_uploads:1").await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        store
            .apply(
                WriteBatch::new()
                    .srem("business_uploads:1", "a")
                    .srem("business_uploads:1", "b"),
            )
            .await
            .unwrap();
        assert!(store.smembers("business_uploads:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_writes_nothing() {
        let store = MemoryStore::new();
        store.incr("counter").await.unwrap();

        let result = store
            .apply(
                WriteBatch::new()
                    .hset("upload:a", [("status", "created")])
                    .sadd("counter", "x"),
            )
            .await;

        assert!(matches!(result, Err(StoreError::WrongType(_))));
        assert!(store.hgetall("upload:a").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_expiry_applies_to_hash() {
        let store = MemoryStore::new();
        store
            .apply(
                WriteBatch::new()
                    .hset("upload_token:t", [("status", "used")])
                    .expire("upload_token:t", Duration::from_secs(900)),
            )
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(899)).await;
        assert!(!store.hgetall("upload_token:t").await.unwrap().is_empty());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.hgetall("upload_token:t").await.unwrap().is_empty());
    }
}
