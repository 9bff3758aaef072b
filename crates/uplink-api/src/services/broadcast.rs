//! Progress broadcast hub
//!
//! Tracks live subscriber connections per upload id and fans frames out to
//! them. Every subscriber owns a bounded queue; a full queue loses that one
//! frame, a closed queue gets the subscriber pruned in the background.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

struct Subscriber {
    id: Uuid,
    tx: mpsc::Sender<Arc<str>>,
}

/// A live registration returned by [`ProgressHub::subscribe`].
pub struct Subscription {
    pub id: Uuid,
    pub upload_id: String,
    pub receiver: mpsc::Receiver<Arc<str>>,
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose queue was full; they miss this frame only.
    pub dropped: usize,
    /// Subscribers found closed and scheduled for removal.
    pub pruned: usize,
}

#[derive(Clone)]
pub struct ProgressHub {
    subscribers: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
    queue_capacity: usize,
}

impl ProgressHub {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub async fn subscribe(&self, upload_id: &str) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();

        let mut subscribers = self.subscribers.write().await;
        subscribers
            .entry(upload_id.to_string())
            .or_default()
            .push(Subscriber { id, tx });

        tracing::debug!(upload_id = %upload_id, subscriber_id = %id, "Subscriber attached");

        Subscription {
            id,
            upload_id: upload_id.to_string(),
            receiver,
        }
    }

    /// Remove one subscriber; drops the upload entry once it is empty.
    pub async fn unsubscribe(&self, upload_id: &str, subscriber_id: Uuid) {
        let mut subscribers = self.subscribers.write().await;
        if let Some(list) = subscribers.get_mut(upload_id) {
            list.retain(|s| s.id != subscriber_id);
            if list.is_empty() {
                subscribers.remove(upload_id);
            }
        }
        tracing::debug!(upload_id = %upload_id, subscriber_id = %subscriber_id, "Subscriber detached");
    }

    /// Serialize `frame` once and offer it to every subscriber of `upload_id`.
    ///
    /// Never waits on a subscriber.
    pub async fn broadcast<T: Serialize>(&self, upload_id: &str, frame: &T) -> BroadcastReport {
        let payload: Arc<str> = match serde_json::to_string(frame) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(upload_id = %upload_id, error = %e, "Failed to serialize progress frame");
                return BroadcastReport::default();
            }
        };

        let targets: Vec<(Uuid, mpsc::Sender<Arc<str>>)> = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(upload_id) {
                Some(list) => list.iter().map(|s| (s.id, s.tx.clone())).collect(),
                None => return BroadcastReport::default(),
            }
        };

        let mut report = BroadcastReport::default();
        for (subscriber_id, tx) in targets {
            match tx.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    report.dropped += 1;
                    tracing::warn!(
                        upload_id = %upload_id,
                        subscriber_id = %subscriber_id,
                        "Subscriber queue full, dropping frame"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    report.pruned += 1;
                    let hub = self.clone();
                    let upload_id = upload_id.to_string();
                    tokio::spawn(async move {
                        hub.unsubscribe(&upload_id, subscriber_id).await;
                    });
                }
            }
        }

        report
    }

    pub async fn subscriber_count(&self, upload_id: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(upload_id)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn wait_for_count(hub: &ProgressHub, upload_id: &str, expected: usize) {
        for _ in 0..100 {
            if hub.subscriber_count(upload_id).await == expected {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("subscriber count never reached {expected}");
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_exactly_one_frame() {
        let hub = ProgressHub::new(8);
        let mut a = hub.subscribe("up-1").await;
        let mut b = hub.subscribe("up-1").await;
        let mut c = hub.subscribe("up-1").await;
        let mut other = hub.subscribe("up-2").await;

        let report = hub.broadcast("up-1", &json!({"type": "progress"})).await;
        assert_eq!(report.delivered, 3);

        for sub in [&mut a, &mut b, &mut c] {
            let frame = sub.receiver.recv().await.unwrap();
            assert_eq!(&*frame, r#"{"type":"progress"}"#);
            assert!(sub.receiver.try_recv().is_err());
        }
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_connection_receives_nothing() {
        let hub = ProgressHub::new(8);
        let mut kept = hub.subscribe("up-1").await;
        let mut gone = hub.subscribe("up-1").await;

        hub.unsubscribe("up-1", gone.id).await;
        let report = hub.broadcast("up-1", &json!({"n": 1})).await;

        assert_eq!(report.delivered, 1);
        assert!(kept.receiver.recv().await.is_some());
        assert!(gone.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_last_unsubscribe_removes_entry() {
        let hub = ProgressHub::new(8);
        let sub = hub.subscribe("up-1").await;
        hub.unsubscribe("up-1", sub.id).await;

        assert_eq!(hub.subscriber_count("up-1").await, 0);
        assert!(hub.subscribers.read().await.get("up-1").is_none());
    }

    #[tokio::test]
    async fn test_closed_connection_alone_is_pruned() {
        let hub = ProgressHub::new(8);
        let mut healthy = hub.subscribe("up-1").await;
        let closed = hub.subscribe("up-1").await;
        drop(closed.receiver);

        let report = hub.broadcast("up-1", &json!({"n": 1})).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);

        wait_for_count(&hub, "up-1", 1).await;
        assert!(healthy.receiver.recv().await.is_some());

        let report = hub.broadcast("up-1", &json!({"n": 2})).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops_frame_for_slow_subscriber_only() {
        let hub = ProgressHub::new(1);
        let mut slow = hub.subscribe("up-1").await;
        let mut fast = hub.subscribe("up-1").await;

        hub.broadcast("up-1", &json!({"n": 1})).await;
        assert!(fast.receiver.recv().await.is_some());

        let report = hub.broadcast("up-1", &json!({"n": 2})).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);

        assert_eq!(&*slow.receiver.recv().await.unwrap(), r#"{"n":1}"#);
        assert_eq!(&*fast.receiver.recv().await.unwrap(), r#"{"n":2}"#);
        assert_eq!(hub.subscriber_count("up-1").await, 2);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let hub = ProgressHub::new(8);
        let report = hub.broadcast("nobody", &json!({})).await;
        assert_eq!(report, BroadcastReport::default());
    }
}
