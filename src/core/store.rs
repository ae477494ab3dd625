use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Last known state of one feed, as seen by readers outside the poll loop.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub last_result: Option<Arc<Value>>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
}

#[derive(Default)]
struct StoreInner {
    feeds: HashMap<String, FeedSnapshot>,
}

/// Shared read view over every active feed loop's latest state.
///
/// Each feed's entry is written only by its owning loop; a failed fetch
/// records the error but never evicts `last_result`, so consumers keep
/// showing stale data through a backend outage instead of flashing empty.
#[derive(Clone, Default)]
pub struct FeedStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
        }
    }

    pub async fn snapshot(&self, feed_key: &str) -> Option<FeedSnapshot> {
        self.inner.read().await.feeds.get(feed_key).cloned()
    }

    pub async fn last_result(&self, feed_key: &str) -> Option<Arc<Value>> {
        self.inner
            .read()
            .await
            .feeds
            .get(feed_key)
            .and_then(|s| s.last_result.clone())
    }

    pub async fn record_success(&self, feed_key: &str, result: Arc<Value>) {
        let mut inner = self.inner.write().await;
        let entry = inner.feeds.entry(feed_key.to_string()).or_default();
        entry.last_result = Some(result);
        entry.last_fetch_at = Some(Utc::now());
        entry.last_error = None;
        entry.consecutive_errors = 0;
    }

    pub async fn record_failure(&self, feed_key: &str, error: String) {
        let mut inner = self.inner.write().await;
        let entry = inner.feeds.entry(feed_key.to_string()).or_default();
        entry.last_error = Some(error);
        entry.consecutive_errors = entry.consecutive_errors.saturating_add(1);
    }

    pub async fn remove(&self, feed_key: &str) {
        self.inner.write().await.feeds.remove(feed_key);
    }

    pub async fn active_feed_keys(&self) -> Vec<String> {
        self.inner.read().await.feeds.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_store_record_and_read() {
        let store = FeedStore::new();
        store
            .record_success("jobs", Arc::new(json!({"count": 3})))
            .await;

        let snapshot = store.snapshot("jobs").await.unwrap();
        assert_eq!(snapshot.last_result.unwrap()["count"], 3);
        assert!(snapshot.last_fetch_at.is_some());
        assert!(snapshot.last_error.is_none());
        assert_eq!(snapshot.consecutive_errors, 0);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_result() {
        let store = FeedStore::new();
        store
            .record_success("jobs", Arc::new(json!({"count": 3})))
            .await;
        store.record_failure("jobs", "503 upstream busy".to_string()).await;
        store.record_failure("jobs", "503 upstream busy".to_string()).await;

        let snapshot = store.snapshot("jobs").await.unwrap();
        assert_eq!(snapshot.last_result.unwrap()["count"], 3);
        assert_eq!(snapshot.last_error.as_deref(), Some("503 upstream busy"));
        assert_eq!(snapshot.consecutive_errors, 2);
    }

    #[tokio::test]
    async fn test_success_resets_error_count() {
        let store = FeedStore::new();
        store.record_failure("jobs", "timeout".to_string()).await;
        store
            .record_success("jobs", Arc::new(json!({"count": 1})))
            .await;

        let snapshot = store.snapshot("jobs").await.unwrap();
        assert_eq!(snapshot.consecutive_errors, 0);
        assert!(snapshot.last_error.is_none());
    }

    #[tokio::test]
    async fn test_remove_discards_state() {
        let store = FeedStore::new();
        store
            .record_success("jobs", Arc::new(json!({"count": 3})))
            .await;
        store.remove("jobs").await;

        assert!(store.snapshot("jobs").await.is_none());
        assert!(store.last_result("jobs").await.is_none());
        assert!(store.active_feed_keys().await.is_empty());
    }
}
