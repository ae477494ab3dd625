mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub use http::HttpFetcher;

/// The single I/O seam of the scheduler: one fetch per call, decoded payload
/// out. Implementations own their transport details (auth, base URL,
/// timeouts); the scheduler treats both payload and errors opaquely.
///
/// A fetch that never resolves blocks its feed loop forever, so request
/// timeouts belong inside the fetcher, not the scheduler.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    fn feed_type(&self) -> &str;
    async fn fetch(&self) -> Result<Value>;
}

/// Maps a feed type to the fetcher that produces its data.
#[derive(Default)]
pub struct FetcherRegistry {
    fetchers: HashMap<String, Arc<dyn FeedFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self {
            fetchers: HashMap::new(),
        }
    }

    /// Registers a fetcher under its declared feed type, replacing any
    /// previous fetcher for that type.
    pub fn register(&mut self, fetcher: Arc<dyn FeedFetcher>) {
        self.fetchers
            .insert(fetcher.feed_type().to_string(), fetcher);
    }

    pub fn get(&self, feed_type: &str) -> Option<Arc<dyn FeedFetcher>> {
        self.fetchers.get(feed_type).cloned()
    }

    pub fn contains(&self, feed_type: &str) -> bool {
        self.fetchers.contains_key(feed_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.fetchers.keys().cloned().collect()
    }

    pub async fn fetch(&self, feed_type: &str) -> Result<Value> {
        self.get(feed_type)
            .ok_or_else(|| anyhow::anyhow!("No fetcher registered for feed type `{feed_type}`"))?
            .fetch()
            .await
    }
}
