use crate::fetchers::FeedFetcher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Fetches one dashboard endpoint as JSON over authenticated HTTP.
///
/// One instance per feed type; the reqwest client is shared by the caller so
/// all fetchers reuse the same connection pool.
pub struct HttpFetcher {
    feed_type: String,
    url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(
        client: reqwest::Client,
        feed_type: impl Into<String>,
        base_url: &str,
        path: &str,
        bearer_token: Option<String>,
    ) -> Self {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Self {
            feed_type: feed_type.into(),
            url,
            bearer_token,
            client,
        }
    }

    /// Client with the request timeout applied at the fetcher boundary, so a
    /// stalled backend cannot wedge a feed loop.
    pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    fn feed_type(&self) -> &str {
        &self.feed_type
    }

    async fn fetch(&self) -> Result<Value> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            anyhow::bail!("API error for `{}`: {} - {}", self.feed_type, status, snippet);
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Failed to decode JSON from {}", self.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let client = reqwest::Client::new();
        let fetcher = HttpFetcher::new(
            client.clone(),
            "jobs",
            "https://ops.example.com/api/",
            "/jobs",
            None,
        );
        assert_eq!(fetcher.url(), "https://ops.example.com/api/jobs");

        let fetcher = HttpFetcher::new(
            client,
            "dashboard-stats",
            "https://ops.example.com/api",
            "stats/dashboard",
            Some("secret".to_string()),
        );
        assert_eq!(fetcher.url(), "https://ops.example.com/api/stats/dashboard");
        assert_eq!(fetcher.feed_type(), "dashboard-stats");
    }
}
