pub mod fetch;
pub mod watch;

use crate::core::settings::Settings;
use crate::fetchers::{FetcherRegistry, HttpFetcher};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builds the fetcher registry the CLI commands share, one HTTP fetcher per
/// configured feed type.
pub fn build_fetchers(settings: &Settings) -> Result<FetcherRegistry> {
    let token = match &settings.api.token_env {
        Some(var) => std::env::var(var).ok(),
        None => None,
    };
    if token.is_none() {
        tracing::debug!("No API token in environment, requests will be unauthenticated");
    }

    let client =
        HttpFetcher::build_client(Duration::from_secs(settings.api.request_timeout_secs))?;

    let mut registry = FetcherRegistry::new();
    for (feed_type, path) in &settings.fetchers {
        registry.register(Arc::new(HttpFetcher::new(
            client.clone(),
            feed_type.clone(),
            &settings.api.base_url,
            path,
            token.clone(),
        )));
    }
    Ok(registry)
}

pub fn load_settings(config: Option<&std::path::Path>) -> Result<Settings> {
    let settings = match config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}
