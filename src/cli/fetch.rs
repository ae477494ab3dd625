use crate::cli::{build_fetchers, load_settings};
use anyhow::{Context, Result};
use std::path::Path;

/// One-shot fetch of a feed type, bypassing the scheduler; prints the JSON
/// payload to stdout.
pub async fn run(feed_type: &str, pretty: bool, config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let registry = build_fetchers(&settings)?;

    if !registry.contains(feed_type) {
        let mut known = registry.registered_types();
        known.sort();
        anyhow::bail!(
            "Unknown feed type `{}`. Configured types: {}",
            feed_type,
            known.join(", ")
        );
    }

    let value = registry.fetch(feed_type).await?;

    let output = if pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    }
    .context("Failed to serialize payload")?;

    println!("{output}");
    Ok(())
}
