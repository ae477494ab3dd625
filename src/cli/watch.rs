use crate::cli::{build_fetchers, load_settings};
use crate::scheduler::PollScheduler;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Subscribes every configured feed and logs deliveries until Ctrl-C.
pub async fn run(config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let registry = build_fetchers(&settings)?;
    let scheduler = PollScheduler::new(registry);

    let mut subscriptions = Vec::with_capacity(settings.feeds.len());
    for feed in &settings.feeds {
        let key = feed.key.clone();
        let err_key = feed.key.clone();

        let subscription = scheduler.subscribe(
            &feed.key,
            &feed.feed_type,
            Duration::from_millis(feed.interval_ms),
            move |data| {
                tracing::info!(
                    feed_key = %key,
                    bytes = data.to_string().len(),
                    "Feed updated"
                );
            },
            move |err| {
                tracing::warn!(feed_key = %err_key, error = %err, "Feed fetch failed");
            },
        )?;

        tracing::info!(
            feed_key = %feed.key,
            feed_type = %feed.feed_type,
            interval_ms = feed.interval_ms,
            "Watching feed"
        );
        subscriptions.push(subscription);
    }

    if subscriptions.is_empty() {
        anyhow::bail!("No feeds configured. Add [[feeds]] entries to the config file.");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down, unsubscribing {} feeds", subscriptions.len());
    for subscription in &subscriptions {
        subscription.unsubscribe();
    }

    Ok(())
}
