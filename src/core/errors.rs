use thiserror::Error;

/// Validation and registration failures surfaced by `PollScheduler::subscribe`.
///
/// These are programmer/configuration errors and fail fast at the call site;
/// nothing here is retried.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("feed key must be a non-empty string")]
    EmptyFeedKey,

    #[error("feed type must be a non-empty string")]
    EmptyFeedType,

    #[error("poll interval must be greater than zero")]
    ZeroInterval,

    #[error("no fetcher registered for feed type `{0}`")]
    UnknownFeedType(String),

    #[error("feed `{feed_key}` is already polling as type `{existing}`, cannot attach as `{requested}`")]
    FeedTypeMismatch {
        feed_key: String,
        existing: String,
        requested: String,
    },
}

/// A failed fetch tick, as delivered to subscriber error callbacks.
///
/// The underlying fetcher error is kept opaque; the scheduler only adds the
/// feed identity so a shared error handler can tell feeds apart.
#[derive(Debug, Error)]
#[error("fetch failed for feed `{feed_key}` (type `{feed_type}`): {source}")]
pub struct FetchError {
    pub feed_key: String,
    pub feed_type: String,
    #[source]
    pub source: anyhow::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_error_display() {
        let err = SubscribeError::UnknownFeedType("recent-posts".to_string());
        assert_eq!(
            err.to_string(),
            "no fetcher registered for feed type `recent-posts`"
        );

        let err = SubscribeError::FeedTypeMismatch {
            feed_key: "jobs".to_string(),
            existing: "jobs".to_string(),
            requested: "dashboard-stats".to_string(),
        };
        assert!(err.to_string().contains("already polling as type `jobs`"));
    }

    #[test]
    fn test_fetch_error_carries_feed_identity() {
        let err = FetchError {
            feed_key: "cost-data-global".to_string(),
            feed_type: "detailed-costs".to_string(),
            source: anyhow::anyhow!("connection refused"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cost-data-global"));
        assert!(msg.contains("detailed-costs"));
        assert!(msg.contains("connection refused"));
    }
}
