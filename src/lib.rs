//! Shared polling scheduler for dashboard-style data feeds.
//!
//! Many independent consumers subscribe to the same logical feed (a feed
//! key such as `"jobs"`), each with its own callback and desired cadence;
//! the scheduler runs at most one fetch loop per key, keeps at most one
//! request in flight per loop, fans results out to every subscriber, and
//! tears the loop down when the last subscriber leaves.

pub mod cli;
pub mod core;
pub mod fetchers;
pub mod scheduler;

pub use crate::core::errors::{FetchError, SubscribeError};
pub use crate::core::settings::Settings;
pub use crate::core::store::{FeedSnapshot, FeedStore};
pub use crate::fetchers::{FeedFetcher, FetcherRegistry, HttpFetcher};
pub use crate::scheduler::{
    AdaptiveInterval, FixedInterval, IntervalStrategy, PollScheduler, Subscription,
};
