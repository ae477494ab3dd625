mod feed_loop;
mod interval;

use crate::core::errors::{FetchError, SubscribeError};
use crate::core::store::{FeedSnapshot, FeedStore};
use crate::fetchers::FetcherRegistry;
use feed_loop::{FeedLoop, LoopCommand, Subscriber};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

pub use interval::{AdaptiveInterval, FixedInterval, IntervalStrategy};

/// Shared polling scheduler: multiplexes any number of subscribers per feed
/// key onto a single timer-driven fetch loop for that key.
///
/// An explicit owned object rather than process-global state; clones share
/// one registry, independent instances (as in tests) share nothing. Must be
/// used from within a tokio runtime — `subscribe` spawns the feed loops.
#[derive(Clone)]
pub struct PollScheduler {
    shared: Arc<SchedulerShared>,
}

struct SchedulerShared {
    fetchers: FetcherRegistry,
    store: FeedStore,
    strategy: Arc<dyn IntervalStrategy>,
    loops: Mutex<HashMap<String, FeedHandle>>,
    next_id: AtomicU64,
}

struct FeedHandle {
    feed_type: String,
    cmd_tx: mpsc::UnboundedSender<LoopCommand>,
    subscriber_ids: HashSet<u64>,
}

impl PollScheduler {
    pub fn new(fetchers: FetcherRegistry) -> Self {
        Self::with_strategy(fetchers, Arc::new(FixedInterval))
    }

    pub fn with_strategy(fetchers: FetcherRegistry, strategy: Arc<dyn IntervalStrategy>) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                fetchers,
                store: FeedStore::new(),
                strategy,
                loops: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers interest in `feed_key`. The first subscriber for a key
    /// creates its feed loop and triggers an immediate fetch; later
    /// subscribers attach to the existing loop without an extra fetch, and
    /// the loop's cadence becomes the minimum of all subscriber intervals.
    ///
    /// Every successful fetch is delivered to `on_data` as shared JSON; every
    /// failed fetch to `on_error` (pass `|_| {}` to ignore errors). Callbacks
    /// run on the feed loop's task and should not block.
    ///
    /// The returned [`Subscription`] detaches on `unsubscribe()` or drop;
    /// when the last subscriber for a key goes away the loop is torn down.
    pub fn subscribe(
        &self,
        feed_key: impl Into<String>,
        feed_type: impl Into<String>,
        interval: Duration,
        on_data: impl Fn(Arc<Value>) + Send + Sync + 'static,
        on_error: impl Fn(Arc<FetchError>) + Send + Sync + 'static,
    ) -> Result<Subscription, SubscribeError> {
        let feed_key = feed_key.into();
        let feed_type = feed_type.into();

        if feed_key.is_empty() {
            return Err(SubscribeError::EmptyFeedKey);
        }
        if feed_type.is_empty() {
            return Err(SubscribeError::EmptyFeedType);
        }
        if interval.is_zero() {
            return Err(SubscribeError::ZeroInterval);
        }
        let Some(fetcher) = self.shared.fetchers.get(&feed_type) else {
            return Err(SubscribeError::UnknownFeedType(feed_type));
        };

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Subscriber {
            id,
            interval,
            on_data: Arc::new(on_data),
            on_error: Arc::new(on_error),
        };

        let mut loops = self.shared.lock_loops();
        match loops.get_mut(&feed_key) {
            Some(handle) => {
                if handle.feed_type != feed_type {
                    return Err(SubscribeError::FeedTypeMismatch {
                        feed_key,
                        existing: handle.feed_type.clone(),
                        requested: feed_type,
                    });
                }
                handle.subscriber_ids.insert(id);
                if handle.cmd_tx.send(LoopCommand::Attach(subscriber)).is_err() {
                    tracing::error!(
                        feed_key = %feed_key,
                        "Feed loop command channel closed unexpectedly"
                    );
                }
            }
            None => {
                let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                let feed_loop = FeedLoop::new(
                    feed_key.clone(),
                    feed_type.clone(),
                    fetcher,
                    self.shared.store.clone(),
                    Arc::clone(&self.shared.strategy),
                    subscriber,
                    cmd_rx,
                );
                tokio::spawn(feed_loop.run());

                loops.insert(
                    feed_key.clone(),
                    FeedHandle {
                        feed_type,
                        cmd_tx,
                        subscriber_ids: HashSet::from([id]),
                    },
                );
            }
        }
        drop(loops);

        Ok(Subscription {
            shared: Arc::downgrade(&self.shared),
            feed_key,
            id,
            active: AtomicBool::new(true),
        })
    }

    /// Forces an out-of-band fetch for `feed_key`. Coalesces with an
    /// in-flight request; the next scheduled tick is measured from the
    /// manual fetch's completion. No-op for keys without active subscribers.
    pub fn trigger_manual_refresh(&self, feed_key: &str) {
        let loops = self.shared.lock_loops();
        match loops.get(feed_key) {
            Some(handle) => {
                let _ = handle.cmd_tx.send(LoopCommand::ManualRefresh);
            }
            None => {
                tracing::debug!(feed_key, "Manual refresh ignored: no active subscribers");
            }
        }
    }

    /// Latest successful payload for `feed_key`, surviving fetch failures
    /// until the loop is torn down.
    pub async fn last_result(&self, feed_key: &str) -> Option<Arc<Value>> {
        self.shared.store.last_result(feed_key).await
    }

    pub async fn feed_snapshot(&self, feed_key: &str) -> Option<FeedSnapshot> {
        self.shared.store.snapshot(feed_key).await
    }

    pub fn subscriber_count(&self, feed_key: &str) -> usize {
        self.shared
            .lock_loops()
            .get(feed_key)
            .map(|h| h.subscriber_ids.len())
            .unwrap_or(0)
    }

    pub fn active_feeds(&self) -> Vec<String> {
        self.shared.lock_loops().keys().cloned().collect()
    }
}

impl SchedulerShared {
    fn lock_loops(&self) -> MutexGuard<'_, HashMap<String, FeedHandle>> {
        self.loops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn detach(&self, feed_key: &str, id: u64) {
        let mut loops = self.lock_loops();
        let Some(handle) = loops.get_mut(feed_key) else {
            return;
        };
        if !handle.subscriber_ids.remove(&id) {
            return;
        }

        if handle.subscriber_ids.is_empty() {
            // Last subscriber: drop the loop from the registry before
            // returning so no new fetch can be scheduled for this key. The
            // loop drains its queue, sees Shutdown, and exits; a request
            // already on the wire completes and is discarded.
            if let Some(handle) = loops.remove(feed_key) {
                let _ = handle.cmd_tx.send(LoopCommand::Shutdown);
            }
            tracing::debug!(feed_key, "Last subscriber gone, tearing down feed loop");
        } else {
            let _ = handle.cmd_tx.send(LoopCommand::Detach(id));
        }
    }
}

/// One consumer's registration of interest in a feed.
///
/// `unsubscribe()` is idempotent; dropping the guard unsubscribes too, so a
/// component can simply hold it for its own lifetime.
#[derive(Debug)]
pub struct Subscription {
    shared: Weak<SchedulerShared>,
    feed_key: String,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    pub fn feed_key(&self) -> &str {
        &self.feed_key
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.detach(&self.feed_key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
