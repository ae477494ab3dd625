use crate::core::errors::FetchError;
use crate::core::store::FeedStore;
use crate::fetchers::FeedFetcher;
use crate::scheduler::interval::IntervalStrategy;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub(crate) type DataCallback = Arc<dyn Fn(Arc<Value>) + Send + Sync>;
pub(crate) type ErrorCallback = Arc<dyn Fn(Arc<FetchError>) + Send + Sync>;

/// One consumer's registration, as held by the owning feed loop.
pub(crate) struct Subscriber {
    pub id: u64,
    pub interval: Duration,
    pub on_data: DataCallback,
    pub on_error: ErrorCallback,
}

pub(crate) enum LoopCommand {
    Attach(Subscriber),
    Detach(u64),
    ManualRefresh,
    Shutdown,
}

/// Per-feed polling actor. Owns all mutable state for one feed key, so the
/// sequential-tick invariant holds without any per-field locking: commands,
/// fetch completions and the timer are serialized through one `select!`.
pub(crate) struct FeedLoop {
    feed_key: String,
    feed_type: String,
    fetcher: Arc<dyn FeedFetcher>,
    store: FeedStore,
    strategy: Arc<dyn IntervalStrategy>,
    subscribers: Vec<Subscriber>,
    cmd_rx: mpsc::UnboundedReceiver<LoopCommand>,
    done_tx: mpsc::Sender<anyhow::Result<Value>>,
    done_rx: mpsc::Receiver<anyhow::Result<Value>>,
    /// Ids of the subscribers present when the in-flight fetch began.
    /// `None` while idle; doubles as the re-entrancy guard.
    in_flight: Option<HashSet<u64>>,
    last_result: Option<Arc<Value>>,
    consecutive_errors: u32,
    current_interval: Duration,
    next_deadline: Instant,
}

impl FeedLoop {
    pub(crate) fn new(
        feed_key: String,
        feed_type: String,
        fetcher: Arc<dyn FeedFetcher>,
        store: FeedStore,
        strategy: Arc<dyn IntervalStrategy>,
        first: Subscriber,
        cmd_rx: mpsc::UnboundedReceiver<LoopCommand>,
    ) -> Self {
        // Capacity 1 is enough: the in-flight guard means at most one
        // outstanding fetch result at any time.
        let (done_tx, done_rx) = mpsc::channel(1);
        let interval = first.interval;
        Self {
            feed_key,
            feed_type,
            fetcher,
            store,
            strategy,
            subscribers: vec![first],
            cmd_rx,
            done_tx,
            done_rx,
            in_flight: None,
            last_result: None,
            consecutive_errors: 0,
            current_interval: interval,
            next_deadline: Instant::now() + interval,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::debug!(
            feed_key = %self.feed_key,
            feed_type = %self.feed_type,
            interval_ms = self.current_interval.as_millis() as u64,
            "Feed loop started"
        );

        // First subscriber does not wait for the first timer tick.
        self.begin_fetch();

        loop {
            tokio::select! {
                // Commands first: a queued Shutdown must win over an expired
                // timer, otherwise an orphaned fetch could start after the
                // last unsubscribe.
                biased;

                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        None | Some(LoopCommand::Shutdown) => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }

                Some(outcome) = self.done_rx.recv() => {
                    self.finish_fetch(outcome).await;
                }

                _ = tokio::time::sleep_until(self.next_deadline), if self.in_flight.is_none() => {
                    self.begin_fetch();
                }
            }
        }

        self.store.remove(&self.feed_key).await;
        tracing::debug!(feed_key = %self.feed_key, "Feed loop stopped");
    }

    fn handle_command(&mut self, cmd: LoopCommand) {
        match cmd {
            LoopCommand::Attach(subscriber) => {
                tracing::debug!(
                    feed_key = %self.feed_key,
                    subscriber = subscriber.id,
                    interval_ms = subscriber.interval.as_millis() as u64,
                    "Subscriber attached"
                );
                self.subscribers.push(subscriber);

                // Minimum-wins merge. Only a shrink reschedules the pending
                // tick, and never to earlier than one fresh interval from
                // now, so a recent fetch is not immediately repeated.
                let effective = self.effective_interval();
                if effective < self.current_interval {
                    self.current_interval = effective;
                    if self.in_flight.is_none() {
                        let candidate = Instant::now() + effective;
                        if candidate < self.next_deadline {
                            self.next_deadline = candidate;
                        }
                    }
                }
            }
            LoopCommand::Detach(id) => {
                self.subscribers.retain(|s| s.id != id);
                tracing::debug!(
                    feed_key = %self.feed_key,
                    subscriber = id,
                    remaining = self.subscribers.len(),
                    "Subscriber detached"
                );
                // A grown effective interval takes effect after the next
                // completion; the pending tick stays where it is.
            }
            LoopCommand::ManualRefresh => {
                if self.in_flight.is_some() {
                    tracing::debug!(
                        feed_key = %self.feed_key,
                        "Manual refresh coalesced into in-flight fetch"
                    );
                } else {
                    tracing::debug!(feed_key = %self.feed_key, "Manual refresh");
                    self.begin_fetch();
                }
            }
            LoopCommand::Shutdown => unreachable!("Shutdown is handled by the run loop"),
        }
    }

    fn begin_fetch(&mut self) {
        let cohort = self.subscribers.iter().map(|s| s.id).collect();
        self.in_flight = Some(cohort);

        let fetcher = Arc::clone(&self.fetcher);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = fetcher.fetch().await;
            // A closed receiver means the loop was torn down while this
            // request was on the wire; the result is simply discarded.
            let _ = done_tx.send(outcome).await;
        });
    }

    async fn finish_fetch(&mut self, outcome: anyhow::Result<Value>) {
        let cohort = self.in_flight.take().unwrap_or_default();

        match outcome {
            Ok(value) => {
                let value = Arc::new(value);
                self.last_result = Some(Arc::clone(&value));
                self.consecutive_errors = 0;
                self.store
                    .record_success(&self.feed_key, Arc::clone(&value))
                    .await;

                // Results go to subscribers present both when the fetch
                // started and now: late joiners wait for the next tick,
                // mid-fetch leavers are never called.
                for subscriber in self.subscribers.iter().filter(|s| cohort.contains(&s.id)) {
                    (subscriber.on_data)(Arc::clone(&value));
                }
            }
            Err(err) => {
                self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                self.store
                    .record_failure(&self.feed_key, err.to_string())
                    .await;
                tracing::warn!(
                    feed_key = %self.feed_key,
                    error = %err,
                    consecutive_errors = self.consecutive_errors,
                    "Fetch failed, keeping last result"
                );

                let err = Arc::new(FetchError {
                    feed_key: self.feed_key.clone(),
                    feed_type: self.feed_type.clone(),
                    source: err,
                });
                for subscriber in &self.subscribers {
                    (subscriber.on_error)(Arc::clone(&err));
                }
            }
        }

        // Cadence is measured from completion, so manual refreshes reset the
        // schedule and a slow fetch never causes a burst of catch-up ticks.
        let base = self.effective_interval();
        self.current_interval = self.strategy.next_interval(
            self.last_result.as_deref(),
            self.consecutive_errors,
            base,
            self.current_interval,
        );
        self.next_deadline = Instant::now() + self.current_interval;
    }

    fn effective_interval(&self) -> Duration {
        self.subscribers
            .iter()
            .map(|s| s.interval)
            .min()
            .unwrap_or(self.current_interval)
    }
}
