//! Keyed query cache with request deduplication.
//!
//! Each [`QueryKey`] owns one entry holding the last settled value or error,
//! the freshness timestamp, and at most one in-flight request. Consumers read
//! snapshots ([`QueryState`]) and may subscribe to a key to be notified on
//! every transition.
//!
//! Per-key lifecycle: `Pending -> Success | Failure`, a stale `Success` goes
//! back to `Pending` on the next observation, and `Failure -> Pending` only on
//! an explicit refetch or invalidation.
//!
//! Only the most recently started request for a key may write its outcome.
//! Each request is tagged with the entry's generation when it starts; results
//! arriving for an older generation are dropped.

use crate::api::FetchError;
use crate::query::key::QueryKey;
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Produces a fresh request each time it is called. Called again for retries.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, FetchError>> + Send + Sync>;

/// Wraps an async closure as a [`Fetcher`].
pub fn fetcher<V, F, Fut>(f: F) -> Fetcher<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Settled outcome of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// No outcome yet, or a new request has started.
    Pending,
    Success,
    Failure,
}

/// Cache-wide behaviour.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// How long a successful value is served without a refresh.
    pub stale_time: Duration,
    /// Automatic retries after the first attempt, for transient failures only.
    pub retry: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(5 * 60),
            retry: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

impl QueryOptions {
    /// Exponential back-off before retry number `attempt + 1`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base_delay
            .saturating_mul(factor)
            .min(self.retry_max_delay)
    }
}

/// Read-only snapshot of one key.
#[derive(Debug)]
pub struct QueryState<V> {
    pub status: FetchStatus,
    /// Last successful value. Always `None` once a failure is recorded.
    pub data: Option<Arc<V>>,
    pub error: Option<FetchError>,
    /// A request for this key is in flight.
    pub is_fetching: bool,
    /// The value is past its freshness window or was invalidated.
    pub is_stale: bool,
    /// Failed attempts of the current or last request.
    pub failure_count: u32,
}

impl<V> Clone for QueryState<V> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            failure_count: self.failure_count,
        }
    }
}

impl<V> QueryState<V> {
    fn idle() -> Self {
        Self {
            status: FetchStatus::Pending,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: true,
            failure_count: 0,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == FetchStatus::Failure
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }
}

struct Entry<V> {
    status: FetchStatus,
    data: Option<Arc<V>>,
    error: Option<FetchError>,
    updated_at: Option<Instant>,
    invalidated: bool,
    generation: u64,
    failure_count: u32,
    in_flight: Option<JoinHandle<()>>,
    tx: watch::Sender<QueryState<V>>,
}

impl<V> Entry<V> {
    fn new() -> Self {
        let (tx, _) = watch::channel(QueryState::idle());
        Self {
            status: FetchStatus::Pending,
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            generation: 0,
            failure_count: 0,
            in_flight: None,
            tx,
        }
    }

    fn is_stale(&self, now: Instant, stale_time: Duration) -> bool {
        self.invalidated
            || match self.updated_at {
                Some(at) => now.saturating_duration_since(at) >= stale_time,
                None => true,
            }
    }

    fn needs_fetch(&self, now: Instant, stale_time: Duration) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        match self.status {
            FetchStatus::Pending => true,
            FetchStatus::Success => self.is_stale(now, stale_time),
            FetchStatus::Failure => self.invalidated,
        }
    }

    fn snapshot(&self, now: Instant, stale_time: Duration) -> QueryState<V> {
        QueryState {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.in_flight.is_some(),
            is_stale: self.is_stale(now, stale_time),
            failure_count: self.failure_count,
        }
    }

    fn publish(&self, now: Instant, stale_time: Duration) {
        self.tx.send_replace(self.snapshot(now, stale_time));
    }
}

struct Inner<V> {
    entries: HashMap<QueryKey, Entry<V>>,
}

/// Process-wide cache of query results for one value type.
///
/// Cloning yields another handle to the same cache.
pub struct QueryCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    options: QueryOptions,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            options: self.options.clone(),
        }
    }
}

impl<V: Send + Sync + 'static> QueryCache<V> {
    pub fn new(options: QueryOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
            })),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // A panic while holding the lock can't leave an entry half-written.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the current snapshot for `key`, starting a request when the key
    /// is new or stale and none is already in flight.
    ///
    /// Observers of the same key share the in-flight request. Must be called
    /// from within a tokio runtime.
    pub fn get_or_fetch(&self, key: &QueryKey, fetch: Fetcher<V>) -> QueryState<V> {
        let now = Instant::now();
        let stale_time = self.options.stale_time;
        let mut inner = self.lock();
        let entry = inner.entries.entry(key.clone()).or_insert_with(Entry::new);

        if entry.needs_fetch(now, stale_time) {
            self.start(entry, key, fetch, now);
        } else if entry.in_flight.is_some() {
            debug!(key = key.kind(), "Joining in-flight request");
        }
        entry.snapshot(now, stale_time)
    }

    /// Starts a new request for `key` regardless of freshness.
    ///
    /// Any request already in flight for the key is aborted, so at most one
    /// request per key is ever outstanding. Should an aborted request still
    /// complete, its result is ignored.
    pub fn refetch(&self, key: &QueryKey, fetch: Fetcher<V>) -> QueryState<V> {
        let now = Instant::now();
        let mut inner = self.lock();
        let entry = inner.entries.entry(key.clone()).or_insert_with(Entry::new);
        self.start(entry, key, fetch, now);
        entry.snapshot(now, self.options.stale_time)
    }

    /// Snapshot without triggering any request.
    pub fn peek(&self, key: &QueryKey) -> Option<QueryState<V>> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .map(|entry| entry.snapshot(now, self.options.stale_time))
    }

    /// Registers interest in `key`. The receiver sees a new snapshot on every
    /// transition; `is_stale` reflects the moment of the transition.
    pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<QueryState<V>> {
        let now = Instant::now();
        let mut inner = self.lock();
        let entry = inner.entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.publish(now, self.options.stale_time);
        entry.tx.subscribe()
    }

    /// Marks `key` stale so the next observation refetches it, even after a failure.
    pub fn invalidate(&self, key: &QueryKey) {
        let now = Instant::now();
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.invalidated = true;
            entry.publish(now, self.options.stale_time);
            debug!(key = key.kind(), "Invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        for entry in inner.entries.values_mut() {
            entry.invalidated = true;
            entry.publish(now, self.options.stale_time);
        }
    }

    /// Aborts in-flight requests and drops every entry.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        let count = inner.entries.len();
        for (_, entry) in inner.entries.drain() {
            if let Some(task) = entry.in_flight {
                task.abort();
            }
        }
        debug!(entries = count, "Query cache disposed");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    fn start(&self, entry: &mut Entry<V>, key: &QueryKey, fetch: Fetcher<V>, now: Instant) {
        entry.generation += 1;
        entry.status = FetchStatus::Pending;
        entry.error = None;
        entry.failure_count = 0;
        entry.invalidated = false;

        let generation = entry.generation;
        info!(key = key.kind(), generation, "Starting request");

        let task = tokio::spawn(run_request(
            Arc::clone(&self.inner),
            self.options.clone(),
            key.clone(),
            generation,
            fetch,
        ));
        if let Some(superseded) = entry.in_flight.replace(task) {
            debug!(key = key.kind(), generation, "Aborting superseded request");
            superseded.abort();
        }
        entry.publish(now, self.options.stale_time);
    }
}

async fn run_request<V>(
    inner: Arc<Mutex<Inner<V>>>,
    options: QueryOptions,
    key: QueryKey,
    generation: u64,
    fetch: Fetcher<V>,
) {
    let mut attempt = 0;
    let outcome = loop {
        match fetch().await {
            Ok(value) => break Ok(value),
            Err(err) if err.is_transient() && attempt < options.retry => {
                let delay = options.retry_delay(attempt);
                attempt += 1;
                warn!(
                    key = key.kind(),
                    generation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Request failed, retrying"
                );
                record_attempt(&inner, &options, &key, generation, attempt);
                tokio::time::sleep(delay).await;
            }
            Err(err) => break Err(err),
        }
    };

    let now = Instant::now();
    let mut guard = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let Some(entry) = guard.entries.get_mut(&key) else {
        return;
    };
    if entry.generation != generation {
        debug!(
            key = key.kind(),
            generation,
            current = entry.generation,
            "Discarding superseded response"
        );
        return;
    }

    entry.in_flight = None;
    entry.updated_at = Some(now);
    match outcome {
        Ok(value) => {
            info!(key = key.kind(), generation, "Request succeeded");
            entry.status = FetchStatus::Success;
            entry.data = Some(Arc::new(value));
            entry.error = None;
            entry.failure_count = 0;
        }
        Err(err) => {
            warn!(key = key.kind(), generation, error = %err, "Request failed");
            entry.status = FetchStatus::Failure;
            entry.data = None;
            entry.error = Some(err);
            entry.failure_count = attempt + 1;
        }
    }
    entry.publish(now, options.stale_time);
}

fn record_attempt<V>(
    inner: &Mutex<Inner<V>>,
    options: &QueryOptions,
    key: &QueryKey,
    generation: u64,
    failures: u32,
) {
    let mut guard = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(entry) = guard.entries.get_mut(key) {
        if entry.generation == generation {
            entry.failure_count = failures;
            entry.publish(Instant::now(), options.stale_time);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A fetcher replaying scripted `(latency, outcome)` steps; the last step repeats.
    pub struct Script<V> {
        steps: Mutex<VecDeque<(Duration, Result<V, FetchError>)>>,
        pub calls: AtomicUsize,
        outstanding: Arc<AtomicUsize>,
    }

    /// Counts a request as outstanding until it finishes or is aborted.
    struct Outstanding(Arc<AtomicUsize>);

    impl Outstanding {
        fn enter(count: &Arc<AtomicUsize>) -> Self {
            count.fetch_add(1, Ordering::SeqCst);
            Self(Arc::clone(count))
        }
    }

    impl Drop for Outstanding {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl<V: Clone + Send + Sync + 'static> Script<V> {
        pub fn new(steps: Vec<(u64, Result<V, FetchError>)>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(
                    steps
                        .into_iter()
                        .map(|(ms, outcome)| (Duration::from_millis(ms), outcome))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                outstanding: Arc::new(AtomicUsize::new(0)),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Requests started and neither finished nor aborted.
        pub fn outstanding(&self) -> usize {
            self.outstanding.load(Ordering::SeqCst)
        }

        pub fn fetcher(self: &Arc<Self>) -> Fetcher<V> {
            let script = Arc::clone(self);
            fetcher(move || {
                let script = Arc::clone(&script);
                async move {
                    script.calls.fetch_add(1, Ordering::SeqCst);
                    let _outstanding = Outstanding::enter(&script.outstanding);
                    let (latency, outcome) = {
                        let mut steps = script.steps.lock().unwrap();
                        if steps.len() > 1 {
                            steps.pop_front().unwrap()
                        } else {
                            steps.front().cloned().unwrap()
                        }
                    };
                    tokio::time::sleep(latency).await;
                    outcome
                }
            })
        }
    }
}
