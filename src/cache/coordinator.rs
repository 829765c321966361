//! Cache-first fetching with one network request per key at a time
//!
//! ```text
//! resolve A ─┐
//!            │   lookup miss            ┌──────────────┐
//! resolve B ─┼──► in-flight map ──────► │ fetch task   │──► decode ──► store
//!            │   (one entry per key)    └──────┬───────┘
//! resolve C ─┘                                 │
//!       ▲                                      │
//!       └──────────── broadcast result ◄───────┘
//! ```
//!
//! The first caller to miss for a key spawns the fetch task; later callers
//! subscribe to the same broadcast channel. The task owns the fetch, so a
//! caller that gives up does not cancel it for the others.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::codec::{Codec, JsonCodec};
use super::error::{FetchError, ResolveError};
use super::facade::DetailCache;
use super::key::{CacheKey, KeyError};

type Outcome<V> = Result<V, ResolveError>;
type InFlightMap<V> = HashMap<CacheKey, broadcast::Sender<Outcome<V>>>;

/// Source of raw detail bytes for a key, usually an HTTP API
pub trait DetailFetcher: Send + Sync {
    /// Fetches the encoded record for `key`
    ///
    /// The returned future must not borrow `self` so that it can outlive the
    /// caller that started it.
    fn fetch(&self, key: CacheKey) -> BoxFuture<'static, Result<Vec<u8>, FetchError>>;
}

/// Counters describing how effective coalescing has been
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Calls to resolve that got past key validation
    pub resolves: u64,
    /// Resolves answered straight from the cache
    pub cache_hits: u64,
    /// Resolves that joined a fetch already in flight
    pub coalesced: u64,
    /// Fetch tasks started
    pub fetches: u64,
    /// Fetch tasks that ended in an error
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    resolves: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Resolves detail records through a [`DetailCache`], de-duplicating fetches per key
pub struct FetchCoordinator<V, C = JsonCodec<V>> {
    cache: Arc<DetailCache<V, C>>,
    in_flight: Arc<Mutex<InFlightMap<V>>>,
    counters: Arc<Counters>,
}

/// Clears a key's in-flight entry when the fetch task ends, even by panic
///
/// The key is taken on completion. Once the entry is gone another caller may
/// register a new fetch for the same key, and that entry is not ours to remove.
struct InFlightGuard<V: Clone> {
    key: Option<CacheKey>,
    in_flight: Arc<Mutex<InFlightMap<V>>>,
}

impl<V: Clone> InFlightGuard<V> {
    fn new(key: CacheKey, in_flight: Arc<Mutex<InFlightMap<V>>>) -> Self {
        Self {
            key: Some(key),
            in_flight,
        }
    }

    /// Removes the entry and hands `outcome` to every subscriber
    fn complete(mut self, outcome: Outcome<V>) {
        let Some(key) = self.key.take() else {
            return;
        };
        let sender = lock(&self.in_flight).remove(&key);
        if let Some(tx) = sender {
            let waiters = tx.receiver_count();
            let _ = tx.send(outcome);
            debug!(key = %key, waiters, "delivered fetch result");
        }
    }
}

impl<V: Clone> Drop for InFlightGuard<V> {
    fn drop(&mut self) {
        // Only reached with a key after a panic: dropping the sender wakes
        // waiters with a closed channel
        if let Some(key) = self.key.take() {
            lock(&self.in_flight).remove(&key);
        }
    }
}

fn lock<V>(map: &Mutex<InFlightMap<V>>) -> MutexGuard<'_, InFlightMap<V>> {
    map.lock().unwrap_or_else(|e| e.into_inner())
}

impl<V, C> FetchCoordinator<V, C>
where
    V: Clone + Send + Sync + 'static,
    C: Codec<V> + 'static,
{
    pub fn new(cache: DetailCache<V, C>) -> Self {
        Self::from_shared(Arc::new(cache))
    }

    pub fn from_shared(cache: Arc<DetailCache<V, C>>) -> Self {
        Self {
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// The facade this coordinator reads and writes through
    pub fn cache(&self) -> &DetailCache<V, C> {
        &self.cache
    }

    /// Resolves the record for a string key
    ///
    /// # Arguments
    /// * `key` - Canonical key, e.g. `"movie:550:detail"`
    /// * `fetch` - Produces the network fetch; only called if this caller has to start one
    ///
    /// # Returns
    /// * `Ok(V)` from cache or from a (possibly shared) fetch
    /// * `Err(ResolveError::InvalidKey)` if the key is malformed or of another kind
    /// * `Err(ResolveError::Fetch | Decode | Aborted)` if the shared fetch failed
    pub async fn resolve<F, Fut>(&self, key: &str, fetch: F) -> Result<V, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FetchError>> + Send + 'static,
    {
        let key: CacheKey = key.parse()?;
        self.resolve_key(&key, fetch).await
    }

    /// Resolves the record for `key`, fetching it through `fetcher` on a miss
    pub async fn resolve_with(
        &self,
        key: &CacheKey,
        fetcher: &dyn DetailFetcher,
    ) -> Result<V, ResolveError> {
        self.resolve_key(key, || fetcher.fetch(*key)).await
    }

    /// Typed variant of [`resolve`](Self::resolve)
    pub async fn resolve_key<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<V, ResolveError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FetchError>> + Send + 'static,
    {
        key.expect_kind(self.cache.kind())?;
        bump(&self.counters.resolves);

        if let Some(value) = self.cache.lookup(key) {
            bump(&self.counters.cache_hits);
            return Ok(value);
        }

        let mut rx = {
            let mut in_flight = lock(&self.in_flight);
            match in_flight.get(key) {
                Some(tx) => {
                    bump(&self.counters.coalesced);
                    debug!(key = %key, "joining in-flight fetch");
                    tx.subscribe()
                }
                None => {
                    // Capacity 1: exactly one outcome is ever sent per channel
                    let (tx, rx) = broadcast::channel(1);
                    in_flight.insert(*key, tx);
                    bump(&self.counters.fetches);
                    debug!(key = %key, in_flight = in_flight.len(), "starting fetch");
                    self.spawn_fetch(*key, fetch());
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(ResolveError::Aborted(key.to_string())),
        }
    }

    fn spawn_fetch<Fut>(&self, key: CacheKey, fetch: Fut)
    where
        Fut: Future<Output = Result<Vec<u8>, FetchError>> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        let counters = Arc::clone(&self.counters);
        let guard = InFlightGuard::new(key, Arc::clone(&self.in_flight));

        tokio::spawn(async move {
            // Another fetch may have stored the value between our lookup and registration
            let outcome = match cache.lookup(&key) {
                Some(value) => Ok(value),
                None => fetch_and_store(&cache, &key, fetch).await,
            };

            if let Err(e) = &outcome {
                bump(&counters.failures);
                warn!(key = %key, error = %e, "detail fetch failed");
            }

            guard.complete(outcome);
        });
    }

    /// Removes `key` from both cache tiers
    pub fn invalidate(&self, key: &str) -> Result<(), KeyError> {
        let key: CacheKey = key.parse()?;
        key.expect_kind(self.cache.kind())?;
        self.cache.invalidate(&key);
        Ok(())
    }

    /// Number of keys with a fetch currently running
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            resolves: self.counters.resolves.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

async fn fetch_and_store<V, C, Fut>(
    cache: &DetailCache<V, C>,
    key: &CacheKey,
    fetch: Fut,
) -> Result<V, ResolveError>
where
    V: Clone,
    C: Codec<V>,
    Fut: Future<Output = Result<Vec<u8>, FetchError>>,
{
    let bytes = fetch.await?;
    let value = cache.codec().decode(&bytes)?;
    cache.store(key, value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;
    use crate::cache::key::EntityKind;
    use crate::config::CacheConfig;
    use crate::data::MovieDetail;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const MOVIE_JSON: &[u8] = br#"{"runtime":139,"vote_average":8.4,"genres":[{"id":18,"name":"Drama"}]}"#;

    fn create_coordinator() -> FetchCoordinator<MovieDetail> {
        let config = CacheConfig {
            disk_enabled: false,
            ..CacheConfig::default()
        };
        let cache = DetailCache::open(EntityKind::Movie, &config, Arc::new(ManualClock::new()));
        FetchCoordinator::new(cache)
    }

    #[tokio::test]
    async fn test_miss_fetches_and_caches() {
        let coordinator = create_coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let movie = coordinator
                .resolve("movie:550:detail", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(MOVIE_JSON.to_vec())
                })
                .await
                .expect("resolve should succeed");
            assert_eq!(movie.runtime, Some(139));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_fetch() {
        let coordinator = create_coordinator();
        let result = coordinator
            .resolve("movie:abc:detail", || async { Ok(MOVIE_JSON.to_vec()) })
            .await;

        assert!(matches!(result, Err(ResolveError::InvalidKey(KeyError::InvalidId { .. }))));
        assert_eq!(coordinator.stats().resolves, 0);
    }

    #[tokio::test]
    async fn test_wrong_kind_key_rejected() {
        let coordinator = create_coordinator();
        let result = coordinator
            .resolve("show:1399:detail", || async { Ok(MOVIE_JSON.to_vec()) })
            .await;

        assert!(matches!(result, Err(ResolveError::InvalidKey(KeyError::WrongKind { .. }))));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_cached() {
        let coordinator = create_coordinator();

        let first = coordinator
            .resolve("movie:550:detail", || async {
                Err(FetchError::Transport("connection reset".to_string()))
            })
            .await;
        assert!(matches!(first, Err(ResolveError::Fetch(_))));
        assert_eq!(coordinator.in_flight_count(), 0);

        let second = coordinator
            .resolve("movie:550:detail", || async { Ok(MOVIE_JSON.to_vec()) })
            .await;
        assert!(second.is_ok(), "retry should fetch again");
        assert_eq!(coordinator.stats().fetches, 2);
    }

    #[tokio::test]
    async fn test_undecodable_response_is_error_and_not_cached() {
        let coordinator = create_coordinator();

        let result = coordinator
            .resolve("movie:550:detail", || async { Ok(b"<html>".to_vec()) })
            .await;

        assert!(matches!(result, Err(ResolveError::Decode(_))));
        assert!(coordinator.cache().lookup(&CacheKey::movie(550)).is_none());
    }

    #[tokio::test]
    async fn test_concurrent_resolves_share_one_fetch() {
        let coordinator = Arc::new(create_coordinator());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .resolve("movie:550:detail", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(MOVIE_JSON.to_vec())
                    })
                    .await
            }));
        }

        for handle in handles {
            let movie = handle.await.expect("task should join").expect("resolve should succeed");
            assert_eq!(movie.runtime, Some(139));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_failed_fetches_never_overlap_or_abort_under_contention() {
        let coordinator = Arc::new(create_coordinator());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coordinator = coordinator.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            handles.push(tokio::spawn(async move {
                let mut aborted = 0;
                for _ in 0..500 {
                    let active = active.clone();
                    let max_active = max_active.clone();
                    let result = coordinator
                        .resolve("movie:550:detail", move || async move {
                            let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_active.fetch_max(now_active, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            Err(FetchError::Transport("connection reset".to_string()))
                        })
                        .await;
                    match result {
                        Err(ResolveError::Fetch(_)) => {}
                        Err(ResolveError::Aborted(_)) => aborted += 1,
                        other => panic!("unexpected outcome: {:?}", other.map(|movie| movie.runtime)),
                    }
                }
                aborted
            }));
        }

        let mut aborted = 0;
        for handle in handles {
            aborted += handle.await.expect("task should join");
        }

        assert_eq!(aborted, 0, "no fetch panicked, so no waiter should see an abort");
        assert_eq!(max_active.load(Ordering::SeqCst), 1, "fetches for one key must not overlap");
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_retry_after_failure_joins_new_fetch() {
        let coordinator = Arc::new(create_coordinator());
        let calls = Arc::new(AtomicUsize::new(0));

        let failed = coordinator
            .resolve("movie:550:detail", || async {
                Err(FetchError::Transport("connection reset".to_string()))
            })
            .await;
        assert!(matches!(failed, Err(ResolveError::Fetch(_))));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coordinator
                    .resolve("movie:550:detail", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(MOVIE_JSON.to_vec())
                    })
                    .await
            }));
        }

        for handle in handles {
            let movie = handle.await.expect("task should join").expect("retry should succeed");
            assert_eq!(movie.runtime, Some(139));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[allow(unreachable_code)]
    async fn test_panicking_fetch_aborts_waiters_and_clears_entry() {
        let coordinator = create_coordinator();

        let result = coordinator
            .resolve("movie:550:detail", || async {
                panic!("fetch blew up");
                Ok(Vec::new())
            })
            .await;

        assert!(matches!(result, Err(ResolveError::Aborted(_))));
        assert_eq!(coordinator.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let coordinator = create_coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        for round in 0..2 {
            let calls = calls.clone();
            coordinator
                .resolve("movie:550:detail", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(MOVIE_JSON.to_vec())
                })
                .await
                .expect("resolve should succeed");
            if round == 0 {
                coordinator.invalidate("movie:550:detail").expect("valid key");
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
