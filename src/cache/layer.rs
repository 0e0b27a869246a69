//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::panic::AssertUnwindSafe;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::traits::{CacheResult, QueryKey};

type CachedValue = Arc<dyn Any + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, Result<Fetched, String>>>;

/// Output of a finished fetch, shared by every caller that joined it.
#[derive(Clone)]
struct Fetched {
  value: CachedValue,
  at: Instant,
}

#[derive(Default)]
struct Entry {
  value: Option<CachedValue>,
  fetched_at: Option<Instant>,
  cached_at: Option<DateTime<Utc>>,
  error: Option<String>,
  in_flight: Option<InFlight>,
  /// Bumped on invalidation; results from older generations are dropped
  generation: u64,
}

/// Request cache shared by every query in the process.
///
/// Each entry is judged against the staleness window of the caller asking
/// for it, so one key may be fresh for one query and stale for another.
#[derive(Clone)]
pub struct QueryCache {
  entries: Arc<Mutex<HashMap<String, Entry>>>,
  /// Extra attempts after a failed fetch
  retries: u32,
}

impl QueryCache {
  pub fn new(retries: u32) -> Self {
    Self {
      entries: Arc::new(Mutex::new(HashMap::new())),
      retries,
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, String> {
    self
      .entries
      .lock()
      .map_err(|e| format!("Cache lock poisoned: {}", e))
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh value cached - return it
  /// 2. Fetch already in flight for this key - wait for it
  /// 3. Otherwise start a fetch (retrying on failure) and store the result
  pub async fn fetch<K, T, F, Fut>(
    &self,
    key: &K,
    stale_time: Duration,
    fetcher: F,
  ) -> Result<CacheResult<T>, String>
  where
    K: QueryKey + ?Sized,
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let hash = key.cache_hash();
    let description = key.description();

    let (in_flight, joined) = {
      let mut entries = self.lock()?;
      let entry = entries.entry(hash.clone()).or_default();

      if let (Some(value), Some(fetched_at), Some(cached_at)) =
        (&entry.value, entry.fetched_at, entry.cached_at)
      {
        if fetched_at.elapsed() <= stale_time {
          if let Some(data) = value.downcast_ref::<T>() {
            debug!(key = %description, "Cache hit");
            return Ok(CacheResult::from_cache(data.clone(), cached_at, fetched_at));
          }
        }
      }

      match &entry.in_flight {
        Some(existing) => {
          debug!(key = %description, "Joining fetch in flight");
          (existing.clone(), true)
        }
        None => {
          let started = self.start_fetch(hash, entry.generation, description.clone(), fetcher);
          entry.in_flight = Some(started.clone());
          (started, false)
        }
      }
    };

    let fetched = in_flight.await?;
    let data = fetched
      .value
      .downcast_ref::<T>()
      .cloned()
      .ok_or_else(|| format!("Cached value for {} has an unexpected type", description))?;

    Ok(if joined {
      CacheResult::joined(data, fetched.at)
    } else {
      CacheResult::from_network(data, fetched.at)
    })
  }

  /// Build the shared fetch future for one entry generation.
  fn start_fetch<T, F, Fut>(
    &self,
    hash: String,
    generation: u64,
    description: String,
    fetcher: F,
  ) -> InFlight
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let entries = Arc::clone(&self.entries);
    let retries = self.retries;

    async move {
      // A panicking fetcher settles as an ordinary error
      let result = AssertUnwindSafe(fetch_with_retry(&description, retries, fetcher))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(format!("Fetch for {} panicked", description)))
        .map(|data| Fetched {
          value: Arc::new(data) as CachedValue,
          at: Instant::now(),
        });

      if let Ok(mut entries) = entries.lock() {
        match entries.get_mut(&hash) {
          Some(entry) if entry.generation == generation => {
            entry.in_flight = None;
            match &result {
              Ok(fetched) => {
                entry.value = Some(Arc::clone(&fetched.value));
                entry.fetched_at = Some(fetched.at);
                entry.cached_at = Some(Utc::now());
                entry.error = None;
              }
              Err(e) => entry.error = Some(e.clone()),
            }
          }
          _ => debug!(key = %description, "Discarding result of invalidated fetch"),
        }
      }

      result
    }
    .boxed()
    .shared()
  }

  /// Mark a key stale and forget any fetch in flight for it.
  ///
  /// The last value stays available through [`QueryCache::peek`], but the
  /// next `fetch` goes to the network.
  pub fn invalidate<K: QueryKey + ?Sized>(&self, key: &K) {
    let hash = key.cache_hash();
    if let Ok(mut entries) = self.lock() {
      if let Some(entry) = entries.get_mut(&hash) {
        entry.generation += 1;
        entry.in_flight = None;
        entry.fetched_at = None;
        info!(key = %key.description(), generation = entry.generation, "Invalidated cache entry");
      }
    }
  }

  /// Error from the most recent failed fetch of `key`, if the entry has one.
  pub fn last_error<K: QueryKey + ?Sized>(&self, key: &K) -> Option<String> {
    self
      .lock()
      .ok()
      .and_then(|entries| entries.get(&key.cache_hash()).and_then(|e| e.error.clone()))
  }

  /// Last value stored for `key`, fresh or not.
  pub fn peek<K: QueryKey + ?Sized, T: Clone + 'static>(&self, key: &K) -> Option<T> {
    let entries = self.lock().ok()?;
    entries
      .get(&key.cache_hash())
      .and_then(|e| e.value.as_ref())
      .and_then(|v| v.downcast_ref::<T>())
      .cloned()
  }
}

/// Run `fetcher`, retrying up to `retries` more times on failure.
async fn fetch_with_retry<T, F, Fut>(description: &str, retries: u32, fetcher: F) -> Result<T, String>
where
  F: Fn() -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let mut attempt = 0;
  loop {
    match fetcher().await {
      Ok(data) => return Ok(data),
      Err(e) if attempt < retries => {
        attempt += 1;
        warn!(key = %description, attempt, error = %e, "Fetch failed, retrying");
      }
      Err(e) => return Err(e.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheSource;
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicU32, Ordering};

  struct TestKey(&'static str);

  impl QueryKey for TestKey {
    fn cache_hash(&self) -> String {
      self.0.to_string()
    }

    fn description(&self) -> String {
      self.0.to_string()
    }
  }

  const MINUTE: Duration = Duration::from_secs(60);

  fn counting_fetcher(
    calls: Arc<AtomicU32>,
    delay: Duration,
  ) -> impl Fn() -> BoxFuture<'static, Result<u32>> + Send + Sync + 'static {
    move || {
      let calls = Arc::clone(&calls);
      async move {
        tokio::time::sleep(delay).await;
        Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_fresh_value_served_from_cache() {
    let cache = QueryCache::new(0);
    let calls = Arc::new(AtomicU32::new(0));

    let first = cache
      .fetch(&TestKey("leagues"), MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    let second = cache
      .fetch(&TestKey("leagues"), MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_stale_value_refetched() {
    let cache = QueryCache::new(0);
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&TestKey("odds"), Duration::ZERO, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let again = cache
      .fetch(&TestKey("odds"), Duration::ZERO, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(again.data, 2);
  }

  #[tokio::test]
  async fn test_concurrent_requests_share_one_fetch() {
    let cache = QueryCache::new(0);
    let calls = Arc::new(AtomicU32::new(0));
    let delay = Duration::from_millis(30);

    let (a, b) = tokio::join!(
      cache.fetch(&TestKey("games"), MINUTE, counting_fetcher(calls.clone(), delay)),
      cache.fetch(&TestKey("games"), MINUTE, counting_fetcher(calls.clone(), delay)),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().data, 1);
    let b = b.unwrap();
    assert_eq!(b.data, 1);
    assert_eq!(b.source, CacheSource::InFlight);
  }

  #[tokio::test]
  async fn test_distinct_keys_fetch_independently() {
    let cache = QueryCache::new(0);
    let calls = Arc::new(AtomicU32::new(0));

    cache
      .fetch(&TestKey("games:nfl"), MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    cache
      .fetch(&TestKey("games:nba"), MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let cache = QueryCache::new(0);
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey("bets:u1");

    cache
      .fetch(&key, MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    cache.invalidate(&key);
    let again = cache
      .fetch(&key, MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(again.source, CacheSource::Network);
    assert_eq!(again.data, 2);
  }

  #[tokio::test]
  async fn test_invalidated_in_flight_result_is_not_stored() {
    let cache = QueryCache::new(0);
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey("leaderboard:p1");

    let pending = {
      let cache = cache.clone();
      let calls = calls.clone();
      tokio::spawn(async move {
        cache
          .fetch(
            &TestKey("leaderboard:p1"),
            MINUTE,
            counting_fetcher(calls, Duration::from_millis(30)),
          )
          .await
      })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.invalidate(&key);

    // The original caller still gets its answer...
    assert_eq!(pending.await.unwrap().unwrap().data, 1);
    // ...but it was never written back.
    assert_eq!(cache.peek::<_, u32>(&key), None);
  }

  #[tokio::test]
  async fn test_single_retry_before_error() {
    let cache = QueryCache::new(1);
    let calls = Arc::new(AtomicU32::new(0));

    let fetcher = {
      let calls = calls.clone();
      move || {
        let calls = calls.clone();
        async move {
          if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(eyre!("connection reset"))
          } else {
            Ok(7u32)
          }
        }
      }
    };

    let result = cache.fetch(&TestKey("game:g1"), MINUTE, fetcher).await.unwrap();
    assert_eq!(result.data, 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_error_surfaces_after_retries_exhausted() {
    let cache = QueryCache::new(1);
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey("market");

    let fetcher = {
      let calls = calls.clone();
      move || {
        let calls = calls.clone();
        async move {
          calls.fetch_add(1, Ordering::SeqCst);
          Err::<u32, _>(eyre!("GET /api/market/games returned 502"))
        }
      }
    };

    let err = cache.fetch(&key, MINUTE, fetcher).await.unwrap_err();
    assert!(err.contains("502"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.last_error(&key).as_deref(), Some(err.as_str()));
  }

  #[tokio::test]
  async fn test_panicking_fetcher_does_not_wedge_key() {
    let cache = QueryCache::new(0);
    let key = TestKey("game:g1");

    let err = cache
      .fetch(&key, MINUTE, || async {
        if true {
          panic!("decoder bug");
        }
        Ok(0u32)
      })
      .await
      .unwrap_err();
    assert!(err.contains("panicked"));

    let calls = Arc::new(AtomicU32::new(0));
    let recovered = cache
      .fetch(&key, MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    assert_eq!(recovered.source, CacheSource::Network);
    assert_eq!(recovered.data, 1);
  }

  #[tokio::test]
  async fn test_cache_hit_reports_original_fetch_time() {
    let cache = QueryCache::new(0);
    let calls = Arc::new(AtomicU32::new(0));
    let key = TestKey("leagues");

    let first = cache
      .fetch(&key, MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let hit = cache
      .fetch(&key, MINUTE, counting_fetcher(calls.clone(), Duration::ZERO))
      .await
      .unwrap();

    assert_eq!(hit.source, CacheSource::CacheFresh);
    assert_eq!(hit.fetched_at, first.fetched_at);
    assert!(hit.fetched_at.elapsed() >= Duration::from_millis(20));
  }
}
