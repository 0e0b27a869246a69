//! Observable, cache-backed queries.
//!
//! A `Query<T>` owns a resolver that either yields the request to run or
//! `None` when a required input (a signed-in user, a selected league) is
//! missing. While the resolver yields `None` the query sits in `Idle` and
//! sends nothing. Requests go through the shared [`QueryCache`], so two
//! queries with the same key reuse each other's results and in-flight
//! fetches.
//!
//! ```ignore
//! let mut bets = queries.user_bets();
//!
//! // Observe: fetches when enabled and missing or stale
//! bets.fetch();
//!
//! // Later, on a timer or after other work
//! if bets.poll() {
//!     if let Some(list) = bets.data() {
//!         println!("{} bets", list.len());
//!     }
//! }
//!
//! // Or block on it
//! bets.wait(Duration::from_millis(25)).await;
//! ```

use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::cache::{QueryCache, QueryKey};

const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Disabled, or never observed
  Idle,
  Loading,
  Success(T),
  /// Fetch failed after the cache's retries
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_idle(&self) -> bool {
    matches!(self, QueryState::Idle)
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type FetcherFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// A resolved request: the cache key and how to fetch the value behind it.
pub struct Request<T> {
  key: Arc<dyn QueryKey>,
  fetcher: FetcherFn<T>,
}

impl<T: 'static> Request<T> {
  pub fn new<K, F, Fut>(key: K, fetcher: F) -> Self
  where
    K: QueryKey + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self {
      key: Arc::new(key),
      fetcher: Arc::new(move || fetcher().boxed()),
    }
  }
}

/// Produces the request to run, or `None` while the query is disabled.
type ResolveFn<T> = Box<dyn Fn() -> Option<Request<T>> + Send + Sync>;

/// One observed resource.
///
/// Results arrive from a spawned task over a channel and are applied on
/// [`Query::poll`]; a result for a key the query no longer points at is
/// never applied.
pub struct Query<T> {
  state: QueryState<T>,
  cache: QueryCache,
  resolve: ResolveFn<T>,
  /// Cache hash of the request the current state belongs to
  active_key: Option<String>,
  receiver: Option<mpsc::UnboundedReceiver<Result<(T, Instant), String>>>,
  /// When the current data was fetched, or when the last error arrived
  settled_at: Option<Instant>,
  stale_time: Duration,
}

impl<T: Clone + Send + Sync + 'static> Query<T> {
  /// Create a new query with the given resolver.
  ///
  /// The resolver is evaluated on every `fetch()` and `refetch()`, so it
  /// always sees current inputs.
  pub fn new<F>(cache: QueryCache, resolve: F) -> Self
  where
    F: Fn() -> Option<Request<T>> + Send + Sync + 'static,
  {
    Self {
      state: QueryState::Idle,
      cache,
      resolve: Box::new(resolve),
      active_key: None,
      receiver: None,
      settled_at: None,
      stale_time: DEFAULT_STALE_TIME,
    }
  }

  /// How long a settled result counts as fresh.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_idle(&self) -> bool {
    self.state.is_idle()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Data older than the stale time, counted from its fetch (which may have
  /// been started by another query sharing the key). Never true while idle
  /// or loading.
  pub fn is_stale(&self) -> bool {
    match &self.state {
      QueryState::Success(_) | QueryState::Error(_) => self
        .settled_at
        .map(|t| t.elapsed() > self.stale_time)
        .unwrap_or(true),
      _ => false,
    }
  }

  /// Observe the query.
  ///
  /// - Disabled: drop back to `Idle`, discarding anything in flight
  /// - Inputs changed: discard the old request and fetch the new one
  /// - Idle, or settled and stale: start a fetch
  /// - Otherwise a no-op, including while loading
  pub fn fetch(&mut self) {
    let Some(request) = (self.resolve)() else {
      self.disable();
      return;
    };

    let hash = request.key.cache_hash();
    if self.active_key.as_deref() != Some(hash.as_str()) {
      self.active_key = Some(hash);
      self.receiver = None;
      self.start_fetch(request);
      return;
    }

    let should_fetch = match self.state {
      QueryState::Idle => true,
      QueryState::Loading => false,
      QueryState::Success(_) | QueryState::Error(_) => self.is_stale(),
    };
    if should_fetch {
      self.start_fetch(request);
    }
  }

  /// Invalidate the cached value and fetch again, even if already loading.
  pub fn refetch(&mut self) {
    let Some(request) = (self.resolve)() else {
      self.disable();
      return;
    };

    self.cache.invalidate(request.key.as_ref());
    self.active_key = Some(request.key.cache_hash());
    self.receiver = None;
    self.start_fetch(request);
  }

  /// Apply a finished fetch, if any. Returns `true` when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(receiver) = self.receiver.as_mut() else {
      return false;
    };

    // Data ages from its fetch, not from its arrival here
    let (next, settled_at) = match receiver.try_recv() {
      Ok(Ok((data, fetched_at))) => (QueryState::Success(data), fetched_at),
      Ok(Err(error)) => (QueryState::Error(error), Instant::now()),
      Err(mpsc::error::TryRecvError::Empty) => return false,
      Err(mpsc::error::TryRecvError::Disconnected) => (
        QueryState::Error("Fetch task ended without a result".to_string()),
        Instant::now(),
      ),
    };

    self.state = next;
    self.settled_at = Some(settled_at);
    self.receiver = None;
    true
  }

  /// Poll every `tick` until the query leaves `Loading`.
  pub async fn wait(&mut self, tick: Duration) -> &QueryState<T> {
    while self.is_loading() {
      if !self.poll() {
        tokio::time::sleep(tick).await;
      }
    }
    &self.state
  }

  fn disable(&mut self) {
    self.state = QueryState::Idle;
    self.active_key = None;
    self.receiver = None;
    self.settled_at = None;
  }

  fn start_fetch(&mut self, request: Request<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let cache = self.cache.clone();
    let stale_time = self.stale_time;
    let Request { key, fetcher } = request;

    tokio::spawn(async move {
      let result = cache
        .fetch(key.as_ref(), stale_time, move || fetcher())
        .await
        .map(|cached| (cached.data, cached.fetched_at));
      // Receiver is gone when the query moved on to another key
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("active_key", &self.active_key)
      .field("settled_at", &self.settled_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}
