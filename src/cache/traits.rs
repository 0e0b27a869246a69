//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Key identifying one cached query.
pub trait QueryKey: Send + Sync {
  /// Stable, fixed-length hash used as the cache key
  fn cache_hash(&self) -> String;

  /// Human-readable form for logging
  fn description(&self) -> String;
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
  /// When the fetch that produced the data finished
  pub fetched_at: Instant,
}

impl<T> CacheResult<T> {
  /// Fresh data from a fetch this call started.
  pub fn from_network(data: T, fetched_at: Instant) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
      fetched_at,
    }
  }

  /// Data from a fetch another caller had already started.
  pub fn joined(data: T, fetched_at: Instant) -> Self {
    Self {
      data,
      source: CacheSource::InFlight,
      cached_at: None,
      fetched_at,
    }
  }

  /// Data served from the cache while still fresh.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>, fetched_at: Instant) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
      fetched_at,
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Shared result of a fetch already in flight
  InFlight,
  /// Data from cache, still within its staleness window
  CacheFresh,
}
