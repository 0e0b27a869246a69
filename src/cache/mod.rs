//! In-memory request cache for API queries.
//!
//! Entries are keyed by a hashed query key and hold the last value, its
//! fetch time and any fetch in flight:
//! - Fresh values are served without touching the network
//! - Concurrent requests for one key share a single fetch
//! - Failed fetches are retried before the error is surfaced
//! - Invalidation drops in-flight results so they are never stored

mod layer;
mod traits;

pub use layer::QueryCache;
pub use traits::{CacheResult, CacheSource, QueryKey};
