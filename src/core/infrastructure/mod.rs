//! Infrastructure and cross-cutting concerns
//!
//! This module contains the caching layer that fronts the track store.

pub mod cache;

pub use cache::{CacheKey, CacheStats, MemoryCache, RedisCache, TrackCache};
