use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client as RedisClient};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::core::models::Track;
use crate::error::CacheError;

/// Best-effort track cache.
///
/// Reads report absence through [`CacheError::NotCached`]; callers treat every
/// error from a cache as a miss.
#[async_trait]
pub trait TrackCache: Send + Sync {
    async fn track(&self, artist: &str, title: &str) -> Result<Track, CacheError>;
    async fn save_track(&self, track: &Track) -> Result<(), CacheError>;
    async fn artist_tracks(&self, artist: &str) -> Result<Vec<Track>, CacheError>;
    async fn save_artist_tracks(&self, artist: &str, tracks: &[Track]) -> Result<(), CacheError>;

    /// Extend the lifetime of an entry that was just served.
    async fn touch_track(&self, _artist: &str, _title: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn touch_artist_tracks(&self, _artist: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn stats(&self) -> CacheStats;
}

/// Cache key for a single track or for an artist's track list.
///
/// Components are trimmed and lower-cased so lookups match the store's
/// case-insensitive identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Track { artist: String, title: String },
    ArtistTracks { artist: String },
}

impl CacheKey {
    pub fn track(artist: &str, title: &str) -> Self {
        CacheKey::Track {
            artist: normalize(artist),
            title: normalize(title),
        }
    }

    pub fn artist_tracks(artist: &str) -> Self {
        CacheKey::ArtistTracks {
            artist: normalize(artist),
        }
    }

    pub fn namespaced(&self, namespace: &str) -> String {
        format!("{}{}", namespace, self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Track { artist, title } => write!(f, "track:{}:{}", artist, title),
            CacheKey::ArtistTracks { artist } => write!(f, "artist_tracks:{}", artist),
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub backend: &'static str,
    pub total_entries: Option<usize>,
    pub total_requests: u64,
    pub cache_hits: u64,
    pub hit_rate_percent: f64,
}

impl CacheStats {
    fn new(backend: &'static str, total_entries: Option<usize>, total_requests: u64, cache_hits: u64) -> Self {
        let hit_rate_percent = if total_requests > 0 {
            (cache_hits as f64 / total_requests as f64) * 100.0
        } else {
            0.0
        };

        Self {
            backend,
            total_entries,
            total_requests,
            cache_hits,
            hit_rate_percent,
        }
    }
}

#[derive(Clone)]
enum CachedValue {
    Track(Track),
    ArtistTracks(Vec<Track>),
}

struct CacheEntry {
    value: CachedValue,
    cached_at: Instant,
    last_accessed: Instant,
}

struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    total_requests: u64,
    cache_hits: u64,
}

/// In-process cache with per-entry TTL and least-recently-accessed eviction.
pub struct MemoryCache {
    namespace: String,
    state: StdMutex<MemoryState>,
    ttl: Duration,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(namespace: impl Into<String>, ttl: Duration, max_entries: usize) -> Self {
        Self {
            namespace: namespace.into(),
            state: StdMutex::new(MemoryState {
                entries: HashMap::new(),
                total_requests: 0,
                cache_hits: 0,
            }),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get(&self, key: &CacheKey) -> Result<CachedValue, CacheError> {
        let key = key.namespaced(&self.namespace);
        let mut guard = self.lock();
        let state = &mut *guard;
        state.total_requests += 1;

        let now = Instant::now();
        let expired = match state.entries.get_mut(&key) {
            Some(entry) if now.duration_since(entry.cached_at) <= self.ttl => {
                entry.last_accessed = now;
                state.cache_hits += 1;
                debug!("Cache hit for {}", key);
                return Ok(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            debug!("Cache entry expired for {}", key);
            state.entries.remove(&key);
        }

        Err(CacheError::NotCached { key })
    }

    fn refresh(&self, key: &CacheKey) {
        let key = key.namespaced(&self.namespace);
        if let Some(entry) = self.lock().entries.get_mut(&key) {
            entry.cached_at = Instant::now();
        }
    }

    fn put(&self, key: &CacheKey, value: CachedValue) {
        let key = key.namespaced(&self.namespace);
        let now = Instant::now();
        let mut state = self.lock();

        state.entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: now,
                last_accessed: now,
            },
        );

        if state.entries.len() > self.max_entries {
            self.evict(&mut state, now);
        }
    }

    fn evict(&self, state: &mut MemoryState, now: Instant) {
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| now.duration_since(entry.cached_at) <= self.ttl);

        if state.entries.len() > self.max_entries {
            let mut by_access: Vec<(String, Instant)> = state
                .entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.last_accessed))
                .collect();
            by_access.sort_by(|a, b| a.1.cmp(&b.1));

            let to_remove = state.entries.len() - self.max_entries;
            for (key, _) in by_access.into_iter().take(to_remove) {
                state.entries.remove(&key);
            }
        }

        debug!("Memory cache eviction: {} -> {} entries", before, state.entries.len());
    }
}

#[async_trait]
impl TrackCache for MemoryCache {
    async fn track(&self, artist: &str, title: &str) -> Result<Track, CacheError> {
        let key = CacheKey::track(artist, title);
        match self.get(&key)? {
            CachedValue::Track(track) => Ok(track),
            CachedValue::ArtistTracks(_) => Err(CacheError::NotCached { key: key.to_string() }),
        }
    }

    async fn save_track(&self, track: &Track) -> Result<(), CacheError> {
        self.put(
            &CacheKey::track(&track.artist, &track.title),
            CachedValue::Track(track.clone()),
        );
        Ok(())
    }

    async fn artist_tracks(&self, artist: &str) -> Result<Vec<Track>, CacheError> {
        let key = CacheKey::artist_tracks(artist);
        match self.get(&key)? {
            CachedValue::ArtistTracks(tracks) => Ok(tracks),
            CachedValue::Track(_) => Err(CacheError::NotCached { key: key.to_string() }),
        }
    }

    async fn save_artist_tracks(&self, artist: &str, tracks: &[Track]) -> Result<(), CacheError> {
        self.put(
            &CacheKey::artist_tracks(artist),
            CachedValue::ArtistTracks(tracks.to_vec()),
        );
        Ok(())
    }

    async fn touch_track(&self, artist: &str, title: &str) -> Result<(), CacheError> {
        self.refresh(&CacheKey::track(artist, title));
        Ok(())
    }

    async fn touch_artist_tracks(&self, artist: &str) -> Result<(), CacheError> {
        self.refresh(&CacheKey::artist_tracks(artist));
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats::new(
            "memory",
            Some(state.entries.len()),
            state.total_requests,
            state.cache_hits,
        )
    }
}

/// Redis-backed cache storing JSON values with a fixed TTL.
pub struct RedisCache {
    manager: ConnectionManager,
    namespace: String,
    ttl_seconds: u64,
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
}

impl RedisCache {
    pub async fn connect(redis_url: &str, namespace: impl Into<String>, ttl_seconds: u64) -> Result<Self, CacheError> {
        let client = RedisClient::open(redis_url)?;
        let mut manager = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut manager).await?;
        info!("Connected to Redis cache");

        Ok(Self {
            manager,
            namespace: namespace.into(),
            ttl_seconds,
            total_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<T, CacheError> {
        let key = key.namespaced(&self.namespace);
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut con = self.manager.clone();
        let value: Option<String> = con.get(&key).await?;

        match value {
            Some(value) => {
                let decoded = serde_json::from_str(&value)?;
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Redis cache hit for {}", key);
                Ok(decoded)
            }
            None => {
                debug!("Redis cache miss for {}", key);
                Err(CacheError::NotCached { key })
            }
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &CacheKey, value: &T) -> Result<(), CacheError> {
        let key = key.namespaced(&self.namespace);
        let value = serde_json::to_string(value)?;

        let mut con = self.manager.clone();
        let _: () = con.set_ex(&key, value, self.ttl_seconds).await?;

        debug!("Cached {} in Redis", key);
        Ok(())
    }

    async fn expire(&self, key: &CacheKey) -> Result<(), CacheError> {
        let key = key.namespaced(&self.namespace);
        let mut con = self.manager.clone();
        let _: i64 = redis::cmd("EXPIRE")
            .arg(&key)
            .arg(self.ttl_seconds)
            .query_async(&mut con)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TrackCache for RedisCache {
    async fn track(&self, artist: &str, title: &str) -> Result<Track, CacheError> {
        self.get_json(&CacheKey::track(artist, title)).await
    }

    async fn save_track(&self, track: &Track) -> Result<(), CacheError> {
        self.set_json(&CacheKey::track(&track.artist, &track.title), track).await
    }

    async fn artist_tracks(&self, artist: &str) -> Result<Vec<Track>, CacheError> {
        self.get_json(&CacheKey::artist_tracks(artist)).await
    }

    async fn save_artist_tracks(&self, artist: &str, tracks: &[Track]) -> Result<(), CacheError> {
        self.set_json(&CacheKey::artist_tracks(artist), &tracks).await
    }

    async fn touch_track(&self, artist: &str, title: &str) -> Result<(), CacheError> {
        self.expire(&CacheKey::track(artist, title)).await
    }

    async fn touch_artist_tracks(&self, artist: &str) -> Result<(), CacheError> {
        self.expire(&CacheKey::artist_tracks(artist)).await
    }

    fn stats(&self) -> CacheStats {
        CacheStats::new(
            "redis",
            None,
            self.total_requests.load(Ordering::Relaxed),
            self.cache_hits.load(Ordering::Relaxed),
        )
    }
}
