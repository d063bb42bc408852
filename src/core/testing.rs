//! Counting test doubles for the collaborator traits.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::core::data::TrackStorage;
use crate::core::infrastructure::{CacheStats, MemoryCache, TrackCache};
use crate::core::models::Track;
use crate::core::services::{LyricsProvider, LyricsTranslator};
use crate::error::{CacheError, ProviderError, StorageError, TranslatorError};

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn sample_track(artist: &str, title: &str) -> Track {
    Track::new(
        artist,
        title,
        lines(&["Hello, it's me", "I was wondering"]),
        lines(&["Привет, это я", "Мне было интересно"]),
    )
}

#[derive(Clone)]
pub enum ProviderBehavior {
    Lyrics(Vec<String>),
    NotFound,
    Unavailable,
}

pub struct MockProvider {
    behavior: ProviderBehavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(behavior: ProviderBehavior) -> Self {
        Self {
            behavior,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_lyrics(items: &[&str]) -> Self {
        Self::new(ProviderBehavior::Lyrics(lines(items)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LyricsProvider for MockProvider {
    async fn lyrics(&self, artist: &str, title: &str) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            ProviderBehavior::Lyrics(lines) => Ok(lines.clone()),
            ProviderBehavior::NotFound => Err(ProviderError::NotFound {
                artist: artist.to_string(),
                title: title.to_string(),
            }),
            ProviderBehavior::Unavailable => Err(ProviderError::Status { status: 503 }),
        }
    }
}

#[derive(Clone, Copy)]
pub enum TranslatorBehavior {
    /// Prefixes every line with `ru:`.
    Prefix,
    Fail,
    Unavailable,
    /// Drops the last line, violating the length contract.
    Truncate,
}

pub struct MockTranslator {
    behavior: TranslatorBehavior,
    calls: AtomicUsize,
    received: Mutex<Vec<Vec<String>>>,
}

impl MockTranslator {
    pub fn new(behavior: TranslatorBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Vec<String>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl LyricsTranslator for MockTranslator {
    async fn translate(&self, lyrics: &[String]) -> Result<Vec<String>, TranslatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(lyrics.to_vec());

        match self.behavior {
            TranslatorBehavior::Prefix => Ok(lyrics.iter().map(|l| format!("ru: {}", l)).collect()),
            TranslatorBehavior::Fail => Err(TranslatorError::TranslationFailed {
                reason: "model refused".to_string(),
            }),
            TranslatorBehavior::Unavailable => Err(TranslatorError::Status { status: 502 }),
            TranslatorBehavior::Truncate => {
                let mut out: Vec<String> = lyrics.to_vec();
                out.pop();
                Ok(out)
            }
        }
    }
}

#[derive(Default)]
pub struct MockStorage {
    tracks: Arc<Mutex<Vec<Track>>>,
    read_delay: Duration,
    write_delay: Duration,
    broken: AtomicBool,
    pub saves: AtomicUsize,
    pub reads: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Writes take `delay` and, like a blocking-pool write, complete on their
    /// own task even when the caller is dropped.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    /// Insert a track directly, bypassing the counters.
    pub fn seed(&self, track: Track) -> Track {
        let track = track.with_uuid(Uuid::new_v4());
        self.tracks.lock().unwrap().push(track.clone());
        track
    }

    pub fn rows(&self) -> Vec<Track> {
        self.tracks.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(StorageError::Corruption);
        }
        Ok(())
    }

    async fn read_pause(&self) {
        if !self.read_delay.is_zero() {
            tokio::time::sleep(self.read_delay).await;
        }
    }
}

fn same(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[async_trait]
impl TrackStorage for MockStorage {
    async fn save_track(&self, track: Track) -> Result<Track, StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let rows = Arc::clone(&self.tracks);
        let delay = self.write_delay;

        let write = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let track = track.with_uuid(Uuid::new_v4());
            rows.lock().unwrap().push(track.clone());
            track
        });
        Ok(write.await?)
    }

    async fn track(&self, artist: &str, title: &str) -> Result<Track, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_pause().await;
        self.check()?;
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .find(|t| same(&t.artist, artist) && same(&t.title, title))
            .cloned()
            .ok_or(StorageError::TrackNotFound)
    }

    async fn tracks_by_artist(&self, artist: &str) -> Result<Vec<Track>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.read_pause().await;
        self.check()?;
        let tracks: Vec<Track> = self
            .tracks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| same(&t.artist, artist))
            .cloned()
            .collect();
        if tracks.is_empty() {
            return Err(StorageError::ArtistTracksNotFound);
        }
        Ok(tracks)
    }

    async fn delete_track(&self, uuid: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let invalid = || StorageError::InvalidUuid { uuid: uuid.to_string() };
        let parsed = Uuid::parse_str(uuid).map_err(|_| invalid())?;

        let mut tracks = self.tracks.lock().unwrap();
        let before = tracks.len();
        tracks.retain(|t| t.uuid != Some(parsed));
        if tracks.len() == before {
            return Err(invalid());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }
}

/// Memory cache wrapped with call counters, an optional write delay and a
/// switch that makes every call fail with a backend error.
pub struct MockCache {
    inner: MemoryCache,
    write_delay: Duration,
    broken: AtomicBool,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub touches: AtomicUsize,
}

impl MockCache {
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::new("test:", Duration::from_secs(60), 100),
            write_delay: Duration::ZERO,
            broken: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            touches: AtomicUsize::new(0),
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn touches(&self) -> usize {
        self.touches.load(Ordering::SeqCst)
    }

    /// Populate the cache without touching the counters.
    pub async fn seed(&self, track: &Track) {
        self.inner.save_track(track).await.unwrap();
    }

    pub async fn seed_artist(&self, artist: &str, tracks: &[Track]) {
        self.inner.save_artist_tracks(artist, tracks).await.unwrap();
    }

    /// Peek at the cached track without touching the counters.
    pub async fn peek(&self, artist: &str, title: &str) -> Option<Track> {
        self.inner.track(artist, title).await.ok()
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(CacheError::Timeout);
        }
        Ok(())
    }

    async fn write_pause(&self) {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
    }
}

impl Default for MockCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackCache for MockCache {
    async fn track(&self, artist: &str, title: &str) -> Result<Track, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.track(artist, title).await
    }

    async fn save_track(&self, track: &Track) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.write_pause().await;
        self.check()?;
        self.inner.save_track(track).await
    }

    async fn artist_tracks(&self, artist: &str) -> Result<Vec<Track>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.artist_tracks(artist).await
    }

    async fn save_artist_tracks(&self, artist: &str, tracks: &[Track]) -> Result<(), CacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.write_pause().await;
        self.check()?;
        self.inner.save_artist_tracks(artist, tracks).await
    }

    async fn touch_track(&self, artist: &str, title: &str) -> Result<(), CacheError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.touch_track(artist, title).await
    }

    async fn touch_artist_tracks(&self, artist: &str) -> Result<(), CacheError> {
        self.touches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.touch_artist_tracks(artist).await
    }

    fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

/// Shared handles to a full set of doubles.
pub struct Doubles {
    pub provider: Arc<MockProvider>,
    pub translator: Arc<MockTranslator>,
    pub storage: Arc<MockStorage>,
    pub cache: Arc<MockCache>,
}

impl Doubles {
    pub fn new(provider: MockProvider, translator: MockTranslator) -> Self {
        Self {
            provider: Arc::new(provider),
            translator: Arc::new(translator),
            storage: Arc::new(MockStorage::new()),
            cache: Arc::new(MockCache::new()),
        }
    }

    pub fn with_storage(mut self, storage: MockStorage) -> Self {
        self.storage = Arc::new(storage);
        self
    }

    pub fn with_cache(mut self, cache: MockCache) -> Self {
        self.cache = Arc::new(cache);
        self
    }
}
