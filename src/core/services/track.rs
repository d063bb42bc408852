//! Cache-aside orchestration of lyrics tracks.
//!
//! `TrackService` consults the cache first, falls back to the store (reads) or
//! to the provider and translator (saves), and repopulates the cache from
//! detached background tasks that outlive the triggering call.
//!
//! A Save is cancellable until its store write starts. The write then runs on
//! its own task and its outcome reaches every Save waiting on the same track,
//! whether or not the caller that started it is still around.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn, Instrument};

use super::{LyricsProvider, LyricsTranslator};
use crate::core::data::TrackStorage;
use crate::core::infrastructure::{CacheKey, CacheStats, TrackCache};
use crate::core::models::Track;
use crate::error::{CacheError, StorageError, TrackError};
use crate::utils::dedup::{InFlight, Joined, Leader};

type SaveLeader = Leader<String, Track, TrackError>;

pub struct TrackService {
    provider: Arc<dyn LyricsProvider>,
    translator: Arc<dyn LyricsTranslator>,
    storage: Arc<dyn TrackStorage>,
    cache: Arc<dyn TrackCache>,
    tasks: TaskTracker,
    cache_tasks: CacheTasks,
    saves: InFlight<String, Track, TrackError>,
}

/// Detached cache updates, each bounded by its own timeout.
#[derive(Clone)]
struct CacheTasks {
    cache: Arc<dyn TrackCache>,
    tracker: TaskTracker,
    timeout: Duration,
}

impl CacheTasks {
    fn spawn<F, Fut>(&self, op: &'static str, task: F)
    where
        F: FnOnce(Arc<dyn TrackCache>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), CacheError>> + Send + 'static,
    {
        let cache = Arc::clone(&self.cache);
        let timeout = self.timeout;

        self.tracker.spawn(async move {
            match tokio::time::timeout(timeout, task(cache)).await {
                Ok(Ok(())) => debug!(op, "Cache updated"),
                Ok(Err(e)) => warn!(op, error = %e, "Cache update failed"),
                Err(_) => warn!(op, "Cache update timed out after {:?}", timeout),
            }
        });
    }
}

/// What the cancellable part of a Save produced.
enum Prepared {
    Cached(Track),
    Fetched(Track),
}

/// Fail with `Cancelled` as soon as `cancel` fires. Dropping `fut` aborts
/// whatever collaborator call it was awaiting.
async fn with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, TrackError>
where
    F: Future<Output = Result<T, TrackError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TrackError::Cancelled),
        result = fut => result,
    }
}

impl TrackService {
    pub fn new(
        provider: Arc<dyn LyricsProvider>,
        translator: Arc<dyn LyricsTranslator>,
        storage: Arc<dyn TrackStorage>,
        cache: Arc<dyn TrackCache>,
        cache_write_timeout: Duration,
    ) -> Self {
        let tasks = TaskTracker::new();
        let cache_tasks = CacheTasks {
            cache: Arc::clone(&cache),
            tracker: tasks.clone(),
            timeout: cache_write_timeout,
        };

        Self {
            provider,
            translator,
            storage,
            cache,
            tasks,
            cache_tasks,
            saves: InFlight::new(),
        }
    }

    /// Fetch, translate and persist a track, unless it is already cached.
    ///
    /// Concurrent Saves of the same track share one pipeline run.
    #[instrument(skip(self, cancel), fields(op = "save"))]
    pub async fn save(&self, artist: &str, title: &str, cancel: &CancellationToken) -> Result<Track, TrackError> {
        let key = CacheKey::track(artist, title).to_string();

        loop {
            if cancel.is_cancelled() {
                return Err(TrackError::Cancelled);
            }

            match self.saves.join(key.clone()) {
                Joined::Leader(leader) => return self.lead_save(artist, title, cancel, leader).await,
                Joined::Follower(follower) => {
                    let outcome = with_cancel(cancel, async move { Ok(follower.wait().await) }).await?;
                    match outcome {
                        Some(result) => return result,
                        None => debug!("Save leader abandoned, taking over"),
                    }
                }
            }
        }
    }

    async fn lead_save(
        &self,
        artist: &str,
        title: &str,
        cancel: &CancellationToken,
        leader: SaveLeader,
    ) -> Result<Track, TrackError> {
        let track = match with_cancel(cancel, self.prepare_save(artist, title)).await {
            Ok(Prepared::Cached(track)) => {
                info!("Track already cached, skipping fetch");
                return leader.complete(Ok(track));
            }
            Ok(Prepared::Fetched(track)) => track,
            // dropping the leader lets a waiting Save take over
            Err(TrackError::Cancelled) => return Err(TrackError::Cancelled),
            Err(e) => return leader.complete(Err(e)),
        };

        if cancel.is_cancelled() {
            return Err(TrackError::Cancelled);
        }

        let persist = self.tasks.spawn(self.persist(track, leader).in_current_span());
        persist
            .await
            .unwrap_or_else(|e| Err(StorageError::Task(e).into()))
    }

    /// Cache lookup, fetch and translation. Nothing is written.
    async fn prepare_save(&self, artist: &str, title: &str) -> Result<Prepared, TrackError> {
        if let Some(track) = self.cached_track(artist, title).await {
            return Ok(Prepared::Cached(track));
        }

        let lyrics = self.provider.lyrics(artist, title).await?;
        if lyrics.is_empty() {
            return Err(TrackError::LyricsNotFound);
        }
        debug!(lines = lyrics.len(), "Lyrics fetched");

        let translation = self.translator.translate(&lyrics).await?;
        if translation.len() != lyrics.len() {
            warn!(
                lyrics = lyrics.len(),
                translation = translation.len(),
                "Translator returned a different number of lines"
            );
            return Err(TrackError::TranslationFailed);
        }

        Ok(Prepared::Fetched(Track::new(artist, title, lyrics, translation)))
    }

    /// Store write and cache population, independent of the caller. The
    /// leader keeps answering Saves of the track until the cache holds it.
    fn persist(
        &self,
        track: Track,
        leader: SaveLeader,
    ) -> impl Future<Output = Result<Track, TrackError>> + Send + 'static {
        let storage = Arc::clone(&self.storage);
        let cache_tasks = self.cache_tasks.clone();

        async move {
            let saved = match storage.save_track(track).await {
                Ok(saved) => saved,
                Err(e) => return leader.complete(Err(e.into())),
            };
            info!(uuid = ?saved.uuid, "Track saved");

            let result: Result<Track, TrackError> = Ok(saved.clone());
            leader.publish(&result);

            cache_tasks.spawn("save_track", move |cache| async move {
                let _leader = leader;
                cache.save_track(&saved).await
            });

            result
        }
    }

    /// Look a track up by artist and title.
    #[instrument(skip(self, cancel), fields(op = "track"))]
    pub async fn track(&self, artist: &str, title: &str, cancel: &CancellationToken) -> Result<Track, TrackError> {
        with_cancel(cancel, async {
            if let Some(track) = self.cached_track(artist, title).await {
                let (artist, title) = (artist.to_string(), title.to_string());
                self.cache_tasks.spawn("touch_track", move |cache| async move {
                    cache.touch_track(&artist, &title).await
                });
                return Ok(track);
            }

            let track = self.storage.track(artist, title).await?;

            let cached = track.clone();
            self.cache_tasks
                .spawn("save_track", move |cache| async move { cache.save_track(&cached).await });

            Ok(track)
        })
        .await
    }

    /// All tracks of an artist, in store order.
    #[instrument(skip(self, cancel), fields(op = "artist_tracks"))]
    pub async fn artist_tracks(&self, artist: &str, cancel: &CancellationToken) -> Result<Vec<Track>, TrackError> {
        with_cancel(cancel, async {
            match self.cache.artist_tracks(artist).await {
                Ok(tracks) => {
                    let artist = artist.to_string();
                    self.cache_tasks.spawn("touch_artist_tracks", move |cache| async move {
                        cache.touch_artist_tracks(&artist).await
                    });
                    return Ok(tracks);
                }
                Err(e) => self.log_cache_read_error(&e),
            }

            let tracks = self.storage.tracks_by_artist(artist).await?;
            debug!(count = tracks.len(), "Artist tracks read from store");

            let (artist, cached) = (artist.to_string(), tracks.clone());
            self.cache_tasks.spawn("save_artist_tracks", move |cache| async move {
                cache.save_artist_tracks(&artist, &cached).await
            });

            Ok(tracks)
        })
        .await
    }

    /// Delete a track from the store. Cached copies expire on their own.
    #[instrument(skip(self, cancel), fields(op = "delete"))]
    pub async fn delete(&self, uuid: &str, cancel: &CancellationToken) -> Result<(), TrackError> {
        with_cancel(cancel, async {
            self.storage.delete_track(uuid).await?;
            info!("Track deleted");
            Ok(())
        })
        .await
    }

    pub async fn ping(&self) -> Result<(), TrackError> {
        Ok(self.storage.ping().await?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of detached tasks (store writes and cache updates) still running.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for detached tasks to finish. Returns false if `timeout` elapsed
    /// first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let finished = tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok();
        self.tasks.reopen();

        if !finished {
            warn!(pending = self.tasks.len(), "Timed out waiting for background tasks");
        }
        finished
    }

    async fn cached_track(&self, artist: &str, title: &str) -> Option<Track> {
        match self.cache.track(artist, title).await {
            Ok(track) => Some(track),
            Err(e) => {
                self.log_cache_read_error(&e);
                None
            }
        }
    }

    fn log_cache_read_error(&self, err: &CacheError) {
        if err.is_miss() {
            debug!("Cache miss");
        } else {
            warn!(error = %err, "Cache read failed, falling back");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::*;
    use tokio::task::JoinSet;

    const DRAIN: Duration = Duration::from_secs(5);

    fn service(d: &Doubles) -> TrackService {
        service_with_timeout(d, Duration::from_secs(5))
    }

    fn service_with_timeout(d: &Doubles, cache_write_timeout: Duration) -> TrackService {
        TrackService::new(
            d.provider.clone(),
            d.translator.clone(),
            d.storage.clone(),
            d.cache.clone(),
            cache_write_timeout,
        )
    }

    fn doubles() -> Doubles {
        Doubles::new(
            MockProvider::with_lyrics(&["Hello, it's me", "I was wondering", "if after all these years"]),
            MockTranslator::new(TranslatorBehavior::Prefix),
        )
    }

    #[tokio::test]
    async fn test_track_cache_hit_skips_collaborators() {
        let d = doubles();
        let svc = service(&d);
        let track = sample_track("Adele", "Hello");
        d.cache.seed(&track).await;

        let found = svc.track("Adele", "Hello", &CancellationToken::new()).await.unwrap();
        assert_eq!(found, track);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.reads(), 1);
        assert_eq!(d.storage.reads(), 0);
        assert_eq!(d.provider.calls(), 0);
        assert_eq!(d.translator.calls(), 0);
        assert_eq!(d.cache.writes(), 0);
        assert_eq!(d.cache.touches(), 1);
    }

    #[tokio::test]
    async fn test_track_cache_miss_reads_store_and_populates_cache() {
        let d = doubles();
        let svc = service(&d);
        let stored = d.storage.seed(sample_track("Adele", "Hello"));

        let found = svc.track("adele", "HELLO", &CancellationToken::new()).await.unwrap();
        assert_eq!(found, stored);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.storage.reads(), 1);
        assert_eq!(d.cache.writes(), 1);
        assert_eq!(d.cache.peek("Adele", "Hello").await, Some(stored));
    }

    #[tokio::test]
    async fn test_track_cache_failures_do_not_affect_result() {
        let d = doubles();
        let svc = service(&d);
        let stored = d.storage.seed(sample_track("Adele", "Hello"));
        d.cache.set_broken(true);

        let found = svc.track("Adele", "Hello", &CancellationToken::new()).await.unwrap();
        assert_eq!(found, stored);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.writes(), 1);
    }

    #[tokio::test]
    async fn test_track_not_found() {
        let d = doubles();
        let svc = service(&d);

        let err = svc.track("Adele", "Hello", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrackError::TrackNotFound));

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.writes(), 0);
    }

    #[tokio::test]
    async fn test_save_cached_pair_is_idempotent() {
        let d = doubles();
        let svc = service(&d);
        let track = sample_track("Adele", "Hello");
        d.cache.seed(&track).await;

        let saved = svc.save("Adele", "Hello", &CancellationToken::new()).await.unwrap();
        assert_eq!(saved, track);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.provider.calls(), 0);
        assert_eq!(d.translator.calls(), 0);
        assert_eq!(d.storage.saves(), 0);
    }

    #[tokio::test]
    async fn test_save_runs_pipeline_once() {
        let d = doubles();
        let svc = service(&d);
        let lyrics = lines(&["Hello, it's me", "I was wondering", "if after all these years"]);

        let saved = svc.save("Adele", "Hello", &CancellationToken::new()).await.unwrap();

        assert!(saved.uuid.is_some());
        assert_eq!(saved.lyrics, lyrics);
        assert_eq!(saved.translation.len(), 3);
        assert_eq!(saved.translation[0], "ru: Hello, it's me");

        assert_eq!(d.provider.calls(), 1);
        assert_eq!(d.translator.received(), vec![lyrics]);
        assert_eq!(d.storage.saves(), 1);
        let rows = d.storage.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lyrics.len(), rows[0].translation.len());
    }

    #[tokio::test]
    async fn test_saved_track_is_then_served_from_cache() {
        let d = doubles();
        let svc = service(&d);
        let cancel = CancellationToken::new();

        let saved = svc.save("Adele", "Hello", &cancel).await.unwrap();
        assert!(svc.drain(DRAIN).await);

        let found = svc.track("Adele", "Hello", &cancel).await.unwrap();
        assert_eq!(found, saved);
        assert_eq!(found.lyrics.len(), 3);
        assert_eq!(found.translation.len(), 3);
        assert_eq!(d.storage.reads(), 0);
    }

    #[tokio::test]
    async fn test_save_lyrics_not_found() {
        let d = Doubles::new(
            MockProvider::new(ProviderBehavior::NotFound),
            MockTranslator::new(TranslatorBehavior::Prefix),
        );
        let svc = service(&d);

        let err = svc.save("Nobody", "Nothing", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrackError::LyricsNotFound));
        assert_eq!(d.translator.calls(), 0);
        assert_eq!(d.storage.saves(), 0);
    }

    #[tokio::test]
    async fn test_save_empty_lyrics_is_not_found() {
        let d = Doubles::new(MockProvider::with_lyrics(&[]), MockTranslator::new(TranslatorBehavior::Prefix));
        let svc = service(&d);

        let err = svc.save("Adele", "Hello", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrackError::LyricsNotFound));
        assert_eq!(d.storage.saves(), 0);
    }

    #[tokio::test]
    async fn test_save_provider_failure() {
        let d = Doubles::new(
            MockProvider::new(ProviderBehavior::Unavailable),
            MockTranslator::new(TranslatorBehavior::Prefix),
        );
        let svc = service(&d);

        let err = svc.save("Adele", "Hello", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrackError::Provider(_)));
        assert!(!err.is_client_error());
        assert_eq!(d.storage.saves(), 0);
    }

    #[tokio::test]
    async fn test_save_translation_failures() {
        for (behavior, expect_client_error) in [
            (TranslatorBehavior::Fail, true),
            (TranslatorBehavior::Truncate, true),
            (TranslatorBehavior::Unavailable, false),
        ] {
            let d = Doubles::new(MockProvider::with_lyrics(&["one", "two"]), MockTranslator::new(behavior));
            let svc = service(&d);

            let err = svc.save("Adele", "Hello", &CancellationToken::new()).await.unwrap_err();
            if expect_client_error {
                assert!(matches!(err, TrackError::TranslationFailed));
            } else {
                assert!(matches!(err, TrackError::Translator(_)));
            }
            assert_eq!(d.storage.saves(), 0);
        }
    }

    #[tokio::test]
    async fn test_save_storage_failure_skips_cache() {
        let d = doubles();
        d.storage.set_broken(true);
        let svc = service(&d);

        let err = svc.save("Adele", "Hello", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TrackError::Storage(_)));

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.writes(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let d = doubles();
        let svc = service(&d);
        let cancel = CancellationToken::new();
        let stored = d.storage.seed(sample_track("Adele", "Hello"));
        let id = stored.uuid.unwrap().to_string();

        let err = svc.delete(&uuid::Uuid::new_v4().to_string(), &cancel).await.unwrap_err();
        assert!(matches!(err, TrackError::InvalidUuid));

        let err = svc.delete("not-a-uuid", &cancel).await.unwrap_err();
        assert!(matches!(err, TrackError::InvalidUuid));

        svc.delete(&id, &cancel).await.unwrap();
        assert!(d.storage.rows().is_empty());
        // The malformed uuid is rejected by the store too
        assert_eq!(d.storage.deletes(), 3);
    }

    #[tokio::test]
    async fn test_artist_tracks() {
        let d = doubles();
        let svc = service(&d);
        let cancel = CancellationToken::new();

        let err = svc.artist_tracks("Adele", &cancel).await.unwrap_err();
        assert!(matches!(err, TrackError::ArtistTracksNotFound));

        let hello = d.storage.seed(sample_track("Adele", "Hello"));
        d.storage.seed(sample_track("Muse", "Uprising"));
        let skyfall = d.storage.seed(sample_track("Adele", "Skyfall"));

        let tracks = svc.artist_tracks("adele", &cancel).await.unwrap();
        assert_eq!(tracks, vec![hello.clone(), skyfall.clone()]);

        assert!(svc.drain(DRAIN).await);
        let reads = d.storage.reads();

        let cached = svc.artist_tracks("Adele", &cancel).await.unwrap();
        assert_eq!(cached, vec![hello, skyfall]);
        assert_eq!(d.storage.reads(), reads);
    }

    #[tokio::test]
    async fn test_artist_tracks_served_from_cache() {
        let d = doubles();
        let svc = service(&d);
        let tracks = vec![sample_track("Adele", "Hello")];
        d.cache.seed_artist("Adele", &tracks).await;

        let found = svc.artist_tracks("Adele", &CancellationToken::new()).await.unwrap();
        assert_eq!(found, tracks);
        assert_eq!(d.storage.reads(), 0);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.touches(), 1);
        assert_eq!(d.cache.writes(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let d = doubles();
        let svc = service(&d);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = svc.save("Adele", "Hello", &cancel).await.unwrap_err();
        assert!(matches!(err, TrackError::Cancelled));
        assert_eq!(d.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_pipeline() {
        let d = Doubles::new(
            MockProvider::with_lyrics(&["one"]).with_delay(Duration::from_secs(30)),
            MockTranslator::new(TranslatorBehavior::Prefix),
        );
        let svc = service(&d);
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let err = svc.save("Adele", "Hello", &cancel).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, TrackError::Cancelled));
        assert_eq!(d.provider.calls(), 1);
        assert_eq!(d.translator.calls(), 0);
        assert_eq!(d.storage.saves(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_store_read() {
        let d = doubles().with_storage(MockStorage::new().with_read_delay(Duration::from_secs(30)));
        let svc = service(&d);
        d.storage.seed(sample_track("Adele", "Hello"));
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let err = svc.track("Adele", "Hello", &cancel).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, TrackError::Cancelled));
        assert_eq!(d.storage.reads(), 1);
        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.writes(), 0);
    }

    #[tokio::test]
    async fn test_cancel_does_not_abort_detached_cache_write() {
        let d = doubles().with_cache(MockCache::new().with_write_delay(Duration::from_millis(50)));
        let svc = service(&d);
        let stored = d.storage.seed(sample_track("Adele", "Hello"));
        let cancel = CancellationToken::new();

        svc.track("Adele", "Hello", &cancel).await.unwrap();
        cancel.cancel();
        assert_eq!(svc.pending_tasks(), 1);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.peek("Adele", "Hello").await, Some(stored));
    }

    #[tokio::test]
    async fn test_slow_cache_write_times_out_without_failing_call() {
        let d = doubles().with_cache(MockCache::new().with_write_delay(Duration::from_secs(30)));
        let svc = service_with_timeout(&d, Duration::from_millis(20));
        d.storage.seed(sample_track("Adele", "Hello"));

        svc.track("Adele", "Hello", &CancellationToken::new()).await.unwrap();

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.peek("Adele", "Hello").await, None);
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_coalesced() {
        let d = Doubles::new(
            MockProvider::with_lyrics(&["one", "two"]).with_delay(Duration::from_millis(50)),
            MockTranslator::new(TranslatorBehavior::Prefix),
        );
        let svc = Arc::new(service(&d));

        let mut set = JoinSet::new();
        for i in 0..8 {
            let svc = Arc::clone(&svc);
            let title = if i % 2 == 0 { "Hello" } else { "HELLO" };
            set.spawn(async move { svc.save("Adele", title, &CancellationToken::new()).await });
        }

        let mut uuids = Vec::new();
        while let Some(result) = set.join_next().await {
            uuids.push(result.unwrap().unwrap().uuid);
        }

        assert_eq!(d.provider.calls(), 1);
        assert_eq!(d.storage.rows().len(), 1);
        assert!(uuids.iter().all(|u| *u == uuids[0]));
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over_to_follower() {
        let d = Doubles::new(
            MockProvider::with_lyrics(&["one"]).with_delay(Duration::from_millis(100)),
            MockTranslator::new(TranslatorBehavior::Prefix),
        );
        let svc = Arc::new(service(&d));
        let leader_cancel = CancellationToken::new();

        let leader = {
            let svc = Arc::clone(&svc);
            let cancel = leader_cancel.clone();
            tokio::spawn(async move { svc.save("Adele", "Hello", &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let follower = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.save("Adele", "Hello", &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader_cancel.cancel();

        assert!(matches!(leader.await.unwrap(), Err(TrackError::Cancelled)));
        let saved = follower.await.unwrap().unwrap();
        assert!(saved.uuid.is_some());
        assert_eq!(d.provider.calls(), 2);
        assert_eq!(d.storage.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_store_write_keeps_one_row() {
        let d = doubles().with_storage(MockStorage::new().with_write_delay(Duration::from_millis(100)));
        let svc = Arc::new(service(&d));
        let leader_cancel = CancellationToken::new();

        let leader = {
            let svc = Arc::clone(&svc);
            let cancel = leader_cancel.clone();
            tokio::spawn(async move { svc.save("Adele", "Hello", &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(d.storage.saves(), 1);

        let follower = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.save("Adele", "Hello", &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader_cancel.cancel();

        let led = leader.await.unwrap().unwrap();
        let followed = follower.await.unwrap().unwrap();
        assert!(led.uuid.is_some());
        assert_eq!(led, followed);

        assert_eq!(d.provider.calls(), 1);
        assert_eq!(d.translator.calls(), 1);
        assert_eq!(d.storage.saves(), 1);
        assert_eq!(d.storage.rows().len(), 1);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.peek("Adele", "Hello").await, Some(led));
    }

    #[tokio::test]
    async fn test_dropped_caller_still_hands_stored_track_to_follower() {
        let d = doubles().with_storage(MockStorage::new().with_write_delay(Duration::from_millis(100)));
        let svc = Arc::new(service(&d));

        let leader = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.save("Adele", "Hello", &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let follower = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.save("Adele", "Hello", &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        let saved = follower.await.unwrap().unwrap();
        assert_eq!(d.storage.rows(), vec![saved]);
        assert_eq!(d.provider.calls(), 1);
        assert!(svc.drain(DRAIN).await);
    }

    #[tokio::test]
    async fn test_save_right_after_save_waits_for_cache_write() {
        let d = doubles().with_cache(MockCache::new().with_write_delay(Duration::from_millis(100)));
        let svc = service(&d);
        let cancel = CancellationToken::new();

        let first = svc.save("Adele", "Hello", &cancel).await.unwrap();
        assert_eq!(d.cache.peek("Adele", "Hello").await, None);

        let second = svc.save("Adele", "Hello", &cancel).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(d.provider.calls(), 1);
        assert_eq!(d.storage.rows().len(), 1);

        assert!(svc.drain(DRAIN).await);
        assert_eq!(d.cache.peek("Adele", "Hello").await, Some(first));
    }

    #[tokio::test]
    async fn test_ping_reports_storage_health() {
        let d = doubles();
        let svc = service(&d);
        svc.ping().await.unwrap();

        d.storage.set_broken(true);
        assert!(matches!(svc.ping().await, Err(TrackError::Storage(_))));
    }
}
