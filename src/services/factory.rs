use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::config::{Config, ProviderKind, TranslatorKind};
use crate::core::data::{SqliteStorage, TrackStorage};
use crate::core::infrastructure::{MemoryCache, RedisCache, TrackCache};
use crate::core::services::{deepseek, lrclib, lyricsovh, yandex};
use crate::core::services::{LyricsProvider, LyricsTranslator, TrackService};
use crate::error::{ConfigError, LyricsLibraryError, Result, TranslatorError};

/// Centralized factory for creating all core services from the configuration
pub struct ServiceFactory {
    config: Arc<Config>,
}

impl ServiceFactory {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub async fn create_storage(&self) -> Result<Arc<dyn TrackStorage>> {
        let storage = SqliteStorage::new(&self.config.database_path).await?;
        Ok(Arc::new(storage))
    }

    /// Redis when configured and reachable, the in-memory cache otherwise
    pub async fn create_cache(&self) -> Arc<dyn TrackCache> {
        if let Some(redis_url) = &self.config.redis_url {
            let connect = RedisCache::connect(redis_url, &self.config.cache_namespace, self.config.cache_ttl_seconds);
            match tokio::time::timeout(self.config.cache_write_timeout(), connect).await {
                Ok(Ok(cache)) => {
                    info!("Using Redis cache at {}", redis_url);
                    return Arc::new(cache);
                }
                Ok(Err(e)) => warn!("Redis unavailable ({}), falling back to in-memory cache", e),
                Err(_) => warn!("Timed out connecting to Redis, falling back to in-memory cache"),
            }
        }

        info!("Using in-memory cache (max {} entries)", self.config.cache_max_entries);
        Arc::new(MemoryCache::new(
            self.config.cache_namespace.clone(),
            self.config.cache_ttl(),
            self.config.cache_max_entries,
        ))
    }

    pub fn create_provider(&self) -> Result<Arc<dyn LyricsProvider>> {
        let timeout = self.config.http_timeout();
        let provider: Arc<dyn LyricsProvider> = match self.config.lyrics_provider {
            ProviderKind::Lyricsovh => {
                let base = self.endpoint(self.config.lyrics_api_url.as_deref(), lyricsovh::DEFAULT_BASE_URL)?;
                Arc::new(lyricsovh::LyricsOvhClient::new(base, timeout).map_err(internal)?)
            }
            ProviderKind::Lrclib => {
                let base = self.endpoint(self.config.lyrics_api_url.as_deref(), lrclib::DEFAULT_BASE_URL)?;
                Arc::new(lrclib::LrclibClient::new(base, timeout).map_err(internal)?)
            }
        };

        info!("Lyrics provider: {:?}", self.config.lyrics_provider);
        Ok(provider)
    }

    pub fn create_translator(&self) -> Result<Arc<dyn LyricsTranslator>> {
        let config = &self.config;
        let timeout = config.http_timeout();
        let translator: Arc<dyn LyricsTranslator> = match config.translator {
            TranslatorKind::Yandex => {
                let endpoint = self.endpoint(config.translator_api_url.as_deref(), yandex::DEFAULT_BASE_URL)?;
                Arc::new(
                    yandex::YandexTranslator::new(
                        endpoint,
                        &config.translator_api_key,
                        &config.target_language,
                        timeout,
                    )
                    .map_err(translator_error)?,
                )
            }
            TranslatorKind::Deepseek => {
                let endpoint = self.endpoint(config.translator_api_url.as_deref(), deepseek::DEFAULT_BASE_URL)?;
                Arc::new(
                    deepseek::DeepSeekTranslator::new(
                        endpoint,
                        &config.translator_api_key,
                        &config.target_language,
                        timeout,
                    )
                    .map_err(translator_error)?,
                )
            }
        };

        info!("Translator: {:?} (target language: {})", config.translator, config.target_language);
        Ok(translator)
    }

    /// Wire every collaborator into a track service
    pub async fn create_track_service(&self) -> Result<Arc<TrackService>> {
        let storage = self.create_storage().await?;
        let cache = self.create_cache().await;
        let provider = self.create_provider()?;
        let translator = self.create_translator()?;

        Ok(Arc::new(TrackService::new(
            provider,
            translator,
            storage,
            cache,
            self.config.cache_write_timeout(),
        )))
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    fn endpoint(&self, configured: Option<&str>, default: &str) -> Result<Url> {
        let raw = configured.unwrap_or(default);
        Url::parse(raw).map_err(|e| LyricsLibraryError::Validation(format!("Invalid endpoint '{}': {}", raw, e)))
    }
}

fn internal<E>(err: E) -> LyricsLibraryError
where
    E: std::error::Error + Send + Sync + 'static,
{
    LyricsLibraryError::Internal(err.into())
}

fn translator_error(err: TranslatorError) -> LyricsLibraryError {
    match err {
        TranslatorError::NotConfigured { .. } => ConfigError::MissingField {
            field: "translator_api_key".to_string(),
        }
        .into(),
        other => internal(other),
    }
}
