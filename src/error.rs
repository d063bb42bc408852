//! Error handling for the lyrics-library service
//!
//! Every layer owns a closed error enum. Collaborator errors (storage, cache,
//! lyrics provider, translator) are converted into the orchestrator's
//! [`TrackError`] through explicit `From` mappings, so callers only ever match
//! on a small, stable set of kinds.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LyricsLibraryError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Track error: {0}")]
    Track(#[from] TrackError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("track not found")]
    TrackNotFound,

    #[error("artist's tracks not found")]
    ArtistTracksNotFound,

    #[error("invalid uuid: {uuid}")]
    InvalidUuid { uuid: String },

    #[error("Query failed: {0}")]
    Query(#[source] rusqlite::Error),

    #[error("Database corruption detected")]
    Corruption,

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Failed to encode stored lines: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache key not found: {key}")]
    NotCached { key: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache operation timed out")]
    Timeout,
}

impl CacheError {
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::NotCached { .. })
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("lyrics not found for {artist} - {title}")]
    NotFound { artist: String, title: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lyrics API returned status {status}")]
    Status { status: u16 },

    #[error("lyrics API response invalid: {reason}")]
    InvalidResponse { reason: String },
}

#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("failed to translate lyrics: {reason}")]
    TranslationFailed { reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation API returned status {status}")]
    Status { status: u16 },

    #[error("translation API response invalid: {reason}")]
    InvalidResponse { reason: String },

    #[error("translator is not configured: {reason}")]
    NotConfigured { reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid config format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Failure kinds surfaced by the track orchestrator.
///
/// Cache faults never appear here: a cache miss or a broken cache backend only
/// makes the orchestrator fall back to the store or the providers.
#[derive(Error, Debug, Clone)]
pub enum TrackError {
    #[error("lyrics not found")]
    LyricsNotFound,

    #[error("failed to translate lyrics")]
    TranslationFailed,

    #[error("track not found")]
    TrackNotFound,

    #[error("artist's tracks not found")]
    ArtistTracksNotFound,

    #[error("invalid uuid")]
    InvalidUuid,

    #[error("lyrics provider error: {0}")]
    Provider(#[source] Arc<ProviderError>),

    #[error("translator error: {0}")]
    Translator(#[source] Arc<TranslatorError>),

    #[error("storage error: {0}")]
    Storage(#[source] Arc<StorageError>),

    #[error("operation cancelled")]
    Cancelled,
}

impl TrackError {
    /// Whether the failure is attributable to the request rather than to a
    /// backend fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TrackError::LyricsNotFound
                | TrackError::TranslationFailed
                | TrackError::TrackNotFound
                | TrackError::ArtistTracksNotFound
                | TrackError::InvalidUuid
        )
    }
}

impl From<ProviderError> for TrackError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { .. } => TrackError::LyricsNotFound,
            other => TrackError::Provider(Arc::new(other)),
        }
    }
}

impl From<TranslatorError> for TrackError {
    fn from(err: TranslatorError) -> Self {
        match err {
            TranslatorError::TranslationFailed { .. } => TrackError::TranslationFailed,
            other => TrackError::Translator(Arc::new(other)),
        }
    }
}

impl From<StorageError> for TrackError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TrackNotFound => TrackError::TrackNotFound,
            StorageError::ArtistTracksNotFound => TrackError::ArtistTracksNotFound,
            StorageError::InvalidUuid { .. } => TrackError::InvalidUuid,
            other => TrackError::Storage(Arc::new(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, LyricsLibraryError>;

use rusqlite::ffi;

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ffi::Error { code: ffi::ErrorCode::DatabaseCorrupt, .. }, _) => {
                StorageError::Corruption
            }
            _ => StorageError::Query(err),
        }
    }
}

impl From<toml::de::Error> for LyricsLibraryError {
    fn from(err: toml::de::Error) -> Self {
        LyricsLibraryError::Config(ConfigError::InvalidFormat(err))
    }
}

impl From<tokio::task::JoinError> for LyricsLibraryError {
    fn from(err: tokio::task::JoinError) -> Self {
        LyricsLibraryError::Internal(err.into())
    }
}
