//! Durable track storage
//!
//! This module contains the storage contract consumed by the track service
//! and its SQLite implementation.

pub mod database;

use async_trait::async_trait;

use crate::core::models::Track;
use crate::error::StorageError;

pub use database::SqliteStorage;

/// Authoritative persistence for tracks.
///
/// Lookups by artist and title are case-insensitive. Not-found conditions are
/// reported through the dedicated [`StorageError`] variants.
#[async_trait]
pub trait TrackStorage: Send + Sync {
    /// Persist a track and return it with its assigned uuid.
    async fn save_track(&self, track: Track) -> Result<Track, StorageError>;

    async fn track(&self, artist: &str, title: &str) -> Result<Track, StorageError>;

    /// All tracks of an artist in insertion order. Never returns an empty list.
    async fn tracks_by_artist(&self, artist: &str) -> Result<Vec<Track>, StorageError>;

    async fn delete_track(&self, uuid: &str) -> Result<(), StorageError>;

    async fn ping(&self) -> Result<(), StorageError>;
}
