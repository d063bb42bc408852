//! SQLite track storage
//!
//! Tracks are stored with their lyrics and translation encoded as JSON arrays.
//! Lookup columns hold the trimmed, lower-cased artist and title so lookups
//! are case-insensitive for any script, not just ASCII.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use super::TrackStorage;
use crate::core::models::Track;
use crate::error::StorageError;

const CURRENT_DB_VERSION: u32 = 1;

#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub async fn new(db_path: &Path) -> Result<Self, StorageError> {
        info!("Opening database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(db_path)?;

        // WAL lets readers proceed while a write is in progress
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Self::migrate(&mut conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let mut conn = Connection::open_in_memory()?;
        Self::migrate(&mut conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate(conn: &mut Connection) -> Result<(), StorageError> {
        let existing_version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if existing_version > CURRENT_DB_VERSION {
            return Err(StorageError::Migration(format!(
                "database version {} is newer than supported version {}",
                existing_version, CURRENT_DB_VERSION
            )));
        }

        if existing_version < CURRENT_DB_VERSION {
            Self::upgrade_database(conn, existing_version)?;
        }

        Ok(())
    }

    fn upgrade_database(conn: &mut Connection, existing_version: u32) -> Result<(), StorageError> {
        debug!("Upgrading database from version {} to {}", existing_version, CURRENT_DB_VERSION);

        if existing_version == 0 {
            let tx = conn.transaction()?;

            tx.pragma_update(None, "user_version", CURRENT_DB_VERSION)?;

            tx.execute_batch(
                r#"
                CREATE TABLE tracks (
                    uuid TEXT PRIMARY KEY,
                    artist TEXT NOT NULL,
                    artist_lower TEXT NOT NULL,
                    title TEXT NOT NULL,
                    title_lower TEXT NOT NULL,
                    lyrics TEXT NOT NULL,
                    translation TEXT NOT NULL,
                    created_at DATETIME NOT NULL
                );

                CREATE INDEX idx_tracks_artist_lower ON tracks(artist_lower);
                CREATE INDEX idx_tracks_artist_title_lower ON tracks(artist_lower, title_lower);
                "#,
            )?;

            tx.commit()?;
        }

        info!("Database upgraded successfully");
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&guard)
        })
        .await?
    }
}

fn lookup_key(value: &str) -> String {
    value.trim().to_lowercase()
}

struct StoredRow {
    uuid: String,
    artist: String,
    title: String,
    lyrics: String,
    translation: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uuid: row.get(0)?,
            artist: row.get(1)?,
            title: row.get(2)?,
            lyrics: row.get(3)?,
            translation: row.get(4)?,
        })
    }

    fn into_track(self) -> Result<Track, StorageError> {
        let uuid = Uuid::parse_str(&self.uuid).map_err(|_| StorageError::Corruption)?;
        let lyrics: Vec<String> = serde_json::from_str(&self.lyrics)?;
        let translation: Vec<String> = serde_json::from_str(&self.translation)?;

        Ok(Track::new(self.artist, self.title, lyrics, translation).with_uuid(uuid))
    }
}

#[async_trait]
impl TrackStorage for SqliteStorage {
    async fn save_track(&self, track: Track) -> Result<Track, StorageError> {
        let uuid = Uuid::new_v4();
        let lyrics = serde_json::to_string(&track.lyrics)?;
        let translation = serde_json::to_string(&track.translation)?;
        let track = track.with_uuid(uuid);
        let row = track.clone();

        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO tracks
                (uuid, artist, artist_lower, title, title_lower, lyrics, translation, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    uuid.to_string(),
                    row.artist,
                    lookup_key(&row.artist),
                    row.title,
                    lookup_key(&row.title),
                    lyrics,
                    translation,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?;

        debug!(uuid = %uuid, artist = %track.artist, title = %track.title, "Track stored");
        Ok(track)
    }

    async fn track(&self, artist: &str, title: &str) -> Result<Track, StorageError> {
        let artist = lookup_key(artist);
        let title = lookup_key(title);

        let row = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT uuid, artist, title, lyrics, translation
                    FROM tracks
                    WHERE artist_lower = ?1 AND title_lower = ?2
                    ORDER BY rowid
                    LIMIT 1
                    "#,
                )?;
                let row = stmt
                    .query_row(params![artist, title], StoredRow::from_row)
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.ok_or(StorageError::TrackNotFound)?.into_track()
    }

    async fn tracks_by_artist(&self, artist: &str) -> Result<Vec<Track>, StorageError> {
        let artist = lookup_key(artist);

        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT uuid, artist, title, lyrics, translation
                    FROM tracks
                    WHERE artist_lower = ?1
                    ORDER BY rowid
                    "#,
                )?;
                let rows = stmt
                    .query_map(params![artist], StoredRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        if rows.is_empty() {
            return Err(StorageError::ArtistTracksNotFound);
        }

        rows.into_iter().map(StoredRow::into_track).collect()
    }

    async fn delete_track(&self, uuid: &str) -> Result<(), StorageError> {
        let parsed = Uuid::parse_str(uuid).map_err(|_| StorageError::InvalidUuid {
            uuid: uuid.to_string(),
        })?;

        let affected = self
            .with_conn(move |conn| {
                let affected = conn.execute("DELETE FROM tracks WHERE uuid = ?1", params![parsed.to_string()])?;
                Ok(affected)
            })
            .await?;

        if affected == 0 {
            return Err(StorageError::InvalidUuid {
                uuid: uuid.to_string(),
            });
        }

        debug!(uuid = %parsed, "Track deleted");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}
