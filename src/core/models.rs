use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A song with its lyrics and a line-by-line translation.
///
/// `lyrics` and `translation` always have the same length. `uuid` is assigned
/// by the store when the track is persisted and serves as its deletion handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    pub artist: String,
    pub title: String,
    pub lyrics: Vec<String>,
    pub translation: Vec<String>,
}

impl Track {
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        lyrics: Vec<String>,
        translation: Vec<String>,
    ) -> Self {
        Self {
            uuid: None,
            artist: artist.into(),
            title: title.into(),
            lyrics,
            translation,
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    pub fn line_count(&self) -> usize {
        self.lyrics.len()
    }
}
