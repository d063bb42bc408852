use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{user_agent, LyricsProvider, RetryPolicy};
use crate::core::lyrics::{format_lyrics, strip_timestamps};
use crate::error::ProviderError;

pub const DEFAULT_BASE_URL: &str = "https://lrclib.net";

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub artist_name: Option<String>,
    pub plain_lyrics: Option<String>,
    pub synced_lyrics: Option<String>,
    #[serde(default)]
    pub instrumental: bool,
}

impl SearchResult {
    /// Plain lyrics if present, otherwise synced lyrics with the LRC
    /// timestamps removed.
    fn lyrics_lines(&self) -> Vec<String> {
        if self.instrumental {
            return Vec::new();
        }

        if let Some(plain) = self.plain_lyrics.as_deref() {
            let lines = format_lyrics(plain);
            if !lines.is_empty() {
                return lines;
            }
        }

        self.synced_lyrics
            .as_deref()
            .map(|synced| format_lyrics(&strip_timestamps(synced)))
            .unwrap_or_default()
    }
}

/// Client for the LRCLIB search API.
#[derive(Clone)]
pub struct LrclibClient {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl LrclibClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;

        Ok(Self {
            client,
            base_url,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn search(&self, artist: &str, title: &str) -> Result<Vec<SearchResult>, ProviderError> {
        let url = self
            .base_url
            .join("api/search")
            .map_err(|e| ProviderError::InvalidResponse { reason: e.to_string() })?;

        let params = [("track_name", title), ("artist_name", artist)];
        debug!("Searching LRCLIB API with params: {:?}", params);

        let response = self
            .retry
            .send(|| self.client.get(url.clone()).query(&params))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16() });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LyricsProvider for LrclibClient {
    async fn lyrics(&self, artist: &str, title: &str) -> Result<Vec<String>, ProviderError> {
        info!(artist, title, "Fetching lyrics from LRCLIB");

        let results = self.search(artist, title).await?;
        debug!("LRCLIB returned {} results", results.len());

        let lines = results
            .iter()
            .map(SearchResult::lyrics_lines)
            .find(|lines| !lines.is_empty())
            .ok_or_else(|| ProviderError::NotFound {
                artist: artist.to_string(),
                title: title.to_string(),
            })?;

        info!(artist, title, lines = lines.len(), "Lyrics fetched");
        Ok(lines)
    }
}
