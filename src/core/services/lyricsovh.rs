use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{user_agent, LyricsProvider, RetryPolicy};
use crate::core::lyrics::format_lyrics;
use crate::error::ProviderError;

pub const DEFAULT_BASE_URL: &str = "https://api.lyrics.ovh";

#[derive(Deserialize, Debug)]
struct LyricsResponse {
    #[serde(default)]
    lyrics: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the lyrics.ovh API.
#[derive(Clone)]
pub struct LyricsOvhClient {
    client: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl LyricsOvhClient {
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

    fn lyrics_url(&self, artist: &str, title: &str) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::InvalidResponse {
                reason: format!("base URL cannot carry a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(["v1", artist, title]);
        Ok(url)
    }
}

#[async_trait]
impl LyricsProvider for LyricsOvhClient {
    async fn lyrics(&self, artist: &str, title: &str) -> Result<Vec<String>, ProviderError> {
        info!(artist, title, "Fetching lyrics from lyrics.ovh");

        let url = self.lyrics_url(artist, title)?;
        debug!("Lyrics URL: {}", url);

        let not_found = || ProviderError::NotFound {
            artist: artist.to_string(),
            title: title.to_string(),
        };

        let response = self.retry.send(|| self.client.get(url.clone())).await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(not_found()),
            status => return Err(ProviderError::Status { status: status.as_u16() }),
        }

        let body: LyricsResponse = response.json().await?;

        if let Some(error) = body.error.filter(|e| !e.is_empty()) {
            if error.to_lowercase().contains("no lyrics") {
                return Err(not_found());
            }
            return Err(ProviderError::InvalidResponse { reason: error });
        }

        let lines = format_lyrics(body.lyrics.as_deref().unwrap_or_default());
        if lines.is_empty() {
            return Err(not_found());
        }

        info!(artist, title, lines = lines.len(), "Lyrics fetched");
        Ok(lines)
    }
}
