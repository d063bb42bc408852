//! External services and the track orchestrator
//!
//! This module contains the contracts for the external collaborators, their
//! HTTP clients, and the track service that composes them:
//! - `lyricsovh`, `lrclib`: lyrics providers
//! - `yandex`, `deepseek`: lyrics translators
//! - `track`: cache-aside orchestration over store, cache, provider, translator

pub mod deepseek;
pub mod lrclib;
pub mod lyricsovh;
pub mod track;
pub mod yandex;

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::warn;

use crate::error::{ProviderError, TranslatorError};

pub use track::TrackService;

/// Fetches raw lyrics for a song, one entry per non-empty line.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    async fn lyrics(&self, artist: &str, title: &str) -> Result<Vec<String>, ProviderError>;
}

/// Translates lyrics line by line; the result has as many lines as the input.
#[async_trait]
pub trait LyricsTranslator: Send + Sync {
    async fn translate(&self, lyrics: &[String]) -> Result<Vec<String>, TranslatorError>;
}

/// Retry policy for transient HTTP failures (429, 5xx, transport errors).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt.saturating_sub(1))
    }

    /// Send the request built by `build`, retrying transient failures with
    /// exponential backoff. The last response is returned as-is, whatever
    /// its status.
    pub async fn send<F>(&self, build: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    let transient = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    if transient && attempt < self.max_attempts {
                        warn!("Transient status {} (attempt {}/{}), retrying", status, attempt, self.max_attempts);
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt < self.max_attempts {
                        warn!("Request error (attempt {}/{}): {}", attempt, self.max_attempts, e);
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }
}

pub(crate) fn user_agent() -> String {
    format!("lyrics-library/{}", env!("CARGO_PKG_VERSION"))
}
