use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{user_agent, LyricsTranslator, RetryPolicy};
use crate::error::TranslatorError;

pub const DEFAULT_BASE_URL: &str = "https://translate.api.cloud.yandex.net/translate/v2/translate";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TranslateRequest<'a> {
    texts: &'a [String],
    target_language_code: &'a str,
}

#[derive(Deserialize, Debug)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize, Debug)]
struct Translation {
    text: String,
}

/// Yandex Cloud Translate client. Every lyric line is sent as a separate
/// text so the response maps back line for line.
#[derive(Clone)]
pub struct YandexTranslator {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    target_language: String,
    retry: RetryPolicy,
}

impl YandexTranslator {
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        target_language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TranslatorError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TranslatorError::NotConfigured {
                reason: "Yandex translator requires an API key".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            target_language: target_language.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl LyricsTranslator for YandexTranslator {
    async fn translate(&self, lyrics: &[String]) -> Result<Vec<String>, TranslatorError> {
        if lyrics.is_empty() {
            return Ok(Vec::new());
        }

        info!(lines = lyrics.len(), target = %self.target_language, "Translating lyrics with Yandex");

        let body = TranslateRequest {
            texts: lyrics,
            target_language_code: &self.target_language,
        };
        let auth = format!("Api-Key {}", self.api_key);

        let response = self
            .retry
            .send(|| {
                self.client
                    .post(self.endpoint.clone())
                    .header(AUTHORIZATION, &auth)
                    .json(&body)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslatorError::Status { status: status.as_u16() });
        }

        let parsed: TranslateResponse = response.json().await?;
        debug!("Yandex returned {} translations", parsed.translations.len());

        if parsed.translations.len() != lyrics.len() {
            return Err(TranslatorError::TranslationFailed {
                reason: format!(
                    "expected {} translated lines, got {}",
                    lyrics.len(),
                    parsed.translations.len()
                ),
            });
        }

        Ok(parsed
            .translations
            .into_iter()
            .map(|t| t.text.trim().to_string())
            .collect())
    }
}
