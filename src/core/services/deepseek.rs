use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{user_agent, LyricsTranslator, RetryPolicy};
use crate::core::lyrics::format_lyrics;
use crate::error::TranslatorError;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize, Debug)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChatMessage,
}

/// Translator backed by the DeepSeek chat completions API.
#[derive(Clone)]
pub struct DeepSeekTranslator {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    target_language: String,
    retry: RetryPolicy,
}

impl DeepSeekTranslator {
    pub fn new(
        endpoint: Url,
        api_key: impl Into<String>,
        target_language: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TranslatorError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TranslatorError::NotConfigured {
                reason: "DeepSeek translator requires an API key".to_string(),
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
            model: DEFAULT_MODEL.to_string(),
            target_language: target_language.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn system_prompt(&self) -> String {
        format!(
            "You translate song lyrics into the language with code '{}'. \
             Translate every line separately and keep the line breaks: \
             the answer must have exactly as many lines as the input. \
             Reply with the translation only.",
            self.target_language
        )
    }
}

#[async_trait]
impl LyricsTranslator for DeepSeekTranslator {
    async fn translate(&self, lyrics: &[String]) -> Result<Vec<String>, TranslatorError> {
        if lyrics.is_empty() {
            return Ok(Vec::new());
        }

        info!(lines = lyrics.len(), target = %self.target_language, model = %self.model, "Translating lyrics with DeepSeek");

        let system = self.system_prompt();
        let user = lyrics.join("\n");

        let response = self
            .retry
            .send(|| {
                let body = ChatRequest {
                    model: &self.model,
                    messages: vec![
                        ChatMessage {
                            role: "system".to_string(),
                            content: system.clone(),
                        },
                        ChatMessage {
                            role: "user".to_string(),
                            content: user.clone(),
                        },
                    ],
                    stream: false,
                };
                self.client
                    .post(self.endpoint.clone())
                    .bearer_auth(&self.api_key)
                    .json(&body)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslatorError::Status { status: status.as_u16() });
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| TranslatorError::TranslationFailed {
                reason: "empty completion".to_string(),
            })?;

        let translated = format_lyrics(&content);
        debug!("DeepSeek returned {} lines", translated.len());

        if translated.len() != lyrics.len() {
            return Err(TranslatorError::TranslationFailed {
                reason: format!("expected {} translated lines, got {}", lyrics.len(), translated.len()),
            });
        }

        Ok(translated)
    }
}
