pub mod env;
pub mod validation;

use directories::ProjectDirs;
use serde::de::value::StrDeserializer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ConfigError, LyricsLibraryError, Result};
use env::{EnvParser, EnvVars};
use validation::ConfigValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Lyricsovh,
    Lrclib,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    Yandex,
    Deepseek,
}

/// Parse a lowercase enum name such as `lrclib` from an environment value.
fn parse_kind<T: DeserializeOwned>(field: &str, value: &str) -> std::result::Result<T, ConfigError> {
    T::deserialize(StrDeserializer::<serde::de::value::Error>::new(&value.to_lowercase())).map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runtime environment, controls log verbosity and format
    pub env: Environment,

    /// Address the HTTP server binds to
    pub server_address: String,

    /// Per-request deadline (seconds)
    pub request_timeout_secs: u64,

    /// Upper bound on graceful shutdown, including the background cache drain (seconds)
    pub shutdown_timeout_secs: u64,

    /// SQLite database file path
    pub database_path: PathBuf,

    /// Redis URL for the cache (optional, falls back to the in-memory cache)
    pub redis_url: Option<String>,

    /// Prefix for every cache key
    pub cache_namespace: String,

    /// Lifetime of cached entries (seconds)
    pub cache_ttl_seconds: u64,

    /// Maximum number of entries kept by the in-memory cache
    pub cache_max_entries: usize,

    /// Deadline for each detached cache write (seconds)
    pub cache_write_timeout_secs: u64,

    pub lyrics_provider: ProviderKind,

    /// Base URL of the lyrics provider (defaults per provider)
    pub lyrics_api_url: Option<String>,

    pub translator: TranslatorKind,

    /// Endpoint of the translator (defaults per translator)
    pub translator_api_url: Option<String>,

    pub translator_api_key: String,

    /// Language code lyrics are translated into
    pub target_language: String,

    /// Timeout for outbound HTTP calls to providers and translators (seconds)
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let default_data_path = match ProjectDirs::from("dev", "lyrics", "lyrics-library") {
            Some(project_dirs) => project_dirs.data_dir().to_path_buf(),
            None => {
                warn!("ProjectDirs unavailable; falling back to current directory for data path");
                PathBuf::from(".")
            }
        };

        Self {
            env: Environment::Prod,
            server_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
            database_path: default_data_path.join("lyrics.db"),
            redis_url: None,
            cache_namespace: "lyrics:".to_string(),
            cache_ttl_seconds: 3600,
            cache_max_entries: 10_000,
            cache_write_timeout_secs: 5,
            lyrics_provider: ProviderKind::Lyricsovh,
            lyrics_api_url: None,
            translator: TranslatorKind::Yandex,
            translator_api_url: None,
            translator_api_key: String::new(),
            target_language: "ru".to_string(),
            http_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from defaults, the TOML file, `.env` and `LYRICS_*`
    /// environment variables, in increasing order of priority.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let explicit = config_path
            .map(PathBuf::from)
            .or(EnvParser::parse_path(EnvVars::CONFIG_PATH, false)?);

        let mut config = match &explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::FileNotFound { path: path.clone() }.into());
            }
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_config_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config file at {}, using defaults", default_path.display());
                    Self::default()
                }
            }
        };

        config.load_from_env()?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading config from {}", path.display());
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `LYRICS_*` environment overrides
    fn load_from_env(&mut self) -> Result<()> {
        if let Some(value) = EnvParser::parse_string(EnvVars::ENV, None)? {
            self.env = parse_kind("env", &value)?;
        }

        if let Some(address) = EnvParser::parse_string(EnvVars::SERVER_ADDRESS, None)? {
            self.server_address = address;
        }

        if let Some(secs) = EnvParser::parse_u64(EnvVars::REQUEST_TIMEOUT_SECS, 1, 3600)? {
            self.request_timeout_secs = secs;
        }

        if let Some(secs) = EnvParser::parse_u64(EnvVars::SHUTDOWN_TIMEOUT_SECS, 1, 600)? {
            self.shutdown_timeout_secs = secs;
        }

        if let Some(path) = EnvParser::parse_path(EnvVars::DATABASE_PATH, false)? {
            self.database_path = path;
        }

        // An empty value explicitly disables Redis
        if std::env::var(EnvVars::REDIS_URL).is_ok() {
            self.redis_url = EnvParser::parse_string(EnvVars::REDIS_URL, None)?;
        }

        if let Some(namespace) = EnvParser::parse_string(EnvVars::CACHE_NAMESPACE, None)? {
            self.cache_namespace = namespace;
        }

        if let Some(ttl) = EnvParser::parse_u64(EnvVars::CACHE_TTL_SECONDS, 1, 30 * 24 * 3600)? {
            self.cache_ttl_seconds = ttl;
        }

        if let Some(max) = EnvParser::parse_usize(EnvVars::CACHE_MAX_ENTRIES, 1, 10_000_000)? {
            self.cache_max_entries = max;
        }

        if let Some(secs) = EnvParser::parse_u64(EnvVars::CACHE_WRITE_TIMEOUT_SECS, 1, 600)? {
            self.cache_write_timeout_secs = secs;
        }

        if let Some(value) = EnvParser::parse_string(EnvVars::LYRICS_PROVIDER, None)? {
            self.lyrics_provider = parse_kind("lyrics_provider", &value)?;
        }

        if let Some(url) = EnvParser::parse_string(EnvVars::LYRICS_API_URL, None)? {
            self.lyrics_api_url = Some(url);
        }

        if let Some(value) = EnvParser::parse_string(EnvVars::TRANSLATOR, None)? {
            self.translator = parse_kind("translator", &value)?;
        }

        if let Some(url) = EnvParser::parse_string(EnvVars::TRANSLATOR_API_URL, None)? {
            self.translator_api_url = Some(url);
        }

        if let Some(key) = EnvParser::parse_string(EnvVars::TRANSLATOR_API_KEY, None)? {
            self.translator_api_key = key;
        }

        if let Some(language) = EnvParser::parse_string(EnvVars::TARGET_LANGUAGE, None)? {
            self.target_language = language;
        }

        if let Some(secs) = EnvParser::parse_u64(EnvVars::HTTP_TIMEOUT_SECS, 1, 600)? {
            self.http_timeout_secs = secs;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        ConfigValidator::validate_socket_address(&self.server_address, "server_address")?;
        ConfigValidator::validate_range(self.request_timeout_secs, 1, 3600, "request_timeout_secs")?;
        ConfigValidator::validate_range(self.shutdown_timeout_secs, 1, 600, "shutdown_timeout_secs")?;
        ConfigValidator::validate_db_path(&self.database_path)?;

        if let Some(redis_url) = &self.redis_url {
            ConfigValidator::validate_redis_url(redis_url)?;
        }

        if self.cache_namespace.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "cache_namespace".to_string(),
            }
            .into());
        }
        ConfigValidator::validate_range(self.cache_ttl_seconds, 1, 30 * 24 * 3600, "cache_ttl_seconds")?;
        ConfigValidator::validate_range(self.cache_max_entries, 1, 10_000_000, "cache_max_entries")?;
        ConfigValidator::validate_range(self.cache_write_timeout_secs, 1, 600, "cache_write_timeout_secs")?;
        ConfigValidator::validate_range(self.http_timeout_secs, 1, 600, "http_timeout_secs")?;

        if let Some(url) = &self.lyrics_api_url {
            ConfigValidator::validate_http_url(url, "lyrics_api_url")?;
        }
        if let Some(url) = &self.translator_api_url {
            ConfigValidator::validate_http_url(url, "translator_api_url")?;
        }

        if self.target_language.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "target_language".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn cache_write_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_write_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn is_local(&self) -> bool {
        self.env == Environment::Local
    }

    /// TOML rendering with the translator key masked
    pub fn to_display_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.translator_api_key.is_empty() {
            shown.translator_api_key = "********".to_string();
        }
        Ok(toml::to_string_pretty(&shown).map_err(ConfigError::from)?)
    }

    /// Write the configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(ConfigError::from)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn default_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("dev", "lyrics", "lyrics-library")
            .ok_or_else(|| LyricsLibraryError::Validation("Failed to determine project directories".to_string()))?;

        Ok(project_dirs.config_dir().join("config.toml"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Self::default_config_path()
    }
}
