use std::env;
use std::path::PathBuf;
use crate::error::{Result, LyricsLibraryError};

/// Environment variable configuration constants
pub struct EnvVars;

impl EnvVars {
    pub const CONFIG_PATH: &'static str = "LYRICS_CONFIG_PATH";
    pub const ENV: &'static str = "LYRICS_ENV";
    pub const SERVER_ADDRESS: &'static str = "LYRICS_SERVER_ADDRESS";
    pub const REQUEST_TIMEOUT_SECS: &'static str = "LYRICS_REQUEST_TIMEOUT_SECS";
    pub const SHUTDOWN_TIMEOUT_SECS: &'static str = "LYRICS_SHUTDOWN_TIMEOUT_SECS";
    pub const DATABASE_PATH: &'static str = "LYRICS_DATABASE_PATH";
    pub const REDIS_URL: &'static str = "LYRICS_REDIS_URL";
    pub const CACHE_NAMESPACE: &'static str = "LYRICS_CACHE_NAMESPACE";
    pub const CACHE_TTL_SECONDS: &'static str = "LYRICS_CACHE_TTL_SECONDS";
    pub const CACHE_MAX_ENTRIES: &'static str = "LYRICS_CACHE_MAX_ENTRIES";
    pub const CACHE_WRITE_TIMEOUT_SECS: &'static str = "LYRICS_CACHE_WRITE_TIMEOUT_SECS";
    pub const LYRICS_PROVIDER: &'static str = "LYRICS_PROVIDER";
    pub const LYRICS_API_URL: &'static str = "LYRICS_API_URL";
    pub const TRANSLATOR: &'static str = "LYRICS_TRANSLATOR";
    pub const TRANSLATOR_API_URL: &'static str = "LYRICS_TRANSLATOR_API_URL";
    pub const TRANSLATOR_API_KEY: &'static str = "LYRICS_TRANSLATOR_API_KEY";
    pub const TARGET_LANGUAGE: &'static str = "LYRICS_TARGET_LANGUAGE";
    pub const HTTP_TIMEOUT_SECS: &'static str = "LYRICS_HTTP_TIMEOUT_SECS";
}

/// Environment variable parsing utilities with validation
pub struct EnvParser;

impl EnvParser {
    /// Parse environment variable as string. Blank values count as unset.
    pub fn parse_string(var_name: &str, validator: Option<fn(&str) -> Result<()>>) -> Result<Option<String>> {
        match env::var(var_name) {
            Ok(value) => {
                let trimmed = value.trim().to_string();
                if trimmed.is_empty() {
                    return Ok(None);
                }

                if let Some(validate_fn) = validator {
                    validate_fn(&trimmed)?;
                }

                Ok(Some(trimmed))
            }
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(LyricsLibraryError::Validation(format!(
                "Environment variable {} contains invalid UTF-8",
                var_name
            ))),
        }
    }

    /// Parse environment variable as PathBuf
    pub fn parse_path(var_name: &str, should_exist: bool) -> Result<Option<PathBuf>> {
        let Some(path_str) = Self::parse_string(var_name, None)? else {
            return Ok(None);
        };

        let path = PathBuf::from(path_str);
        if should_exist && !path.exists() {
            return Err(LyricsLibraryError::Validation(format!(
                "Path specified in {} does not exist: {}",
                var_name,
                path.display()
            )));
        }

        Ok(Some(path))
    }

    /// Parse environment variable as u64 with range validation
    pub fn parse_u64(var_name: &str, min: u64, max: u64) -> Result<Option<u64>> {
        Self::parse_number(var_name, min, max)
    }

    /// Parse environment variable as usize with range validation
    pub fn parse_usize(var_name: &str, min: usize, max: usize) -> Result<Option<usize>> {
        Self::parse_number(var_name, min, max)
    }

    fn parse_number<T>(var_name: &str, min: T, max: T) -> Result<Option<T>>
    where
        T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
    {
        let Some(value_str) = Self::parse_string(var_name, None)? else {
            return Ok(None);
        };

        let value = value_str.parse::<T>().map_err(|_| {
            LyricsLibraryError::Validation(format!(
                "Invalid number in {}: '{}'. Must be a positive integer",
                var_name, value_str
            ))
        })?;

        if value < min || value > max {
            return Err(LyricsLibraryError::Validation(format!(
                "Value in {} must be between {} and {}, got {}",
                var_name, min, max, value
            )));
        }

        Ok(Some(value))
    }
}
