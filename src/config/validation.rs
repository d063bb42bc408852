use std::net::SocketAddr;
use std::path::Path;
use url::Url;
use crate::error::{Result, LyricsLibraryError};

/// Centralized configuration validation utilities
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate a URL string
    pub fn validate_url(url: &str, field_name: &str) -> Result<()> {
        Url::parse(url).map_err(|e| {
            LyricsLibraryError::Validation(format!("Invalid {} URL '{}': {}", field_name, url, e))
        })?;
        Ok(())
    }

    /// Validate an http(s) endpoint
    pub fn validate_http_url(url: &str, field_name: &str) -> Result<()> {
        Self::validate_url(url, field_name)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(LyricsLibraryError::Validation(format!(
                "{} must be an http:// or https:// URL, got: {}",
                field_name, url
            )));
        }
        Ok(())
    }

    /// Validate a `host:port` listen address
    pub fn validate_socket_address(address: &str, field_name: &str) -> Result<()> {
        address.parse::<SocketAddr>().map_err(|e| {
            LyricsLibraryError::Validation(format!("Invalid {} '{}': {}", field_name, address, e))
        })?;
        Ok(())
    }

    /// Validate numeric range
    pub fn validate_range<T>(value: T, min: T, max: T, field_name: &str) -> Result<()>
    where
        T: PartialOrd + std::fmt::Display + Copy,
    {
        if value < min || value > max {
            return Err(LyricsLibraryError::Validation(format!(
                "{} must be between {} and {}, got {}",
                field_name, min, max, value
            )));
        }
        Ok(())
    }

    /// Validate Redis URL format
    pub fn validate_redis_url(url: &str) -> Result<()> {
        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(LyricsLibraryError::Validation(format!(
                "Redis URL must start with 'redis://' or 'rediss://', got: {}",
                url
            )));
        }

        Self::validate_url(url, "Redis")?;
        Ok(())
    }

    /// Validate database file extension
    pub fn validate_db_path(path: &Path) -> Result<()> {
        match path.extension() {
            Some(ext) if ext == "db" || ext == "sqlite" || ext == "sqlite3" => Ok(()),
            _ => Err(LyricsLibraryError::Validation(format!(
                "Database file should have a .db, .sqlite, or .sqlite3 extension, got: {}",
                path.display()
            ))),
        }
    }
}
