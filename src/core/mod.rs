//! Core functionality modules
//!
//! This module contains all core business logic organized into logical layers:
//! - `data`: Durable track storage
//! - `services`: Lyrics providers, translators and the track orchestrator
//! - `infrastructure`: The cache in front of the store
//! - `lyrics`: Lyrics text normalization

pub mod data;
pub mod infrastructure;
pub mod lyrics;
pub mod models;
pub mod services;

#[cfg(test)]
pub mod testing;

pub use data::{SqliteStorage, TrackStorage};
pub use models::Track;
