//! Lyrics retrieval and translation service
//!
//! Tracks are fetched from a lyrics provider, translated line by line,
//! persisted in SQLite and served through a cache-aside read path.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod server;
pub mod services;
pub mod signal_handler;
pub mod utils;
