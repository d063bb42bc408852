//! Utility modules for common functionality
//!
//! - `logging`: Logging configuration and setup
//! - `dedup`: Coalescing of concurrent operations that share a key

pub mod dedup;
pub mod logging;
