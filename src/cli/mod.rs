//! Command Line Interface module
//!
//! - `serve`: run the HTTP server
//! - `track`: save, get and delete tracks directly against the configured backends
//! - `config`: inspect and reset the configuration

pub mod config;
pub mod serve;
pub mod track;
