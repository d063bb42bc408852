//! HTTP transport over the track service
//!
//! - `POST /lyrics`: fetch, translate and store a track
//! - `GET /lyrics?artist=&title=`: one track, or all of an artist's tracks
//! - `DELETE /lyrics/{uuid}`: remove a stored track
//! - `GET /health`: store liveness and cache statistics

pub mod error;
pub mod handlers;

use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::services::TrackService;
use crate::error::Result;
use crate::signal_handler::shutdown_signal;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TrackService>,
}

pub fn build_app(service: Arc<TrackService>, request_timeout: Duration) -> Router {
    let state = AppState { service };

    let lyrics = Router::new()
        .route("/lyrics", post(handlers::save_lyrics).get(handlers::get_lyrics))
        .route("/lyrics/{uuid}", delete(handlers::delete_lyrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), handlers::require_storage));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(lyrics)
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until a shutdown signal arrives, then wait for background cache
/// writes within the configured shutdown timeout.
pub async fn run(config: &Config, service: Arc<TrackService>) -> Result<()> {
    let listener = TcpListener::bind(&config.server_address).await?;
    info!("Listening on {}", listener.local_addr()?);

    let app = build_app(Arc::clone(&service), config.request_timeout());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, draining background cache writes");
    if !service.drain(config.shutdown_timeout()).await {
        warn!("Some cache writes did not finish before shutdown");
    }

    Ok(())
}
