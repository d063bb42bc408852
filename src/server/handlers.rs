use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{ApiError, ErrorBody};
use super::AppState;
use crate::core::infrastructure::CacheStats;
use crate::core::models::Track;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct LyricsQuery {
    pub artist: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub cache: CacheStats,
}

/// A cancellation token that fires when the handler future is dropped,
/// i.e. when the client goes away or the request deadline passes.
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// POST /lyrics
pub async fn save_lyrics(
    State(state): State<AppState>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Track>), ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!(op = "save_lyrics", "Failed to decode request body: {}", e);
        ApiError::bad_request("invalid request")
    })?;
    debug!(op = "save_lyrics", ?request, "Request body decoded");

    let (Some(artist), Some(title)) = (non_blank(Some(&request.artist)), non_blank(Some(&request.title))) else {
        return Err(ApiError::bad_request("artist and title are required"));
    };

    info!(op = "save_lyrics", artist, title, "Saving lyrics");
    let (cancel, _guard) = request_token();
    let track = state.service.save(artist, title, &cancel).await?;

    Ok((StatusCode::CREATED, Json(track)))
}

/// GET /lyrics?artist=..&title=..
///
/// Without a title, every stored track of the artist is returned.
pub async fn get_lyrics(
    State(state): State<AppState>,
    query: Result<Query<LyricsQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| {
        warn!(op = "get_lyrics", "Invalid query: {}", e);
        ApiError::bad_request("invalid request")
    })?;

    let Some(artist) = non_blank(query.artist.as_deref()) else {
        return Err(ApiError::bad_request("artist is required"));
    };

    let (cancel, _guard) = request_token();

    match non_blank(query.title.as_deref()) {
        Some(title) => {
            info!(op = "get_lyrics", artist, title, "Getting lyrics");
            let track = state.service.track(artist, title, &cancel).await?;
            Ok(Json(track).into_response())
        }
        None => {
            info!(op = "get_lyrics", artist, "Getting artist's tracks");
            let tracks = state.service.artist_tracks(artist, &cancel).await?;
            Ok(Json(tracks).into_response())
        }
    }
}

/// DELETE /lyrics/{uuid}
pub async fn delete_lyrics(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<StatusBody>, ApiError> {
    info!(op = "delete_lyrics", uuid, "Deleting track");

    let (cancel, _guard) = request_token();
    state.service.delete(&uuid, &cancel).await?;

    Ok(Json(StatusBody { status: "OK" }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Response {
    match tokio::time::timeout(PING_TIMEOUT, state.service.ping()).await {
        Ok(Ok(())) => Json(HealthBody {
            status: "OK",
            cache: state.service.cache_stats(),
        })
        .into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Storage health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody::new("storage unavailable"))).into_response()
        }
        Err(_) => {
            error!("Storage health check timed out");
            (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody::new("storage unavailable"))).into_response()
        }
    }
}

/// Rejects requests up front while the store does not answer `ping`.
pub async fn require_storage(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match tokio::time::timeout(PING_TIMEOUT, state.service.ping()).await {
        Ok(Ok(())) => next.run(request).await,
        Ok(Err(e)) => {
            error!(error = %e, "Storage health check failed");
            ApiError::unavailable("internal error").into_response()
        }
        Err(_) => {
            error!("Storage health check timed out");
            ApiError::unavailable("internal error").into_response()
        }
    }
}
