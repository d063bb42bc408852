use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::error::TrackError;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: "Error",
            error: error.into(),
        }
    }
}

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Track(err) => match err {
                TrackError::LyricsNotFound | TrackError::TrackNotFound | TrackError::ArtistTracksNotFound => {
                    StatusCode::NOT_FOUND
                }
                TrackError::InvalidUuid | TrackError::TranslationFailed => StatusCode::BAD_REQUEST,
                TrackError::Provider(_) | TrackError::Translator(_) => StatusCode::BAD_GATEWAY,
                TrackError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                TrackError::Cancelled => StatusCode::REQUEST_TIMEOUT,
            },
        }
    }

    /// Message shown to the client. Backend details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Track(TrackError::Provider(_)) | ApiError::Track(TrackError::Translator(_)) => {
                "upstream service error".to_string()
            }
            ApiError::Track(TrackError::Storage(_)) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        }

        (status, Json(ErrorBody::new(self.public_message()))).into_response()
    }
}
