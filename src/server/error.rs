use crate::media::{ExtractError, MediaError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

/// Every failure a request can end in. Messages are client-safe; internal
/// detail is logged where the error is created.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("Unauthorized: Invalid API Key")]
    Unauthorized,

    #[error("Could not fetch media. The link may be private or restricted.")]
    ExtractionFailed,

    #[error("Media extraction timed out. Please try again later.")]
    ExtractionTimeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Failed to proxy media")]
    ProxyUpstreamFailure,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ExtractionFailed => StatusCode::FORBIDDEN,
            ApiError::ExtractionTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::ProxyUpstreamFailure | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Extract(ExtractError::Timeout(after)) => {
                warn!("Extraction timed out after {:?}", after);
                ApiError::ExtractionTimeout
            }
            MediaError::Extract(ExtractError::Spawn(e)) => {
                error!("Could not run extractor: {}", e);
                ApiError::Internal
            }
            other => {
                warn!("Extraction failed: {}", other);
                ApiError::ExtractionFailed
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
