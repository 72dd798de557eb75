use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP clients as `{"detail": ...}` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Service not initialized")]
    NotReady,
    #[error("{0}")]
    BadRequest(String),
    #[error("Generation failed: {0}")]
    Generation(kamado::Error),
}

#[derive(Serialize)]
struct Detail {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<kamado::Error> for ApiError {
    fn from(e: kamado::Error) -> Self {
        match e {
            kamado::Error::NotReady => ApiError::NotReady,
            other => ApiError::Generation(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(Detail {
            detail: self.to_string(),
        });
        (self.status(), body).into_response()
    }
}
