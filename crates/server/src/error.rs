//! HTTP mapping of worker errors for the control routes.
//!
//! Bodies are `{"code": ..., "message": ...}` using the stable codes of
//! [`dashcache_core::Error`].

use axum::Json;
use axum::response::{IntoResponse, Response};
use dashcache_client::fetch::UrlError;
use dashcache_core::Error;
use http::StatusCode;
use serde::Serialize;

/// Errors surfaced by the dashcache HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error(transparent)]
    Worker(#[from] Error),

    /// Request target could not be turned into an absolute URL.
    #[error("INVALID_URL: {0}")]
    BadTarget(#[from] UrlError),

    /// Request body exceeded the configured limit.
    #[error("BODY_TOO_LARGE: request body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl WebError {
    pub fn code(&self) -> &'static str {
        match self {
            WebError::Worker(e) => e.code(),
            WebError::BadTarget(_) => "INVALID_URL",
            WebError::BodyTooLarge(_) => "BODY_TOO_LARGE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Worker(e) => match e {
                Error::InvalidInput(_) | Error::InvalidUrl(_) | Error::InvalidMessage(_) => StatusCode::BAD_REQUEST,
                Error::ClientGone(_) => StatusCode::GONE,
                Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                e if e.is_network() => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            WebError::BadTarget(_) => StatusCode::BAD_REQUEST,
            WebError::BodyTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }
        (status, Json(ErrorBody { code: self.code(), message: self.to_string() })).into_response()
    }
}
