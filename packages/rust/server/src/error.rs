//! Mapping from handler failures to HTTP responses.
//!
//! Every error body is `{"success": false, "error": "..."}`. Upstream
//! failures are logged in full and answered with a generic message.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use snap2listing_shared::Snap2ListingError;

/// A failed request.
#[derive(Debug)]
pub enum ApiError {
    /// Client input is missing or malformed (400).
    BadRequest(String),
    /// Usage limit reached (403).
    Forbidden(String),
    /// Unknown resource (404).
    NotFound(String),
    /// A dependency failed (500). `public` is what the client sees.
    Internal {
        public: &'static str,
        source: Snap2ListingError,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Map a domain error: validation failures become 400, anything else 500
    /// with `public` as the client-facing message.
    ///
    /// Use as `.map_err(ApiError::from_domain("Failed to ..."))`.
    pub fn from_domain(public: &'static str) -> impl FnOnce(Snap2ListingError) -> Self {
        move |source| match source {
            Snap2ListingError::Validation { message } => Self::BadRequest(message),
            source => Self::Internal { public, source },
        }
    }

    /// Like [`from_domain`](Self::from_domain), but always 500.
    pub fn internal(public: &'static str) -> impl FnOnce(Snap2ListingError) -> Self {
        move |source| Self::Internal { public, source }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal { public, source } => {
                error!(error = %source, "{public}");
                (StatusCode::INTERNAL_SERVER_ERROR, public.to_string())
            }
        };

        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Reject blank required fields with a message naming the field.
pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::BadRequest(format!("{field} is required")))
    } else {
        Ok(trimmed)
    }
}
