use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::engine::TransitionError;

/// User-facing error messages shared across handlers.
pub mod msg {
    pub const LICENSE_NOT_FOUND: &str = "License not found";
    pub const PRODUCT_NOT_FOUND: &str = "Product not found";
    pub const PRODUCT_CODE_TAKEN: &str = "A product with this product_code already exists";
    pub const COUNT_OUT_OF_RANGE: &str = "count must be between 1 and 100";
    pub const DURATION_NOT_POSITIVE: &str = "duration must be at least 1 second";
    pub const SECONDS_NOT_POSITIVE: &str = "seconds must be at least 1";
    pub const NAME_EMPTY: &str = "name cannot be empty";
    pub const PRODUCT_CODE_INVALID: &str = "product_code must be 1-50 characters";
    pub const DESCRIPTION_TOO_LONG: &str = "description must be at most 255 characters";
    pub const KEY_FORMAT: &str = "key must be a license key (XXXX-XXXX-...)";
    pub const HWID_LENGTH: &str = "hwid must be 5-200 characters";
    pub const STATUS_OVERRIDE_INVALID: &str = "status can only be set to active or expired";
    pub const NOTHING_TO_UPDATE: &str = "Provide status and/or description";
}

/// Errors surfaced by handlers and the license store.
///
/// Policy outcomes of a license check are not errors; they are answered with
/// a 200 body by the check handler.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Missing or wrong admin bearer token.
    #[error("admin credentials required")]
    Unauthorized,

    /// Illegal state transition or uniqueness violation.
    #[error("{0}")]
    Conflict(String),

    #[error("sqlite: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-visible detail. Server-side failures are logged, not echoed.
    fn details(&self) -> Option<String> {
        match self {
            AppError::NotFound(m) | AppError::BadRequest(m) | AppError::Conflict(m) => {
                Some(m.clone())
            }
            AppError::Unauthorized => None,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => None,
        }
    }
}

/// JSON body of every non-2xx response outside the check endpoint.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<TransitionError> for AppError {
    fn from(e: TransitionError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error"),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

/// Convert a missing row into a `NotFound` error.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.into()))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
