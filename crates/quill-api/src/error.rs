use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Field-level validation messages for 400 responses. A BTreeMap keeps the
/// field order deterministic in the serialized body.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_BLANK: &str = "This field may not be blank.";

pub fn push_error(errors: &mut FieldErrors, field: &'static str, message: &str) {
    errors.entry(field).or_default().push(message.to_string());
}

/// Every handler failure resolves into one of these at the boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("malformed request body")]
    MalformedBody,
    /// Logout's blanket failure: 400 with an empty body.
    #[error("bad request")]
    BadRequest,
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    /// Ownership failures report identically to absence.
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(fields) => {
                (StatusCode::BAD_REQUEST, Json(fields)).into_response()
            }
            ApiError::MalformedBody => (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "Malformed request body."})),
            )
                .into_response(),
            ApiError::BadRequest => StatusCode::BAD_REQUEST.into_response(),
            ApiError::Unauthorized(detail) => {
                (StatusCode::UNAUTHORIZED, Json(json!({"detail": detail}))).into_response()
            }
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response()
            }
            ApiError::Internal(e) => {
                // Log the chain, disclose nothing
                error!("internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": "Internal server error."})),
                )
                    .into_response()
            }
        }
    }
}
