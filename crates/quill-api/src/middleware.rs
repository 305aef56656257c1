use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use quill_types::api::TokenType;

use crate::AppState;
use crate::error::ApiError;

/// Bearer-token gate for the protected routes. On success the decoded
/// claims ride along as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized(
            "Authentication credentials were not provided.",
        ))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized("Invalid or expired token."))?;

    // Only access tokens authorize requests; a refresh token here is
    // rejected like any other invalid token.
    let claims = state
        .tokens
        .verify(token, TokenType::Access)
        .ok_or(ApiError::Unauthorized("Invalid or expired token."))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
