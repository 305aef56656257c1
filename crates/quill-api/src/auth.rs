use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use quill_types::api::{
    AccessTokenResponse, Claims, LoginRequest, RefreshTokenRequest, RegisterRequest,
    TokenPairResponse, TokenType, UserResponse,
};

use crate::AppState;
use crate::error::{ApiError, FieldErrors, MSG_BLANK, MSG_REQUIRED, push_error};

const MSG_USERNAME_TAKEN: &str = "A user with that username already exists.";

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::MalformedBody)?;

    // Aggregate all field failures into one response
    let mut errors = FieldErrors::new();

    let username = match req.username.as_deref() {
        None => {
            push_error(&mut errors, "username", MSG_REQUIRED);
            None
        }
        Some("") => {
            push_error(&mut errors, "username", MSG_BLANK);
            None
        }
        Some(u) => {
            if state.db.get_user_by_username(u)?.is_some() {
                push_error(&mut errors, "username", MSG_USERNAME_TAKEN);
            }
            Some(u)
        }
    };

    let password = match req.password.as_deref() {
        None => {
            push_error(&mut errors, "password", MSG_REQUIRED);
            None
        }
        Some("") => {
            push_error(&mut errors, "password", MSG_BLANK);
            None
        }
        Some(p) => Some(p),
    };

    let email = req.email.unwrap_or_default();
    if !email.is_empty() && !email.contains('@') {
        push_error(&mut errors, "email", "Enter a valid email address.");
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    // Both are Some once validation passed
    let (username, password) = (username.unwrap_or_default(), password.unwrap_or_default());

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();
    let created = state
        .db
        .create_user(&user_id.to_string(), username, &email, &password_hash)?;
    if !created {
        // Lost the race to a concurrent registration; same error as the
        // up-front check
        let mut errors = FieldErrors::new();
        push_error(&mut errors, "username", MSG_USERNAME_TAKEN);
        return Err(ApiError::Validation(errors));
    }

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user_id,
            username: username.to_string(),
            email,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenPairResponse>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::MalformedBody)?;

    // Missing field, unknown user and wrong password all collapse into one
    // answer; nothing leaks which part failed
    let (Some(username), Some(password)) = (req.username, req.password) else {
        return Err(invalid_credentials());
    };

    let user = state
        .db
        .get_user_by_username(&username)?
        .ok_or_else(invalid_credentials)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("corrupt password hash for '{}': {}", user.username, e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| invalid_credentials())?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let (refresh, access) = state.tokens.issue_pair(user_id, &user.username)?;
    Ok(Json(TokenPairResponse { refresh, access }))
}

pub async fn logout(
    State(state): State<AppState>,
    body: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    // Contract: every failure here is the same empty-body 400, and token
    // parsing errors never escape as server errors
    let token = body
        .ok()
        .and_then(|Json(req)| req.refresh)
        .ok_or(ApiError::BadRequest)?;

    let claims = state
        .tokens
        .verify(&token, TokenType::Refresh)
        .ok_or(ApiError::BadRequest)?;

    let jti = claims.jti.to_string();
    if state.db.is_token_blacklisted(&jti)? {
        return Err(ApiError::BadRequest);
    }

    state
        .db
        .blacklist_token(&jti, &claims.sub.to_string(), &expiry_rfc3339(&claims))?;

    Ok(StatusCode::RESET_CONTENT)
}

pub async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::MalformedBody)?;

    let token = req.refresh.ok_or_else(|| {
        let mut errors = FieldErrors::new();
        push_error(&mut errors, "refresh", MSG_REQUIRED);
        ApiError::Validation(errors)
    })?;

    let claims = state
        .tokens
        .verify(&token, TokenType::Refresh)
        .ok_or(ApiError::Unauthorized("Token is invalid or expired."))?;

    if state.db.is_token_blacklisted(&claims.jti.to_string())? {
        return Err(ApiError::Unauthorized("Token is blacklisted."));
    }

    // The refresh token is not rotated; only a new access token is minted
    let access = state
        .tokens
        .issue(claims.sub, &claims.username, TokenType::Access)?;
    Ok(Json(AccessTokenResponse { access }))
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials.")
}

/// Blacklist rows keep the token's expiry so an operator can prune dead
/// entries out-of-band.
fn expiry_rfc3339(claims: &Claims) -> String {
    chrono::DateTime::from_timestamp(claims.exp as i64, 0)
        .unwrap_or_default()
        .to_rfc3339()
}
