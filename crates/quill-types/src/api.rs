use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Discriminates the two halves of a token pair. Only access tokens
/// authorize API requests; only refresh tokens can be exchanged or
/// blacklisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims shared by token issuance (auth handlers) and verification
/// (the bearer middleware). Canonical definition lives here in quill-types
/// to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub token_type: TokenType,
    pub jti: Uuid,
    pub exp: usize,
    pub iat: usize,
}

// -- Auth --

/// Fields are optional at the parse layer so that missing ones surface as
/// field-level validation errors rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
}

/// Public identity of a user. The password hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenPairResponse {
    pub refresh: String,
    pub access: String,
}

/// Body shape shared by logout and refresh, both of which take a refresh
/// token rather than an Authorization header.
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

// -- Notes --

/// Write payload for create, full update and partial update; which fields
/// are required depends on the operation. Read-only fields supplied by the
/// client (`id`, `owner`, timestamps) are simply ignored.
#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owner's username, read-only.
    pub owner: String,
}
