use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use quill_db::NoteOrder;
use quill_db::models::NoteRow;
use quill_types::api::{Claims, NoteRequest, NoteResponse};

use crate::AppState;
use crate::error::{ApiError, FieldErrors, MSG_BLANK, MSG_REQUIRED, push_error};

const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
}

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<NoteResponse>>, ApiError> {
    let order = parse_ordering(query.ordering.as_deref());
    let owner = claims.sub.to_string();

    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || {
        db.db.list_notes(&owner, query.search.as_deref(), order)
    })
    .await
    .map_err(join_err)??;

    Ok(Json(rows.into_iter().map(note_response).collect()))
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|_| ApiError::MalformedBody)?;
    validate_fields(&req, true)?;
    // Validation guarantees both are present; any client-supplied id,
    // owner or timestamps never even reach this point
    let title = req.title.unwrap_or_default();
    let content = req.content.unwrap_or_default();

    let id = Uuid::new_v4();
    // Truncated to the stored precision so this response matches what any
    // later read returns
    let now = now_micros();

    let db = state.clone();
    let row_id = id.to_string();
    let owner_id = claims.sub.to_string();
    let row_title = title.clone();
    let row_content = content.clone();
    let row_stamp = stamp(now);
    tokio::task::spawn_blocking(move || {
        db.db
            .create_note(&row_id, &owner_id, &row_title, &row_content, &row_stamp)
    })
    .await
    .map_err(join_err)??;

    // Response built from what was just stamped; no re-query
    Ok((
        StatusCode::CREATED,
        Json(NoteResponse {
            id,
            title,
            content,
            created_at: now,
            updated_at: now,
            owner: claims.username,
        }),
    ))
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note_id = parse_note_id(&id)?;
    let owner = claims.sub.to_string();

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_note(&owner, &note_id))
        .await
        .map_err(join_err)??
        .ok_or(ApiError::NotFound)?;

    Ok(Json(note_response(row)))
}

pub async fn update_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    body: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<Json<NoteResponse>, ApiError> {
    apply_update(state, claims, id, body, true).await
}

pub async fn patch_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    body: Result<Json<NoteRequest>, JsonRejection>,
) -> Result<Json<NoteResponse>, ApiError> {
    apply_update(state, claims, id, body, false).await
}

/// Shared by PUT (all fields required) and PATCH (any subset, including the
/// empty patch, which still refreshes `updated_at`).
async fn apply_update(
    state: AppState,
    claims: Claims,
    id: String,
    body: Result<Json<NoteRequest>, JsonRejection>,
    require_all: bool,
) -> Result<Json<NoteResponse>, ApiError> {
    let note_id = parse_note_id(&id)?;
    let owner = claims.sub.to_string();

    // Ownership before validation: another user's note must 404 even when
    // the body is invalid
    {
        let db = state.clone();
        let owner = owner.clone();
        let note_id = note_id.clone();
        tokio::task::spawn_blocking(move || db.db.get_note(&owner, &note_id))
            .await
            .map_err(join_err)??
            .ok_or(ApiError::NotFound)?;
    }

    let Json(req) = body.map_err(|_| ApiError::MalformedBody)?;
    validate_fields(&req, require_all)?;

    let now_stamp = stamp(now_micros());
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || {
        db.db.update_note(
            &owner,
            &note_id,
            req.title.as_deref(),
            req.content.as_deref(),
            &now_stamp,
        )
    })
    .await
    .map_err(join_err)??
    // Deleted between the check and the update; same outward shape
    .ok_or(ApiError::NotFound)?;

    Ok(Json(note_response(row)))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let note_id = parse_note_id(&id)?;
    let owner = claims.sub.to_string();

    let db = state.clone();
    let deleted = tokio::task::spawn_blocking(move || db.db.delete_note(&owner, &note_id))
        .await
        .map_err(join_err)??;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// `created_at` / `-created_at` / `updated_at` / `-updated_at`; anything
/// else (or nothing) falls back to most-recently-updated first.
fn parse_ordering(raw: Option<&str>) -> NoteOrder {
    match raw {
        Some("created_at") => NoteOrder::CreatedAtAsc,
        Some("-created_at") => NoteOrder::CreatedAtDesc,
        Some("updated_at") => NoteOrder::UpdatedAtAsc,
        _ => NoteOrder::UpdatedAtDesc,
    }
}

/// A path id that does not parse as a UUID cannot name a stored note, so it
/// reports as absent rather than malformed.
fn parse_note_id(raw: &str) -> Result<String, ApiError> {
    raw.parse::<Uuid>()
        .map(|id| id.to_string())
        .map_err(|_| ApiError::NotFound)
}

fn validate_fields(req: &NoteRequest, require_all: bool) -> Result<(), ApiError> {
    let mut errors = FieldErrors::new();

    match req.title.as_deref() {
        None if require_all => push_error(&mut errors, "title", MSG_REQUIRED),
        Some("") => push_error(&mut errors, "title", MSG_BLANK),
        Some(t) if t.chars().count() > MAX_TITLE_CHARS => push_error(
            &mut errors,
            "title",
            "Ensure this field has no more than 200 characters.",
        ),
        _ => {}
    }

    // Content may be empty, only its presence is checked
    if require_all && req.content.is_none() {
        push_error(&mut errors, "content", MSG_REQUIRED);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

fn note_response(row: NoteRow) -> NoteResponse {
    let created_at = parse_timestamp(&row.created_at, &row.id);
    let updated_at = parse_timestamp(&row.updated_at, &row.id);
    NoteResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt note id '{}': {}", row.id, e);
            Uuid::default()
        }),
        title: row.title,
        content: row.content,
        created_at,
        updated_at,
        owner: row.owner_username,
    }
}

fn parse_timestamp(raw: &str, note_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on note '{}': {}", raw, note_id, e);
        DateTime::default()
    })
}

fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

/// Fixed-width RFC 3339 so lexicographic SQL ordering stays chronological.
fn stamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn join_err(e: tokio::task::JoinError) -> anyhow::Error {
    anyhow::anyhow!("spawn_blocking join error: {}", e)
}
