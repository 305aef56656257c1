use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::{AppState, auth, health, notes};

/// The full routing table. Living here rather than in the binary lets the
/// integration tests serve exactly what production serves.
pub fn build(state: AppState) -> Router {
    let public = Router::new()
        .route("/health/", get(health::health))
        .route("/auth/register/", post(auth::register))
        .route("/auth/login/", post(auth::login))
        .route("/auth/logout/", post(auth::logout))
        .route("/auth/refresh/", post(auth::refresh));

    let protected = Router::new()
        .route("/notes/", get(notes::list_notes).post(notes::create_note))
        .route(
            "/notes/{id}/",
            get(notes::get_note)
                .put(notes::update_note)
                .patch(notes::patch_note)
                .delete(notes::delete_note),
        )
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new().merge(public).merge(protected).with_state(state)
}
