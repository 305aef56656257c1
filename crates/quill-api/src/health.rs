use axum::Json;
use serde_json::{Value, json};

/// Liveness probe: no auth, no side effects.
pub async fn health() -> Json<Value> {
    Json(json!({"message": "Server is up!"}))
}
