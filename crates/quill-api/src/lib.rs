pub mod auth;
pub mod error;
pub mod health;
pub mod middleware;
pub mod notes;
pub mod router;
pub mod tokens;

use std::sync::Arc;

use quill_db::Database;

use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
}
