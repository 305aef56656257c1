/// Database row types — these map directly to SQLite rows.
/// Timestamps stay as raw TEXT here; parsing happens at the API boundary.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

pub struct NoteRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub owner_username: String,
}
