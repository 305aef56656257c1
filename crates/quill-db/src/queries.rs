use crate::Database;
use crate::models::{NoteRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

/// Permitted orderings for note listings. Only these static fragments are
/// ever spliced into SQL; the ordering parameter itself never is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteOrder {
    CreatedAtAsc,
    CreatedAtDesc,
    UpdatedAtAsc,
    #[default]
    UpdatedAtDesc,
}

impl NoteOrder {
    fn sql(self) -> &'static str {
        match self {
            NoteOrder::CreatedAtAsc => "n.created_at ASC",
            NoteOrder::CreatedAtDesc => "n.created_at DESC",
            NoteOrder::UpdatedAtAsc => "n.updated_at ASC",
            NoteOrder::UpdatedAtDesc => "n.updated_at DESC",
        }
    }
}

impl Database {
    // -- Users --

    /// Insert a new user. Returns Ok(false) when the username is already
    /// taken, so the UNIQUE constraint doubles as the race-free duplicate
    /// check behind the handler's friendlier pre-check.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, username, email, password, created_at
                     FROM users WHERE username = ?1",
                )?
                .query_row([username], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        password: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    /// Administrative removal. Owned notes go with the user via the
    /// ON DELETE CASCADE constraint.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Notes --

    /// Insert a note with both timestamps set to the same instant.
    pub fn create_note(
        &self,
        id: &str,
        owner_id: &str,
        title: &str,
        content: &str,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notes (id, owner_id, title, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, owner_id, title, content, now],
            )?;
            Ok(())
        })
    }

    pub fn get_note(&self, owner_id: &str, note_id: &str) -> Result<Option<NoteRow>> {
        self.with_conn(|conn| query_note(conn, owner_id, note_id))
    }

    /// All notes owned by `owner_id`, optionally filtered to rows whose
    /// title or content contains `search` (case-insensitive, literal —
    /// LIKE wildcards in the term are escaped).
    pub fn list_notes(
        &self,
        owner_id: &str,
        search: Option<&str>,
        order: NoteOrder,
    ) -> Result<Vec<NoteRow>> {
        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT n.id, n.title, n.content, n.created_at, n.updated_at, u.username
                 FROM notes n
                 JOIN users u ON n.owner_id = u.id
                 WHERE n.owner_id = ?1",
            );

            let pattern = search.filter(|s| !s.is_empty()).map(like_pattern);
            if pattern.is_some() {
                sql.push_str(
                    " AND (n.title LIKE ?2 ESCAPE '\\' OR n.content LIKE ?2 ESCAPE '\\')",
                );
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(order.sql());

            let mut stmt = conn.prepare(&sql)?;
            let rows = match &pattern {
                Some(p) => stmt.query_map(params![owner_id, p], map_note_row)?,
                None => stmt.query_map(params![owner_id], map_note_row)?,
            }
            .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Apply a (possibly partial) update and return the fresh row. None
    /// when the note does not exist or belongs to someone else — the two
    /// cases are indistinguishable on purpose. A NULL field keeps its
    /// stored value; `updated_at` is always refreshed.
    pub fn update_note(
        &self,
        owner_id: &str,
        note_id: &str,
        title: Option<&str>,
        content: Option<&str>,
        updated_at: &str,
    ) -> Result<Option<NoteRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE notes
                 SET title = COALESCE(?3, title),
                     content = COALESCE(?4, content),
                     updated_at = ?5
                 WHERE id = ?1 AND owner_id = ?2",
                params![note_id, owner_id, title, content, updated_at],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_note(conn, owner_id, note_id)
        })
    }

    pub fn delete_note(&self, owner_id: &str, note_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notes WHERE id = ?1 AND owner_id = ?2",
                params![note_id, owner_id],
            )?;
            Ok(deleted > 0)
        })
    }

    // -- Token blacklist --

    pub fn blacklist_token(&self, jti: &str, user_id: &str, expires_at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO token_blacklist (jti, user_id, expires_at)
                 VALUES (?1, ?2, ?3)",
                params![jti, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn is_token_blacklisted(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM token_blacklist WHERE jti = ?1",
                    [jti],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }
}

fn query_note(conn: &Connection, owner_id: &str, note_id: &str) -> Result<Option<NoteRow>> {
    let row = conn
        .prepare(
            "SELECT n.id, n.title, n.content, n.created_at, n.updated_at, u.username
             FROM notes n
             JOIN users u ON n.owner_id = u.id
             WHERE n.id = ?1 AND n.owner_id = ?2",
        )?
        .query_row(params![note_id, owner_id], map_note_row)
        .optional()?;
    Ok(row)
}

fn map_note_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        owner_username: row.get(5)?,
    })
}

/// Wrap a search term in `%` wildcards, escaping any `%`, `_` or `\` it
/// contains so they only match literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, username: &str) -> String {
        let id = Uuid::new_v4().to_string();
        assert!(db.create_user(&id, username, "", "argon2-hash").unwrap());
        id
    }

    fn add_note(db: &Database, owner_id: &str, title: &str, content: &str, now: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_note(&id, owner_id, title, content, now).unwrap();
        id
    }

    #[test]
    fn create_and_fetch_user() {
        let db = test_db();
        let id = add_user(&db, "alice");

        let row = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.username, "alice");
        assert_eq!(row.password, "argon2-hash");

        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = test_db();
        add_user(&db, "alice");

        let taken = db
            .create_user(&Uuid::new_v4().to_string(), "alice", "", "other-hash")
            .unwrap();
        assert!(!taken);

        // The original user is untouched
        let row = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.password, "argon2-hash");
    }

    #[test]
    fn note_crud_roundtrip() {
        let db = test_db();
        let owner = add_user(&db, "alice");
        let id = add_note(&db, &owner, "Shopping", "milk, eggs", "2026-01-01T10:00:00+00:00");

        let row = db.get_note(&owner, &id).unwrap().unwrap();
        assert_eq!(row.title, "Shopping");
        assert_eq!(row.content, "milk, eggs");
        assert_eq!(row.created_at, row.updated_at);
        assert_eq!(row.owner_username, "alice");

        // Partial update: content untouched, updated_at refreshed
        let row = db
            .update_note(&owner, &id, Some("Groceries"), None, "2026-01-01T11:00:00+00:00")
            .unwrap()
            .unwrap();
        assert_eq!(row.title, "Groceries");
        assert_eq!(row.content, "milk, eggs");
        assert_eq!(row.created_at, "2026-01-01T10:00:00+00:00");
        assert_eq!(row.updated_at, "2026-01-01T11:00:00+00:00");

        assert!(db.delete_note(&owner, &id).unwrap());
        assert!(!db.delete_note(&owner, &id).unwrap());
        assert!(db.get_note(&owner, &id).unwrap().is_none());
    }

    #[test]
    fn notes_are_owner_scoped() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        let id = add_note(&db, &alice, "Secret", "alice only", "2026-01-01T10:00:00+00:00");

        assert!(db.get_note(&bob, &id).unwrap().is_none());
        assert!(
            db.update_note(&bob, &id, Some("stolen"), None, "2026-01-01T11:00:00+00:00")
                .unwrap()
                .is_none()
        );
        assert!(!db.delete_note(&bob, &id).unwrap());
        assert!(db.list_notes(&bob, None, NoteOrder::default()).unwrap().is_empty());

        // Alice's note survived all of it
        let row = db.get_note(&alice, &id).unwrap().unwrap();
        assert_eq!(row.title, "Secret");
    }

    #[test]
    fn search_matches_title_and_content_case_insensitively() {
        let db = test_db();
        let owner = add_user(&db, "alice");
        add_note(&db, &owner, "Shopping", "milk, eggs", "2026-01-01T10:00:00+00:00");
        add_note(&db, &owner, "Ideas", "write more rust", "2026-01-01T10:00:01+00:00");

        let hits = db.list_notes(&owner, Some("MILK"), NoteOrder::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Shopping");

        let hits = db.list_notes(&owner, Some("ideas"), NoteOrder::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Ideas");

        assert!(db.list_notes(&owner, Some("zzz"), NoteOrder::default()).unwrap().is_empty());

        // Empty term means no filter
        assert_eq!(db.list_notes(&owner, Some(""), NoteOrder::default()).unwrap().len(), 2);
        assert_eq!(db.list_notes(&owner, None, NoteOrder::default()).unwrap().len(), 2);
    }

    #[test]
    fn search_wildcards_match_literally() {
        let db = test_db();
        let owner = add_user(&db, "alice");
        add_note(&db, &owner, "Progress", "100% done", "2026-01-01T10:00:00+00:00");
        add_note(&db, &owner, "Snapshot", "100 done", "2026-01-01T10:00:01+00:00");
        add_note(&db, &owner, "env", "FOO_BAR=1", "2026-01-01T10:00:02+00:00");
        add_note(&db, &owner, "envish", "FOOXBAR=1", "2026-01-01T10:00:03+00:00");

        let hits = db.list_notes(&owner, Some("100%"), NoteOrder::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "100% done");

        let hits = db.list_notes(&owner, Some("FOO_BAR"), NoteOrder::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "FOO_BAR=1");
    }

    #[test]
    fn listing_orders_by_requested_field() {
        let db = test_db();
        let owner = add_user(&db, "alice");
        let a = add_note(&db, &owner, "a", "", "2026-01-01T10:00:00+00:00");
        let b = add_note(&db, &owner, "b", "", "2026-01-01T10:00:01+00:00");
        let c = add_note(&db, &owner, "c", "", "2026-01-01T10:00:02+00:00");
        // Touch the oldest note so created and updated orders disagree
        db.update_note(&owner, &a, None, None, "2026-01-01T12:00:00+00:00")
            .unwrap()
            .unwrap();

        let ids = |order: NoteOrder| -> Vec<String> {
            db.list_notes(&owner, None, order)
                .unwrap()
                .into_iter()
                .map(|n| n.id)
                .collect()
        };

        assert_eq!(ids(NoteOrder::CreatedAtAsc), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(ids(NoteOrder::CreatedAtDesc), vec![c.clone(), b.clone(), a.clone()]);
        assert_eq!(ids(NoteOrder::UpdatedAtAsc), vec![b.clone(), c.clone(), a.clone()]);
        // Default ordering: most recently updated first
        assert_eq!(ids(NoteOrder::default()), vec![a, c, b]);
    }

    #[test]
    fn deleting_a_user_cascades_to_their_notes() {
        let db = test_db();
        let alice = add_user(&db, "alice");
        let bob = add_user(&db, "bob");
        add_note(&db, &alice, "one", "", "2026-01-01T10:00:00+00:00");
        add_note(&db, &alice, "two", "", "2026-01-01T10:00:01+00:00");
        let kept = add_note(&db, &bob, "bobs", "", "2026-01-01T10:00:02+00:00");

        assert!(db.delete_user(&alice).unwrap());
        assert!(db.list_notes(&alice, None, NoteOrder::default()).unwrap().is_empty());

        // Unrelated rows survive
        assert!(db.get_note(&bob, &kept).unwrap().is_some());
        assert!(!db.delete_user(&alice).unwrap());
    }

    #[test]
    fn blacklist_roundtrip() {
        let db = test_db();
        let jti = Uuid::new_v4().to_string();

        assert!(!db.is_token_blacklisted(&jti).unwrap());
        db.blacklist_token(&jti, "user-1", "2026-02-01T00:00:00+00:00").unwrap();
        assert!(db.is_token_blacklisted(&jti).unwrap());

        // Re-inserting the same jti is a no-op, not an error
        db.blacklist_token(&jti, "user-1", "2026-02-01T00:00:00+00:00").unwrap();
        assert!(db.is_token_blacklisted(&jti).unwrap());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("milk"), "%milk%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("back\\slash"), "%back\\\\slash%");
    }
}
