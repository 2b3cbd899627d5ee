use crate::Database;
use crate::models::{SessionRow, UserRow};
use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params_from_iter};

const SESSION_COLUMNS: &str =
    "s.id, s.user_id, s.title, s.tags, s.json_file_url, s.status, s.created_at, s.updated_at";

/// Filters for the public listing. Empty `tags` matches everything;
/// otherwise a record must carry at least one of them.
#[derive(Debug, Clone, Default)]
pub struct PublishedFilter {
    pub tags: Vec<String>,
    pub search: Option<String>,
}

impl Database {
    // -- Users --

    /// Returns false when the email is already registered.
    pub fn create_user(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, email, password_hash, created_at),
            );
            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn touch_last_login(&self, id: &str, at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET last_login_at = ?1 WHERE id = ?2", (at, id))?;
            Ok(())
        })
    }

    // -- Sessions --

    pub fn insert_session(&self, row: &SessionRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions
                     (id, user_id, title, tags, json_file_url, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.id,
                    row.user_id,
                    row.title,
                    row.tags,
                    row.json_file_url,
                    row.status,
                    row.created_at,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Overwrite the editable fields of a session owned by `row.user_id`.
    /// Returns the stored row, or `None` when no such owned session exists.
    /// `created_at` on the input is ignored.
    pub fn update_owned_session(&self, row: &SessionRow) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE sessions
                 SET title = ?1, tags = ?2, json_file_url = ?3, status = ?4, updated_at = ?5
                 WHERE id = ?6 AND user_id = ?7",
                rusqlite::params![
                    row.title,
                    row.tags,
                    row.json_file_url,
                    row.status,
                    row.updated_at,
                    row.id,
                    row.user_id,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_owned_session(conn, &row.id, &row.user_id)
        })
    }

    pub fn get_owned_session(&self, id: &str, user_id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| query_owned_session(conn, id, user_id))
    }

    /// Returns false when the session does not exist or belongs to someone else.
    pub fn delete_owned_session(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM sessions WHERE id = ?1 AND user_id = ?2",
                (id, user_id),
            )?;
            Ok(deleted > 0)
        })
    }

    /// A page of the caller's sessions plus the total matching count.
    pub fn list_user_sessions(
        &self,
        user_id: &str,
        status: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<SessionRow>, u64)> {
        let mut clauses = vec!["s.user_id = ?".to_string()];
        let mut params = vec![Value::Text(user_id.to_string())];
        if let Some(status) = status {
            clauses.push("s.status = ?".to_string());
            params.push(Value::Text(status.to_string()));
        }

        self.with_conn(|conn| {
            page_sessions(conn, &clauses, params, "s.updated_at DESC", limit, offset)
        })
    }

    /// A page of published sessions, newest first, plus the total matching count.
    pub fn list_published_sessions(
        &self,
        filter: &PublishedFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<SessionRow>, u64)> {
        let mut clauses = vec!["s.status = 'published'".to_string()];
        let mut params = Vec::new();

        if !filter.tags.is_empty() {
            let placeholders = vec!["?"; filter.tags.len()].join(", ");
            clauses.push(format!(
                "EXISTS (SELECT 1 FROM json_each(s.tags) t WHERE t.value IN ({}))",
                placeholders
            ));
            params.extend(filter.tags.iter().map(|t| Value::Text(t.clone())));
        }

        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(search) = search {
            // SQLite's lower() only folds ASCII; fold_case is registered in Database::prepare
            clauses.push(
                "(instr(fold_case(s.title), ?) > 0
                  OR EXISTS (SELECT 1 FROM json_each(s.tags) t
                             WHERE instr(fold_case(t.value), ?) > 0))"
                    .to_string(),
            );
            let needle = search.to_lowercase();
            params.push(Value::Text(needle.clone()));
            params.push(Value::Text(needle));
        }

        self.with_conn(|conn| {
            page_sessions(conn, &clauses, params, "s.created_at DESC", limit, offset)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password, created_at, last_login_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
                last_login_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_owned_session(conn: &Connection, id: &str, user_id: &str) -> Result<Option<SessionRow>> {
    let sql = format!(
        "SELECT {} FROM sessions s WHERE s.id = ?1 AND s.user_id = ?2",
        SESSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id, user_id], session_from_row).optional()?;
    Ok(row)
}

fn page_sessions(
    conn: &Connection,
    clauses: &[String],
    params: Vec<Value>,
    order_by: &str,
    limit: u32,
    offset: u64,
) -> Result<(Vec<SessionRow>, u64)> {
    let where_sql = clauses.join(" AND ");

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM sessions s WHERE {}", where_sql),
        params_from_iter(params.iter()),
        |r| r.get(0),
    )?;

    let sql = format!(
        "SELECT {} FROM sessions s WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
        SESSION_COLUMNS, where_sql, order_by
    );
    let mut page_params = params;
    page_params.push(Value::Integer(i64::from(limit)));
    page_params.push(Value::Integer(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(page_params.iter()), session_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((rows, total as u64))
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        tags: row.get(3)?,
        json_file_url: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_user(id: &str) -> Database {
        let db = Database::open_in_memory().unwrap();
        let email = format!("{}@example.com", id);
        assert!(db.create_user(id, &email, "hash", "2024-01-01T00:00:00.000000Z").unwrap());
        db
    }

    fn session(
        id: &str,
        user_id: &str,
        title: &str,
        tags: &str,
        status: &str,
        ts: &str,
    ) -> SessionRow {
        SessionRow {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            tags: tags.to_string(),
            json_file_url: "https://example.com/s.json".to_string(),
            status: status.to_string(),
            created_at: ts.to_string(),
            updated_at: ts.to_string(),
        }
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let db = db_with_user("ana");
        let user = db.get_user_by_email("ANA@Example.com").unwrap().unwrap();
        assert_eq!(user.id, "ana");
        assert!(user.last_login_at.is_none());

        db.touch_last_login("ana", "2024-02-02T00:00:00.000000Z").unwrap();
        let user = db.get_user_by_id("ana").unwrap().unwrap();
        assert_eq!(user.last_login_at.as_deref(), Some("2024-02-02T00:00:00.000000Z"));
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = db_with_user("ana");
        assert!(!db.create_user("other", "ana@example.com", "h", "2024").unwrap());
        assert!(!db.create_user("other", "ANA@example.com", "h", "2024").unwrap());
        assert!(db.get_user_by_id("other").unwrap().is_none());
    }

    #[test]
    fn owner_scoping_on_get_update_delete() {
        let db = db_with_user("ana");
        assert!(db.create_user("ben", "ben@example.com", "hash", "2024").unwrap());
        db.insert_session(&session("s1", "ana", "Dawn", "[]", "draft", "2024-01-01T00:00:00Z"))
            .unwrap();

        assert!(db.get_owned_session("s1", "ben").unwrap().is_none());
        assert!(db.get_owned_session("s1", "ana").unwrap().is_some());

        let mut edit = session("s1", "ben", "Hijack", "[]", "draft", "2024-01-02T00:00:00Z");
        assert!(db.update_owned_session(&edit).unwrap().is_none());

        edit.user_id = "ana".to_string();
        edit.title = "Dawn Flow".to_string();
        let stored = db.update_owned_session(&edit).unwrap().unwrap();
        assert_eq!(stored.title, "Dawn Flow");
        assert_eq!(stored.created_at, "2024-01-01T00:00:00Z");
        assert_eq!(stored.updated_at, "2024-01-02T00:00:00Z");

        assert!(!db.delete_owned_session("s1", "ben").unwrap());
        assert!(db.delete_owned_session("s1", "ana").unwrap());
        assert!(db.get_owned_session("s1", "ana").unwrap().is_none());
    }

    #[test]
    fn user_listing_filters_status_and_pages() {
        let db = db_with_user("ana");
        for i in 0..5 {
            let status = if i % 2 == 0 { "draft" } else { "published" };
            let ts = format!("2024-01-0{}T00:00:00Z", i + 1);
            db.insert_session(&session(&format!("s{}", i), "ana", "T", "[]", status, &ts))
                .unwrap();
        }

        let (rows, total) = db.list_user_sessions("ana", None, 2, 0).unwrap();
        assert_eq!(total, 5);
        assert_eq!(rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["s4", "s3"]);

        let (rows, total) = db.list_user_sessions("ana", Some("draft"), 10, 0).unwrap();
        assert_eq!(total, 3);
        assert!(rows.iter().all(|r| r.status == "draft"));

        let (rows, _) = db.list_user_sessions("ana", None, 2, 4).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn published_listing_filters_by_tags_and_search() {
        let db = db_with_user("ana");
        let rows = [
            ("a", "Morning Flow", r#"["yoga","calm"]"#, "published", "2024-01-01T00:00:00Z"),
            ("b", "Box Breathing", r#"["breath"]"#, "published", "2024-01-02T00:00:00Z"),
            ("c", "Hidden Yoga", r#"["yoga"]"#, "draft", "2024-01-03T00:00:00Z"),
        ];
        for (id, title, tags, status, ts) in rows {
            db.insert_session(&session(id, "ana", title, tags, status, ts))
                .unwrap();
        }

        let (rows, total) = db
            .list_published_sessions(&PublishedFilter::default(), 10, 0)
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows[0].id, "b");

        let filter = PublishedFilter {
            tags: vec!["yoga".into(), "sleep".into()],
            search: None,
        };
        let (rows, total) = db.list_published_sessions(&filter, 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "a");

        let filter = PublishedFilter {
            tags: vec![],
            search: Some("BREATH".into()),
        };
        let (rows, _) = db.list_published_sessions(&filter, 10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "b");

        // search also matches tags
        let filter = PublishedFilter {
            tags: vec![],
            search: Some("calm".into()),
        };
        let (rows, _) = db.list_published_sessions(&filter, 10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "a");
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let db = db_with_user("ana");
        db.insert_session(&session(
            "fr",
            "ana",
            "Éveil Matinal",
            r#"["méditation"]"#,
            "published",
            "2024-01-01T00:00:00Z",
        ))
        .unwrap();

        for term in ["éveil", "ÉVEIL", "Éveil", "MÉDITATION", "médit"] {
            let filter = PublishedFilter {
                tags: vec![],
                search: Some(term.to_string()),
            };
            let (_, total) = db.list_published_sessions(&filter, 10, 0).unwrap();
            assert_eq!(total, 1, "search {:?}", term);
        }
    }
}
