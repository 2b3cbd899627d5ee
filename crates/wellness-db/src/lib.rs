//! SQLite persistence for accounts and wellness session records.

pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Context, Result};
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

pub use queries::PublishedFilter;

/// Single shared connection. Every query goes through [`Database::with_conn`].
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if missing) the database file and bring its schema
    /// up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {}", path.display()))?;

        // WAL so the public listing can read while a save is writing
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let db = Self::prepare(conn)?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database, gone when dropped.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self::prepare(Connection::open_in_memory()?)?;
        debug!("In-memory database ready");
        Ok(db)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        register_functions(&conn)?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// `fold_case(text)`: Unicode lowercase, matching how tags are normalized.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_database_keeps_data_across_reopen() {
        let dir = std::env::temp_dir().join(format!("wellness_db_test_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reopen.db");
        let _ = std::fs::remove_file(&path);

        {
            let db = Database::open(&path).unwrap();
            assert!(
                db.create_user("u1", "ana@example.com", "hash", "2024-01-01T00:00:00Z")
                    .unwrap()
            );
        }

        let db = Database::open(&path).unwrap();
        let user = db.get_user_by_email("ana@example.com").unwrap().unwrap();
        assert_eq!(user.id, "u1");

        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
