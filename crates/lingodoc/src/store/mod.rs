//! Persistent job record store.
//!
//! A shared SQLite database holds one row per job plus the durable queue
//! entries. All access goes through a thread-safe [`Database`] handle;
//! records are read and written exclusively through the [`JobStore`]
//! interface — there is no process-wide in-memory job table.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod error;
pub mod sqlite;

pub use error::StoreError;
pub use sqlite::SqliteJobStore;

use crate::job::JobRecord;

/// Read/update operations over persisted job records.
///
/// Writers follow a read-modify-write discipline: load the full record,
/// mutate it, and [`put`](JobStore::put) the whole thing back. The record's
/// `revision` is the optimistic concurrency token — a `put` whose revision
/// no longer matches the stored row is rejected with
/// [`StoreError::RevisionConflict`] instead of silently losing the other
/// writer's update.
pub trait JobStore: Send + Sync {
    /// Inserts a new record. A duplicate `job_id` is an error.
    fn create(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Loads a record by id.
    fn get(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Full-record overwrite. `record.revision` must match the stored
    /// revision; on success the stored revision is bumped and returned.
    fn put(&self, record: &JobRecord) -> Result<i64, StoreError>;

    /// Non-terminal jobs, newest first.
    fn list_active(&self, limit: usize) -> Result<Vec<JobRecord>, StoreError>;
}

/// A single schema migration, applied at most once.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: "CREATE TABLE jobs (
                job_id            TEXT PRIMARY KEY,
                source_path       TEXT NOT NULL,
                source_lang       TEXT NOT NULL,
                target_lang       TEXT NOT NULL,
                tier              TEXT NOT NULL,
                status            TEXT NOT NULL,
                progress          REAL NOT NULL DEFAULT 0,
                total_pages       INTEGER NOT NULL DEFAULT 0,
                processed_pages   INTEGER NOT NULL DEFAULT 0,
                extraction_output TEXT,
                translation_output TEXT,
                final_output      TEXT,
                error             TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL,
                revision          INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX idx_jobs_status_created ON jobs(status, created_at);",
    },
    Migration {
        version: 2,
        description: "create_queue_entries_table",
        sql: "CREATE TABLE queue_entries (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                stage       TEXT NOT NULL,
                job_id      TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
            );
            CREATE INDEX idx_queue_entries_stage ON queue_entries(stage, id);",
    },
];

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through a
/// `Mutex`, which is fine for SQLite (which serializes writes anyway).
/// WAL mode is enabled for concurrent read performance.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        run_migrations(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }
}

fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  TEXT NOT NULL
        );",
    )?;

    for migration in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = ?1)",
            [migration.version],
            |row| row.get(0),
        )?;
        if applied {
            continue;
        }

        conn.execute_batch(migration.sql)?;
        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        log::debug!(
            "Applied migration {} ({})",
            migration.version,
            migration.description
        );
    }

    Ok(())
}

/// Returns the default database path under the given data directory.
pub fn database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("lingodoc.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_runs_migrations() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert_eq!(count as usize, super::MIGRATIONS.len());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_open_file_db_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        drop(Database::open(&path).unwrap());
        // Reopening must not re-apply migrations.
        let db = Database::open(&path).unwrap();
        db.with_conn(|conn| {
            let count: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert_eq!(count as usize, super::MIGRATIONS.len());
            Ok(())
        })
        .unwrap();
        assert!(path.exists());
    }
}
