//! Database schema migrations for studypet.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);
    if current_version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    debug!(version, "schema migrated");
    Ok(())
}

/// Migration v1: pet record, session history, evolution log and the kv store.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS pet (
            id              INTEGER PRIMARY KEY CHECK (id = 1),
            pet_name        TEXT NOT NULL,
            pet_kind        TEXT NOT NULL,
            stage_level     INTEGER NOT NULL DEFAULT 1,
            progress_points INTEGER NOT NULL DEFAULT 0,
            experience      INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS session_history (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id       TEXT NOT NULL,
            session_duration INTEGER NOT NULL,
            elapsed          INTEGER NOT NULL,
            points_awarded   INTEGER NOT NULL,
            outcome          TEXT NOT NULL,
            multiplier       REAL NOT NULL DEFAULT 1.0,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS evolutions (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            from_stage          INTEGER NOT NULL,
            to_stage            INTEGER NOT NULL,
            points_at_evolution INTEGER NOT NULL,
            created_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_session_history_created_at
            ON session_history(created_at);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}
