//! Database migrations for hound.
//!
//! Each migration upgrades the schema by one version and runs when the
//! database is opened.

use rusqlite::Connection;

use crate::error::HoundError;

/// Current schema version.
const CURRENT_VERSION: i32 = 1;

/// Get the current schema version from the database.
///
/// Returns 0 for a new database.
pub fn get_version(conn: &Connection) -> Result<i32, HoundError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| HoundError::Database(format!("Failed to get schema version: {e}")))
}

fn set_version(conn: &Connection, version: i32) -> Result<(), HoundError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| HoundError::Database(format!("Failed to set schema version: {e}")))
}

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<(), HoundError> {
    let current = get_version(conn)?;

    for version in (current + 1)..=CURRENT_VERSION {
        run_migration(conn, version)?;
        set_version(conn, version)?;
    }

    Ok(())
}

fn run_migration(conn: &Connection, version: i32) -> Result<(), HoundError> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(HoundError::Database(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: finished sessions, steps kept as a JSON array.
fn migrate_v1(conn: &Connection) -> Result<(), HoundError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            target_sec INTEGER NOT NULL,
            success TEXT NOT NULL,
            comment TEXT NOT NULL DEFAULT '',
            started_at TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            steps_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
        ",
    )
    .map_err(|e| HoundError::Database(format!("Migration v1 failed: {e}")))
}
