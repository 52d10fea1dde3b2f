//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: recorder tables
    r#"
    CREATE TABLE IF NOT EXISTS apps (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        path             TEXT NOT NULL UNIQUE,
        name             TEXT NOT NULL,
        icon             TEXT NOT NULL DEFAULT '',
        version          JSON
    );

    CREATE TABLE IF NOT EXISTS focus_records (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        app_id           INTEGER NOT NULL REFERENCES apps(id),
        focus_at         INTEGER NOT NULL,
        blur_at          INTEGER NOT NULL CHECK (blur_at >= focus_at)
    );

    CREATE INDEX IF NOT EXISTS idx_focus_records_focus ON focus_records(focus_at);
    CREATE INDEX IF NOT EXISTS idx_focus_records_blur ON focus_records(blur_at);

    CREATE TABLE IF NOT EXISTS app_config (
        id               INTEGER PRIMARY KEY CHECK (id = 1),
        value            JSON NOT NULL,
        updated_at       INTEGER NOT NULL
    );
    "#,
    // Version 2: client-side durable cache of resolved app details
    r#"
    CREATE TABLE IF NOT EXISTS app_detail_cache (
        key              TEXT PRIMARY KEY,
        value            JSON NOT NULL
    );
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
