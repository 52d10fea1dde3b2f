//! Database repository layer
//!
//! Provides query and insert operations for the recorder tables and the
//! client-side detail cache.

use crate::error::Result;
use crate::types::{AppId, FileVersion, FocusInterval, TimeRange};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

/// An application row as stored by the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecord {
    pub id: AppId,
    pub path: String,
    pub name: String,
    pub icon: String,
    pub version: Option<FileVersion>,
}

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // App operations
    // ============================================

    /// Register an application by path, returning its id.
    ///
    /// Name, icon and version are refreshed when the path is already known.
    pub fn upsert_app(
        &self,
        path: &str,
        name: &str,
        icon: &str,
        version: Option<&FileVersion>,
    ) -> Result<AppId> {
        let version_json = version.map(serde_json::to_string).transpose()?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO apps (path, name, icon, version)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(path) DO UPDATE SET
                name = excluded.name,
                icon = CASE WHEN excluded.icon = '' THEN apps.icon ELSE excluded.icon END,
                version = COALESCE(excluded.version, apps.version)
            "#,
            params![path, name, icon, version_json],
        )?;

        let id: i64 = conn.query_row("SELECT id FROM apps WHERE path = ?1", [path], |row| {
            row.get(0)
        })?;
        Ok(id as AppId)
    }

    /// Get an application by id
    pub fn get_app(&self, id: AppId) -> Result<Option<AppRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, path, name, icon, version FROM apps WHERE id = ?1")?;
        let app = stmt
            .query_row([id as i64], Self::row_to_app)
            .optional()?;
        Ok(app)
    }

    /// List all applications ordered by id
    pub fn list_apps(&self) -> Result<Vec<AppRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, path, name, icon, version FROM apps ORDER BY id")?;
        let apps = stmt
            .query_map([], Self::row_to_app)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(apps)
    }

    fn row_to_app(row: &Row) -> rusqlite::Result<AppRecord> {
        let id: i64 = row.get(0)?;
        let version_json: Option<String> = row.get(4)?;
        Ok(AppRecord {
            id: id as AppId,
            path: row.get(1)?,
            name: row.get(2)?,
            icon: row.get(3)?,
            version: version_json.and_then(|s| serde_json::from_str(&s).ok()),
        })
    }

    // ============================================
    // Focus record operations
    // ============================================

    /// Append one focus interval
    pub fn insert_focus_record(&self, interval: &FocusInterval) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO focus_records (app_id, focus_at, blur_at) VALUES (?1, ?2, ?3)",
            params![interval.id as i64, interval.focus_at, interval.blur_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Intervals that overlap `range`, unclipped, ordered by focus time.
    pub fn focus_records_overlapping(&self, range: TimeRange) -> Result<Vec<FocusInterval>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT app_id, focus_at, blur_at
            FROM focus_records
            WHERE blur_at > ?1 AND focus_at < ?2
            ORDER BY focus_at
            "#,
        )?;
        let records = stmt
            .query_map(params![range.start_millis, range.end_millis], |row| {
                let app_id: i64 = row.get(0)?;
                Ok(FocusInterval {
                    id: app_id as AppId,
                    focus_at: row.get(1)?,
                    blur_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    // ============================================
    // App config operations
    // ============================================

    /// Raw JSON of the persisted app config, if any
    pub fn load_app_config_json(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row("SELECT value FROM app_config WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Replace the persisted app config
    pub fn save_app_config_json(&self, value: &str, updated_at: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO app_config (id, value, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![value, updated_at],
        )?;
        Ok(())
    }

    // ============================================
    // Detail cache operations
    // ============================================

    /// Cached JSON for `key`, if present
    pub fn cache_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM app_detail_cache WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or replace the cached JSON for `key`
    pub fn cache_put(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO app_detail_cache (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Number of cached entries
    pub fn cache_len(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM app_detail_cache", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
