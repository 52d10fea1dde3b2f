//! Durable store for resolved app details
//!
//! Maps the decimal string form of an [`AppId`] to a JSON-serialized
//! [`AppDetail`]. Entries are written once per id and never removed by this
//! crate; the store is consulted before any metadata call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::error::Result;
use crate::types::{AppDetail, AppId};

/// Key/value store that survives process restarts.
pub trait DetailStore: Send + Sync {
    /// Previously persisted detail for `id`.
    fn get(&self, id: AppId) -> Result<Option<AppDetail>>;

    /// Persist `detail` under its own id.
    fn put(&self, detail: &AppDetail) -> Result<()>;

    /// Number of persisted entries.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn key(id: AppId) -> String {
    id.to_string()
}

/// [`DetailStore`] backed by the `app_detail_cache` table.
pub struct SqliteDetailStore {
    db: Arc<Database>,
}

impl SqliteDetailStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl DetailStore for SqliteDetailStore {
    fn get(&self, id: AppId) -> Result<Option<AppDetail>> {
        let Some(json) = self.db.cache_get(&key(id))? else {
            return Ok(None);
        };
        // An undecodable row reads as a miss; the next fetch replaces it.
        match serde_json::from_str(&json) {
            Ok(detail) => Ok(Some(detail)),
            Err(err) => {
                tracing::warn!(app_id = id, error = %err, "Discarding undecodable cached app detail");
                Ok(None)
            }
        }
    }

    fn put(&self, detail: &AppDetail) -> Result<()> {
        let json = serde_json::to_string(detail)?;
        self.db.cache_put(&key(detail.id), &json)
    }

    fn len(&self) -> Result<usize> {
        self.db.cache_len()
    }
}

/// In-process [`DetailStore`], lost on exit.
#[derive(Default)]
pub struct MemoryDetailStore {
    entries: Mutex<HashMap<String, AppDetail>>,
}

impl MemoryDetailStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DetailStore for MemoryDetailStore {
    fn get(&self, id: AppId) -> Result<Option<AppDetail>> {
        Ok(self.entries.lock().unwrap().get(&key(id)).cloned())
    }

    fn put(&self, detail: &AppDetail) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key(detail.id), detail.clone());
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().unwrap().len())
    }
}
