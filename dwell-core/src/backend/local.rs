//! SQLite-backed recorder
//!
//! Stores applications, focus intervals and the persisted app config in a
//! local database and answers the [`Backend`] calls from it. Intervals are
//! clipped to the queried range and split at offset-shifted day boundaries.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Backend, RpcResult};
use crate::db::{AppRecord, Database};
use crate::error::{Error, Result, RpcError};
use crate::settings::AppConfig;
use crate::time::{day_index, MILLISECONDS_PER_DAY};
use crate::types::{
    AppDetail, AppId, DayDurations, FileVersion, FocusInterval, IdDayDurations, IdDurations,
    TimeRange,
};

/// Recorder backend over a local [`Database`].
pub struct LocalBackend {
    db: Arc<Database>,
}

impl LocalBackend {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register an application by executable path.
    pub fn register_app(
        &self,
        path: &str,
        name: &str,
        version: Option<&FileVersion>,
    ) -> Result<AppId> {
        self.db.upsert_app(path, name, "", version)
    }

    /// Append a focus interval for an already registered application.
    pub fn record(&self, interval: &FocusInterval) -> Result<()> {
        if self.db.get_app(interval.id)?.is_none() {
            return Err(Error::Config(format!("unknown app id {}", interval.id)));
        }
        self.db.insert_focus_record(interval)?;
        tracing::debug!(
            app_id = interval.id,
            duration_ms = interval.duration_millis(),
            "Recorded focus interval"
        );
        Ok(())
    }

    fn clipped(&self, call: &'static str, range: TimeRange) -> RpcResult<Vec<(AppId, i64, i64)>> {
        let records = self
            .db
            .focus_records_overlapping(range)
            .map_err(|e| rpc_error(call, e))?;
        Ok(records
            .into_iter()
            .filter_map(|r| {
                range
                    .clip(r.focus_at, r.blur_at)
                    .map(|(start, end)| (r.id, start, end))
            })
            .collect())
    }
}

/// Split `[start, end)` at day boundaries and add each piece to `days`.
fn add_by_day(days: &mut DayDurations, start: i64, end: i64, tz_offset_millis: i64) {
    let mut cur = start;
    while cur < end {
        let day = day_index(cur, tz_offset_millis);
        let boundary = (day + 1) * MILLISECONDS_PER_DAY - tz_offset_millis;
        let piece_end = end.min(boundary);
        *days.entry(day).or_default() += piece_end - cur;
        cur = piece_end;
    }
}

fn rpc_error(call: &'static str, err: Error) -> RpcError {
    RpcError::new(call, err.to_string())
}

fn to_detail(record: AppRecord) -> AppDetail {
    let exist = Path::new(&record.path).exists();
    AppDetail {
        id: record.id,
        name: record.name,
        path: record.path,
        exist,
        icon: record.icon,
        version: record.version,
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn duration_by_id(&self, range: TimeRange) -> RpcResult<IdDurations> {
        let mut totals = IdDurations::new();
        for (id, start, end) in self.clipped("duration_by_id", range)? {
            *totals.entry(id).or_default() += end - start;
        }
        Ok(totals)
    }

    async fn duration_by_day(
        &self,
        range: TimeRange,
        tz_offset_millis: i64,
    ) -> RpcResult<DayDurations> {
        let mut days = DayDurations::new();
        for (_, start, end) in self.clipped("duration_by_day", range)? {
            add_by_day(&mut days, start, end, tz_offset_millis);
        }
        Ok(days)
    }

    async fn duration_by_day_id(
        &self,
        range: TimeRange,
        tz_offset_millis: i64,
    ) -> RpcResult<IdDayDurations> {
        let mut totals: IdDayDurations = HashMap::new();
        for (id, start, end) in self.clipped("duration_by_day_id", range)? {
            add_by_day(totals.entry(id).or_default(), start, end, tz_offset_millis);
        }
        Ok(totals)
    }

    async fn app_detail(&self, id: AppId) -> RpcResult<AppDetail> {
        let record = self
            .db
            .get_app(id)
            .map_err(|e| rpc_error("app_detail", e))?
            .ok_or_else(|| RpcError::new("app_detail", format!("unknown app id {}", id)))?;
        Ok(to_detail(record))
    }

    async fn all_app_details(&self) -> RpcResult<Vec<AppDetail>> {
        let records = self
            .db
            .list_apps()
            .map_err(|e| rpc_error("all_app_details", e))?;
        Ok(records.into_iter().map(to_detail).collect())
    }

    async fn get_app_config(&self) -> RpcResult<AppConfig> {
        let json = self
            .db
            .load_app_config_json()
            .map_err(|e| rpc_error("get_app_config", e))?;
        match json {
            Some(json) => serde_json::from_str(&json)
                .map_err(|e| RpcError::new("get_app_config", e.to_string())),
            None => Ok(AppConfig::default()),
        }
    }

    async fn set_app_config(&self, config: &AppConfig) -> RpcResult<()> {
        let json = serde_json::to_string(config)
            .map_err(|e| RpcError::new("set_app_config", e.to_string()))?;
        self.db
            .save_app_config_json(&json, chrono::Utc::now().timestamp_millis())
            .map_err(|e| rpc_error("set_app_config", e))
    }
}
