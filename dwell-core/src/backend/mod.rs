//! Backend RPC surface
//!
//! The recorder owns focus tracking and interval-to-bucket assignment. The
//! client only sees the calls below, each an asynchronous round trip that
//! either completes or fails with an [`RpcError`]. Nothing in this crate
//! retries a failed call.
//!
//! [`LocalBackend`] implements the trait over a local SQLite recorder
//! database and is what the `dwell` CLI talks to.

mod local;

pub use local::LocalBackend;

use async_trait::async_trait;

use crate::error::RpcError;
use crate::settings::AppConfig;
use crate::types::{AppDetail, AppId, DayDurations, IdDayDurations, IdDurations, TimeRange};

/// Result of a backend call.
pub type RpcResult<T> = std::result::Result<T, RpcError>;

/// Calls exposed by the recorder backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Total focus time per application inside `range`.
    async fn duration_by_id(&self, range: TimeRange) -> RpcResult<IdDurations>;

    /// Total focus time per day index inside `range`.
    ///
    /// Days are bucketed after shifting timestamps by `tz_offset_millis`.
    async fn duration_by_day(
        &self,
        range: TimeRange,
        tz_offset_millis: i64,
    ) -> RpcResult<DayDurations>;

    /// Total focus time per application and day index inside `range`.
    async fn duration_by_day_id(
        &self,
        range: TimeRange,
        tz_offset_millis: i64,
    ) -> RpcResult<IdDayDurations>;

    /// Metadata for a single application.
    async fn app_detail(&self, id: AppId) -> RpcResult<AppDetail>;

    /// Metadata for every known application.
    async fn all_app_details(&self) -> RpcResult<Vec<AppDetail>>;

    /// Persisted user settings.
    async fn get_app_config(&self) -> RpcResult<AppConfig>;

    /// Replace the persisted user settings.
    async fn set_app_config(&self, config: &AppConfig) -> RpcResult<()>;
}
