//! # dwell-core
//!
//! Core library for dwell - a desktop app usage tracker.
//!
//! This library provides:
//! - Domain types for focus intervals, app details and duration buckets
//! - The backend RPC trait and a local SQLite recorder implementing it
//! - A durable, coalescing app detail cache
//! - User settings with derived language/theme and background persistence
//! - Calendar-aligned usage aggregation
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! The recorder backend owns raw intervals and bucketing. The client side
//! is three components, leaves first:
//! - **[`DetailResolutionCache`]:** app id to [`AppDetail`], at most one fetch per id
//! - **[`ConfigSyncStore`]:** settings, derived state, config persistence
//! - **[`TimeBucketAggregator`]:** today's usage and the per-day year summary
//!
//! [`AppState`] wires them together and owns their lifecycle.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dwell_core::{AppState, Config, Database, LocalBackend, SqliteDetailStore, SystemClock, SystemPlatform};
//!
//! # async fn run() -> dwell_core::Result<()> {
//! let config = Config::load()?;
//! let db = Arc::new(Database::open(&config.database_path())?);
//! db.migrate()?;
//!
//! let (_events, rx) = tokio::sync::mpsc::unbounded_channel();
//! let state = AppState::init(
//!     Arc::new(LocalBackend::new(db.clone())),
//!     Arc::new(SqliteDetailStore::new(db)),
//!     &SystemPlatform::new(config.platform.clone()),
//!     Arc::new(SystemClock),
//!     rx,
//! )
//! .await?;
//!
//! for row in state.aggregator().aggregate_today().await? {
//!     println!("{} {}", row.app.display_name(), row.duration_millis);
//! }
//! state.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use aggregate::TimeBucketAggregator;
pub use backend::{Backend, LocalBackend, RpcResult};
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result, RpcError};
pub use resolve::{DetailResolutionCache, EntryState};
pub use settings::{
    AppConfig, ConfigSyncStore, ConfigUpdate, DerivedState, MenuCommand, PersistStatus, Platform,
    SystemPlatform, UiEvent,
};
pub use state::AppState;
pub use store::{DetailStore, MemoryDetailStore, SqliteDetailStore};
pub use time::{Clock, FixedClock, SystemClock};
pub use types::*;

// Public modules
pub mod aggregate;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod resolve;
pub mod settings;
pub mod state;
pub mod store;
pub mod time;
pub mod types;
