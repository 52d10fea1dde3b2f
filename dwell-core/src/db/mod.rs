//! Database layer for dwell
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - The recorder tables behind [`crate::backend::LocalBackend`]
//! - The durable app-detail cache behind [`crate::store::SqliteDetailStore`]

pub mod repo;
pub mod schema;

pub use repo::{AppRecord, Database};
