//! Core domain types for dwell
//!
//! These types describe what the recorder backend hands to the client:
//! pre-aggregated durations keyed by application and/or day, and the
//! descriptive metadata attached to each application.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **App** | An executable the recorder has seen take focus, identified by a numeric [`AppId`] |
//! | **Focus interval** | One `[focus_at, blur_at)` span during which an app held focus |
//! | **Bucket** | A duration total keyed by app, by day, or by both |
//! | **Day index** | Days since the UTC epoch, after shifting timestamps by a timezone offset |
//!
//! All timestamps are milliseconds since the Unix epoch and all durations are
//! milliseconds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Numeric application identifier assigned by the recorder.
pub type AppId = u64;

/// Days since the UTC epoch, after applying a timezone offset.
pub type DayIndex = i64;

/// Duration totals per application.
pub type IdDurations = HashMap<AppId, i64>;

/// Duration totals per day index, ordered by day.
pub type DayDurations = BTreeMap<DayIndex, i64>;

/// Duration totals per application, then per day.
pub type IdDayDurations = HashMap<AppId, DayDurations>;

/// Duration totals keyed by 1-based day of the local year.
pub type YearDayDurations = BTreeMap<i64, i64>;

// ============================================
// Time ranges and intervals
// ============================================

/// Half-open millisecond range `[start_millis, end_millis)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_millis: i64,
    pub end_millis: i64,
}

impl TimeRange {
    pub fn new(start_millis: i64, end_millis: i64) -> Self {
        Self {
            start_millis,
            end_millis,
        }
    }

    /// Returns the part of `[from, to)` that falls inside this range.
    pub fn clip(&self, from: i64, to: i64) -> Option<(i64, i64)> {
        let start = from.max(self.start_millis);
        let end = to.min(self.end_millis);
        (end > start).then_some((start, end))
    }
}

/// A single span during which an application held focus.
///
/// Produced by the recorder; the client only consumes aggregates derived
/// from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusInterval {
    pub id: AppId,
    pub focus_at: i64,
    pub blur_at: i64,
}

impl FocusInterval {
    /// Create an interval, rejecting spans that end before they start.
    pub fn new(id: AppId, focus_at: i64, blur_at: i64) -> Option<Self> {
        (blur_at >= focus_at).then_some(Self {
            id,
            focus_at,
            blur_at,
        })
    }

    pub fn duration_millis(&self) -> i64 {
        self.blur_at - self.focus_at
    }
}

// ============================================
// Application metadata
// ============================================

/// Version resource fields read from an executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_copyright: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
}

/// Descriptive metadata for one application.
///
/// Immutable once resolved: an application's identity does not change
/// during a process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDetail {
    pub id: AppId,
    pub name: String,
    pub path: String,
    /// Whether the executable is still present on disk
    pub exist: bool,
    /// Base64-encoded PNG icon, empty when unknown
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<FileVersion>,
}

impl AppDetail {
    /// Name to show in listings: product name when known, else the file name.
    pub fn display_name(&self) -> &str {
        self.version
            .as_ref()
            .and_then(|v| v.product_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

/// One row of a per-app usage summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDuration {
    pub app: AppDetail,
    pub duration_millis: i64,
}
