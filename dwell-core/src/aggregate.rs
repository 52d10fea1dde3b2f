//! Calendar-aligned usage summaries
//!
//! [`TimeBucketAggregator`] asks the backend for pre-aggregated durations,
//! remaps backend day indices into positions within the local year and joins
//! per-app totals with resolved [`AppDetail`]s.
//!
//! Every query reads the clock once. The range and the timezone offset sent
//! to the backend come from that single reading, so a DST change during the
//! year does not shift the day remap; bucketing individual intervals under
//! the captured offset is the backend's job.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::backend::Backend;
use crate::error::Result;
use crate::resolve::DetailResolutionCache;
use crate::settings::ConfigSyncStore;
use crate::time::{self, Clock};
use crate::types::{
    AppDetail, AppDuration, AppId, DayDurations, DayIndex, IdDayDurations, IdDurations,
    TimeRange, YearDayDurations,
};

/// Produces per-app and per-day usage summaries.
#[derive(Clone)]
pub struct TimeBucketAggregator {
    backend: Arc<dyn Backend>,
    cache: DetailResolutionCache,
    config: Arc<ConfigSyncStore>,
    clock: Arc<dyn Clock>,
}

impl TimeBucketAggregator {
    pub fn new(
        backend: Arc<dyn Backend>,
        cache: DetailResolutionCache,
        config: Arc<ConfigSyncStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            cache,
            config,
            clock,
        }
    }

    /// Usage per app over `[start of local day, now)`.
    ///
    /// Every id is resolved through the cache; a single resolution failure
    /// fails the whole call. Rows are sorted by duration, longest first.
    pub async fn aggregate_today(&self) -> Result<Vec<AppDuration>> {
        let now = self.clock.now();
        let range = TimeRange::new(
            time::start_of_day(self.clock.as_ref(), &now).timestamp_millis(),
            now.timestamp_millis(),
        );

        let durations = self.backend.duration_by_id(range).await?;
        let mut ids: Vec<AppId> = durations.keys().copied().collect();
        ids.sort_unstable();

        let details = self.cache.resolve_many(&ids).await?;
        let mut rows: Vec<AppDuration> = details
            .into_iter()
            .map(|app| AppDuration {
                duration_millis: durations.get(&app.id).copied().unwrap_or_default(),
                app,
            })
            .collect();
        sort_rows(&mut rows);

        tracing::debug!(apps = rows.len(), "Aggregated today's usage");
        Ok(rows)
    }

    /// [`Self::aggregate_today`], minus uninstalled apps when
    /// `filterUninstalledApp` is on.
    pub async fn aggregate_today_filtered(&self) -> Result<Vec<AppDuration>> {
        let mut rows = self.aggregate_today().await?;
        if self.config.config().filter_uninstalled_app {
            rows.retain(|row| row.app.exist);
        }
        Ok(rows)
    }

    /// Usage per day over `[start of local year, now)`, keyed by the 1-based
    /// day of the year.
    pub async fn aggregate_year_by_day(&self) -> Result<YearDayDurations> {
        let now = self.clock.now();
        let offset = time::timezone_offset_millis(&now);
        let start = time::start_of_year(self.clock.as_ref(), &now).timestamp_millis();
        let range = TimeRange::new(start, now.timestamp_millis());

        let days = self.backend.duration_by_day(range, offset).await?;
        let start_day = time::day_index(start, offset);

        Ok(remap_day_indices(&days, start_day))
    }

    /// Raw per-app durations over `range`.
    pub async fn duration_by_id(&self, range: TimeRange) -> Result<IdDurations> {
        Ok(self.backend.duration_by_id(range).await?)
    }

    /// Raw per-day durations over `range`, bucketed with the current offset.
    pub async fn duration_by_day(&self, range: TimeRange) -> Result<DayDurations> {
        let offset = self.current_offset();
        Ok(self.backend.duration_by_day(range, offset).await?)
    }

    /// Raw per-app, per-day durations over `range`, bucketed with the current offset.
    pub async fn duration_by_day_id(&self, range: TimeRange) -> Result<IdDayDurations> {
        let offset = self.current_offset();
        Ok(self.backend.duration_by_day_id(range, offset).await?)
    }

    /// Every known app detail, fetched in one call.
    pub async fn app_details(&self) -> Result<HashMap<AppId, AppDetail>> {
        self.cache.resolve_all().await
    }

    /// Position of `date` within the week configured by `firstDayOfWeek`.
    pub fn weekday_offset(&self, date: &DateTime<FixedOffset>) -> u32 {
        time::weekday_offset(date, self.config.config().first_day_of_week)
    }

    fn current_offset(&self) -> i64 {
        time::timezone_offset_millis(&self.clock.now())
    }
}

/// Longest first; equal durations by ascending id.
fn sort_rows(rows: &mut [AppDuration]) {
    rows.sort_by(|a, b| {
        b.duration_millis
            .cmp(&a.duration_millis)
            .then(a.app.id.cmp(&b.app.id))
    });
}

/// Rebase backend day indices so `start_day` becomes day 1.
///
/// Order preserving: the shift is the same for every key.
pub fn remap_day_indices(days: &DayDurations, start_day: DayIndex) -> YearDayDurations {
    days.iter()
        .map(|(day, millis)| (day - start_day + 1, *millis))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RpcResult;
    use crate::error::{Error, RpcError};
    use crate::settings::{AppConfig, UiEvent};
    use crate::store::MemoryDetailStore;
    use crate::time::{FixedClock, MILLISECONDS_PER_DAY, MILLISECONDS_PER_HOUR};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct StubBackend {
        by_id: IdDurations,
        by_day: DayDurations,
        uninstalled: Vec<AppId>,
        missing: Vec<AppId>,
        fail_aggregates: bool,
        day_calls: Mutex<Vec<(TimeRange, i64)>>,
        id_calls: Mutex<Vec<TimeRange>>,
    }

    impl StubBackend {
        fn detail(&self, id: AppId) -> AppDetail {
            AppDetail {
                id,
                name: format!("app{}", id),
                path: format!("/opt/app{}/bin", id),
                exist: !self.uninstalled.contains(&id),
                icon: String::new(),
                version: None,
            }
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        async fn duration_by_id(&self, range: TimeRange) -> RpcResult<IdDurations> {
            self.id_calls.lock().unwrap().push(range);
            if self.fail_aggregates {
                return Err(RpcError::new("duration_by_id", "recorder offline"));
            }
            Ok(self.by_id.clone())
        }

        async fn duration_by_day(&self, range: TimeRange, tz: i64) -> RpcResult<DayDurations> {
            self.day_calls.lock().unwrap().push((range, tz));
            if self.fail_aggregates {
                return Err(RpcError::new("duration_by_day", "recorder offline"));
            }
            Ok(self.by_day.clone())
        }

        async fn duration_by_day_id(
            &self,
            _range: TimeRange,
            _tz: i64,
        ) -> RpcResult<IdDayDurations> {
            Ok(IdDayDurations::new())
        }

        async fn app_detail(&self, id: AppId) -> RpcResult<AppDetail> {
            if self.missing.contains(&id) {
                return Err(RpcError::new("app_detail", format!("no app {}", id)));
            }
            Ok(self.detail(id))
        }

        async fn all_app_details(&self) -> RpcResult<Vec<AppDetail>> {
            Ok(self.by_id.keys().map(|id| self.detail(*id)).collect())
        }

        async fn get_app_config(&self) -> RpcResult<AppConfig> {
            Ok(AppConfig::default())
        }

        async fn set_app_config(&self, _config: &AppConfig) -> RpcResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        backend: Arc<StubBackend>,
        aggregator: TimeBucketAggregator,
        config: Arc<ConfigSyncStore>,
        _events: mpsc::UnboundedSender<UiEvent>,
    }

    async fn fixture(backend: StubBackend, clock: FixedClock) -> Fixture {
        let backend = Arc::new(backend);
        let (events, rx) = mpsc::unbounded_channel();
        let platform = crate::settings::SystemPlatform::default();
        let config = ConfigSyncStore::init(backend.clone(), &platform, rx)
            .await
            .unwrap();
        let cache = DetailResolutionCache::new(backend.clone(), Arc::new(MemoryDetailStore::new()));
        let aggregator =
            TimeBucketAggregator::new(backend.clone(), cache, config.clone(), Arc::new(clock));
        Fixture {
            backend,
            aggregator,
            config,
            _events: events,
        }
    }

    /// 1970-03-01T00:00:00Z
    fn march_1970() -> FixedClock {
        FixedClock::at_millis(59 * MILLISECONDS_PER_DAY, 0).unwrap()
    }

    #[tokio::test]
    async fn test_year_remap_at_utc_day_boundary() {
        let backend = StubBackend {
            by_day: [(0, MILLISECONDS_PER_HOUR), (1, 2 * MILLISECONDS_PER_HOUR)].into(),
            ..Default::default()
        };
        let f = fixture(backend, march_1970()).await;

        let year = f.aggregator.aggregate_year_by_day().await.unwrap();

        let expected: YearDayDurations =
            [(1, MILLISECONDS_PER_HOUR), (2, 2 * MILLISECONDS_PER_HOUR)].into();
        assert_eq!(year, expected);
        let calls = f.backend.day_calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(TimeRange::new(0, 59 * MILLISECONDS_PER_DAY), 0)]);
    }

    #[tokio::test]
    async fn test_year_remap_east_of_utc() {
        // 2024-03-10T12:00:00+08:00; the local year starts 2023-12-31T16:00Z
        let clock = FixedClock::at_millis(1_710_043_200_000, 8 * 3600).unwrap();
        let backend = StubBackend {
            by_day: [(19723, 10), (19724, 20), (19792, 30)].into(),
            ..Default::default()
        };
        let f = fixture(backend, clock).await;

        let year = f.aggregator.aggregate_year_by_day().await.unwrap();

        let expected: YearDayDurations = [(1, 10), (2, 20), (70, 30)].into();
        assert_eq!(year, expected);
        let calls = f.backend.day_calls.lock().unwrap();
        assert_eq!(calls[0].0.start_millis, 1_704_038_400_000);
        assert_eq!(calls[0].0.end_millis, 1_710_043_200_000);
        assert_eq!(calls[0].1, 8 * MILLISECONDS_PER_HOUR);
    }

    #[test]
    fn test_remap_preserves_order() {
        let days: DayDurations = [(-3, 1), (5, 2), (6, 3), (400, 4)].into();
        let remapped = remap_day_indices(&days, 5);
        let keys: Vec<i64> = remapped.keys().copied().collect();
        assert_eq!(keys, vec![-7, 1, 2, 396]);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(remapped.values().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_start_day_floors_before_epoch() {
        assert_eq!(time::day_index(0, 0), 0);
        assert_eq!(time::day_index(-1, 0), -1);
        assert_eq!(time::day_index(0, -MILLISECONDS_PER_HOUR), -1);
        assert_eq!(time::day_index(1_704_038_400_000, 8 * MILLISECONDS_PER_HOUR), 19723);
    }

    #[tokio::test]
    async fn test_today_joins_details_sorted_by_duration() {
        let backend = StubBackend {
            by_id: [(3, 500), (1, 9_000), (2, 500)].into(),
            ..Default::default()
        };
        let clock = FixedClock::at_millis(59 * MILLISECONDS_PER_DAY + 10 * MILLISECONDS_PER_HOUR, 0)
            .unwrap();
        let f = fixture(backend, clock).await;

        let rows = f.aggregator.aggregate_today().await.unwrap();

        let summary: Vec<(AppId, i64)> = rows.iter().map(|r| (r.app.id, r.duration_millis)).collect();
        assert_eq!(summary, vec![(1, 9_000), (2, 500), (3, 500)]);
        assert_eq!(rows[0].app.name, "app1");
        let calls = f.backend.id_calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[TimeRange::new(
                59 * MILLISECONDS_PER_DAY,
                59 * MILLISECONDS_PER_DAY + 10 * MILLISECONDS_PER_HOUR
            )]
        );
    }

    #[tokio::test]
    async fn test_today_fails_when_any_detail_fails() {
        let backend = StubBackend {
            by_id: [(1, 100), (2, 200)].into(),
            missing: vec![2],
            ..Default::default()
        };
        let f = fixture(backend, march_1970()).await;

        let err = f.aggregator.aggregate_today().await.unwrap_err();
        match err {
            Error::Rpc(e) => assert_eq!(e.call, "app_detail"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rpc_failure_is_surfaced_unchanged() {
        let backend = StubBackend {
            fail_aggregates: true,
            ..Default::default()
        };
        let f = fixture(backend, march_1970()).await;

        let err = f.aggregator.aggregate_year_by_day().await.unwrap_err();
        assert_eq!(err.to_string(), "duration_by_day failed: recorder offline");
        let err = f.aggregator.aggregate_today().await.unwrap_err();
        assert_eq!(err.to_string(), "duration_by_id failed: recorder offline");
    }

    #[tokio::test]
    async fn test_filtered_today_follows_config() {
        let backend = StubBackend {
            by_id: [(1, 100), (2, 200)].into(),
            uninstalled: vec![2],
            ..Default::default()
        };
        let f = fixture(backend, march_1970()).await;

        let rows = f.aggregator.aggregate_today_filtered().await.unwrap();
        assert_eq!(rows.iter().map(|r| r.app.id).collect::<Vec<_>>(), vec![1]);

        f.config
            .set(crate::settings::ConfigUpdate::FilterUninstalledApp(false));
        let rows = f.aggregator.aggregate_today_filtered().await.unwrap();
        assert_eq!(rows.iter().map(|r| r.app.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_weekday_offset_uses_configured_first_day() {
        let f = fixture(StubBackend::default(), march_1970()).await;
        // 1970-03-02 was a Monday
        let monday = FixedClock::at_millis(60 * MILLISECONDS_PER_DAY, 0).unwrap().now();

        assert_eq!(f.aggregator.weekday_offset(&monday), 0);
        f.config.set(crate::settings::ConfigUpdate::FirstDayOfWeek(1));
        assert_eq!(f.aggregator.weekday_offset(&monday), 6);
    }
}
