//! Application state with an explicit lifecycle
//!
//! One [`AppState`] is built at startup and handed to whatever needs the
//! cache, the settings or the aggregator. It replaces ambient singletons:
//! `init` starts the background tasks, `shutdown` stops them and waits for
//! the last config write.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::aggregate::TimeBucketAggregator;
use crate::backend::Backend;
use crate::error::Result;
use crate::resolve::DetailResolutionCache;
use crate::settings::{ConfigSyncStore, Platform, UiEvent};
use crate::store::DetailStore;
use crate::time::Clock;

/// Shared client state: detail cache, settings and aggregator.
pub struct AppState {
    cache: DetailResolutionCache,
    config: Arc<ConfigSyncStore>,
    aggregator: TimeBucketAggregator,
}

impl AppState {
    /// Load settings and start the settings tasks.
    ///
    /// Fails only when the persisted config cannot be loaded.
    pub async fn init(
        backend: Arc<dyn Backend>,
        store: Arc<dyn DetailStore>,
        platform: &dyn Platform,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedReceiver<UiEvent>,
    ) -> Result<Self> {
        let config = ConfigSyncStore::init(backend.clone(), platform, events).await?;
        let cache = DetailResolutionCache::new(backend.clone(), store);
        let aggregator = TimeBucketAggregator::new(backend, cache.clone(), config.clone(), clock);

        tracing::info!("App state initialized");
        Ok(Self {
            cache,
            config,
            aggregator,
        })
    }

    pub fn cache(&self) -> &DetailResolutionCache {
        &self.cache
    }

    pub fn config(&self) -> &Arc<ConfigSyncStore> {
        &self.config
    }

    pub fn aggregator(&self) -> &TimeBucketAggregator {
        &self.aggregator
    }

    /// Stop the UI listener, release the detail store and flush pending
    /// config changes.
    pub async fn shutdown(self) {
        let Self {
            cache,
            config,
            aggregator,
        } = self;

        drop(aggregator);
        let abandoned = cache.close();
        if abandoned > 0 {
            tracing::debug!(abandoned, "Dropped in-flight detail fetches");
        }
        drop(cache);

        config.shutdown().await;
        tracing::info!("App state shut down");
    }
}
