//! App detail resolution with request coalescing
//!
//! Resolves an [`AppId`] to its [`AppDetail`] at most once per id:
//!
//! 1. A detail already in the durable store is returned without any call.
//! 2. If a fetch for the id is in flight, the caller joins it and receives
//!    the same outcome as every other joined caller.
//! 3. Otherwise a pending entry is registered *before* the fetch starts, so
//!    a concurrent caller arriving during the await gap sees step 2.
//!
//! On success the detail is persisted and the pending entry is removed; the
//! durable store is authoritative from then on. On failure the entry is
//! removed without persisting, so the next call retries.
//!
//! ```text
//!            resolve(id)                 fetch ok: persist
//!   Empty ───────────────▶ Pending ─────────────────────────▶ Resolved (store)
//!     ▲                       │
//!     └───────────────────────┘
//!          fetch failed: every joined caller gets the error
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::backend::Backend;
use crate::error::{Result, RpcError};
use crate::store::DetailStore;
use crate::types::{AppDetail, AppId};

type FetchOutcome = std::result::Result<AppDetail, RpcError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Observable state of one id in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never resolved, or the last attempt failed
    Empty,
    /// A fetch is in flight
    Pending,
    /// Present in the durable store
    Resolved,
}

/// An in-flight fetch. The generation ties the entry to the fetch that
/// created it so only that fetch can clear it.
struct PendingEntry {
    fetch: SharedFetch,
    generation: u64,
}

enum Lookup {
    Stored(AppDetail),
    Joined(SharedFetch),
    Started(SharedFetch),
}

struct Inner {
    backend: Arc<dyn Backend>,
    store: Arc<dyn DetailStore>,
    pending: Mutex<HashMap<AppId, PendingEntry>>,
    next_generation: AtomicU64,
}

/// Coalescing resolver from app ids to app details.
///
/// Cheap to clone; clones share the same in-flight map and store.
#[derive(Clone)]
pub struct DetailResolutionCache {
    inner: Arc<Inner>,
}

impl DetailResolutionCache {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn DetailStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                pending: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Resolve `id`, issuing at most one metadata fetch per id at a time.
    ///
    /// Fetch failures reach every joined caller as [`crate::Error::Rpc`].
    pub async fn resolve(&self, id: AppId) -> Result<AppDetail> {
        let fetch = match self.inner.lookup(id)? {
            Lookup::Stored(detail) => return Ok(detail),
            Lookup::Joined(fetch) => {
                tracing::trace!(app_id = id, "Joining in-flight detail fetch");
                fetch
            }
            Lookup::Started(fetch) => {
                tracing::debug!(app_id = id, "Fetching app detail");
                fetch
            }
        };
        Ok(fetch.await?)
    }

    /// Resolve several ids concurrently, failing on the first error.
    ///
    /// Results come back in the order of `ids`.
    pub async fn resolve_many(&self, ids: &[AppId]) -> Result<Vec<AppDetail>> {
        futures::future::try_join_all(ids.iter().map(|id| self.resolve(*id))).await
    }

    /// Fetch every known app detail in one call.
    ///
    /// Bypasses the per-id bookkeeping and does not write the store.
    pub async fn resolve_all(&self) -> Result<HashMap<AppId, AppDetail>> {
        let details = self.inner.backend.all_app_details().await?;
        Ok(details.into_iter().map(|d| (d.id, d)).collect())
    }

    /// Current state of `id`.
    pub fn state(&self, id: AppId) -> Result<EntryState> {
        let pending = self.inner.pending.lock().unwrap();
        if self.inner.store.get(id)?.is_some() {
            Ok(EntryState::Resolved)
        } else if pending.contains_key(&id) {
            Ok(EntryState::Pending)
        } else {
            Ok(EntryState::Empty)
        }
    }

    /// Number of fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }

    /// Forget every in-flight fetch.
    ///
    /// Callers already joined still get their outcome. Abandoned fetches
    /// are dropped along with their reference to the store.
    pub fn close(&self) -> usize {
        let abandoned: Vec<PendingEntry> = self
            .inner
            .pending
            .lock()
            .unwrap()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        abandoned.len()
    }
}

impl Inner {
    /// Store check, join check and registration happen under one lock so
    /// no caller can slip between them.
    fn lookup(self: &Arc<Self>, id: AppId) -> Result<Lookup> {
        let mut pending = self.pending.lock().unwrap();

        if let Some(detail) = self.store.get(id)? {
            return Ok(Lookup::Stored(detail));
        }

        if let Some(entry) = pending.get(&id) {
            return Ok(Lookup::Joined(entry.fetch.clone()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let fetch = Arc::clone(self).fetch(id, generation).boxed().shared();
        pending.insert(
            id,
            PendingEntry {
                fetch: fetch.clone(),
                generation,
            },
        );
        Ok(Lookup::Started(fetch))
    }

    /// Runs once per pending entry, driven by whichever joined caller polls.
    async fn fetch(self: Arc<Self>, id: AppId, generation: u64) -> FetchOutcome {
        let outcome = self.backend.app_detail(id).await;

        match &outcome {
            Ok(detail) => {
                if let Err(err) = self.store.put(detail) {
                    tracing::warn!(app_id = id, error = %err, "Failed to persist app detail");
                }
            }
            Err(err) => {
                tracing::warn!(app_id = id, error = %err, "App detail fetch failed");
            }
        }

        self.settle(id, generation);
        outcome
    }

    /// Pending -> Empty. The outcome itself lives in the shared future.
    fn settle(&self, id: AppId, generation: u64) {
        let mut pending = self.pending.lock().unwrap();
        match pending.get(&id) {
            Some(entry) if entry.generation == generation => {
                pending.remove(&id);
            }
            _ => tracing::trace!(app_id = id, "Pending entry already cleared"),
        }
    }
}
