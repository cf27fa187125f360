//! Lazy catalog cache.
//!
//! The light catalog is loaded up front; full hazard detail is fetched per id
//! on demand or in one batch. Each id maps to either a resolved detail or a
//! shared pending fetch, so concurrent requesters await the same call. Entries
//! are never evicted.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::Result;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use shared::{
    domain::HazardId,
    protocol::{CatalogQuery, CategorySummary, HazardDetail, HazardSummary},
};
use tracing::{debug, info, warn};

use crate::CatalogBackend;

pub type DetailListener = Arc<dyn Fn(&HazardDetail) + Send + Sync>;

type PendingDetail = Shared<BoxFuture<'static, Option<Arc<HazardDetail>>>>;
type PendingBatch = Shared<BoxFuture<'static, Arc<HashMap<HazardId, Arc<HazardDetail>>>>>;

enum DetailSlot {
    InFlight(PendingDetail),
    Ready(Arc<HazardDetail>),
}

#[derive(Default)]
struct CacheState {
    summaries: HashMap<HazardId, HazardSummary>,
    categories: Vec<CategorySummary>,
    details: HashMap<HazardId, DetailSlot>,
}

/// What the cache can show for an id: the full record when loaded, the light
/// listing record otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEntry {
    Full(Arc<HazardDetail>),
    Light(HazardSummary),
}

impl CatalogEntry {
    pub fn name(&self) -> &str {
        match self {
            CatalogEntry::Full(detail) => &detail.name,
            CatalogEntry::Light(summary) => &summary.name,
        }
    }

    pub fn recommended_measures(&self) -> Option<&str> {
        match self {
            CatalogEntry::Full(detail) => detail.recommended_measures.as_deref(),
            CatalogEntry::Light(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrefetchReport {
    pub requested: usize,
    pub loaded: usize,
}

pub struct CatalogCache {
    backend: Arc<dyn CatalogBackend>,
    state: Arc<Mutex<CacheState>>,
    listener: Option<DetailListener>,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CatalogCache {
    pub fn new(backend: Arc<dyn CatalogBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(CacheState::default())),
            listener: None,
        }
    }

    /// Hook invoked after every successful single-item detail fetch.
    pub fn with_listener(mut self, listener: DetailListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn backend(&self) -> Arc<dyn CatalogBackend> {
        Arc::clone(&self.backend)
    }

    pub async fn load_catalog(&self, query: &CatalogQuery) -> Result<Vec<HazardSummary>> {
        let summaries = self.backend.list_hazards(query).await?;
        {
            let mut state = lock(&self.state);
            for summary in &summaries {
                state.summaries.insert(summary.id, summary.clone());
            }
        }
        info!(count = summaries.len(), "catalog: light list loaded");
        Ok(summaries)
    }

    pub async fn load_categories(&self) -> Result<Vec<CategorySummary>> {
        let categories = self.backend.list_categories().await?;
        lock(&self.state).categories = categories.clone();
        Ok(categories)
    }

    pub fn categories(&self) -> Vec<CategorySummary> {
        lock(&self.state).categories.clone()
    }

    pub fn summary(&self, id: HazardId) -> Option<HazardSummary> {
        lock(&self.state).summaries.get(&id).cloned()
    }

    pub fn cached_detail(&self, id: HazardId) -> Option<Arc<HazardDetail>> {
        match lock(&self.state).details.get(&id) {
            Some(DetailSlot::Ready(detail)) => Some(Arc::clone(detail)),
            _ => None,
        }
    }

    pub fn is_in_flight(&self, id: HazardId) -> bool {
        matches!(
            lock(&self.state).details.get(&id),
            Some(DetailSlot::InFlight(_))
        )
    }

    pub fn detail_count(&self) -> usize {
        lock(&self.state)
            .details
            .values()
            .filter(|slot| matches!(slot, DetailSlot::Ready(_)))
            .count()
    }

    pub fn entry(&self, id: HazardId) -> Option<CatalogEntry> {
        let state = lock(&self.state);
        if let Some(DetailSlot::Ready(detail)) = state.details.get(&id) {
            return Some(CatalogEntry::Full(Arc::clone(detail)));
        }
        if let Some(summary) = state.summaries.get(&id) {
            return Some(CatalogEntry::Light(summary.clone()));
        }
        None
    }

    /// Full detail for `id`. Returns `None` for ids that are not catalog
    /// backed and when the fetch fails; failures are logged, not raised.
    pub async fn detail(&self, id: HazardId) -> Option<Arc<HazardDetail>> {
        if !id.is_catalog_backed() {
            return None;
        }

        let pending = {
            let mut state = lock(&self.state);
            match state.details.get(&id) {
                Some(DetailSlot::Ready(detail)) => {
                    debug!(hazard_id = id.0, "catalog: detail cache hit");
                    return Some(Arc::clone(detail));
                }
                Some(DetailSlot::InFlight(pending)) => pending.clone(),
                None => {
                    let pending = self.single_fetch(id);
                    state
                        .details
                        .insert(id, DetailSlot::InFlight(pending.clone()));
                    pending
                }
            }
        };

        pending.await
    }

    fn single_fetch(&self, id: HazardId) -> PendingDetail {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let listener = self.listener.clone();
        async move {
            match backend.hazard_detail(id).await {
                Ok(detail) => {
                    let detail = Arc::new(detail);
                    lock(&state)
                        .details
                        .insert(id, DetailSlot::Ready(Arc::clone(&detail)));
                    if let Some(listener) = listener {
                        listener(&detail);
                    }
                    Some(detail)
                }
                Err(err) => {
                    warn!(hazard_id = id.0, "catalog: detail fetch failed: {err:#}");
                    lock(&state).details.remove(&id);
                    None
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Loads every id of `selection` that is catalog backed and neither cached
    /// nor already in flight, with a single batch request.
    pub async fn prefetch(&self, selection: &[HazardId]) -> PrefetchReport {
        let (wanted, batch) = {
            let mut state = lock(&self.state);
            let mut seen = HashSet::new();
            let wanted: Vec<HazardId> = selection
                .iter()
                .copied()
                .filter(|id| id.is_catalog_backed())
                .filter(|id| !state.details.contains_key(id))
                .filter(|id| seen.insert(*id))
                .collect();
            if wanted.is_empty() {
                return PrefetchReport::default();
            }

            let batch = self.batch_fetch(wanted.clone());
            for id in &wanted {
                let id = *id;
                let pending = batch
                    .clone()
                    .map(move |loaded| loaded.get(&id).cloned())
                    .boxed()
                    .shared();
                state.details.insert(id, DetailSlot::InFlight(pending));
            }
            (wanted, batch)
        };

        let loaded = batch.await;
        info!(
            requested = wanted.len(),
            loaded = loaded.len(),
            "catalog: batch prefetch settled"
        );
        PrefetchReport {
            requested: wanted.len(),
            loaded: loaded.len(),
        }
    }

    fn batch_fetch(&self, ids: Vec<HazardId>) -> PendingBatch {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        async move {
            let mut loaded = HashMap::new();
            match backend.hazard_details(&ids).await {
                Ok(details) => {
                    for detail in details {
                        if ids.contains(&detail.id) {
                            loaded.insert(detail.id, Arc::new(detail));
                        }
                    }
                }
                Err(err) => {
                    warn!(count = ids.len(), "catalog: batch detail fetch failed: {err:#}");
                }
            }

            let mut state = lock(&state);
            for id in &ids {
                match loaded.get(id) {
                    Some(detail) => {
                        state.details.insert(*id, DetailSlot::Ready(Arc::clone(detail)));
                    }
                    None => {
                        state.details.remove(id);
                    }
                }
            }
            Arc::new(loaded)
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
