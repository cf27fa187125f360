use super::*;
use crate::CatalogBackend;
use anyhow::anyhow;
use async_trait::async_trait;
use shared::{
    domain::CategoryId,
    protocol::{CatalogValidation, HazardSuggestion, SuggestionRequest},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Semaphore;

struct FakeCatalog {
    detail_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    batch_ids: Mutex<Vec<Vec<HazardId>>>,
    fail_details: bool,
    hold: Option<Arc<Semaphore>>,
}

impl FakeCatalog {
    fn new() -> Self {
        Self {
            detail_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            batch_ids: Mutex::new(Vec::new()),
            fail_details: false,
            hold: None,
        }
    }

    fn failing() -> Self {
        Self {
            fail_details: true,
            ..Self::new()
        }
    }

    fn held(gate: Arc<Semaphore>) -> Self {
        Self {
            hold: Some(gate),
            ..Self::new()
        }
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.hold {
            let _permit = gate.acquire().await.expect("gate open");
        }
    }
}

fn detail(id: i64) -> HazardDetail {
    HazardDetail {
        id: HazardId(id),
        name: format!("hazard-{id}"),
        category_id: CategoryId(1),
        description: String::new(),
        is_common: id % 2 == 0,
        sector_relevance: vec!["construction".into()],
        recommended_measures: Some(format!("measures for {id}")),
    }
}

#[async_trait]
impl CatalogBackend for FakeCatalog {
    async fn list_hazards(&self, _query: &CatalogQuery) -> Result<Vec<HazardSummary>> {
        Ok((1..=3).map(|id| detail(id).summary()).collect())
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>> {
        Ok(vec![CategorySummary {
            id: CategoryId(1),
            name: "Physical".into(),
        }])
    }

    async fn hazard_detail(&self, id: HazardId) -> Result<HazardDetail> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if self.fail_details {
            return Err(anyhow!("connection reset"));
        }
        Ok(detail(id.0))
    }

    async fn hazard_details(&self, ids: &[HazardId]) -> Result<Vec<HazardDetail>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_ids
            .lock()
            .expect("batch ids")
            .push(ids.to_vec());
        self.wait_gate().await;
        if self.fail_details {
            return Err(anyhow!("connection reset"));
        }
        Ok(ids.iter().map(|id| detail(id.0)).collect())
    }

    async fn suggest_hazards(&self, _request: &SuggestionRequest) -> Result<Vec<HazardSuggestion>> {
        Ok(Vec::new())
    }

    async fn validate_catalog(&self) -> Result<CatalogValidation> {
        Ok(CatalogValidation {
            complete: true,
            missing_categories: Vec::new(),
        })
    }
}

#[tokio::test]
async fn concurrent_detail_requests_share_one_call() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(FakeCatalog::held(gate.clone()));
    let cache = Arc::new(CatalogCache::new(backend.clone()));

    let first = tokio::spawn({
        let cache = cache.clone();
        async move { cache.detail(HazardId(7)).await }
    });
    let second = tokio::spawn({
        let cache = cache.clone();
        async move { cache.detail(HazardId(7)).await }
    });

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(cache.is_in_flight(HazardId(7)));

    gate.add_permits(10);
    let first = first.await.expect("join").expect("detail");
    let second = second.await.expect("join").expect("detail");

    assert_eq!(backend.detail_calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(!cache.is_in_flight(HazardId(7)));
}

#[tokio::test]
async fn cached_detail_skips_the_network() {
    let backend = Arc::new(FakeCatalog::new());
    let cache = CatalogCache::new(backend.clone());

    cache.detail(HazardId(3)).await.expect("first");
    cache.detail(HazardId(3)).await.expect("second");

    assert_eq!(backend.detail_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.detail_count(), 1);
}

#[tokio::test]
async fn non_catalog_ids_never_fetch() {
    let backend = Arc::new(FakeCatalog::new());
    let cache = CatalogCache::new(backend.clone());

    assert!(cache.detail(HazardId(0)).await.is_none());
    assert!(cache.detail(HazardId(-4)).await.is_none());
    assert_eq!(backend.detail_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_detail_is_swallowed_and_retryable() {
    let backend = Arc::new(FakeCatalog::failing());
    let cache = CatalogCache::new(backend.clone());

    assert!(cache.detail(HazardId(2)).await.is_none());
    assert!(!cache.is_in_flight(HazardId(2)));
    assert!(cache.cached_detail(HazardId(2)).is_none());

    assert!(cache.detail(HazardId(2)).await.is_none());
    assert_eq!(backend.detail_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn listener_fires_after_single_fetch() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let listener: DetailListener = {
        let seen = seen.clone();
        Arc::new(move |detail: &HazardDetail| {
            seen.lock().expect("seen").push(detail.id);
        })
    };
    let cache = CatalogCache::new(Arc::new(FakeCatalog::new())).with_listener(listener);

    cache.detail(HazardId(5)).await.expect("detail");
    cache.detail(HazardId(5)).await.expect("cached");

    assert_eq!(*seen.lock().expect("seen"), vec![HazardId(5)]);
}

#[tokio::test]
async fn prefetch_skips_cached_and_invalid_ids() {
    let backend = Arc::new(FakeCatalog::new());
    let cache = CatalogCache::new(backend.clone());
    cache.detail(HazardId(1)).await.expect("warm");

    let report = cache
        .prefetch(&[
            HazardId(1),
            HazardId(2),
            HazardId(0),
            HazardId(-1),
            HazardId(3),
            HazardId(2),
        ])
        .await;

    assert_eq!(report, PrefetchReport { requested: 2, loaded: 2 });
    assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        backend.batch_ids.lock().expect("batch ids")[0],
        vec![HazardId(2), HazardId(3)]
    );
    assert!(cache.cached_detail(HazardId(3)).is_some());
    assert_eq!(cache.detail_count(), 3);
}

#[tokio::test]
async fn prefetch_with_nothing_new_issues_no_request() {
    let backend = Arc::new(FakeCatalog::new());
    let cache = CatalogCache::new(backend.clone());
    cache.detail(HazardId(4)).await.expect("warm");

    let report = cache.prefetch(&[HazardId(4), HazardId(0)]).await;

    assert_eq!(report, PrefetchReport::default());
    assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_request_during_batch_waits_for_the_batch() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(FakeCatalog::held(gate.clone()));
    let cache = Arc::new(CatalogCache::new(backend.clone()));

    let batch = tokio::spawn({
        let cache = cache.clone();
        async move { cache.prefetch(&[HazardId(8), HazardId(9)]).await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(cache.is_in_flight(HazardId(9)));

    let single = tokio::spawn({
        let cache = cache.clone();
        async move { cache.detail(HazardId(9)).await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    gate.add_permits(10);
    batch.await.expect("join batch");
    let detail = single.await.expect("join single").expect("detail");

    assert_eq!(detail.id, HazardId(9));
    assert_eq!(backend.detail_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.batch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_batch_leaves_ids_fetchable() {
    let backend = Arc::new(FakeCatalog::failing());
    let cache = CatalogCache::new(backend.clone());

    let report = cache.prefetch(&[HazardId(1), HazardId(2)]).await;
    assert_eq!(report, PrefetchReport { requested: 2, loaded: 0 });
    assert!(!cache.is_in_flight(HazardId(1)));
    assert!(cache.cached_detail(HazardId(1)).is_none());
}

#[tokio::test]
async fn entry_falls_back_to_light_record() {
    let cache = CatalogCache::new(Arc::new(FakeCatalog::new()));
    cache
        .load_catalog(&CatalogQuery::default())
        .await
        .expect("catalog");

    let light = cache.entry(HazardId(2)).expect("light entry");
    assert!(matches!(light, CatalogEntry::Light(_)));
    assert_eq!(light.recommended_measures(), None);

    cache.detail(HazardId(2)).await.expect("detail");
    let full = cache.entry(HazardId(2)).expect("full entry");
    assert_eq!(full.recommended_measures(), Some("measures for 2"));
    assert!(cache.entry(HazardId(99)).is_none());
}
