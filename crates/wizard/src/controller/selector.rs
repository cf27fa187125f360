//! Hazard selection for the active position: catalog grouped by category,
//! debounced search, category filter, AI suggestions.

use std::{collections::BTreeMap, sync::Arc};

use catalog_client::CatalogCache;
use shared::{
    domain::{CategoryId, HazardAssignment, HazardId, PositionId},
    protocol::{
        CatalogQuery, CatalogValidation, CategorySummary, HazardSuggestion, HazardSummary,
        SuggestionRequest,
    },
};
use tracing::{debug, info, warn};

use crate::{
    controller::StepContext,
    debounce::{Debouncer, Liveness},
    events::{Notice, WizardEvent},
    model::EntityStore,
    view::{CategoryGroup, HazardRow},
};

const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLoad {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

pub struct SelectorController {
    liveness: Liveness,
    cache: Arc<CatalogCache>,
    load: CatalogLoad,
    catalog: Vec<HazardSummary>,
    categories: Vec<CategorySummary>,
    search_input: String,
    search: String,
    category_filter: Option<CategoryId>,
    search_debouncer: Debouncer,
    suggestions: Vec<HazardSuggestion>,
    suggestions_for: Option<PositionId>,
    catalog_warning: Option<String>,
}

impl SelectorController {
    pub fn new(cache: Arc<CatalogCache>, ctx: StepContext<'_>) -> Self {
        Self {
            liveness: Liveness::new(),
            cache,
            load: CatalogLoad::Idle,
            catalog: Vec::new(),
            categories: Vec::new(),
            search_input: String::new(),
            search: String::new(),
            category_filter: None,
            search_debouncer: Debouncer::new(ctx.settings.search_debounce()),
            suggestions: Vec::new(),
            suggestions_for: None,
            catalog_warning: None,
        }
    }

    pub fn instance(&self) -> u64 {
        self.liveness.instance()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    pub fn cache(&self) -> Arc<CatalogCache> {
        Arc::clone(&self.cache)
    }

    pub fn load_state(&self) -> &CatalogLoad {
        &self.load
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn applied_search(&self) -> &str {
        &self.search
    }

    pub fn category_filter(&self) -> Option<CategoryId> {
        self.category_filter
    }

    pub fn suggestions(&self) -> &[HazardSuggestion] {
        &self.suggestions
    }

    pub fn catalog_warning(&self) -> Option<&str> {
        self.catalog_warning.as_deref()
    }

    /// Starts the light catalog load, the category list and the catalog
    /// completeness check.
    pub fn activate(&mut self, ctx: StepContext<'_>) {
        self.load_catalog(ctx);
        self.load_categories(ctx);
        self.validate_catalog(ctx);
    }

    pub fn retry(&mut self, ctx: StepContext<'_>) {
        if matches!(self.load, CatalogLoad::Failed(_)) {
            info!("selector: retrying catalog load");
            self.load_catalog(ctx);
        }
    }

    fn load_catalog(&mut self, ctx: StepContext<'_>) {
        self.load = CatalogLoad::Loading;
        let cache = Arc::clone(&self.cache);
        let liveness = self.liveness.clone();
        let events = ctx.events.clone();
        let query = CatalogQuery {
            search: None,
            limit: Some(ctx.settings.catalog_limit),
        };
        ctx.runtime.spawn(async move {
            let result = cache
                .load_catalog(&query)
                .await
                .map_err(|err| format!("{err:#}"));
            if liveness.is_alive() {
                let _ = events.send(WizardEvent::CatalogLoaded {
                    instance: liveness.instance(),
                    result,
                });
            }
        });
    }

    fn load_categories(&self, ctx: StepContext<'_>) {
        let cache = Arc::clone(&self.cache);
        let liveness = self.liveness.clone();
        let events = ctx.events.clone();
        ctx.runtime.spawn(async move {
            match cache.load_categories().await {
                Ok(categories) if liveness.is_alive() => {
                    let _ = events.send(WizardEvent::CategoriesLoaded {
                        instance: liveness.instance(),
                        categories,
                    });
                }
                Ok(_) => {}
                Err(err) => warn!("selector: category load failed: {err:#}"),
            }
        });
    }

    fn validate_catalog(&self, ctx: StepContext<'_>) {
        let backend = self.cache.backend();
        let liveness = self.liveness.clone();
        let events = ctx.events.clone();
        ctx.runtime.spawn(async move {
            match backend.validate_catalog().await {
                Ok(validation) if liveness.is_alive() => {
                    let _ = events.send(WizardEvent::CatalogValidated {
                        instance: liveness.instance(),
                        validation,
                    });
                }
                Ok(_) => {}
                Err(err) => warn!("selector: catalog validation unavailable: {err:#}"),
            }
        });
    }

    /// Asks for AI category suggestions for a position. Results for any
    /// other position are dropped when they arrive.
    pub fn request_suggestions(
        &mut self,
        ctx: StepContext<'_>,
        position: PositionId,
        position_name: &str,
        sector: Option<String>,
    ) {
        self.suggestions.clear();
        self.suggestions_for = Some(position);
        if position_name.trim().is_empty() {
            return;
        }
        let backend = self.cache.backend();
        let liveness = self.liveness.clone();
        let events = ctx.events.clone();
        let request = SuggestionRequest {
            position_name: position_name.trim().to_string(),
            sector,
        };
        ctx.runtime.spawn(async move {
            match backend.suggest_hazards(&request).await {
                Ok(suggestions) if liveness.is_alive() => {
                    let _ = events.send(WizardEvent::SuggestionsLoaded {
                        instance: liveness.instance(),
                        position,
                        suggestions,
                    });
                }
                Ok(_) => {}
                Err(err) => debug!("selector: no suggestions for position {}: {err:#}", position.0),
            }
        });
    }

    pub fn on_catalog_loaded(&mut self, result: Result<Vec<HazardSummary>, String>) -> Option<Notice> {
        match result {
            Ok(catalog) => {
                self.catalog = catalog;
                self.load = CatalogLoad::Ready;
                None
            }
            Err(message) => {
                warn!("selector: catalog load failed: {message}");
                self.load = CatalogLoad::Failed(message);
                Some(Notice::error(
                    "The hazard catalog could not be loaded. Retry to continue.",
                ))
            }
        }
    }

    pub fn on_categories_loaded(&mut self, categories: Vec<CategorySummary>) {
        self.categories = categories;
    }

    pub fn on_catalog_validated(&mut self, validation: CatalogValidation) -> Option<Notice> {
        if validation.complete {
            self.catalog_warning = None;
            return None;
        }
        let message = format!(
            "The hazard catalog is missing categories: {}",
            validation.missing_categories.join(", ")
        );
        self.catalog_warning = Some(message.clone());
        Some(Notice::warning(message))
    }

    pub fn on_suggestions(&mut self, position: PositionId, mut suggestions: Vec<HazardSuggestion>) -> bool {
        if self.suggestions_for != Some(position) {
            return false;
        }
        suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        self.suggestions = suggestions;
        true
    }

    /// Records the typed text and applies it once typing pauses.
    pub fn set_search(&mut self, ctx: StepContext<'_>, text: impl Into<String>) {
        self.search_input = text.into();
        let liveness = self.liveness.clone();
        let events = ctx.events.clone();
        let text = self.search_input.clone();
        self.search_debouncer.schedule(ctx.runtime, move || {
            if liveness.is_alive() {
                let _ = events.send(WizardEvent::SearchDue {
                    instance: liveness.instance(),
                    text,
                });
            }
        });
    }

    /// Applies a debounced search. Stale texts from earlier keystrokes are
    /// ignored.
    pub fn apply_search(&mut self, text: String) -> bool {
        if text != self.search_input {
            return false;
        }
        self.search = text;
        true
    }

    pub fn set_category_filter(&mut self, category: Option<CategoryId>) {
        self.category_filter = category;
    }

    pub fn category_name(&self, id: CategoryId) -> String {
        self.categories
            .iter()
            .find(|category| category.id == id)
            .map(|category| category.name.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }

    fn matches(&self, summary: &HazardSummary) -> bool {
        if let Some(filter) = self.category_filter {
            if summary.category_id != filter {
                return false;
            }
        }
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || summary.name.to_lowercase().contains(&needle)
            || summary.description.to_lowercase().contains(&needle)
    }

    /// Filtered catalog grouped by category name, common hazards first in
    /// each group.
    pub fn groups(&self, selected: &[HazardId]) -> Vec<CategoryGroup> {
        let mut grouped: BTreeMap<String, Vec<HazardRow>> = BTreeMap::new();
        for summary in self.catalog.iter().filter(|summary| self.matches(summary)) {
            grouped
                .entry(self.category_name(summary.category_id))
                .or_default()
                .push(HazardRow {
                    summary: summary.clone(),
                    selected: selected.contains(&summary.id),
                });
        }
        grouped
            .into_iter()
            .map(|(category, mut items)| {
                items.sort_by(|a, b| {
                    b.summary
                        .is_common
                        .cmp(&a.summary.is_common)
                        .then_with(|| a.summary.name.cmp(&b.summary.name))
                });
                CategoryGroup { category, items }
            })
            .collect()
    }

    pub fn selection(&self, store: &EntityStore, position: PositionId) -> Vec<HazardId> {
        store
            .position(position)
            .map(|position| position.selected_hazard_ids())
            .unwrap_or_default()
    }

    /// Selects or deselects a catalog hazard. Selecting starts a background
    /// detail fetch. Returns the new selected state, or `None` when the
    /// position or hazard is unknown.
    pub fn toggle(
        &mut self,
        store: &mut EntityStore,
        ctx: StepContext<'_>,
        position: PositionId,
        hazard_id: HazardId,
    ) -> Option<bool> {
        let selected = store.position(position)?.hazard_index(hazard_id).is_some();
        if selected {
            store.remove_catalog_hazard(position, hazard_id)?;
            debug!(position_id = position.0, hazard_id = hazard_id.0, "selector: deselected");
            return Some(false);
        }

        let summary = self
            .catalog
            .iter()
            .find(|summary| summary.id == hazard_id)
            .cloned()
            .or_else(|| self.cache.summary(hazard_id))?;
        let category = self.category_name(summary.category_id);
        if !store.add_hazard(
            position,
            HazardAssignment::from_catalog(hazard_id, summary.name, category),
        ) {
            return None;
        }
        debug!(position_id = position.0, hazard_id = hazard_id.0, "selector: selected");

        let cache = Arc::clone(&self.cache);
        ctx.runtime.spawn(async move {
            cache.detail(hazard_id).await;
        });
        Some(true)
    }

    /// Adds a hazard that is not in the catalog.
    pub fn add_custom(
        &mut self,
        store: &mut EntityStore,
        position: PositionId,
        name: &str,
        category: &str,
    ) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let category = match category.trim() {
            "" => UNCATEGORIZED,
            category => category,
        };
        store.add_hazard(position, HazardAssignment::hand_entered(name, category))
    }

    /// Cancels the pending search and marks queued work stale.
    pub fn destroy(&mut self) {
        self.search_debouncer.cancel();
        self.liveness.kill();
        debug!(instance = self.liveness.instance(), "selector: destroyed");
    }
}
