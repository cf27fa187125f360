//! The wizard: step sequence, render-or-patch decisions, validation gates and
//! the cross-step side effects of navigation.

use std::{collections::HashMap, sync::Arc};

use catalog_client::{
    CatalogBackend, CatalogCache, DetailListener, DocumentSink, MissingCatalogBackend,
    MissingDocumentSink,
};
use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use shared::{
    domain::{
        CategoryId, CompanyInfo, ControlField, FactorKind, FactorValue, HazardId, PositionDraft,
        PositionId,
    },
    protocol::{DocumentReceipt, HazardDetail},
    scoring::Derived,
};
use storage::StatePersistence;
use tokio::{runtime::Handle, sync::watch};
use tracing::{debug, error, info, warn};

use crate::{
    config::WizardSettings,
    controller::{
        control_editor::ControlEditor, factor_editor::FactorEditor,
        selector::{CatalogLoad, SelectorController},
        StepContext,
    },
    cursor::CursorMove,
    events::{NavigationError, Notice, WizardError, WizardEvent},
    export::{build_export, review_rows},
    model::{EntityStore, ModelChange, ProgressSummary, WizardModel},
    steps::{StepId, StepManagement},
    validation::{validate_step, Coverage, ValidationError},
    view::{AssessmentBody, HazardsBody, StepBody, StepContent, WizardView},
};

macro_rules! step_ctx {
    ($wizard:ident) => {
        StepContext {
            runtime: &$wizard.runtime,
            events: &$wizard.events_tx,
            settings: &$wizard.settings,
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    Advanced(StepId),
    /// Navigation waits for the hazard detail pre-fetch; the step changes
    /// when it settles.
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardStep {
    Moved(usize),
    NextPosition(PositionId),
    Completed(NavOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Navigation {
    Idle,
    Prefetching { sequence: u64, from: usize, target: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum SaveRequest {
    Idle,
    Save(Box<WizardModel>),
    Clear,
}

pub struct WizardBuilder {
    settings: WizardSettings,
    view: Option<Box<dyn WizardView>>,
    backend: Option<Arc<dyn CatalogBackend>>,
    sink: Option<Arc<dyn DocumentSink>>,
    persistence: Option<StatePersistence>,
    runtime: Option<Handle>,
}

impl WizardBuilder {
    pub fn new(settings: WizardSettings) -> Self {
        Self {
            settings,
            view: None,
            backend: None,
            sink: None,
            persistence: None,
            runtime: None,
        }
    }

    pub fn view(mut self, view: impl WizardView + 'static) -> Self {
        self.view = Some(Box::new(view));
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CatalogBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DocumentSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn persistence(mut self, persistence: StatePersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Wizard, WizardError> {
        let Some(view) = self.view else {
            error!("wizard: no view to render into");
            return Err(WizardError::MissingView);
        };
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| WizardError::MissingRuntime)?,
        };

        let (events_tx, events_rx) = unbounded();
        let listener: DetailListener = {
            let events = events_tx.clone();
            Arc::new(move |detail: &HazardDetail| {
                let _ = events.send(WizardEvent::DetailLoaded(detail.id));
            })
        };
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MissingCatalogBackend));
        let catalog = Arc::new(CatalogCache::new(backend).with_listener(listener));
        let sink = self.sink.unwrap_or_else(|| Arc::new(MissingDocumentSink));

        let saver = self
            .persistence
            .clone()
            .map(|persistence| spawn_saver(&runtime, persistence, events_tx.clone()));

        let mut store = EntityStore::new();
        let changes = store.subscribe();
        let steps = self.settings.step_layout.steps();
        info!(layout = %self.settings.step_layout, steps = steps.len(), "wizard ready");

        Ok(Wizard {
            settings: self.settings,
            steps,
            store,
            changes,
            view,
            runtime,
            events_tx,
            events_rx,
            catalog,
            sink,
            persistence: self.persistence,
            saver,
            selector: None,
            factor_editors: HashMap::new(),
            control_editor: None,
            rendered_step: None,
            inline_errors: Vec::new(),
            errors_step: None,
            navigation: Navigation::Idle,
            prefetch_sequence: 0,
            redraw_body: false,
            coverage_confirmed: false,
            exporting: false,
            receipt: None,
        })
    }
}

fn spawn_saver(
    runtime: &Handle,
    persistence: StatePersistence,
    events: Sender<WizardEvent>,
) -> watch::Sender<SaveRequest> {
    let (tx, mut rx) = watch::channel(SaveRequest::Idle);
    runtime.spawn(async move {
        while rx.changed().await.is_ok() {
            let request = rx.borrow_and_update().clone();
            let result = match request {
                SaveRequest::Idle => continue,
                SaveRequest::Save(model) => persistence.save(&*model).await,
                SaveRequest::Clear => persistence.clear().await,
            };
            if let Err(err) = result {
                warn!("wizard: saving state failed: {err:#}");
                let _ = events.send(WizardEvent::SaveFailed(format!("{err:#}")));
            }
        }
    });
    tx
}

pub struct Wizard {
    settings: WizardSettings,
    steps: Vec<StepId>,
    store: EntityStore,
    changes: Receiver<ModelChange>,
    view: Box<dyn WizardView>,
    runtime: Handle,
    events_tx: Sender<WizardEvent>,
    events_rx: Receiver<WizardEvent>,
    catalog: Arc<CatalogCache>,
    sink: Arc<dyn DocumentSink>,
    persistence: Option<StatePersistence>,
    saver: Option<watch::Sender<SaveRequest>>,
    selector: Option<SelectorController>,
    factor_editors: HashMap<PositionId, FactorEditor>,
    control_editor: Option<ControlEditor>,
    rendered_step: Option<usize>,
    inline_errors: Vec<ValidationError>,
    errors_step: Option<usize>,
    navigation: Navigation,
    prefetch_sequence: u64,
    redraw_body: bool,
    coverage_confirmed: bool,
    exporting: bool,
    receipt: Option<DocumentReceipt>,
}

impl Wizard {
    pub fn builder(settings: WizardSettings) -> WizardBuilder {
        WizardBuilder::new(settings)
    }

    pub fn settings(&self) -> &WizardSettings {
        &self.settings
    }

    pub fn steps(&self) -> &[StepId] {
        &self.steps
    }

    pub fn current_step(&self) -> StepId {
        self.step_at(self.store.current_step())
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn catalog(&self) -> Arc<CatalogCache> {
        Arc::clone(&self.catalog)
    }

    pub fn progress(&self) -> ProgressSummary {
        self.store.model().progress(self.steps.len())
    }

    pub fn inline_errors(&self) -> &[ValidationError] {
        &self.inline_errors
    }

    pub fn is_navigation_busy(&self) -> bool {
        self.navigation != Navigation::Idle || self.exporting
    }

    pub fn selector(&self) -> Option<&SelectorController> {
        self.selector.as_ref()
    }

    pub fn factor_editor(&self, position: PositionId) -> Option<&FactorEditor> {
        self.factor_editors.get(&position)
    }

    pub fn control_editor(&self) -> Option<&ControlEditor> {
        self.control_editor.as_ref()
    }

    pub fn last_receipt(&self) -> Option<&DocumentReceipt> {
        self.receipt.as_ref()
    }

    fn step_at(&self, index: usize) -> StepId {
        self.steps
            .get(index)
            .copied()
            .unwrap_or(StepId::Company)
    }

    /// First render.
    pub fn start(&mut self) {
        self.reconcile();
    }

    /// Loads saved state when there is fresh state to load. Expired or
    /// unreadable state is discarded by the persistence layer.
    pub async fn resume(&mut self) -> Result<bool, WizardError> {
        let Some(persistence) = self.persistence.clone() else {
            return Ok(false);
        };
        let loaded: Option<WizardModel> = persistence
            .load()
            .await
            .map_err(WizardError::Persistence)?;
        let Some(mut model) = loaded else {
            return Ok(false);
        };
        model.clamp_steps(self.steps.len());
        info!(
            step = model.current_step(),
            positions = model.positions().len(),
            "wizard: resumed saved state"
        );
        self.store.replace(model);
        self.reconcile();
        Ok(true)
    }

    /// Starts over with an empty model and clears saved state.
    pub fn reset(&mut self) {
        if self.navigation != Navigation::Idle {
            self.navigation = Navigation::Idle;
            self.view.set_navigation_busy(false);
        }
        self.store.replace(WizardModel::default());
        if let Some(saver) = &self.saver {
            saver.send_replace(SaveRequest::Clear);
        }
        info!("wizard: reset");
        self.reconcile();
    }

    /// Applies finished background work, then brings the view up to date.
    /// Returns the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            handled += 1;
            self.handle_event(event);
        }
        self.reconcile();
        handled
    }

    fn handle_event(&mut self, event: WizardEvent) {
        match event {
            WizardEvent::CatalogLoaded { instance, result } => {
                let Some(selector) = self.live_selector(instance) else {
                    return;
                };
                let notice = selector.on_catalog_loaded(result);
                if let Some(notice) = notice {
                    self.view.notify(&notice);
                } else {
                    info!("wizard: hazard catalog loaded");
                }
                self.update_view();
            }
            WizardEvent::CategoriesLoaded {
                instance,
                categories,
            } => {
                if let Some(selector) = self.live_selector(instance) {
                    selector.on_categories_loaded(categories);
                    self.update_view();
                }
            }
            WizardEvent::CatalogValidated {
                instance,
                validation,
            } => {
                let notice = self
                    .live_selector(instance)
                    .and_then(|selector| selector.on_catalog_validated(validation));
                if let Some(notice) = notice {
                    self.view.notify(&notice);
                }
            }
            WizardEvent::SuggestionsLoaded {
                instance,
                position,
                suggestions,
            } => {
                let applied = self
                    .live_selector(instance)
                    .is_some_and(|selector| selector.on_suggestions(position, suggestions));
                if applied {
                    self.update_view();
                }
            }
            WizardEvent::SearchDue { instance, text } => {
                let applied = self
                    .live_selector(instance)
                    .is_some_and(|selector| selector.apply_search(text));
                if applied {
                    self.update_view();
                }
            }
            WizardEvent::DetailLoaded(hazard_id) => {
                debug!(hazard_id = hazard_id.0, "wizard: hazard detail available");
                if matches!(self.current_step(), StepId::Hazards | StepId::Risk) {
                    self.update_view();
                }
            }
            WizardEvent::AutosaveDue { instance, generation } => {
                let editor = self
                    .factor_editors
                    .values_mut()
                    .find(|editor| editor.instance() == instance && editor.is_alive());
                match editor {
                    Some(editor) => {
                        editor.autosave_due(&mut self.store, generation);
                    }
                    None => debug!(instance, "wizard: autosave for a destroyed editor ignored"),
                }
            }
            WizardEvent::PrefetchSettled { sequence, report } => {
                match report {
                    Some(report) => info!(
                        requested = report.requested,
                        loaded = report.loaded,
                        "wizard: hazard detail pre-fetch settled"
                    ),
                    None => warn!("wizard: hazard detail pre-fetch timed out"),
                }
                let Navigation::Prefetching {
                    sequence: awaited,
                    from,
                    target,
                } = self.navigation
                else {
                    debug!(sequence, "wizard: pre-fetch settled with nothing waiting");
                    return;
                };
                if awaited != sequence {
                    debug!(sequence, awaited, "wizard: stale pre-fetch ignored");
                    return;
                }
                self.navigation = Navigation::Idle;
                self.view.set_navigation_busy(false);
                if self.store.current_step() == from {
                    self.advance_to(target);
                }
            }
            WizardEvent::SaveFailed(message) => {
                self.view
                    .notify(&Notice::warning(format!("Progress could not be saved: {message}")));
            }
            WizardEvent::ExportFinished(result) => {
                self.exporting = false;
                self.view.set_navigation_busy(false);
                match result {
                    Ok(receipt) => {
                        info!(document_id = %receipt.document_id, "wizard: document accepted");
                        self.view.notify(&Notice::info(format!(
                            "Document {} was sent for generation",
                            receipt.document_id
                        )));
                        self.receipt = Some(receipt);
                    }
                    Err(message) => {
                        warn!("wizard: document hand-off failed: {message}");
                        self.view.notify(&Notice::error(format!(
                            "The document could not be generated: {message}"
                        )));
                    }
                }
            }
        }
    }

    fn live_selector(&mut self, instance: u64) -> Option<&mut SelectorController> {
        self.selector
            .as_mut()
            .filter(|selector| selector.instance() == instance && selector.is_alive())
    }

    /// Drains model notifications and decides between a full render and a
    /// chrome patch.
    fn reconcile(&mut self) {
        let changes: Vec<ModelChange> = self.changes.try_iter().collect();
        let current = self.store.current_step();
        let replaced = changes.contains(&ModelChange::Replaced);
        let step_changed = replaced || self.rendered_step != Some(current);
        if !step_changed && changes.is_empty() && !self.redraw_body {
            return;
        }

        self.apply_change_side_effects(&changes, step_changed);

        if step_changed {
            if let Some(previous) = self.rendered_step {
                self.leave_step(self.step_at(previous));
            }
            self.enter_step(self.step_at(current));
            // Activation may pick a default position; the render below covers it.
            let _ = self.changes.try_iter().count();
            self.rendered_step = Some(current);
            self.clear_inline_errors();
            self.redraw_body = false;
            debug!(step = self.step_at(current).title(), "wizard: full render (step changed)");
            let content = self.step_content();
            self.view.render_step(&content);
        } else {
            let redraw = std::mem::take(&mut self.redraw_body);
            match self.step_at(current).management() {
                StepManagement::SelfManaged if redraw => {
                    debug!("wizard: redrawing step body (position switched)");
                    self.update_view();
                }
                StepManagement::SelfManaged => {
                    debug!("wizard: patching progress chrome");
                    let progress = self.progress();
                    self.view.patch_progress(&progress);
                }
                StepManagement::TemplateManaged => {
                    debug!("wizard: full render (template step)");
                    let content = self.step_content();
                    self.view.render_step(&content);
                }
            }
            self.refresh_inline_errors();
        }

        self.persist();
    }

    fn apply_change_side_effects(&mut self, changes: &[ModelChange], step_changed: bool) {
        for change in changes {
            match change {
                ModelChange::PositionRemoved(position) => {
                    if let Some(mut editor) = self.factor_editors.remove(position) {
                        editor.destroy();
                    }
                    if self
                        .control_editor
                        .as_ref()
                        .is_some_and(|editor| editor.position() == *position)
                    {
                        if let Some(mut editor) = self.control_editor.take() {
                            editor.destroy();
                        }
                    }
                }
                ModelChange::HazardsChanged(position) => {
                    self.coverage_confirmed = false;
                    if let Some(editor) = self.factor_editors.get_mut(position) {
                        editor.clamp(&self.store);
                    }
                    if let Some(editor) = self
                        .control_editor
                        .as_mut()
                        .filter(|editor| editor.position() == *position)
                    {
                        editor.clamp(&self.store);
                    }
                }
                ModelChange::ActivePositionChanged(_) if !step_changed => {
                    self.bind_active_position();
                    self.redraw_body = true;
                }
                _ => {}
            }
        }
    }

    fn leave_step(&mut self, step: StepId) {
        match step {
            StepId::Hazards => {
                if let Some(mut selector) = self.selector.take() {
                    selector.destroy();
                }
                self.coverage_confirmed = false;
            }
            StepId::Risk => {
                let count = self.factor_editors.len();
                for (_, mut editor) in self.factor_editors.drain() {
                    editor.destroy();
                }
                debug!(count, "wizard: factor editors destroyed");
            }
            StepId::Controls => {
                if let Some(mut editor) = self.control_editor.take() {
                    editor.destroy();
                }
            }
            StepId::Company | StepId::Positions | StepId::Review => {}
        }
    }

    fn enter_step(&mut self, step: StepId) {
        if matches!(step, StepId::Hazards | StepId::Risk | StepId::Controls) {
            let active = self
                .store
                .active_position()
                .filter(|id| self.store.position(*id).is_some())
                .or_else(|| self.store.positions().first().map(|p| p.id));
            self.store.set_active_position(active);
        }
        if step == StepId::Hazards {
            let ctx = step_ctx!(self);
            let mut selector = SelectorController::new(Arc::clone(&self.catalog), ctx);
            selector.activate(ctx);
            self.selector = Some(selector);
        }
        self.bind_active_position();
    }

    /// Points the active step's controller at the active position.
    fn bind_active_position(&mut self) {
        let Some(position) = self.store.active_position() else {
            return;
        };
        let ctx = step_ctx!(self);
        match self.step_at(self.store.current_step()) {
            StepId::Hazards => {
                let Some(selector) = self.selector.as_mut() else {
                    return;
                };
                let Some(target) = self.store.position(position) else {
                    return;
                };
                let sector = self.store.company().sector.clone();
                selector.request_suggestions(ctx, position, &target.name, sector);
            }
            StepId::Risk => {
                self.factor_editors
                    .entry(position)
                    .or_insert_with(|| FactorEditor::new(position, ctx));
            }
            StepId::Controls => {
                if self
                    .control_editor
                    .as_ref()
                    .is_some_and(|editor| editor.position() == position)
                {
                    return;
                }
                if let Some(mut previous) = self.control_editor.take() {
                    previous.reset_cursor(&mut self.store);
                    previous.destroy();
                }
                self.control_editor = Some(ControlEditor::new(position));
            }
            StepId::Company | StepId::Positions | StepId::Review => {}
        }
    }

    fn update_view(&mut self) {
        let content = self.step_content();
        self.view.update_step(&content);
    }

    fn step_content(&self) -> StepContent {
        let index = self.store.current_step();
        let step = self.step_at(index);
        let body = match step {
            StepId::Company => StepBody::Company(self.store.company().clone()),
            StepId::Positions => StepBody::Positions(self.store.positions().to_vec()),
            StepId::Hazards => StepBody::Hazards(self.hazards_body()),
            StepId::Risk => StepBody::Risk(self.assessment_body(step)),
            StepId::Controls => StepBody::Controls(self.assessment_body(step)),
            StepId::Review => StepBody::Review(review_rows(self.store.model())),
        };
        StepContent {
            step,
            index,
            total: self.steps.len(),
            progress: self.progress(),
            body,
        }
    }

    fn hazards_body(&self) -> HazardsBody {
        let position = self
            .store
            .active_position()
            .and_then(|id| self.store.position(id));
        let selected = position
            .map(|position| position.selected_hazard_ids())
            .unwrap_or_default();
        let custom = position
            .map(|position| {
                position
                    .hazards
                    .iter()
                    .filter(|assignment| assignment.hazard_id.is_none())
                    .map(|assignment| assignment.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        let selector = self.selector.as_ref();
        HazardsBody {
            position: position.map(|position| (position.id, position.name.clone())),
            load: selector.map_or(CatalogLoad::Idle, |s| s.load_state().clone()),
            search: selector.map(|s| s.search_input().to_string()).unwrap_or_default(),
            groups: selector.map(|s| s.groups(&selected)).unwrap_or_default(),
            suggestions: selector.map(|s| s.suggestions().to_vec()).unwrap_or_default(),
            custom,
            catalog_warning: selector.and_then(|s| s.catalog_warning().map(str::to_owned)),
        }
    }

    fn assessment_body(&self, step: StepId) -> Option<AssessmentBody> {
        let position = self.store.position(self.store.active_position()?)?;
        let (current, controls) = match step {
            StepId::Risk => {
                let editor = self.factor_editors.get(&position.id)?;
                (editor.current(&self.store), editor.controls_view(&self.store))
            }
            StepId::Controls => {
                let editor = self.control_editor.as_ref()?;
                (editor.current(&self.store), editor.controls_view(&self.store))
            }
            _ => return None,
        };
        let recommended_measures = current
            .and_then(|(_, assignment)| assignment.hazard_id)
            .and_then(|id| self.catalog.cached_detail(id))
            .and_then(|detail| detail.recommended_measures.clone());
        Some(AssessmentBody {
            position_id: position.id,
            position_name: position.name.clone(),
            index: current.map_or(0, |(index, _)| index),
            total: position.hazards.len(),
            assignment: current.map(|(_, assignment)| assignment.clone()),
            derived: current
                .map(|(_, assignment)| assignment.derived())
                .unwrap_or_default(),
            controls,
            recommended_measures,
        })
    }

    fn show_validation(&mut self, step_index: usize, errors: Vec<ValidationError>) {
        self.view.show_errors(&errors);
        self.inline_errors = errors;
        self.errors_step = Some(step_index);
    }

    fn clear_inline_errors(&mut self) {
        self.errors_step = None;
        if !self.inline_errors.is_empty() {
            self.inline_errors.clear();
            self.view.show_errors(&[]);
        }
    }

    /// Drops shown errors whose field has been corrected.
    fn refresh_inline_errors(&mut self) {
        let Some(step_index) = self.errors_step else {
            return;
        };
        if self.inline_errors.is_empty() {
            return;
        }
        let fresh = validate_step(
            self.step_at(step_index),
            self.store.model(),
            self.settings.low_coverage_threshold,
        )
        .err()
        .unwrap_or_default();
        let still_wrong: Vec<ValidationError> = fresh
            .into_iter()
            .filter(|error| self.inline_errors.iter().any(|shown| shown.field == error.field))
            .collect();
        if still_wrong != self.inline_errors {
            self.view.show_errors(&still_wrong);
            self.inline_errors = still_wrong;
        }
    }

    fn persist(&mut self) {
        let Some(saver) = &self.saver else {
            return;
        };
        let model = self.store.model();
        if *model == WizardModel::default() {
            return;
        }
        saver.send_replace(SaveRequest::Save(Box::new(model.clone())));
    }

    fn ensure_idle(&self) -> Result<(), NavigationError> {
        if self.exporting {
            return Err(NavigationError::ExportInProgress);
        }
        if self.navigation != Navigation::Idle {
            return Err(NavigationError::Busy);
        }
        Ok(())
    }

    fn advance_to(&mut self, target: usize) {
        let from = self.store.current_step();
        info!(
            from = self.step_at(from).title(),
            to = self.step_at(target).title(),
            "wizard: step transition"
        );
        self.store.set_current_step(target);
        self.reconcile();
    }

    /// Runs the gate of one step being left forward.
    fn gate(&mut self, index: usize) -> Result<(), NavigationError> {
        let threshold = self.settings.low_coverage_threshold;
        match validate_step(self.step_at(index), self.store.model(), threshold) {
            Ok(Coverage::Sufficient) => Ok(()),
            Ok(Coverage::Low { average }) if !self.coverage_confirmed => {
                self.view.notify(&Notice::warning(format!(
                    "Positions average {average:.1} hazards; at least {threshold:.1} are expected"
                )));
                Err(NavigationError::LowCoverage { average, threshold })
            }
            Ok(Coverage::Low { .. }) => Ok(()),
            Err(errors) => {
                self.show_validation(index, errors.clone());
                Err(NavigationError::Validation(errors))
            }
        }
    }

    pub fn next(&mut self) -> Result<NavOutcome, NavigationError> {
        self.ensure_idle()?;
        let index = self.store.current_step();
        if index + 1 >= self.steps.len() {
            return Err(NavigationError::AtLastStep);
        }
        self.gate(index)?;
        self.clear_inline_errors();
        Ok(self.move_forward(index, index + 1))
    }

    /// Accepts a below-threshold hazard count and moves on.
    pub fn confirm_low_coverage(&mut self) -> Result<NavOutcome, NavigationError> {
        self.coverage_confirmed = true;
        self.next()
    }

    pub fn previous(&mut self) -> Result<StepId, NavigationError> {
        self.ensure_idle()?;
        let index = self.store.current_step();
        if index == 0 {
            return Err(NavigationError::AtFirstStep);
        }
        self.advance_to(index - 1);
        Ok(self.current_step())
    }

    /// Moves to a step already reached. Forward jumps pass every gate in
    /// between.
    pub fn jump_to_step(&mut self, step: StepId) -> Result<NavOutcome, NavigationError> {
        self.ensure_idle()?;
        let target = self
            .steps
            .iter()
            .position(|candidate| *candidate == step)
            .ok_or(NavigationError::UnknownStep(step))?;
        if target > self.store.model().furthest_step() {
            return Err(NavigationError::NotReached(step));
        }
        let current = self.store.current_step();
        if target <= current {
            if target != current {
                self.advance_to(target);
            }
            return Ok(NavOutcome::Advanced(step));
        }
        for index in current..target {
            self.gate(index)?;
        }
        self.clear_inline_errors();
        Ok(self.move_forward(current, target))
    }

    fn move_forward(&mut self, from: usize, target: usize) -> NavOutcome {
        let crosses_hazards = (from..target).any(|index| self.step_at(index) == StepId::Hazards);
        if crosses_hazards {
            self.start_prefetch(from, target);
            return NavOutcome::Pending;
        }
        self.advance_to(target);
        NavOutcome::Advanced(self.step_at(target))
    }

    fn start_prefetch(&mut self, from: usize, target: usize) {
        let ids: Vec<HazardId> = self
            .store
            .positions()
            .iter()
            .flat_map(|position| position.selected_hazard_ids())
            .collect();
        self.prefetch_sequence += 1;
        let sequence = self.prefetch_sequence;
        self.navigation = Navigation::Prefetching {
            sequence,
            from,
            target,
        };
        self.view.set_navigation_busy(true);
        info!(count = ids.len(), "wizard: pre-fetching hazard details");

        let cache = Arc::clone(&self.catalog);
        let events = self.events_tx.clone();
        let timeout = self.settings.prefetch_timeout();
        self.runtime.spawn(async move {
            let task = tokio::spawn(async move { cache.prefetch(&ids).await });
            let report = match tokio::time::timeout(timeout, task).await {
                Ok(Ok(report)) => Some(report),
                Ok(Err(err)) => {
                    warn!("wizard: pre-fetch task failed: {err}");
                    None
                }
                Err(_) => None,
            };
            let _ = events.send(WizardEvent::PrefetchSettled { sequence, report });
        });
    }

    pub fn set_company(&mut self, company: CompanyInfo) {
        self.store.set_company(company);
        self.reconcile();
    }

    pub fn add_position(&mut self, draft: PositionDraft) -> PositionId {
        let id = self.store.add_position(draft);
        self.reconcile();
        id
    }

    pub fn update_position(&mut self, id: PositionId, draft: PositionDraft) -> Result<(), NavigationError> {
        if !self.store.update_position(id, draft) {
            return Err(NavigationError::UnknownPosition(id));
        }
        self.reconcile();
        Ok(())
    }

    pub fn remove_position(&mut self, id: PositionId) -> Result<(), NavigationError> {
        if !self.store.remove_position(id) {
            return Err(NavigationError::UnknownPosition(id));
        }
        self.reconcile();
        Ok(())
    }

    /// Makes `id` the position the hazard, risk and control steps work on.
    /// Its cursor starts again at the first hazard.
    pub fn select_position(&mut self, id: PositionId) -> Result<(), NavigationError> {
        if self.store.position(id).is_none() {
            return Err(NavigationError::UnknownPosition(id));
        }
        self.store.set_active_position(Some(id));
        if let Some(editor) = self.factor_editors.get_mut(&id) {
            editor.reset_cursor(&mut self.store);
        }
        if let Some(editor) = self
            .control_editor
            .as_mut()
            .filter(|editor| editor.position() == id)
        {
            editor.reset_cursor(&mut self.store);
        }
        self.redraw_body = true;
        self.reconcile();
        Ok(())
    }

    fn active_position(&self) -> Result<PositionId, NavigationError> {
        self.store
            .active_position()
            .ok_or(NavigationError::NoActivePosition)
    }

    fn require_step(&self, step: StepId) -> Result<(), NavigationError> {
        if self.current_step() == step {
            Ok(())
        } else {
            Err(NavigationError::WrongStep)
        }
    }

    pub fn search(&mut self, text: impl Into<String>) -> Result<(), NavigationError> {
        self.require_step(StepId::Hazards)?;
        let ctx = step_ctx!(self);
        let selector = self.selector.as_mut().ok_or(NavigationError::WrongStep)?;
        selector.set_search(ctx, text);
        self.update_view();
        Ok(())
    }

    pub fn filter_category(&mut self, category: Option<CategoryId>) -> Result<(), NavigationError> {
        self.require_step(StepId::Hazards)?;
        let selector = self.selector.as_mut().ok_or(NavigationError::WrongStep)?;
        selector.set_category_filter(category);
        self.update_view();
        Ok(())
    }

    pub fn retry_catalog(&mut self) -> Result<(), NavigationError> {
        self.require_step(StepId::Hazards)?;
        let ctx = step_ctx!(self);
        let selector = self.selector.as_mut().ok_or(NavigationError::WrongStep)?;
        selector.retry(ctx);
        self.update_view();
        Ok(())
    }

    /// Returns whether the hazard is selected afterwards.
    pub fn toggle_hazard(&mut self, hazard_id: HazardId) -> Result<bool, NavigationError> {
        self.require_step(StepId::Hazards)?;
        let position = self.active_position()?;
        let ctx = step_ctx!(self);
        let selector = self.selector.as_mut().ok_or(NavigationError::WrongStep)?;
        let selected = selector
            .toggle(&mut self.store, ctx, position, hazard_id)
            .ok_or(NavigationError::UnknownHazard(hazard_id))?;
        self.update_view();
        self.reconcile();
        Ok(selected)
    }

    pub fn add_custom_hazard(&mut self, name: &str, category: &str) -> Result<bool, NavigationError> {
        self.require_step(StepId::Hazards)?;
        let position = self.active_position()?;
        let selector = self.selector.as_mut().ok_or(NavigationError::WrongStep)?;
        let added = selector.add_custom(&mut self.store, position, name, category);
        self.update_view();
        self.reconcile();
        Ok(added)
    }

    pub fn set_factor(&mut self, value: FactorValue) -> Result<Derived, NavigationError> {
        self.require_step(StepId::Risk)?;
        let position = self.active_position()?;
        let editor = self
            .factor_editors
            .get_mut(&position)
            .ok_or(NavigationError::NoActivePosition)?;
        let derived = editor.set_factor(&mut self.store, value)?;
        self.update_view();
        self.reconcile();
        Ok(derived)
    }

    pub fn clear_factor(&mut self, kind: FactorKind) -> Result<Derived, NavigationError> {
        self.require_step(StepId::Risk)?;
        let position = self.active_position()?;
        let editor = self
            .factor_editors
            .get_mut(&position)
            .ok_or(NavigationError::NoActivePosition)?;
        let derived = editor.clear_factor(&mut self.store, kind)?;
        self.update_view();
        self.reconcile();
        Ok(derived)
    }

    /// Next hazard of the active position. Past the last hazard the wizard
    /// moves to the next position, and past the last position to the next
    /// step.
    pub fn next_hazard(&mut self) -> Result<HazardStep, NavigationError> {
        let position = self.active_position()?;
        let moved = match self.current_step() {
            StepId::Risk => {
                let editor = self
                    .factor_editors
                    .get_mut(&position)
                    .ok_or(NavigationError::NoActivePosition)?;
                editor.next(&mut self.store)?
            }
            StepId::Controls => {
                let editor = self
                    .control_editor
                    .as_mut()
                    .ok_or(NavigationError::NoActivePosition)?;
                editor.next(&mut self.store)?
            }
            _ => return Err(NavigationError::WrongStep),
        };
        match moved {
            CursorMove::Moved(index) => {
                self.update_view();
                self.reconcile();
                Ok(HazardStep::Moved(index))
            }
            CursorMove::Exhausted => self.finish_position(position),
        }
    }

    pub fn previous_hazard(&mut self) -> Result<usize, NavigationError> {
        let position = self.active_position()?;
        let index = match self.current_step() {
            StepId::Risk => self
                .factor_editors
                .get_mut(&position)
                .ok_or(NavigationError::NoActivePosition)?
                .previous(&mut self.store)?,
            StepId::Controls => self
                .control_editor
                .as_mut()
                .ok_or(NavigationError::NoActivePosition)?
                .previous(&mut self.store)?,
            _ => return Err(NavigationError::WrongStep),
        };
        self.update_view();
        self.reconcile();
        Ok(index)
    }

    pub fn jump_to_hazard(&mut self, index: usize) -> Result<usize, NavigationError> {
        let position = self.active_position()?;
        let index = match self.current_step() {
            StepId::Risk => self
                .factor_editors
                .get_mut(&position)
                .ok_or(NavigationError::NoActivePosition)?
                .jump_to(&mut self.store, index)?,
            StepId::Controls => self
                .control_editor
                .as_mut()
                .ok_or(NavigationError::NoActivePosition)?
                .jump_to(&mut self.store, index)?,
            _ => return Err(NavigationError::WrongStep),
        };
        self.update_view();
        self.reconcile();
        Ok(index)
    }

    /// Completes the active position once every hazard has its factors.
    pub fn complete_position(&mut self) -> Result<HazardStep, NavigationError> {
        self.require_step(StepId::Risk)?;
        let position = self.active_position()?;
        self.factor_editors
            .get_mut(&position)
            .ok_or(NavigationError::NoActivePosition)?
            .complete_all(&mut self.store)?;
        self.finish_position(position)
    }

    fn finish_position(&mut self, position: PositionId) -> Result<HazardStep, NavigationError> {
        let positions = self.store.positions();
        let following = positions
            .iter()
            .position(|candidate| candidate.id == position)
            .and_then(|index| positions.get(index + 1))
            .map(|candidate| candidate.id);
        match following {
            Some(next_position) => {
                self.select_position(next_position)?;
                Ok(HazardStep::NextPosition(next_position))
            }
            None => {
                self.reconcile();
                Ok(HazardStep::Completed(self.next()?))
            }
        }
    }

    /// Edits a control field of the current hazard. In the risk step the
    /// text is a draft that is saved after a quiet period; in the controls
    /// step it is saved when the field loses focus.
    pub fn edit_control(&mut self, field: ControlField, text: Option<String>) -> Result<(), NavigationError> {
        let position = self.active_position()?;
        match self.current_step() {
            StepId::Risk => {
                let ctx = step_ctx!(self);
                let editor = self
                    .factor_editors
                    .get_mut(&position)
                    .ok_or(NavigationError::NoActivePosition)?;
                editor.edit_control(ctx, &self.store, field, text)?;
            }
            StepId::Controls => {
                let editor = self
                    .control_editor
                    .as_mut()
                    .ok_or(NavigationError::NoActivePosition)?;
                editor.edit(field, text);
            }
            _ => return Err(NavigationError::WrongStep),
        }
        self.update_view();
        Ok(())
    }

    pub fn blur_control(&mut self, field: ControlField) -> Result<bool, NavigationError> {
        self.require_step(StepId::Controls)?;
        let editor = self
            .control_editor
            .as_mut()
            .ok_or(NavigationError::NoActivePosition)?;
        let saved = editor.blur(&mut self.store, field);
        self.reconcile();
        Ok(saved)
    }

    /// Control text as the user sees it, drafts included.
    pub fn control_value(&self, field: ControlField) -> Option<String> {
        let position = self.store.active_position()?;
        let controls = match self.current_step() {
            StepId::Risk => self.factor_editors.get(&position)?.controls_view(&self.store),
            StepId::Controls => self.control_editor.as_ref()?.controls_view(&self.store),
            _ => return None,
        };
        controls.get(field).map(str::to_owned)
    }

    /// Validates everything and hands the document to the sink. The result
    /// arrives through `pump`.
    pub fn finish(&mut self) -> Result<String, NavigationError> {
        self.ensure_idle()?;
        self.require_step(StepId::Review)?;
        let index = self.store.current_step();
        if let Err(errors) = validate_step(
            StepId::Review,
            self.store.model(),
            self.settings.low_coverage_threshold,
        ) {
            self.show_validation(index, errors.clone());
            return Err(NavigationError::Validation(errors));
        }

        let export = build_export(self.store.model(), Utc::now());
        let document_id = export.document_id.clone();
        self.exporting = true;
        self.view.set_navigation_busy(true);
        info!(
            document_id = %document_id,
            positions = export.positions.len(),
            "wizard: handing off document export"
        );

        let sink = Arc::clone(&self.sink);
        let events = self.events_tx.clone();
        self.runtime.spawn(async move {
            let result = sink.submit(&export).await.map_err(|err| format!("{err:#}"));
            let _ = events.send(WizardEvent::ExportFinished(result));
        });
        Ok(document_id)
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
