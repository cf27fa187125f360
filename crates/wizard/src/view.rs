//! Rendering seam. The wizard decides what to show; a [`WizardView`]
//! implementation decides how.

use std::sync::{Arc, Mutex, PoisonError};

use shared::{
    domain::{CompanyInfo, ControlSet, HazardAssignment, Position, PositionId},
    protocol::{HazardSuggestion, HazardSummary},
    scoring::Derived,
};
use tracing::{debug, info, warn};

use crate::{
    controller::selector::CatalogLoad,
    events::{Notice, NoticeLevel},
    export::ReviewRow,
    model::ProgressSummary,
    steps::StepId,
    validation::ValidationError,
};

pub trait WizardView: Send {
    /// Full render of the active step, chrome included.
    fn render_step(&mut self, content: &StepContent);
    /// A step controller redrawing its own region after internal state
    /// changed.
    fn update_step(&mut self, content: &StepContent);
    fn patch_progress(&mut self, progress: &ProgressSummary);
    fn show_errors(&mut self, errors: &[ValidationError]);
    fn notify(&mut self, notice: &Notice);
    fn set_navigation_busy(&mut self, busy: bool);
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepContent {
    pub step: StepId,
    pub index: usize,
    pub total: usize,
    pub progress: ProgressSummary,
    pub body: StepBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepBody {
    Company(CompanyInfo),
    Positions(Vec<Position>),
    Hazards(HazardsBody),
    Risk(Option<AssessmentBody>),
    Controls(Option<AssessmentBody>),
    Review(Vec<ReviewRow>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardsBody {
    pub position: Option<(PositionId, String)>,
    pub load: CatalogLoad,
    pub search: String,
    pub groups: Vec<CategoryGroup>,
    pub suggestions: Vec<HazardSuggestion>,
    /// Hand-entered assignments of the active position.
    pub custom: Vec<String>,
    pub catalog_warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    pub category: String,
    pub items: Vec<HazardRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HazardRow {
    pub summary: HazardSummary,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentBody {
    pub position_id: PositionId,
    pub position_name: String,
    pub index: usize,
    pub total: usize,
    pub assignment: Option<HazardAssignment>,
    pub derived: Derived,
    /// Stored controls with any unsaved draft laid over them.
    pub controls: ControlSet,
    pub recommended_measures: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCall {
    Render(StepId),
    Update(StepId),
    Patch(ProgressSummary),
    Errors(Vec<ValidationError>),
    Notice(Notice),
    Busy(bool),
}

/// Keeps every call for later inspection. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
    calls: Arc<Mutex<Vec<ViewCall>>>,
    last_content: Arc<Mutex<Option<StepContent>>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn take(&self) -> Vec<ViewCall> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn last_content(&self) -> Option<StepContent> {
        self.last_content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, call: ViewCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn keep(&self, content: &StepContent) {
        *self
            .last_content
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(content.clone());
    }
}

impl WizardView for RecordingView {
    fn render_step(&mut self, content: &StepContent) {
        self.keep(content);
        self.push(ViewCall::Render(content.step));
    }

    fn update_step(&mut self, content: &StepContent) {
        self.keep(content);
        self.push(ViewCall::Update(content.step));
    }

    fn patch_progress(&mut self, progress: &ProgressSummary) {
        self.push(ViewCall::Patch(*progress));
    }

    fn show_errors(&mut self, errors: &[ValidationError]) {
        self.push(ViewCall::Errors(errors.to_vec()));
    }

    fn notify(&mut self, notice: &Notice) {
        self.push(ViewCall::Notice(notice.clone()));
    }

    fn set_navigation_busy(&mut self, busy: bool) {
        self.push(ViewCall::Busy(busy));
    }
}

/// Headless view that writes to the tracing subscriber.
#[derive(Debug, Default)]
pub struct LogView;

impl WizardView for LogView {
    fn render_step(&mut self, content: &StepContent) {
        info!(
            step = content.step.title(),
            index = content.index + 1,
            total = content.total,
            positions = content.progress.positions,
            assessed = content.progress.assessed_hazards,
            assigned = content.progress.assigned_hazards,
            "wizard step"
        );
    }

    fn update_step(&mut self, content: &StepContent) {
        debug!(step = content.step.title(), "wizard step updated");
    }

    fn patch_progress(&mut self, progress: &ProgressSummary) {
        debug!(
            completion = progress.completion_percent,
            "wizard progress"
        );
    }

    fn show_errors(&mut self, errors: &[ValidationError]) {
        for error in errors {
            warn!(field = ?error.field, "{}", error.message);
        }
    }

    fn notify(&mut self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Warning | NoticeLevel::Error => warn!("{}", notice.message),
        }
    }

    fn set_navigation_busy(&mut self, busy: bool) {
        debug!(busy, "wizard navigation");
    }
}
