//! Observable wizard model.
//!
//! [`EntityStore`] is the single owner of the [`WizardModel`]. Reads go through
//! accessors; every write goes through a mutator that publishes a
//! [`ModelChange`] to all subscribers.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use shared::domain::{
    CompanyInfo, ControlField, FactorKind, FactorValue, HazardAssignment, HazardId, Position,
    PositionDraft, PositionId,
};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardModel {
    company: CompanyInfo,
    positions: Vec<Position>,
    current_step: usize,
    furthest_step: usize,
    active_position: Option<PositionId>,
    next_position_id: i64,
}

impl WizardModel {
    pub fn company(&self) -> &CompanyInfo {
        &self.company
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|position| position.id == id)
    }

    pub fn position_index(&self, id: PositionId) -> Option<usize> {
        self.positions.iter().position(|position| position.id == id)
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Highest step index reached so far.
    pub fn furthest_step(&self) -> usize {
        self.furthest_step
    }

    pub fn active_position(&self) -> Option<PositionId> {
        self.active_position
    }

    pub fn assigned_hazards(&self) -> usize {
        self.positions.iter().map(|p| p.hazards.len()).sum()
    }

    pub fn assessed_hazards(&self) -> usize {
        self.positions
            .iter()
            .flat_map(|p| p.hazards.iter())
            .filter(|assignment| assignment.is_complete())
            .count()
    }

    pub fn progress(&self, step_count: usize) -> ProgressSummary {
        let assigned = self.assigned_hazards();
        let assessed = self.assessed_hazards();
        let completion_percent = if assigned == 0 {
            0
        } else {
            u8::try_from(assessed * 100 / assigned).unwrap_or(100)
        };
        ProgressSummary {
            step_index: self.current_step,
            step_count,
            positions: self.positions.len(),
            assigned_hazards: assigned,
            assessed_hazards: assessed,
            completion_percent,
        }
    }

    /// Pulls step indices back inside a layout with `step_count` steps.
    pub(crate) fn clamp_steps(&mut self, step_count: usize) {
        let last = step_count.saturating_sub(1);
        self.current_step = self.current_step.min(last);
        self.furthest_step = self.furthest_step.min(last).max(self.current_step);
    }

    fn position_mut(&mut self, id: PositionId) -> Option<&mut Position> {
        self.positions.iter_mut().find(|position| position.id == id)
    }

    fn assignment_mut(&mut self, id: PositionId, index: usize) -> Option<&mut HazardAssignment> {
        self.position_mut(id)?.hazards.get_mut(index)
    }

    fn issue_position_id(&mut self) -> PositionId {
        let floor = self.positions.iter().map(|p| p.id.0).max().unwrap_or(0);
        self.next_position_id = self.next_position_id.max(floor) + 1;
        PositionId(self.next_position_id)
    }
}

/// Data shown in the wizard chrome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub step_index: usize,
    pub step_count: usize,
    pub positions: usize,
    pub assigned_hazards: usize,
    pub assessed_hazards: usize,
    pub completion_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChange {
    Company,
    PositionAdded(PositionId),
    PositionUpdated(PositionId),
    PositionRemoved(PositionId),
    HazardsChanged(PositionId),
    FactorsChanged { position: PositionId, index: usize },
    ControlsChanged { position: PositionId, index: usize },
    ActivePositionChanged(Option<PositionId>),
    StepChanged { from: usize, to: usize },
    Replaced,
}

#[derive(Default)]
pub struct EntityStore {
    model: WizardModel,
    subscribers: Vec<Sender<ModelChange>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: WizardModel) -> Self {
        Self {
            model,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<ModelChange> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, change: ModelChange) {
        debug!(?change, "model change");
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }

    pub fn model(&self) -> &WizardModel {
        &self.model
    }

    pub fn company(&self) -> &CompanyInfo {
        self.model.company()
    }

    pub fn positions(&self) -> &[Position] {
        self.model.positions()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.model.position(id)
    }

    pub fn current_step(&self) -> usize {
        self.model.current_step
    }

    pub fn active_position(&self) -> Option<PositionId> {
        self.model.active_position
    }

    pub fn replace(&mut self, model: WizardModel) {
        self.model = model;
        self.notify(ModelChange::Replaced);
    }

    pub fn set_company(&mut self, company: CompanyInfo) {
        if self.model.company == company {
            return;
        }
        self.model.company = company;
        self.notify(ModelChange::Company);
    }

    pub fn add_position(&mut self, draft: PositionDraft) -> PositionId {
        let id = self.model.issue_position_id();
        let mut position = Position::new(id, String::new());
        draft.apply_to(&mut position);
        self.model.positions.push(position);
        self.notify(ModelChange::PositionAdded(id));
        if self.model.active_position.is_none() {
            self.set_active_position(Some(id));
        }
        id
    }

    pub fn update_position(&mut self, id: PositionId, draft: PositionDraft) -> bool {
        let Some(position) = self.model.position_mut(id) else {
            return false;
        };
        draft.apply_to(position);
        self.notify(ModelChange::PositionUpdated(id));
        true
    }

    pub fn remove_position(&mut self, id: PositionId) -> bool {
        let Some(index) = self.model.position_index(id) else {
            return false;
        };
        self.model.positions.remove(index);
        self.notify(ModelChange::PositionRemoved(id));
        if self.model.active_position == Some(id) {
            let fallback = self.model.positions.first().map(|p| p.id);
            self.set_active_position(fallback);
        }
        true
    }

    /// Appends an assignment. A catalog hazard already assigned to the
    /// position is not added twice.
    pub fn add_hazard(&mut self, position: PositionId, assignment: HazardAssignment) -> bool {
        let Some(target) = self.model.position_mut(position) else {
            return false;
        };
        if let Some(hazard_id) = assignment.hazard_id {
            if target.hazard_index(hazard_id).is_some() {
                return false;
            }
        }
        target.hazards.push(assignment);
        self.notify(ModelChange::HazardsChanged(position));
        true
    }

    pub fn remove_hazard(&mut self, position: PositionId, index: usize) -> Option<HazardAssignment> {
        let target = self.model.position_mut(position)?;
        if index >= target.hazards.len() {
            return None;
        }
        let removed = target.hazards.remove(index);
        self.notify(ModelChange::HazardsChanged(position));
        Some(removed)
    }

    pub fn remove_catalog_hazard(
        &mut self,
        position: PositionId,
        hazard_id: HazardId,
    ) -> Option<HazardAssignment> {
        let index = self.model.position(position)?.hazard_index(hazard_id)?;
        self.remove_hazard(position, index)
    }

    pub fn set_factor(&mut self, position: PositionId, index: usize, value: FactorValue) -> bool {
        let Some(assignment) = self.model.assignment_mut(position, index) else {
            return false;
        };
        assignment.factors.set(value);
        self.notify(ModelChange::FactorsChanged { position, index });
        true
    }

    pub fn clear_factor(&mut self, position: PositionId, index: usize, kind: FactorKind) -> bool {
        let Some(assignment) = self.model.assignment_mut(position, index) else {
            return false;
        };
        assignment.factors.clear(kind);
        self.notify(ModelChange::FactorsChanged { position, index });
        true
    }

    pub fn set_control(
        &mut self,
        position: PositionId,
        index: usize,
        field: ControlField,
        text: Option<String>,
    ) -> bool {
        let Some(assignment) = self.model.assignment_mut(position, index) else {
            return false;
        };
        let before = assignment.controls.get(field).map(str::to_owned);
        assignment.controls.set(field, text);
        if assignment.controls.get(field) == before.as_deref() {
            return true;
        }
        self.notify(ModelChange::ControlsChanged { position, index });
        true
    }

    pub fn set_active_position(&mut self, position: Option<PositionId>) {
        if self.model.active_position == position {
            return;
        }
        self.model.active_position = position;
        self.notify(ModelChange::ActivePositionChanged(position));
    }

    pub fn set_current_step(&mut self, step: usize) {
        let from = self.model.current_step;
        if from == step {
            return;
        }
        self.model.current_step = step;
        self.model.furthest_step = self.model.furthest_step.max(step);
        self.notify(ModelChange::StepChanged { from, to: step });
    }
}

#[cfg(test)]
#[path = "tests/model_tests.rs"]
mod tests;
