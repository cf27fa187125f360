//! Risk scoring for one position's hazards, one at a time, with an inline
//! control editor that autosaves after a quiet period.

use std::collections::BTreeMap;

use shared::{
    domain::{ControlField, ControlSet, FactorKind, FactorValue, HazardAssignment, PositionId},
    scoring::Derived,
};
use tracing::debug;

use crate::{
    controller::StepContext,
    cursor::{AssignmentCursor, CursorError, CursorMove},
    debounce::{Debouncer, Liveness},
    events::WizardEvent,
    model::EntityStore,
};

struct ControlDraft {
    index: usize,
    edits: BTreeMap<ControlField, Option<String>>,
}

/// Raw draft text shown while typing. Normalization happens on commit.
fn overlay(controls: &mut ControlSet, edits: &BTreeMap<ControlField, Option<String>>) {
    for (field, text) in edits {
        controls.show_raw(*field, text.clone());
    }
}

pub struct FactorEditor {
    position: PositionId,
    cursor: AssignmentCursor,
    liveness: Liveness,
    draft: Option<ControlDraft>,
    generation: u64,
    autosave: Debouncer,
}

impl FactorEditor {
    pub fn new(position: PositionId, ctx: StepContext<'_>) -> Self {
        Self {
            position,
            cursor: AssignmentCursor::default(),
            liveness: Liveness::new(),
            draft: None,
            generation: 0,
            autosave: Debouncer::new(ctx.settings.control_autosave()),
        }
    }

    pub fn position(&self) -> PositionId {
        self.position
    }

    pub fn instance(&self) -> u64 {
        self.liveness.instance()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor.index()
    }

    pub fn len(&self, store: &EntityStore) -> usize {
        store
            .position(self.position)
            .map_or(0, |position| position.hazards.len())
    }

    pub fn current<'a>(&self, store: &'a EntityStore) -> Option<(usize, &'a HazardAssignment)> {
        let position = store.position(self.position)?;
        let index = self.cursor.current(position.hazards.len())?;
        Some((index, &position.hazards[index]))
    }

    fn current_index(&self, store: &EntityStore) -> Result<usize, CursorError> {
        self.current(store)
            .map(|(index, _)| index)
            .ok_or(CursorError::Empty)
    }

    /// Writes one factor of the current hazard and returns the recomputed
    /// values.
    pub fn set_factor(&mut self, store: &mut EntityStore, value: FactorValue) -> Result<Derived, CursorError> {
        let index = self.current_index(store)?;
        store.set_factor(self.position, index, value);
        Ok(self
            .current(store)
            .map(|(_, assignment)| assignment.derived())
            .unwrap_or_default())
    }

    pub fn clear_factor(&mut self, store: &mut EntityStore, kind: FactorKind) -> Result<Derived, CursorError> {
        let index = self.current_index(store)?;
        store.clear_factor(self.position, index, kind);
        Ok(self
            .current(store)
            .map(|(_, assignment)| assignment.derived())
            .unwrap_or_default())
    }

    /// Moves on only once the current hazard has all three factors.
    pub fn next(&mut self, store: &mut EntityStore) -> Result<CursorMove, CursorError> {
        let (_, assignment) = self.current(store).ok_or(CursorError::Empty)?;
        if !assignment.is_complete() {
            return Err(CursorError::IncompleteFactors {
                name: assignment.name.clone(),
            });
        }
        self.commit_draft(store);
        let len = self.len(store);
        self.cursor.next(len)
    }

    pub fn previous(&mut self, store: &mut EntityStore) -> Result<usize, CursorError> {
        self.commit_draft(store);
        self.cursor.previous()
    }

    pub fn jump_to(&mut self, store: &mut EntityStore, index: usize) -> Result<usize, CursorError> {
        let len = self.len(store);
        if index >= len {
            return Err(CursorError::OutOfRange { index, len });
        }
        self.commit_draft(store);
        self.cursor.jump_to(index, len)
    }

    pub fn reset_cursor(&mut self, store: &mut EntityStore) {
        self.commit_draft(store);
        self.cursor.reset();
    }

    /// Keeps the cursor inside the live list after hazards were removed.
    pub fn clamp(&mut self, store: &EntityStore) {
        let len = self.len(store);
        if self.cursor.index() >= len {
            self.draft = None;
            self.autosave.cancel();
        }
        self.cursor.clamp(len);
    }

    pub fn complete_all(&mut self, store: &mut EntityStore) -> Result<(), CursorError> {
        let position = store.position(self.position).ok_or(CursorError::Empty)?;
        if position.hazards.is_empty() {
            return Err(CursorError::Empty);
        }
        let names = position.incomplete_hazard_names();
        if !names.is_empty() {
            return Err(CursorError::IncompleteAssignments { names });
        }
        self.commit_draft(store);
        Ok(())
    }

    /// Updates the local draft right away and restarts the autosave timer.
    pub fn edit_control(
        &mut self,
        ctx: StepContext<'_>,
        store: &EntityStore,
        field: ControlField,
        text: Option<String>,
    ) -> Result<(), CursorError> {
        let index = self.current_index(store)?;
        let draft = self.draft.get_or_insert_with(|| ControlDraft {
            index,
            edits: BTreeMap::new(),
        });
        draft.edits.insert(field, text);

        self.generation += 1;
        let generation = self.generation;
        let liveness = self.liveness.clone();
        let events = ctx.events.clone();
        self.autosave.schedule(ctx.runtime, move || {
            if liveness.is_alive() {
                let _ = events.send(WizardEvent::AutosaveDue {
                    instance: liveness.instance(),
                    generation,
                });
            }
        });
        Ok(())
    }

    /// Commits the draft only if `generation` is its latest edit. A timer
    /// that fired before a later edit, or before the draft was committed by
    /// a cursor move, is stale.
    pub fn autosave_due(&mut self, store: &mut EntityStore, generation: u64) -> bool {
        if generation != self.generation || self.draft.is_none() {
            debug!(
                position_id = self.position.0,
                generation,
                current = self.generation,
                "factor editor: stale autosave ignored"
            );
            return false;
        }
        self.commit_draft(store)
    }

    pub fn has_pending_draft(&self) -> bool {
        self.draft.is_some()
    }

    /// Stored controls of the current hazard with the draft laid over them.
    pub fn controls_view(&self, store: &EntityStore) -> ControlSet {
        let Some((index, assignment)) = self.current(store) else {
            return ControlSet::default();
        };
        let mut controls = assignment.controls.clone();
        if let Some(draft) = self.draft.as_ref().filter(|draft| draft.index == index) {
            overlay(&mut controls, &draft.edits);
        }
        controls
    }

    pub fn control_value(&self, store: &EntityStore, field: ControlField) -> Option<String> {
        self.controls_view(store).get(field).map(str::to_owned)
    }

    /// Writes the draft to the model. Returns whether anything was pending.
    pub fn commit_draft(&mut self, store: &mut EntityStore) -> bool {
        self.autosave.cancel();
        let Some(draft) = self.draft.take() else {
            return false;
        };
        for (field, text) in draft.edits {
            store.set_control(self.position, draft.index, field, text);
        }
        debug!(position_id = self.position.0, index = draft.index, "factor editor: controls committed");
        true
    }

    /// Cancels the autosave timer and drops any uncommitted draft.
    pub fn destroy(&mut self) {
        self.autosave.cancel();
        self.liveness.kill();
        if self.draft.take().is_some() {
            debug!(position_id = self.position.0, "factor editor: pending draft dropped");
        }
    }
}

#[cfg(test)]
#[path = "tests/factor_editor_tests.rs"]
mod tests;
