use std::collections::BTreeMap;

use shared::domain::{ControlField, ControlSet, HazardAssignment, PositionId};
use tracing::debug;

use crate::{
    cursor::{AssignmentCursor, CursorError, CursorMove},
    debounce::Liveness,
    model::EntityStore,
};

/// Standalone control editing. Moving between hazards does not depend on
/// factor completeness; every field is optional and is written when it loses
/// focus.
pub struct ControlEditor {
    position: PositionId,
    cursor: AssignmentCursor,
    liveness: Liveness,
    focused: BTreeMap<ControlField, Option<String>>,
}

impl ControlEditor {
    pub fn new(position: PositionId) -> Self {
        Self {
            position,
            cursor: AssignmentCursor::default(),
            liveness: Liveness::new(),
            focused: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> PositionId {
        self.position
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor.index()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
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

    pub fn edit(&mut self, field: ControlField, text: Option<String>) {
        self.focused.insert(field, text);
    }

    pub fn blur(&mut self, store: &mut EntityStore, field: ControlField) -> bool {
        let Some(text) = self.focused.remove(&field) else {
            return false;
        };
        let Some(index) = self.cursor.current(self.len(store)) else {
            return false;
        };
        store.set_control(self.position, index, field, text)
    }

    fn blur_all(&mut self, store: &mut EntityStore) {
        let fields: Vec<ControlField> = self.focused.keys().copied().collect();
        for field in fields {
            self.blur(store, field);
        }
    }

    pub fn controls_view(&self, store: &EntityStore) -> ControlSet {
        let Some((_, assignment)) = self.current(store) else {
            return ControlSet::default();
        };
        let mut controls = assignment.controls.clone();
        for (field, text) in &self.focused {
            controls.show_raw(*field, text.clone());
        }
        controls
    }

    pub fn next(&mut self, store: &mut EntityStore) -> Result<CursorMove, CursorError> {
        self.blur_all(store);
        let len = self.len(store);
        self.cursor.next(len)
    }

    pub fn previous(&mut self, store: &mut EntityStore) -> Result<usize, CursorError> {
        self.blur_all(store);
        self.cursor.previous()
    }

    pub fn jump_to(&mut self, store: &mut EntityStore, index: usize) -> Result<usize, CursorError> {
        self.blur_all(store);
        let len = self.len(store);
        self.cursor.jump_to(index, len)
    }

    pub fn reset_cursor(&mut self, store: &mut EntityStore) {
        self.blur_all(store);
        self.cursor.reset();
    }

    pub fn clamp(&mut self, store: &EntityStore) {
        let len = self.len(store);
        if self.cursor.index() >= len {
            self.focused.clear();
        }
        self.cursor.clamp(len);
    }

    pub fn destroy(&mut self) {
        self.liveness.kill();
        self.focused.clear();
        debug!(position_id = self.position.0, "control editor: destroyed");
    }
}
