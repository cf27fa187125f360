use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    #[error("this position has no hazards to assess")]
    Empty,
    #[error("hazard {index} is out of range ({len} assigned)")]
    OutOfRange { index: usize, len: usize },
    #[error("already at the first hazard")]
    AtStart,
    #[error("complete the three factors of '{name}' before moving on")]
    IncompleteFactors { name: String },
    #[error("incomplete risk assessment: {}", names.join(", "))]
    IncompleteAssignments { names: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Moved(usize),
    /// No further items; the caller decides what completion means.
    Exhausted,
}

/// Index into a position's live assignment list. Only the index is kept, so
/// every read reflects the list as it is now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentCursor {
    index: usize,
}

impl AssignmentCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self, len: usize) -> Option<usize> {
        (self.index < len).then_some(self.index)
    }

    pub fn next(&mut self, len: usize) -> Result<CursorMove, CursorError> {
        if len == 0 {
            return Err(CursorError::Empty);
        }
        if self.index + 1 >= len {
            self.index = len - 1;
            return Ok(CursorMove::Exhausted);
        }
        self.index += 1;
        Ok(CursorMove::Moved(self.index))
    }

    pub fn previous(&mut self) -> Result<usize, CursorError> {
        if self.index == 0 {
            return Err(CursorError::AtStart);
        }
        self.index -= 1;
        Ok(self.index)
    }

    pub fn jump_to(&mut self, index: usize, len: usize) -> Result<usize, CursorError> {
        if index >= len {
            return Err(CursorError::OutOfRange { index, len });
        }
        self.index = index;
        Ok(index)
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Pulls the cursor back inside a list that shrank.
    pub fn clamp(&mut self, len: usize) {
        if self.index >= len {
            self.index = len.saturating_sub(1);
        }
    }
}
