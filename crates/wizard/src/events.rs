//! Events from background tasks to the wizard owner, user notices, and the
//! error types of the wizard surface.

use catalog_client::PrefetchReport;
use shared::{
    domain::{HazardId, PositionId},
    protocol::{CatalogValidation, CategorySummary, DocumentReceipt, HazardSuggestion, HazardSummary},
};
use thiserror::Error;

use crate::{cursor::CursorError, steps::StepId, validation::ValidationError};

/// Results of async work, drained by `Wizard::pump`. Controller-scoped events
/// carry the issuing controller's instance id.
#[derive(Debug)]
pub enum WizardEvent {
    CatalogLoaded {
        instance: u64,
        result: Result<Vec<HazardSummary>, String>,
    },
    CategoriesLoaded {
        instance: u64,
        categories: Vec<CategorySummary>,
    },
    CatalogValidated {
        instance: u64,
        validation: CatalogValidation,
    },
    SuggestionsLoaded {
        instance: u64,
        position: PositionId,
        suggestions: Vec<HazardSuggestion>,
    },
    SearchDue {
        instance: u64,
        text: String,
    },
    DetailLoaded(HazardId),
    AutosaveDue {
        instance: u64,
        generation: u64,
    },
    /// `None` when the pre-fetch timed out.
    PrefetchSettled {
        sequence: u64,
        report: Option<PrefetchReport>,
    },
    SaveFailed(String),
    ExportFinished(Result<DocumentReceipt, String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub dismissible: bool,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            dismissible: true,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            dismissible: true,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
            dismissible: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("wizard needs a view to render into")]
    MissingView,
    #[error("wizard must be built inside a tokio runtime")]
    MissingRuntime,
    #[error("wizard state persistence failed: {0:#}")]
    Persistence(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavigationError {
    #[error("{} field(s) need attention", .0.len())]
    Validation(Vec<ValidationError>),
    #[error("average of {average:.1} hazards per position is below {threshold:.1}; confirm to continue")]
    LowCoverage { average: f64, threshold: f64 },
    #[error("navigation is busy")]
    Busy,
    #[error("already at the first step")]
    AtFirstStep,
    #[error("use finish to complete the wizard")]
    AtLastStep,
    #[error("step '{}' has not been reached yet", .0.title())]
    NotReached(StepId),
    #[error("step '{}' is not part of this wizard", .0.title())]
    UnknownStep(StepId),
    #[error("the active step does not support this action")]
    WrongStep,
    #[error("no position is selected")]
    NoActivePosition,
    #[error("position {} does not exist", .0 .0)]
    UnknownPosition(PositionId),
    #[error("hazard {} is not in the loaded catalog", .0 .0)]
    UnknownHazard(HazardId),
    #[error("an export is already in progress")]
    ExportInProgress,
    #[error(transparent)]
    Cursor(#[from] CursorError),
}
