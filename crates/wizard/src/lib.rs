//! Headless engine of the GTC-45 hazard matrix wizard.
//!
//! The [`Wizard`] owns the model and the step controllers. Background work
//! runs on a tokio runtime and reports back through [`WizardEvent`]s that the
//! owner applies with [`Wizard::pump`].

pub mod config;
pub mod controller;
pub mod cursor;
pub mod debounce;
pub mod events;
pub mod export;
pub mod model;
pub mod orchestrator;
pub mod steps;
pub mod validation;
pub mod view;

pub use config::{load_settings, prepare_database_url, WizardSettings};
pub use events::{NavigationError, Notice, NoticeLevel, WizardError, WizardEvent};
pub use model::{EntityStore, ModelChange, ProgressSummary, WizardModel};
pub use orchestrator::{HazardStep, NavOutcome, Wizard, WizardBuilder};
pub use steps::{StepId, StepLayout, StepManagement};
pub use view::{LogView, RecordingView, StepBody, StepContent, ViewCall, WizardView};
