//! Step controllers for the self-managed steps.

use crossbeam_channel::Sender;
use tokio::runtime::Handle;

use crate::{config::WizardSettings, events::WizardEvent};

pub mod control_editor;
pub mod factor_editor;
pub mod selector;

/// What a controller needs to start background work.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub runtime: &'a Handle,
    pub events: &'a Sender<WizardEvent>,
    pub settings: &'a WizardSettings,
}
