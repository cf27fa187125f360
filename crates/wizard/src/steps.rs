//! Step sequence and per-step rendering ownership.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Company,
    Positions,
    Hazards,
    Risk,
    Controls,
    Review,
}

/// Who redraws a step when the model changes while it stays active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepManagement {
    /// The step controller keeps its own region up to date; the orchestrator
    /// only patches the shared chrome.
    SelfManaged,
    /// The step is a plain template of the model and is re-rendered whole.
    TemplateManaged,
}

impl StepId {
    pub fn title(self) -> &'static str {
        match self {
            StepId::Company => "Company",
            StepId::Positions => "Positions",
            StepId::Hazards => "Hazards",
            StepId::Risk => "Risk assessment",
            StepId::Controls => "Controls",
            StepId::Review => "Review",
        }
    }

    pub fn management(self) -> StepManagement {
        match self {
            StepId::Hazards | StepId::Risk | StepId::Controls => StepManagement::SelfManaged,
            StepId::Company | StepId::Positions | StepId::Review => {
                StepManagement::TemplateManaged
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepLayout {
    /// Controls are edited inline in the risk step.
    #[default]
    Combined,
    /// Controls get a standalone step after risk assessment.
    Decoupled,
}

impl StepLayout {
    pub fn steps(self) -> Vec<StepId> {
        match self {
            StepLayout::Combined => vec![
                StepId::Company,
                StepId::Positions,
                StepId::Hazards,
                StepId::Risk,
                StepId::Review,
            ],
            StepLayout::Decoupled => vec![
                StepId::Company,
                StepId::Positions,
                StepId::Hazards,
                StepId::Risk,
                StepId::Controls,
                StepId::Review,
            ],
        }
    }
}

impl FromStr for StepLayout {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(StepLayout::Combined),
            "decoupled" => Ok(StepLayout::Decoupled),
            other => Err(format!("unknown step layout '{other}'")),
        }
    }
}

impl fmt::Display for StepLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepLayout::Combined => f.write_str("combined"),
            StepLayout::Decoupled => f.write_str("decoupled"),
        }
    }
}
