//! Step gates. Each check returns every problem at once so the view can mark
//! all offending fields.

use std::{collections::HashSet, fmt};

use serde::Serialize;
use shared::domain::{CompanyInfo, Position, PositionId, MIN_POSITION_NAME_LEN};

use crate::{model::WizardModel, steps::StepId};

/// The input a validation message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "field", content = "position", rename_all = "snake_case")]
pub enum FieldRef {
    CompanyName,
    CompanyTaxId,
    PositionList,
    PositionName(PositionId),
    PositionWorkers(PositionId),
    PositionArea(PositionId),
    PositionHazards(PositionId),
    PositionFactors(PositionId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: FieldRef,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: FieldRef, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a step check that passed its hard rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coverage {
    Sufficient,
    /// Average hazards per position is under the configured threshold.
    Low { average: f64 },
}

pub fn validate_company(company: &CompanyInfo) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if company.name.trim().is_empty() {
        errors.push(ValidationError::new(
            FieldRef::CompanyName,
            "Company name is required",
        ));
    }
    if company.tax_id.trim().is_empty() {
        errors.push(ValidationError::new(
            FieldRef::CompanyTaxId,
            "Tax id is required",
        ));
    }
    errors
}

pub fn validate_positions(positions: &[Position]) -> Vec<ValidationError> {
    if positions.is_empty() {
        return vec![ValidationError::new(
            FieldRef::PositionList,
            "Add at least one position",
        )];
    }

    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for position in positions {
        let name = position.name.trim();
        if name.chars().count() < MIN_POSITION_NAME_LEN {
            errors.push(ValidationError::new(
                FieldRef::PositionName(position.id),
                format!("Position name must have at least {MIN_POSITION_NAME_LEN} characters"),
            ));
        } else if !seen.insert(name.to_lowercase()) {
            errors.push(ValidationError::new(
                FieldRef::PositionName(position.id),
                format!("Position name '{name}' is already used"),
            ));
        }
        if position.worker_count < 1 {
            errors.push(ValidationError::new(
                FieldRef::PositionWorkers(position.id),
                "At least one worker is required",
            ));
        }
        if position.area.trim().is_empty() {
            errors.push(ValidationError::new(
                FieldRef::PositionArea(position.id),
                "Area is required",
            ));
        }
    }
    errors
}

pub fn validate_hazard_coverage(
    positions: &[Position],
    threshold: f64,
) -> Result<Coverage, Vec<ValidationError>> {
    if positions.is_empty() {
        return Err(vec![ValidationError::new(
            FieldRef::PositionList,
            "Add at least one position",
        )]);
    }

    let errors: Vec<_> = positions
        .iter()
        .filter(|position| position.hazards.is_empty())
        .map(|position| {
            ValidationError::new(
                FieldRef::PositionHazards(position.id),
                format!("'{}' has no hazards selected", position.name),
            )
        })
        .collect();
    if !errors.is_empty() {
        return Err(errors);
    }

    let total: usize = positions.iter().map(|p| p.hazards.len()).sum();
    let average = total as f64 / positions.len() as f64;
    if average < threshold {
        Ok(Coverage::Low { average })
    } else {
        Ok(Coverage::Sufficient)
    }
}

pub fn validate_risk(positions: &[Position]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for position in positions {
        if position.hazards.is_empty() {
            errors.push(ValidationError::new(
                FieldRef::PositionHazards(position.id),
                format!("'{}' has no hazards selected", position.name),
            ));
            continue;
        }
        let missing = position.incomplete_hazard_names();
        if !missing.is_empty() {
            errors.push(ValidationError::new(
                FieldRef::PositionFactors(position.id),
                format!(
                    "Incomplete risk assessment for '{}': {}",
                    position.name,
                    missing.join(", ")
                ),
            ));
        }
    }
    errors
}

/// Gate for leaving `step` forward.
pub fn validate_step(
    step: StepId,
    model: &WizardModel,
    threshold: f64,
) -> Result<Coverage, Vec<ValidationError>> {
    let errors = match step {
        StepId::Company => validate_company(model.company()),
        StepId::Positions => validate_positions(model.positions()),
        StepId::Hazards => return validate_hazard_coverage(model.positions(), threshold),
        StepId::Risk => validate_risk(model.positions()),
        StepId::Controls => Vec::new(),
        StepId::Review => {
            let mut errors = validate_company(model.company());
            errors.extend(validate_positions(model.positions()));
            if let Err(coverage) = validate_hazard_coverage(model.positions(), threshold) {
                errors.extend(coverage);
            }
            errors.extend(
                validate_risk(model.positions())
                    .into_iter()
                    .filter(|err| matches!(err.field, FieldRef::PositionFactors(_))),
            );
            errors
        }
    };
    if errors.is_empty() {
        Ok(Coverage::Sufficient)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
