use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    domain::{Position, PositionId},
    protocol::{DocumentExport, ExportedHazard, ExportedPosition, ScoredFactors},
    scoring::RiskBand,
};
use uuid::Uuid;

use crate::model::WizardModel;

/// Snapshot of the whole model in the shape document generation expects.
pub fn build_export(model: &WizardModel, generated_at: DateTime<Utc>) -> DocumentExport {
    DocumentExport {
        document_id: Uuid::new_v4().to_string(),
        generated_at,
        company: model.company().clone(),
        positions: model.positions().iter().map(export_position).collect(),
    }
}

fn export_position(position: &Position) -> ExportedPosition {
    ExportedPosition {
        position_id: position.id,
        name: position.name.clone(),
        worker_count: position.worker_count,
        area: position.area.clone(),
        zone: position.zone.clone(),
        description: position.description.clone(),
        conditions: position.conditions,
        hazards: position
            .hazards
            .iter()
            .map(|assignment| ExportedHazard {
                hazard_id: assignment.hazard_id,
                name: assignment.name.clone(),
                category: assignment.category.clone(),
                factors: ScoredFactors::from(assignment.factors),
                controls: assignment.controls.clone(),
            })
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRow {
    pub position_id: PositionId,
    pub name: String,
    pub worker_count: u32,
    pub hazards: usize,
    pub assessed: usize,
    pub highest_risk: Option<u32>,
    pub highest_band: RiskBand,
    pub not_acceptable: Vec<String>,
}

/// Per-position risk summary shown on the review step.
pub fn review_rows(model: &WizardModel) -> Vec<ReviewRow> {
    model
        .positions()
        .iter()
        .map(|position| {
            let highest_risk = position
                .hazards
                .iter()
                .filter_map(|assignment| assignment.derived().risk)
                .max();
            let highest_band = position
                .hazards
                .iter()
                .map(|assignment| assignment.derived().risk_band())
                .max()
                .unwrap_or(RiskBand::Unclassified);
            ReviewRow {
                position_id: position.id,
                name: position.name.clone(),
                worker_count: position.worker_count,
                hazards: position.hazards.len(),
                assessed: position
                    .hazards
                    .iter()
                    .filter(|assignment| assignment.is_complete())
                    .count(),
                highest_risk,
                highest_band,
                not_acceptable: position
                    .hazards
                    .iter()
                    .filter(|assignment| {
                        assignment.derived().risk_band() == RiskBand::NotAcceptable
                    })
                    .map(|assignment| assignment.name.clone())
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
