use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    CategoryId, CompanyInfo, ControlSet, FactorSet, HazardId, PositionId, SpecialConditions,
};
use scoring::{ProbabilityBand, RiskBand};

/// Light catalog record used for list rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardSummary {
    pub id: HazardId,
    pub name: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_common: bool,
}

/// Full catalog record, fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardDetail {
    pub id: HazardId,
    pub name: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_common: bool,
    #[serde(default)]
    pub sector_relevance: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_measures: Option<String>,
}

impl HazardDetail {
    pub fn summary(&self) -> HazardSummary {
        HazardSummary {
            id: self.id,
            name: self.name.clone(),
            category_id: self.category_id,
            description: self.description.clone(),
            is_common: self.is_common,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDetailRequest {
    pub ids: Vec<HazardId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub position_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardSuggestion {
    pub category_id: CategoryId,
    pub category_name: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogValidation {
    pub complete: bool,
    #[serde(default)]
    pub missing_categories: Vec<String>,
}

/// Scored view of one factor set, as handed to document generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredFactors {
    #[serde(flatten)]
    pub inputs: FactorSet,
    pub probability: Option<u32>,
    pub risk: Option<u32>,
    pub probability_band: ProbabilityBand,
    pub risk_band: RiskBand,
    pub risk_label: String,
}

impl From<FactorSet> for ScoredFactors {
    fn from(inputs: FactorSet) -> Self {
        let derived = inputs.derived();
        let risk_band = derived.risk_band();
        Self {
            inputs,
            probability: derived.probability,
            risk: derived.risk,
            probability_band: derived.probability_band(),
            risk_band,
            risk_label: risk_band.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedHazard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazard_id: Option<HazardId>,
    pub name: String,
    pub category: String,
    pub factors: ScoredFactors,
    pub controls: ControlSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPosition {
    pub position_id: PositionId,
    pub name: String,
    pub worker_count: u32,
    pub area: String,
    pub zone: String,
    pub description: String,
    pub conditions: SpecialConditions,
    pub hazards: Vec<ExportedHazard>,
}

/// Complete wizard output consumed by document generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentExport {
    pub document_id: String,
    pub generated_at: DateTime<Utc>,
    pub company: CompanyInfo,
    pub positions: Vec<ExportedPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReceipt {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}
