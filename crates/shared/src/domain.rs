use scoring::{compute_derived, ConsequenceLevel, DeficiencyLevel, Derived, ExposureLevel};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(PositionId);
id_newtype!(HazardId);
id_newtype!(CategoryId);

impl HazardId {
    /// Hand-entered hazards carry no id; zero and negative ids never resolve
    /// to a catalog record either.
    pub fn is_catalog_backed(self) -> bool {
        self.0 > 0
    }
}

pub const MAX_CONTROL_LEN: usize = 500;
pub const MIN_POSITION_NAME_LEN: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    pub tax_id: String,
    pub sector: Option<String>,
    pub city: Option<String>,
    pub responsible: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialConditions {
    pub repetitive_tasks: bool,
    pub drives_vehicle: bool,
    pub handles_food: bool,
    pub works_at_height: bool,
    pub confined_spaces: bool,
}

impl SpecialConditions {
    pub fn active_labels(&self) -> Vec<&'static str> {
        [
            (self.repetitive_tasks, "Repetitive tasks"),
            (self.drives_vehicle, "Drives vehicle"),
            (self.handles_food, "Handles food"),
            (self.works_at_height, "Works at height"),
            (self.confined_spaces, "Confined spaces"),
        ]
        .into_iter()
        .filter_map(|(active, label)| active.then_some(label))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Deficiency,
    Exposure,
    Consequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "level", rename_all = "snake_case")]
pub enum FactorValue {
    Deficiency(DeficiencyLevel),
    Exposure(ExposureLevel),
    Consequence(ConsequenceLevel),
}

impl FactorValue {
    pub fn kind(self) -> FactorKind {
        match self {
            FactorValue::Deficiency(_) => FactorKind::Deficiency,
            FactorValue::Exposure(_) => FactorKind::Exposure,
            FactorValue::Consequence(_) => FactorKind::Consequence,
        }
    }
}

/// The three GTC-45 inputs of a hazard assignment. Probability and risk are
/// always computed from these on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorSet {
    pub deficiency: Option<DeficiencyLevel>,
    pub exposure: Option<ExposureLevel>,
    pub consequence: Option<ConsequenceLevel>,
}

impl FactorSet {
    pub fn set(&mut self, value: FactorValue) {
        match value {
            FactorValue::Deficiency(level) => self.deficiency = Some(level),
            FactorValue::Exposure(level) => self.exposure = Some(level),
            FactorValue::Consequence(level) => self.consequence = Some(level),
        }
    }

    pub fn clear(&mut self, kind: FactorKind) {
        match kind {
            FactorKind::Deficiency => self.deficiency = None,
            FactorKind::Exposure => self.exposure = None,
            FactorKind::Consequence => self.consequence = None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.deficiency.is_some() && self.exposure.is_some() && self.consequence.is_some()
    }

    pub fn derived(&self) -> Derived {
        compute_derived(self.deficiency, self.exposure, self.consequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlField {
    ExistingSource,
    ExistingMedium,
    ExistingIndividual,
    Elimination,
    Substitution,
    Engineering,
    Administrative,
}

impl ControlField {
    pub const ALL: [ControlField; 7] = [
        ControlField::ExistingSource,
        ControlField::ExistingMedium,
        ControlField::ExistingIndividual,
        ControlField::Elimination,
        ControlField::Substitution,
        ControlField::Engineering,
        ControlField::Administrative,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ControlField::ExistingSource => "Existing control at the source",
            ControlField::ExistingMedium => "Existing control in the medium",
            ControlField::ExistingIndividual => "Existing control on the individual",
            ControlField::Elimination => "Elimination",
            ControlField::Substitution => "Substitution",
            ControlField::Engineering => "Engineering controls",
            ControlField::Administrative => "Administrative controls",
        }
    }

    pub fn is_existing_control(self) -> bool {
        matches!(
            self,
            ControlField::ExistingSource
                | ControlField::ExistingMedium
                | ControlField::ExistingIndividual
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSet {
    pub existing_source: Option<String>,
    pub existing_medium: Option<String>,
    pub existing_individual: Option<String>,
    pub elimination: Option<String>,
    pub substitution: Option<String>,
    pub engineering: Option<String>,
    pub administrative: Option<String>,
}

impl ControlSet {
    pub fn get(&self, field: ControlField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Blank text clears the field; longer text is cut to `MAX_CONTROL_LEN`
    /// characters.
    pub fn set(&mut self, field: ControlField, text: Option<String>) {
        let normalized = text
            .map(|value| truncate_chars(value.trim(), MAX_CONTROL_LEN))
            .filter(|value| !value.is_empty());
        *self.slot_mut(field) = normalized;
    }

    /// Stores `text` exactly as typed, for display of uncommitted edits.
    pub fn show_raw(&mut self, field: ControlField, text: Option<String>) {
        *self.slot_mut(field) = text;
    }

    pub fn is_empty(&self) -> bool {
        ControlField::ALL
            .iter()
            .all(|field| self.slot(*field).is_none())
    }

    fn slot(&self, field: ControlField) -> &Option<String> {
        match field {
            ControlField::ExistingSource => &self.existing_source,
            ControlField::ExistingMedium => &self.existing_medium,
            ControlField::ExistingIndividual => &self.existing_individual,
            ControlField::Elimination => &self.elimination,
            ControlField::Substitution => &self.substitution,
            ControlField::Engineering => &self.engineering,
            ControlField::Administrative => &self.administrative,
        }
    }

    fn slot_mut(&mut self, field: ControlField) -> &mut Option<String> {
        match field {
            ControlField::ExistingSource => &mut self.existing_source,
            ControlField::ExistingMedium => &mut self.existing_medium,
            ControlField::ExistingIndividual => &mut self.existing_individual,
            ControlField::Elimination => &mut self.elimination,
            ControlField::Substitution => &mut self.substitution,
            ControlField::Engineering => &mut self.engineering,
            ControlField::Administrative => &mut self.administrative,
        }
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => value[..byte_idx].to_string(),
        None => value.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardAssignment {
    pub hazard_id: Option<HazardId>,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub factors: FactorSet,
    #[serde(default)]
    pub controls: ControlSet,
}

impl HazardAssignment {
    pub fn from_catalog(hazard_id: HazardId, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            hazard_id: Some(hazard_id),
            name: name.into(),
            category: category.into(),
            factors: FactorSet::default(),
            controls: ControlSet::default(),
        }
    }

    pub fn hand_entered(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            hazard_id: None,
            name: name.into(),
            category: category.into(),
            factors: FactorSet::default(),
            controls: ControlSet::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.factors.is_complete()
    }

    pub fn derived(&self) -> Derived {
        self.factors.derived()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub name: String,
    pub worker_count: u32,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: SpecialConditions,
    #[serde(default)]
    pub hazards: Vec<HazardAssignment>,
}

impl Position {
    pub fn new(id: PositionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            worker_count: 1,
            area: String::new(),
            zone: String::new(),
            description: String::new(),
            conditions: SpecialConditions::default(),
            hazards: Vec::new(),
        }
    }

    /// Catalog-backed hazard ids, in selection order.
    pub fn selected_hazard_ids(&self) -> Vec<HazardId> {
        self.hazards
            .iter()
            .filter_map(|assignment| assignment.hazard_id)
            .collect()
    }

    pub fn hazard_index(&self, hazard_id: HazardId) -> Option<usize> {
        self.hazards
            .iter()
            .position(|assignment| assignment.hazard_id == Some(hazard_id))
    }

    pub fn is_fully_assessed(&self) -> bool {
        !self.hazards.is_empty() && self.hazards.iter().all(HazardAssignment::is_complete)
    }

    pub fn incomplete_hazard_names(&self) -> Vec<String> {
        self.hazards
            .iter()
            .filter(|assignment| !assignment.is_complete())
            .map(|assignment| assignment.name.clone())
            .collect()
    }
}

/// Fields of a position that the position editor can change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionDraft {
    pub name: String,
    pub worker_count: u32,
    pub area: String,
    pub zone: String,
    pub description: String,
    pub conditions: SpecialConditions,
}

impl PositionDraft {
    pub fn apply_to(self, position: &mut Position) {
        position.name = self.name;
        position.worker_count = self.worker_count;
        position.area = self.area;
        position.zone = self.zone;
        position.description = self.description;
        position.conditions = self.conditions;
    }
}

impl From<&Position> for PositionDraft {
    fn from(position: &Position) -> Self {
        Self {
            name: position.name.clone(),
            worker_count: position.worker_count,
            area: position.area.clone(),
            zone: position.zone.clone(),
            description: position.description.clone(),
            conditions: position.conditions,
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
