use super::*;
use shared::domain::HazardAssignment;

fn position(id: i64, name: &str, hazards: usize) -> Position {
    let mut position = Position::new(PositionId(id), name);
    position.area = "Plant".into();
    position.hazards = (0..hazards)
        .map(|n| HazardAssignment::hand_entered(format!("H{n}"), "Physical"))
        .collect();
    position
}

#[test]
fn company_requires_name_and_tax_id() {
    let errors = validate_company(&CompanyInfo {
        name: "  ".into(),
        ..CompanyInfo::default()
    });
    let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
    assert_eq!(fields, vec![FieldRef::CompanyName, FieldRef::CompanyTaxId]);
}

#[test]
fn positions_reject_short_duplicate_and_empty_fields() {
    let mut short = position(1, "Op", 0);
    short.worker_count = 0;
    let first = position(2, "Welder", 0);
    let mut duplicate = position(3, "  welder ", 0);
    duplicate.area = " ".into();

    let errors = validate_positions(&[short, first, duplicate]);
    let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
    assert_eq!(
        fields,
        vec![
            FieldRef::PositionName(PositionId(1)),
            FieldRef::PositionWorkers(PositionId(1)),
            FieldRef::PositionName(PositionId(3)),
            FieldRef::PositionArea(PositionId(3)),
        ]
    );
}

#[test]
fn empty_position_list_is_blocked() {
    let errors = validate_positions(&[]);
    assert_eq!(errors[0].field, FieldRef::PositionList);
}

#[test]
fn any_position_without_hazards_blocks_the_step() {
    let result = validate_hazard_coverage(
        &[position(1, "Welder", 4), position(2, "Driver", 0)],
        3.0,
    );
    let errors = result.expect_err("blocked");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, FieldRef::PositionHazards(PositionId(2)));
    assert!(errors[0].message.contains("Driver"));
}

#[test]
fn low_average_is_a_soft_warning() {
    let coverage = validate_hazard_coverage(
        &[position(1, "Welder", 2), position(2, "Driver", 3)],
        3.0,
    )
    .expect("no hard errors");
    assert_eq!(coverage, Coverage::Low { average: 2.5 });

    let coverage = validate_hazard_coverage(&[position(1, "Welder", 3)], 3.0).expect("ok");
    assert_eq!(coverage, Coverage::Sufficient);
}

#[test]
fn risk_gate_lists_incomplete_hazard_names() {
    let errors = validate_risk(&[position(1, "Welder", 2)]);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, FieldRef::PositionFactors(PositionId(1)));
    assert_eq!(
        errors[0].message,
        "Incomplete risk assessment for 'Welder': H0, H1"
    );
}

#[test]
fn controls_step_never_blocks() {
    assert_eq!(
        validate_step(StepId::Controls, &WizardModel::default(), 3.0),
        Ok(Coverage::Sufficient)
    );
}

#[test]
fn review_gate_collects_every_step() {
    let errors = validate_step(StepId::Review, &WizardModel::default(), 3.0).expect_err("empty");
    let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
    assert!(fields.contains(&FieldRef::CompanyName));
    assert!(fields.contains(&FieldRef::PositionList));
}
