use super::*;
use shared::scoring::{ConsequenceLevel, DeficiencyLevel, ExposureLevel};

fn draft(name: &str) -> PositionDraft {
    PositionDraft {
        name: name.into(),
        worker_count: 2,
        area: "Plant".into(),
        ..PositionDraft::default()
    }
}

#[test]
fn mutators_publish_changes_to_every_subscriber() {
    let mut store = EntityStore::new();
    let first = store.subscribe();
    let second = store.subscribe();

    let id = store.add_position(draft("Welder"));

    let seen: Vec<_> = first.try_iter().collect();
    assert_eq!(
        seen,
        vec![
            ModelChange::PositionAdded(id),
            ModelChange::ActivePositionChanged(Some(id)),
        ]
    );
    assert_eq!(second.try_iter().count(), 2);
}

#[test]
fn dropped_subscribers_are_pruned() {
    let mut store = EntityStore::new();
    let kept = store.subscribe();
    drop(store.subscribe());

    store.set_company(CompanyInfo {
        name: "Acme".into(),
        ..CompanyInfo::default()
    });

    assert_eq!(store.subscribers.len(), 1);
    assert_eq!(kept.try_recv(), Ok(ModelChange::Company));
}

#[test]
fn unchanged_writes_are_silent() {
    let mut store = EntityStore::new();
    let rx = store.subscribe();
    store.set_company(CompanyInfo::default());
    store.set_current_step(0);
    store.set_active_position(None);
    assert!(rx.try_recv().is_err());
}

#[test]
fn position_ids_stay_unique_after_removal() {
    let mut store = EntityStore::new();
    let a = store.add_position(draft("Welder"));
    let b = store.add_position(draft("Driver"));
    assert!(store.remove_position(b));
    let c = store.add_position(draft("Cook"));
    assert_ne!(b, c);
    assert_ne!(a, c);
}

#[test]
fn removing_active_position_falls_back_to_first() {
    let mut store = EntityStore::new();
    let a = store.add_position(draft("Welder"));
    let b = store.add_position(draft("Driver"));
    store.set_active_position(Some(b));

    store.remove_position(b);
    assert_eq!(store.active_position(), Some(a));

    store.remove_position(a);
    assert_eq!(store.active_position(), None);
}

#[test]
fn catalog_hazards_are_not_duplicated() {
    let mut store = EntityStore::new();
    let id = store.add_position(draft("Welder"));
    let rx = store.subscribe();

    assert!(store.add_hazard(id, HazardAssignment::from_catalog(HazardId(4), "Noise", "Physical")));
    assert!(!store.add_hazard(id, HazardAssignment::from_catalog(HazardId(4), "Noise", "Physical")));
    assert!(store.add_hazard(id, HazardAssignment::hand_entered("Heat", "Physical")));
    assert!(store.add_hazard(id, HazardAssignment::hand_entered("Heat", "Physical")));

    assert_eq!(store.position(id).expect("position").hazards.len(), 3);
    assert_eq!(rx.try_iter().count(), 3);

    let removed = store
        .remove_catalog_hazard(id, HazardId(4))
        .expect("removed");
    assert_eq!(removed.name, "Noise");
    assert!(store.remove_catalog_hazard(id, HazardId(4)).is_none());
}

#[test]
fn factor_writes_recompute_on_read() {
    let mut store = EntityStore::new();
    let id = store.add_position(draft("Welder"));
    store.add_hazard(id, HazardAssignment::hand_entered("Fumes", "Chemical"));

    store.set_factor(id, 0, FactorValue::Deficiency(DeficiencyLevel::High));
    store.set_factor(id, 0, FactorValue::Exposure(ExposureLevel::Frequent));
    let derived = store.position(id).expect("position").hazards[0].derived();
    assert_eq!(derived.probability, Some(18));
    assert_eq!(derived.risk, None);

    store.set_factor(id, 0, FactorValue::Consequence(ConsequenceLevel::Serious));
    assert_eq!(
        store.position(id).expect("position").hazards[0].derived().risk,
        Some(450)
    );

    store.clear_factor(id, 0, FactorKind::Exposure);
    let assignment = &store.position(id).expect("position").hazards[0];
    assert!(!assignment.is_complete());
    assert_eq!(assignment.derived().risk, None);

    assert!(!store.set_factor(id, 9, FactorValue::Deficiency(DeficiencyLevel::Low)));
}

#[test]
fn control_writes_notify_only_on_change() {
    let mut store = EntityStore::new();
    let id = store.add_position(draft("Welder"));
    store.add_hazard(id, HazardAssignment::hand_entered("Fumes", "Chemical"));
    let rx = store.subscribe();

    store.set_control(id, 0, ControlField::Engineering, Some("Extraction hood".into()));
    store.set_control(id, 0, ControlField::Engineering, Some("  Extraction hood ".into()));

    assert_eq!(
        rx.try_iter().collect::<Vec<_>>(),
        vec![ModelChange::ControlsChanged { position: id, index: 0 }]
    );
}

#[test]
fn step_changes_track_furthest_step() {
    let mut store = EntityStore::new();
    store.set_current_step(3);
    store.set_current_step(1);
    assert_eq!(store.current_step(), 1);
    assert_eq!(store.model().furthest_step(), 3);
}

#[test]
fn progress_counts_assessed_hazards() {
    let mut store = EntityStore::new();
    let id = store.add_position(draft("Welder"));
    store.add_hazard(id, HazardAssignment::hand_entered("Fumes", "Chemical"));
    store.add_hazard(id, HazardAssignment::hand_entered("Noise", "Physical"));
    for value in [
        FactorValue::Deficiency(DeficiencyLevel::Low),
        FactorValue::Exposure(ExposureLevel::Sporadic),
        FactorValue::Consequence(ConsequenceLevel::Minor),
    ] {
        store.set_factor(id, 1, value);
    }

    let progress = store.model().progress(5);
    assert_eq!(progress.positions, 1);
    assert_eq!(progress.assigned_hazards, 2);
    assert_eq!(progress.assessed_hazards, 1);
    assert_eq!(progress.completion_percent, 50);
}

#[test]
fn model_survives_json_round_trip_with_ids() {
    let mut store = EntityStore::new();
    store.add_position(draft("Welder"));
    let json = serde_json::to_value(store.model()).expect("serialize");
    let restored: WizardModel = serde_json::from_value(json).expect("deserialize");

    let mut store = EntityStore::with_model(restored);
    let next = store.add_position(draft("Driver"));
    assert_eq!(next, PositionId(2));
}
