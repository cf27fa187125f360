use super::*;

#[test]
fn probability_without_consequence_leaves_risk_empty() {
    for nd in DeficiencyLevel::ALL {
        for ne in ExposureLevel::ALL {
            let derived = compute_derived(Some(*nd), Some(*ne), None);
            assert_eq!(derived.probability, Some(nd.value() * ne.value()));
            assert_eq!(derived.risk, None);
        }
    }
}

#[test]
fn risk_is_exact_product_for_complete_sets() {
    for nd in DeficiencyLevel::ALL {
        for ne in ExposureLevel::ALL {
            for nc in ConsequenceLevel::ALL {
                let derived = compute_derived(Some(*nd), Some(*ne), Some(*nc));
                let probability = derived.probability.expect("probability");
                assert_eq!(derived.risk, Some(probability * nc.value()));
            }
        }
    }
}

#[test]
fn missing_operand_never_multiplies() {
    let derived = compute_derived(None, Some(ExposureLevel::Continuous), Some(ConsequenceLevel::Fatal));
    assert_eq!(derived, Derived::default());

    let derived = compute_derived(Some(DeficiencyLevel::High), None, Some(ConsequenceLevel::Fatal));
    assert_eq!(derived.probability, None);
    assert_eq!(derived.risk, None);
}

#[test]
fn risk_band_boundaries_are_exact() {
    assert_eq!(classify_risk(Some(39)).label(), "Acceptable");
    assert_eq!(classify_risk(Some(40)).label(), "Improvable");
    assert_eq!(classify_risk(Some(149)).label(), "Improvable");
    assert_eq!(classify_risk(Some(150)), RiskBand::AcceptableWithControl);
    assert_eq!(classify_risk(Some(599)), RiskBand::AcceptableWithControl);
    assert_eq!(classify_risk(Some(600)).label(), "Not-acceptable");
    assert_eq!(classify_risk(Some(4000)), RiskBand::NotAcceptable);
}

#[test]
fn probability_band_boundaries_are_exact() {
    assert_eq!(classify_probability(Some(7)), ProbabilityBand::Low);
    assert_eq!(classify_probability(Some(8)), ProbabilityBand::Medium);
    assert_eq!(classify_probability(Some(19)), ProbabilityBand::Medium);
    assert_eq!(classify_probability(Some(20)), ProbabilityBand::High);
    assert_eq!(classify_probability(Some(39)), ProbabilityBand::High);
    assert_eq!(classify_probability(Some(40)), ProbabilityBand::VeryHigh);
}

#[test]
fn missing_values_are_unclassified_with_empty_label() {
    assert_eq!(classify_risk(None), RiskBand::Unclassified);
    assert_eq!(classify_risk(None).label(), "");
    assert_eq!(classify_probability(None).label(), "");
    assert_eq!(classify_probability(None).severity(), Severity::Neutral);
    assert_eq!(Severity::Neutral.class_name(), "");
}

#[test]
fn bands_are_ordered_by_severity() {
    assert!(RiskBand::Acceptable < RiskBand::Improvable);
    assert!(RiskBand::Improvable < RiskBand::AcceptableWithControl);
    assert!(RiskBand::AcceptableWithControl < RiskBand::NotAcceptable);
    assert!(RiskBand::NotAcceptable.severity() > RiskBand::Acceptable.severity());
    assert_eq!(RiskBand::NotAcceptable.roman(), "I");
    assert_eq!(RiskBand::Acceptable.roman(), "IV");
}

#[test]
fn welder_scenario_scores() {
    let a = compute_derived(
        Some(DeficiencyLevel::High),
        Some(ExposureLevel::Frequent),
        Some(ConsequenceLevel::Serious),
    );
    assert_eq!(a.probability, Some(18));
    assert_eq!(a.risk, Some(450));
    assert_eq!(a.risk_band().label(), "Not-acceptable-or-acceptable-with-control");
    assert_eq!(a.probability_band(), ProbabilityBand::Medium);

    let b = compute_derived(
        Some(DeficiencyLevel::Low),
        Some(ExposureLevel::Sporadic),
        Some(ConsequenceLevel::Minor),
    );
    assert_eq!(b.risk, Some(10));
    assert_eq!(b.risk_band().label(), "Acceptable");
}

#[test]
fn levels_reject_values_outside_their_domain() {
    assert_eq!(DeficiencyLevel::try_from(6u32), Ok(DeficiencyLevel::High));
    assert_eq!(DeficiencyLevel::try_from(3u32), Err(FactorLevelError::Deficiency(3)));
    assert_eq!(ExposureLevel::try_from(5u32), Err(FactorLevelError::Exposure(5)));
    assert_eq!(ConsequenceLevel::try_from(100u32), Ok(ConsequenceLevel::Fatal));
    assert!(ConsequenceLevel::try_from(50u32).is_err());
}

#[test]
fn levels_serialize_as_their_numeric_value() {
    let json = serde_json::to_string(&ConsequenceLevel::VerySerious).expect("serialize");
    assert_eq!(json, "60");
    let parsed: DeficiencyLevel = serde_json::from_str("10").expect("deserialize");
    assert_eq!(parsed, DeficiencyLevel::VeryHigh);
    assert!(serde_json::from_str::<ExposureLevel>("7").is_err());
}
