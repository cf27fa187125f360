use super::*;

use std::time::{SystemTime, UNIX_EPOCH};

#[test]
fn defaults_match_documented_thresholds() {
    let settings = WizardSettings::default();
    assert_eq!(settings.low_coverage_threshold, 3.0);
    assert_eq!(settings.control_autosave(), Duration::from_millis(1500));
    assert_eq!(settings.state_max_age(), chrono::Duration::hours(24));
    assert_eq!(settings.step_layout, StepLayout::Combined);
}

#[test]
fn toml_file_overrides_typed_values() {
    let mut settings = WizardSettings::default();
    settings
        .apply_toml(
            r#"
catalog_url = "https://catalog.example"
low_coverage_threshold = 2.5
control_autosave_ms = 800
step_layout = "decoupled"
"#,
        )
        .expect("toml");

    assert_eq!(settings.catalog_url, "https://catalog.example");
    assert_eq!(settings.low_coverage_threshold, 2.5);
    assert_eq!(settings.control_autosave_ms, 800);
    assert_eq!(settings.step_layout, StepLayout::Decoupled);
}

#[test]
fn env_overrides_use_prefix_and_skip_bad_values() {
    let mut settings = WizardSettings::default();
    settings.apply_env(vec![
        ("APP__CATALOG_LIMIT".to_string(), "25".to_string()),
        ("APP__SEARCH_DEBOUNCE_MS".to_string(), "soon".to_string()),
        ("APP__STEP_LAYOUT".to_string(), "sideways".to_string()),
        ("CATALOG_LIMIT".to_string(), "99".to_string()),
    ]);

    assert_eq!(settings.catalog_limit, 25);
    assert_eq!(settings.search_debounce_ms, 300);
    assert_eq!(settings.step_layout, StepLayout::Combined);
}

#[test]
fn unknown_keys_are_reported() {
    let mut settings = WizardSettings::default();
    assert!(!settings.apply("colour", "blue"));
    assert!(settings.apply("STORAGE_KEY", "other_key"));
    assert_eq!(settings.storage_key, "other_key");
}

#[test]
fn invalid_toml_is_an_error() {
    let mut settings = WizardSettings::default();
    assert!(settings.apply_toml("catalog_url = ").is_err());
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/wizard.db"),
        "sqlite://./data/wizard.db"
    );
    assert_eq!(
        normalize_database_url("sqlite:data\\wizard.db"),
        "sqlite://data/wizard.db"
    );
    assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
    assert_eq!(normalize_database_url("  "), "sqlite://./data/wizard.db");
}

#[test]
fn prepare_creates_parent_dir() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("gtc45_wizard_test_{suffix}"));
    let db_path = temp_root.join("data").join("wizard.db");

    let url = prepare_database_url(db_path.to_string_lossy().as_ref()).expect("prepare db url");
    assert!(url.starts_with("sqlite://"));
    assert!(temp_root.join("data").exists());

    fs::remove_dir_all(temp_root).expect("cleanup");
}
