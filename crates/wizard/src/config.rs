use std::{collections::HashMap, fs, time::Duration};

use anyhow::Context;
use tracing::warn;

use crate::steps::StepLayout;

pub const SETTINGS_FILE: &str = "wizard.toml";
const ENV_PREFIX: &str = "APP__";

#[derive(Debug, Clone, PartialEq)]
pub struct WizardSettings {
    pub catalog_url: String,
    pub database_url: String,
    pub storage_key: String,
    pub state_max_age_secs: i64,
    /// Average hazards per position below which leaving the hazard step asks
    /// for confirmation.
    pub low_coverage_threshold: f64,
    pub control_autosave_ms: u64,
    pub search_debounce_ms: u64,
    pub prefetch_timeout_ms: u64,
    pub catalog_limit: u32,
    pub step_layout: StepLayout,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            catalog_url: "http://127.0.0.1:8080".into(),
            database_url: "sqlite://./data/wizard.db".into(),
            storage_key: storage::DEFAULT_STATE_KEY.into(),
            state_max_age_secs: storage::DEFAULT_MAX_AGE_SECS,
            low_coverage_threshold: 3.0,
            control_autosave_ms: 1500,
            search_debounce_ms: 300,
            prefetch_timeout_ms: 10_000,
            catalog_limit: 500,
            step_layout: StepLayout::Combined,
        }
    }
}

impl WizardSettings {
    pub fn control_autosave(&self) -> Duration {
        Duration::from_millis(self.control_autosave_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn prefetch_timeout(&self) -> Duration {
        Duration::from_millis(self.prefetch_timeout_ms)
    }

    pub fn state_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.state_max_age_secs)
    }

    /// Applies one override by key. Returns `false` for unknown keys and
    /// values that do not parse; the setting keeps its previous value.
    pub fn apply(&mut self, key: &str, value: &str) -> bool {
        let value = value.trim();
        let applied = match key.to_ascii_lowercase().as_str() {
            "catalog_url" => {
                self.catalog_url = value.to_string();
                true
            }
            "database_url" => {
                self.database_url = value.to_string();
                true
            }
            "storage_key" => {
                self.storage_key = value.to_string();
                true
            }
            "state_max_age_secs" => parse_into(value, &mut self.state_max_age_secs),
            "low_coverage_threshold" => parse_into(value, &mut self.low_coverage_threshold),
            "control_autosave_ms" => parse_into(value, &mut self.control_autosave_ms),
            "search_debounce_ms" => parse_into(value, &mut self.search_debounce_ms),
            "prefetch_timeout_ms" => parse_into(value, &mut self.prefetch_timeout_ms),
            "catalog_limit" => parse_into(value, &mut self.catalog_limit),
            "step_layout" => parse_into(value, &mut self.step_layout),
            _ => return false,
        };
        if !applied {
            warn!(key, value, "ignoring unparseable wizard setting");
        }
        applied
    }

    pub fn apply_toml(&mut self, raw: &str) -> anyhow::Result<()> {
        let table: HashMap<String, toml::Value> =
            toml::from_str(raw).context("wizard settings file is not valid toml")?;
        for (key, value) in table {
            let value = match value {
                toml::Value::String(text) => text,
                other => other.to_string(),
            };
            self.apply(&key, &value);
        }
        Ok(())
    }

    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                self.apply(key, &value);
            }
        }
    }
}

fn parse_into<T: std::str::FromStr>(raw: &str, slot: &mut T) -> bool {
    match raw.parse::<T>() {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

/// Defaults, then `wizard.toml` in the working directory, then `APP__*`
/// environment variables.
pub fn load_settings() -> WizardSettings {
    let mut settings = WizardSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        if let Err(err) = settings.apply_toml(&raw) {
            warn!("ignoring {SETTINGS_FILE}: {err:#}");
        }
    }

    settings.apply_env(std::env::vars());
    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    storage::ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return WizardSettings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        return format!("sqlite://{}", path.replace('\\', "/"));
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
