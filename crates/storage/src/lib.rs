use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_STATE_KEY: &str = "gtc45_wizard_state";
pub const DEFAULT_MAX_AGE_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct SavedState {
    pub payload: serde_json::Value,
    pub saved_at: DateTime<Utc>,
}

/// Key-value persistence for the whole wizard model.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<SavedState>>;
    async fn save(&self, key: &str, state: &SavedState) -> Result<()>;
    async fn clear(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SqliteStateStore {
    pool: Pool<Sqlite>,
}

impl SqliteStateStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{database_url}'"))?
            .create_if_missing(true);
        // Every in-memory connection is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open wizard state database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!(database_url, "wizard state store ready");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self, key: &str) -> Result<Option<SavedState>> {
        let row = sqlx::query("SELECT payload, saved_at FROM wizard_state WHERE state_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load wizard state '{key}'"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("payload")?;
        let saved_at: DateTime<Utc> = row.try_get("saved_at")?;
        let payload = serde_json::from_str(&raw)
            .with_context(|| format!("stored wizard state '{key}' is not valid json"))?;
        Ok(Some(SavedState { payload, saved_at }))
    }

    async fn save(&self, key: &str, state: &SavedState) -> Result<()> {
        let raw = serde_json::to_string(&state.payload)?;
        sqlx::query(
            "INSERT INTO wizard_state (state_key, payload, saved_at) VALUES (?, ?, ?)
             ON CONFLICT(state_key) DO UPDATE SET payload = excluded.payload, saved_at = excluded.saved_at",
        )
        .bind(key)
        .bind(raw)
        .bind(state.saved_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save wizard state '{key}'"))?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM wizard_state WHERE state_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear wizard state '{key}'"))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, SavedState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<SavedState>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, state: &SavedState) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), state.clone());
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Typed access to one key of a [`StateStore`] with a max-age policy: state
/// older than `max_age` is discarded on load.
#[derive(Clone)]
pub struct StatePersistence {
    store: Arc<dyn StateStore>,
    key: String,
    max_age: Duration,
}

impl StatePersistence {
    pub fn new(store: Arc<dyn StateStore>, key: impl Into<String>, max_age: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            max_age,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.load_at(Utc::now()).await
    }

    pub async fn load_at<T: DeserializeOwned>(&self, now: DateTime<Utc>) -> Result<Option<T>> {
        let Some(saved) = self.store.load(&self.key).await? else {
            return Ok(None);
        };

        let age = now - saved.saved_at;
        if age > self.max_age {
            info!(
                key = %self.key,
                age_secs = age.num_seconds(),
                "discarding expired wizard state"
            );
            self.store.clear(&self.key).await?;
            return Ok(None);
        }

        match serde_json::from_value(saved.payload) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key = %self.key, "discarding unreadable wizard state: {err}");
                self.store.clear(&self.key).await?;
                Ok(None)
            }
        }
    }

    pub async fn save<T: Serialize + Sync>(&self, value: &T) -> Result<()> {
        self.save_at(value, Utc::now()).await
    }

    pub async fn save_at<T: Serialize + Sync>(&self, value: &T, saved_at: DateTime<Utc>) -> Result<()> {
        let payload = serde_json::to_value(value).context("failed to serialize wizard state")?;
        self.store
            .save(&self.key, &SavedState { payload, saved_at })
            .await?;
        debug!(key = %self.key, "wizard state saved");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear(&self.key).await
    }
}

pub fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

pub fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
