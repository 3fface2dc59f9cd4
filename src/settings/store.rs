//! Persistence adapter contract for settings.

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::Setting;

/// Durable storage for settings.
///
/// The registry reads the full set once at startup (and on `reload`) and
/// writes every definition and value change back through `upsert_setting`.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load every persisted setting.
    async fn find_settings(&self) -> Result<Vec<Setting>>;

    /// Insert or replace a setting by key.
    async fn upsert_setting(&self, setting: &Setting) -> Result<()>;
}

/// Process-local store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<BTreeMap<String, Setting>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, as if the settings had been written by an earlier run.
    pub fn with_settings(settings: impl IntoIterator<Item = Setting>) -> Self {
        let store = Self::new();
        store
            .settings
            .write()
            .extend(settings.into_iter().map(|s| (s.key.clone(), s)));
        store
    }

    /// Get a stored setting directly, bypassing any registry.
    pub fn stored(&self, key: &str) -> Option<Setting> {
        self.settings.read().get(key).cloned()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn find_settings(&self) -> Result<Vec<Setting>> {
        Ok(self.settings.read().values().cloned().collect())
    }

    async fn upsert_setting(&self, setting: &Setting) -> Result<()> {
        self.settings
            .write()
            .insert(setting.key.clone(), setting.clone());
        Ok(())
    }
}
