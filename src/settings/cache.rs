//! Read-optimized mirror of setting values.

use crate::cache::{CacheConfig, CacheError, CacheRegistry, TypedCache};

use super::SettingValue;

/// Name of the settings cache inside the `CacheRegistry`.
pub const SETTINGS_CACHE: &str = "settings";

/// Shared, read-only view of the current setting values.
///
/// Handed out to every consumer. Only the registry writes to it, and only
/// after the value has been persisted. It holds every setting: nothing is
/// evicted by size or age.
#[derive(Debug, Clone)]
pub struct SettingsCache {
    values: TypedCache<String, SettingValue>,
}

impl SettingsCache {
    /// Create (or attach to) the settings cache in `registry`.
    pub fn new(registry: &CacheRegistry) -> Result<Self, CacheError> {
        let values = registry.get_or_create(SETTINGS_CACHE, CacheConfig::pinned())?;
        Ok(Self { values })
    }

    /// Last known value of `key`.
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.values.get(&key.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains(&key.to_string())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_number())
    }

    pub fn len(&self) -> u64 {
        self.values.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(super) fn store(&self, key: &str, value: SettingValue) {
        self.values.insert(key.to_string(), value);
    }
}
