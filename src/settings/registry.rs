//! Settings registry - definitions, groups and value updates.
//!
//! The registry is built once at startup, loads every persisted setting into
//! the cache, and from then on is the only writer of both the cache and the
//! store. `add` and `add_group` run through the middleware chains composed in
//! `SettingsRegistryBuilder`; `update` goes straight to the core.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::error::{Result, SettingsError};
use super::events::{ChangeKind, ListenerId, SettingChange, SettingsEvents};
use super::middleware::{AddGroup, AddSetting, Chain, Middleware, Operation};
use super::{
    GroupOptions, GroupOutcome, Setting, SettingGroup, SettingOptions, SettingValue, SettingsCache,
    SettingsStore,
};

#[derive(Default)]
struct RegistryState {
    /// Settings registered in this process.
    definitions: HashMap<String, Setting>,
    /// Keys whose `add` is waiting on the store.
    pending: HashSet<String>,
    /// Loaded from the store but not (yet) registered in this process.
    persisted: HashMap<String, Setting>,
    groups: BTreeMap<String, GroupOptions>,
}

/// Holds a key in `pending` until dropped.
struct Reservation<'a> {
    state: &'a RwLock<RegistryState>,
    key: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.state.write().pending.remove(&self.key);
    }
}

struct RegistryCore {
    store: Arc<dyn SettingsStore>,
    cache: SettingsCache,
    events: SettingsEvents,
    state: RwLock<RegistryState>,
}

impl RegistryCore {
    /// Replace the persisted snapshot and cache with the store's contents.
    async fn load(&self) -> Result<usize> {
        let stored = self
            .store
            .find_settings()
            .await
            .map_err(SettingsError::Persistence)?;
        let count = stored.len();

        let mut state = self.state.write();
        for setting in stored {
            self.cache.store(&setting.key, setting.value.clone());
            state.persisted.insert(setting.key.clone(), setting);
        }

        Ok(count)
    }

    fn reserve(&self, key: &str, redefine: bool) -> Result<(Reservation<'_>, Option<Setting>)> {
        let mut state = self.state.write();

        let duplicate = || SettingsError::DuplicateKey { key: key.to_string() };
        if state.pending.contains(key) {
            return Err(duplicate());
        }
        if let Some(existing) = state.definitions.get(key)
            && !(existing.redefine || redefine)
        {
            return Err(duplicate());
        }

        let carried = state
            .definitions
            .get(key)
            .or_else(|| state.persisted.get(key))
            .cloned();
        state.pending.insert(key.to_string());

        Ok((
            Reservation {
                state: &self.state,
                key: key.to_string(),
            },
            carried,
        ))
    }

    async fn add(&self, call: AddSetting) -> Result<Setting> {
        let AddSetting { key, default, options } = call;

        let declared = options.kind.unwrap_or_else(|| default.kind());
        let default = default
            .coerce(declared)
            .map_err(|rejected| SettingsError::InvalidType {
                key: key.clone(),
                expected: declared,
                actual: rejected.kind(),
            })?;
        options.constraints.check(&key, &default)?;

        let (reservation, carried) = self.reserve(&key, options.redefine)?;

        let mut setting = Setting::new(key.clone(), default, options);
        if let Some(previous) = carried {
            setting.created_at = previous.created_at;
            match setting.validate(previous.value) {
                Ok(value) => setting.value = value,
                Err(e) => warn!("Stored value of {} no longer valid, using default: {}", key, e),
            }
        }

        self.store
            .upsert_setting(&setting)
            .await
            .map_err(SettingsError::Persistence)?;

        let previous = self.cache.get(&key);
        {
            let mut state = self.state.write();
            state.persisted.remove(&key);
            state.definitions.insert(key.clone(), setting.clone());
            self.cache.store(&key, setting.value.clone());
        }
        drop(reservation);

        self.events.emit(SettingChange::new(
            key,
            ChangeKind::Added,
            previous,
            setting.value.clone(),
        ));
        Ok(setting)
    }

    fn add_group(&self, call: AddGroup) -> Result<GroupOutcome> {
        let mut state = self.state.write();
        match state.groups.get(&call.name) {
            Some(existing) if *existing == call.options => Ok(GroupOutcome::Unchanged),
            Some(_) => Err(SettingsError::GroupConflict { name: call.name }),
            None => {
                state.groups.insert(call.name, call.options);
                Ok(GroupOutcome::Created)
            }
        }
    }

    async fn update(&self, key: &str, value: SettingValue) -> Result<Setting> {
        let unknown = || SettingsError::UnknownKey { key: key.to_string() };
        let mut setting = self.state.read().definitions.get(key).cloned().ok_or_else(unknown)?;

        let value = setting.validate(value)?;
        let updated_at = Utc::now();
        setting.value = value.clone();
        setting.updated_at = updated_at;

        self.store
            .upsert_setting(&setting)
            .await
            .map_err(SettingsError::Persistence)?;

        // A redefinition may have committed while the write was in flight;
        // only the value belongs to this update.
        let (previous, setting) = {
            let mut state = self.state.write();
            let current = state.definitions.get_mut(key).ok_or_else(unknown)?;
            current.value = value;
            current.updated_at = updated_at;
            let previous = self.cache.get(key);
            self.cache.store(key, current.value.clone());
            (previous, current.clone())
        };
        debug!("Updated setting {} = {}", key, setting.value);

        self.events.emit(SettingChange::new(
            key,
            ChangeKind::Updated,
            previous,
            setting.value.clone(),
        ));
        Ok(setting)
    }

    async fn reload(&self) -> Result<usize> {
        let stored = self
            .store
            .find_settings()
            .await
            .map_err(SettingsError::Persistence)?;
        let count = stored.len();

        let mut changes = Vec::new();
        {
            let mut state = self.state.write();
            for incoming in stored {
                let key = incoming.key.clone();
                let Some(current) = state.definitions.get_mut(&key) else {
                    self.cache.store(&key, incoming.value.clone());
                    state.persisted.insert(key, incoming);
                    continue;
                };

                let value = match current.validate(incoming.value) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!("Ignoring stored value of {} on reload: {}", key, e);
                        continue;
                    }
                };
                if value == current.value {
                    continue;
                }

                let previous = std::mem::replace(&mut current.value, value.clone());
                current.updated_at = incoming.updated_at;
                self.cache.store(&key, value.clone());
                changes.push(SettingChange::new(key, ChangeKind::Reloaded, Some(previous), value));
            }
        }

        for change in changes {
            self.events.emit(change);
        }
        Ok(count)
    }
}

#[async_trait]
impl Operation<AddSetting, Setting> for RegistryCore {
    async fn call(&self, call: AddSetting) -> Result<Setting> {
        self.add(call).await
    }
}

#[async_trait]
impl Operation<AddGroup, GroupOutcome> for RegistryCore {
    async fn call(&self, call: AddGroup) -> Result<GroupOutcome> {
        self.add_group(call)
    }
}

/// Builder for `SettingsRegistry`; composes the middleware chains.
pub struct SettingsRegistryBuilder {
    store: Arc<dyn SettingsStore>,
    cache: SettingsCache,
    event_capacity: usize,
    add_middleware: Vec<Arc<dyn Middleware<AddSetting, Setting>>>,
    group_middleware: Vec<Arc<dyn Middleware<AddGroup, GroupOutcome>>>,
}

impl SettingsRegistryBuilder {
    /// Buffer size of the change broadcast channel.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Add middleware around `add`.
    #[must_use]
    pub fn add_middleware(mut self, middleware: impl Middleware<AddSetting, Setting> + 'static) -> Self {
        self.add_middleware.push(Arc::new(middleware));
        self
    }

    /// Add middleware around `add_group`.
    #[must_use]
    pub fn group_middleware(mut self, middleware: impl Middleware<AddGroup, GroupOutcome> + 'static) -> Self {
        self.group_middleware.push(Arc::new(middleware));
        self
    }

    /// Add middleware around both `add` and `add_group`.
    #[must_use]
    pub fn layer<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<AddSetting, Setting> + Middleware<AddGroup, GroupOutcome> + 'static,
    {
        let middleware = Arc::new(middleware);
        self.add_middleware.push(Arc::clone(&middleware) as Arc<dyn Middleware<AddSetting, Setting>>);
        self.group_middleware.push(middleware as Arc<dyn Middleware<AddGroup, GroupOutcome>>);
        self
    }

    /// Load persisted settings and return a ready registry.
    ///
    /// # Errors
    /// Returns `SettingsError::Persistence` if the store can't be read.
    pub async fn build(self) -> Result<SettingsRegistry> {
        let core = Arc::new(RegistryCore {
            store: self.store,
            cache: self.cache,
            events: SettingsEvents::new(self.event_capacity),
            state: RwLock::new(RegistryState::default()),
        });

        let loaded = core.load().await?;
        info!(
            "Settings registry ready: {} persisted settings, {} add / {} group middleware",
            loaded,
            self.add_middleware.len(),
            self.group_middleware.len()
        );

        Ok(SettingsRegistry {
            add_chain: Chain::new(Arc::clone(&core) as Arc<dyn Operation<AddSetting, Setting>>, self.add_middleware),
            group_chain: Chain::new(
                Arc::clone(&core) as Arc<dyn Operation<AddGroup, GroupOutcome>>,
                self.group_middleware,
            ),
            core,
        })
    }
}

/// The settings registry.
///
/// Construct one per process with `SettingsRegistry::builder` and share it
/// through `Arc`.
pub struct SettingsRegistry {
    core: Arc<RegistryCore>,
    add_chain: Chain<AddSetting, Setting>,
    group_chain: Chain<AddGroup, GroupOutcome>,
}

impl SettingsRegistry {
    pub fn builder(store: Arc<dyn SettingsStore>, cache: SettingsCache) -> SettingsRegistryBuilder {
        SettingsRegistryBuilder {
            store,
            cache,
            event_capacity: 256,
            add_middleware: Vec::new(),
            group_middleware: Vec::new(),
        }
    }

    /// Register a setting.
    ///
    /// A value persisted by an earlier run is kept if it still satisfies the
    /// new definition. Registering an already defined key fails with
    /// `DuplicateKey` unless either definition sets `redefine`.
    pub async fn add(
        &self,
        key: impl Into<String>,
        default: impl Into<SettingValue>,
        options: SettingOptions,
    ) -> Result<Setting> {
        self.add_chain
            .call(AddSetting {
                key: key.into(),
                default: default.into(),
                options,
            })
            .await
    }

    /// Register a group. Re-adding with identical options is a no-op.
    pub async fn add_group(&self, name: impl Into<String>, options: GroupOptions) -> Result<GroupOutcome> {
        self.group_chain
            .call(AddGroup {
                name: name.into(),
                options,
            })
            .await
    }

    /// Register a group and return a scope that adds settings into it.
    pub async fn group(&self, name: impl Into<String>, options: GroupOptions) -> Result<GroupScope<'_>> {
        let name = name.into();
        self.add_group(name.clone(), options).await?;
        Ok(GroupScope {
            registry: self,
            group: name,
            section: None,
        })
    }

    /// Change the value of a registered setting.
    pub async fn update(&self, key: &str, value: impl Into<SettingValue>) -> Result<Setting> {
        self.core.update(key, value.into()).await
    }

    /// Restore a setting to its registered default.
    pub async fn reset(&self, key: &str) -> Result<Setting> {
        let default = self
            .get_setting(key)
            .map(|s| s.package_value)
            .ok_or_else(|| SettingsError::UnknownKey { key: key.to_string() })?;
        self.core.update(key, default).await
    }

    /// Re-read every setting from the store.
    ///
    /// Returns the number of stored settings seen.
    pub async fn reload(&self) -> Result<usize> {
        self.core.reload().await
    }

    /// Current value of `key`, from the cache.
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.core.cache.get(key)
    }

    /// Full definition of a registered setting.
    pub fn get_setting(&self, key: &str) -> Option<Setting> {
        self.core.state.read().definitions.get(key).cloned()
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.core.state.read().definitions.contains_key(key)
    }

    /// All registered settings, ordered by group, sorter and key.
    pub fn settings(&self) -> Vec<Setting> {
        let mut settings: Vec<Setting> = self.core.state.read().definitions.values().cloned().collect();
        settings.sort_by(|a, b| {
            (&a.group, a.sorter, &a.key).cmp(&(&b.group, b.sorter, &b.key))
        });
        settings
    }

    pub fn settings_in_group(&self, group: &str) -> Vec<Setting> {
        self.settings()
            .into_iter()
            .filter(|s| s.group.as_deref() == Some(group))
            .collect()
    }

    /// Settings that may be sent to clients that are not logged in.
    pub fn public_settings(&self) -> Vec<Setting> {
        self.settings().into_iter().filter(|s| s.public && !s.hidden).collect()
    }

    pub fn groups(&self) -> Vec<SettingGroup> {
        self.core
            .state
            .read()
            .groups
            .iter()
            .map(|(name, options)| SettingGroup {
                name: name.clone(),
                options: options.clone(),
            })
            .collect()
    }

    /// Read-only cache handle for consumers.
    pub fn reader(&self) -> SettingsCache {
        self.core.cache.clone()
    }

    /// Call `handler` after every committed change of `key`.
    pub fn on_change<F>(&self, key: &str, handler: F) -> ListenerId
    where
        F: Fn(&SettingChange) + Send + Sync + 'static,
    {
        self.core.events.on_change(key, handler)
    }

    /// Like `on_change`, but also call `handler` right away with the
    /// current value, if there is one.
    pub fn watch<F>(&self, key: &str, handler: F) -> ListenerId
    where
        F: Fn(&SettingChange) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        if let Some(value) = self.get(key) {
            handler(&SettingChange::new(key, ChangeKind::Current, None, value));
        }
        self.core.events.on_change(key, move |change| handler(change))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.core.events.remove(id)
    }

    /// Receive every committed change.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.core.events.subscribe()
    }
}

impl std::fmt::Debug for SettingsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.read();
        f.debug_struct("SettingsRegistry")
            .field("settings", &state.definitions.len())
            .field("groups", &state.groups.len())
            .field("add_middleware", &self.add_chain.len())
            .field("group_middleware", &self.group_chain.len())
            .finish()
    }
}

/// Adds settings into one group (and optionally one section).
#[derive(Clone)]
pub struct GroupScope<'a> {
    registry: &'a SettingsRegistry,
    group: String,
    section: Option<String>,
}

impl<'a> GroupScope<'a> {
    pub fn name(&self) -> &str {
        &self.group
    }

    /// Scope for a section inside this group.
    #[must_use]
    pub fn section(&self, section: impl Into<String>) -> GroupScope<'a> {
        GroupScope {
            registry: self.registry,
            group: self.group.clone(),
            section: Some(section.into()),
        }
    }

    /// `SettingsRegistry::add` with this scope's group and section filled in.
    pub async fn add(
        &self,
        key: impl Into<String>,
        default: impl Into<SettingValue>,
        mut options: SettingOptions,
    ) -> Result<Setting> {
        options.group = Some(self.group.clone());
        if options.section.is_none() {
            options.section = self.section.clone();
        }
        self.registry.add(key, default, options).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::*;
    use crate::cache::CacheRegistry;
    use crate::settings::middleware::{KeyFormat, Next};
    use crate::settings::{MemorySettingsStore, SettingType};

    /// Memory store whose writes can be switched to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySettingsStore,
        fail_writes: AtomicBool,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl SettingsStore for FlakyStore {
        async fn find_settings(&self) -> anyhow::Result<Vec<Setting>> {
            self.inner.find_settings().await
        }

        async fn upsert_setting(&self, setting: &Setting) -> anyhow::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                anyhow::bail!("connection reset");
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert_setting(setting).await
        }
    }

    /// Memory store that can hold its next write until released.
    #[derive(Default)]
    struct GatedStore {
        inner: MemorySettingsStore,
        hold_next: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SettingsStore for GatedStore {
        async fn find_settings(&self) -> anyhow::Result<Vec<Setting>> {
            self.inner.find_settings().await
        }

        async fn upsert_setting(&self, setting: &Setting) -> anyhow::Result<()> {
            if self.hold_next.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.upsert_setting(setting).await
        }
    }

    async fn registry_with(store: Arc<dyn SettingsStore>) -> SettingsRegistry {
        let cache = SettingsCache::new(&CacheRegistry::new()).unwrap();
        SettingsRegistry::builder(store, cache).build().await.unwrap()
    }

    async fn registry() -> (SettingsRegistry, Arc<FlakyStore>) {
        let store = Arc::new(FlakyStore::default());
        (registry_with(store.clone()).await, store)
    }

    #[tokio::test]
    async fn test_max_room_members_scenario() {
        let (registry, _) = registry().await;
        registry
            .add("Max_Room_Members", 100, SettingOptions::new().kind(SettingType::Number))
            .await
            .unwrap();

        registry.update("Max_Room_Members", 250).await.unwrap();
        assert_eq!(registry.get("Max_Room_Members"), Some(SettingValue::Number(250.0)));

        let err = registry.update("Max_Room_Members", "abc").await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation { .. }));
        assert_eq!(registry.get("Max_Room_Members"), Some(SettingValue::Number(250.0)));
    }

    #[tokio::test]
    async fn test_update_then_get_for_each_type() {
        let (registry, _) = registry().await;
        registry.add("Flag", false, SettingOptions::new()).await.unwrap();
        registry.add("Name", "a", SettingOptions::new()).await.unwrap();
        registry
            .add("Mode", "x", SettingOptions::new().values(["x", "y"]))
            .await
            .unwrap();
        registry
            .add("Layout", serde_json::json!([]), SettingOptions::new())
            .await
            .unwrap();

        registry.update("Flag", true).await.unwrap();
        registry.update("Name", "b").await.unwrap();
        registry.update("Mode", "y").await.unwrap();
        registry.update("Layout", serde_json::json!([1, 2])).await.unwrap();

        assert_eq!(registry.get("Flag"), Some(SettingValue::Boolean(true)));
        assert_eq!(registry.get("Name"), Some(SettingValue::String("b".into())));
        assert_eq!(registry.get("Mode"), Some(SettingValue::Enum("y".into())));
        assert_eq!(
            registry.get("Layout"),
            Some(SettingValue::Structured(serde_json::json!([1, 2])))
        );
    }

    #[tokio::test]
    async fn test_update_persists_value() {
        let (registry, store) = registry().await;
        registry.add("Site_Name", "Livedesk", SettingOptions::new()).await.unwrap();
        registry.update("Site_Name", "Support").await.unwrap();

        let stored = store.inner.stored("Site_Name").unwrap();
        assert_eq!(stored.value, SettingValue::String("Support".into()));
        assert_eq!(stored.package_value, SettingValue::String("Livedesk".into()));
    }

    #[tokio::test]
    async fn test_update_out_of_range_keeps_value() {
        let (registry, _) = registry().await;
        registry
            .add("Max_Room_Members", 100, SettingOptions::new().min(1.0).max(1000.0))
            .await
            .unwrap();

        let err = registry.update("Max_Room_Members", 5000).await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation { .. }));
        assert_eq!(registry.get("Max_Room_Members"), Some(SettingValue::Number(100.0)));
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let (registry, _) = registry().await;
        let err = registry.update("Nope", 1).await.unwrap_err();
        assert!(matches!(err, SettingsError::UnknownKey { .. }));

        let err = registry.reset("Nope").await.unwrap_err();
        assert!(matches!(err, SettingsError::UnknownKey { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_key() {
        let (registry, _) = registry().await;
        registry.add("Site_Name", "a", SettingOptions::new()).await.unwrap();

        let err = registry.add("Site_Name", "b", SettingOptions::new()).await.unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateKey { .. }));
        assert_eq!(registry.get("Site_Name"), Some(SettingValue::String("a".into())));
    }

    #[tokio::test]
    async fn test_redefine_keeps_current_value() {
        let (registry, _) = registry().await;
        registry.add("Site_Name", "a", SettingOptions::new()).await.unwrap();
        registry.update("Site_Name", "custom").await.unwrap();

        let setting = registry
            .add("Site_Name", "b", SettingOptions::new().group("General").redefine())
            .await
            .unwrap();
        assert_eq!(setting.value, SettingValue::String("custom".into()));
        assert_eq!(setting.package_value, SettingValue::String("b".into()));
        assert_eq!(setting.group.as_deref(), Some("General"));
    }

    #[tokio::test]
    async fn test_invalid_default_type() {
        let (registry, store) = registry().await;
        let err = registry
            .add("Max_Room_Members", "lots", SettingOptions::new().kind(SettingType::Number))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SettingsError::InvalidType {
                expected: SettingType::Number,
                actual: SettingType::String,
                ..
            }
        ));
        assert!(!registry.is_defined("Max_Room_Members"));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_default_outside_constraints() {
        let (registry, _) = registry().await;
        let err = registry
            .add("Mode", "z", SettingOptions::new().values(["x", "y"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_group_idempotent_and_conflict() {
        let (registry, _) = registry().await;
        let options = GroupOptions::new().label("Omnichannel").sorter(3);

        assert_eq!(
            registry.add_group("Omnichannel", options.clone()).await.unwrap(),
            GroupOutcome::Created
        );
        assert_eq!(
            registry.add_group("Omnichannel", options.clone()).await.unwrap(),
            GroupOutcome::Unchanged
        );

        let err = registry
            .add_group("Omnichannel", options.hidden())
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::GroupConflict { .. }));
        assert_eq!(registry.groups().len(), 1);
    }

    #[tokio::test]
    async fn test_group_scope_fills_group_and_section() {
        let (registry, _) = registry().await;
        let omnichannel = registry.group("Omnichannel", GroupOptions::new()).await.unwrap();
        let routing = omnichannel.section("Routing");

        routing
            .add("Routing_Method", "Auto_Selection", SettingOptions::new().values(["Auto_Selection", "Manual_Selection"]))
            .await
            .unwrap();
        omnichannel.add("Livechat_enabled", true, SettingOptions::new()).await.unwrap();

        let routing_method = registry.get_setting("Routing_Method").unwrap();
        assert_eq!(routing_method.group.as_deref(), Some("Omnichannel"));
        assert_eq!(routing_method.section.as_deref(), Some("Routing"));
        assert_eq!(registry.settings_in_group("Omnichannel").len(), 2);
    }

    #[tokio::test]
    async fn test_persistence_failure_leaves_state_unchanged() {
        let (registry, store) = registry().await;
        registry.add("Site_Name", "a", SettingOptions::new()).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = registry.update("Site_Name", "b").await.unwrap_err();
        assert!(matches!(err, SettingsError::Persistence(_)));
        assert_eq!(registry.get("Site_Name"), Some(SettingValue::String("a".into())));
        assert_eq!(
            registry.get_setting("Site_Name").unwrap().value,
            SettingValue::String("a".into())
        );

        let err = registry.add("Other", 1, SettingOptions::new()).await.unwrap_err();
        assert!(matches!(err, SettingsError::Persistence(_)));
        assert!(registry.get("Other").is_none());

        // The failed add must not leave the key reserved.
        store.fail_writes.store(false, Ordering::SeqCst);
        registry.add("Other", 1, SettingOptions::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_startup_load_populates_cache_and_keeps_value() {
        let mut previous = Setting::new("Max_Room_Members", 100.into(), SettingOptions::new());
        previous.value = 250.into();
        let store = Arc::new(MemorySettingsStore::with_settings([previous]));

        let registry = registry_with(store).await;
        assert_eq!(registry.get("Max_Room_Members"), Some(SettingValue::Number(250.0)));
        assert!(!registry.is_defined("Max_Room_Members"));

        let setting = registry
            .add("Max_Room_Members", 100, SettingOptions::new())
            .await
            .unwrap();
        assert_eq!(setting.value, SettingValue::Number(250.0));
        assert!(setting.is_customized());
    }

    #[tokio::test]
    async fn test_stale_persisted_value_falls_back_to_default() {
        let mut previous = Setting::new("Max_Room_Members", 100.into(), SettingOptions::new());
        previous.value = 5000.into();
        let store = Arc::new(MemorySettingsStore::with_settings([previous]));

        let registry = registry_with(store).await;
        let setting = registry
            .add("Max_Room_Members", 100, SettingOptions::new().max(1000.0))
            .await
            .unwrap();
        assert_eq!(setting.value, SettingValue::Number(100.0));
        assert_eq!(registry.get("Max_Room_Members"), Some(SettingValue::Number(100.0)));
    }

    #[tokio::test]
    async fn test_reset_restores_default() {
        let (registry, _) = registry().await;
        registry.add("Site_Name", "Livedesk", SettingOptions::new()).await.unwrap();
        registry.update("Site_Name", "Other").await.unwrap();

        registry.reset("Site_Name").await.unwrap();
        assert_eq!(registry.get("Site_Name"), Some(SettingValue::String("Livedesk".into())));
    }

    #[tokio::test]
    async fn test_reload_picks_up_external_writes() {
        let (registry, store) = registry().await;
        registry.add("Site_Name", "a", SettingOptions::new()).await.unwrap();
        let mut rx = registry.subscribe();

        let mut external = registry.get_setting("Site_Name").unwrap();
        external.value = "changed elsewhere".into();
        store.inner.upsert_setting(&external).await.unwrap();

        assert_eq!(registry.reload().await.unwrap(), 1);
        assert_eq!(
            registry.get("Site_Name"),
            Some(SettingValue::String("changed elsewhere".into()))
        );

        let change = rx.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Reloaded);
        assert_eq!(change.previous, Some(SettingValue::String("a".into())));
    }

    #[tokio::test]
    async fn test_on_change_and_remove_listener() {
        let (registry, _) = registry().await;
        registry.add("Site_Name", "a", SettingOptions::new()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = registry.on_change("Site_Name", move |change| {
            sink.lock().push((change.previous.clone(), change.value.clone()));
        });

        registry.update("Site_Name", "b").await.unwrap();
        assert!(registry.remove_listener(id));
        registry.update("Site_Name", "c").await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![(Some(SettingValue::String("a".into())), SettingValue::String("b".into()))]
        );
    }

    #[tokio::test]
    async fn test_watch_fires_immediately() {
        let (registry, _) = registry().await;
        registry.add("Livechat_enabled", true, SettingOptions::new()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.watch("Livechat_enabled", move |change| sink.lock().push(change.kind));
        registry.update("Livechat_enabled", false).await.unwrap();

        assert_eq!(*seen.lock(), vec![ChangeKind::Current, ChangeKind::Updated]);
    }

    #[tokio::test]
    async fn test_public_settings_exclude_hidden() {
        let (registry, _) = registry().await;
        registry.add("Site_Name", "a", SettingOptions::new().public()).await.unwrap();
        registry
            .add("Secret_Public", "b", SettingOptions::new().public().hidden())
            .await
            .unwrap();
        registry.add("Private", "c", SettingOptions::new()).await.unwrap();

        let keys: Vec<String> = registry.public_settings().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["Site_Name".to_string()]);
    }

    struct Prefix;

    #[async_trait]
    impl Middleware<AddSetting, Setting> for Prefix {
        async fn handle(&self, mut call: AddSetting, next: Next<'_, AddSetting, Setting>) -> Result<Setting> {
            call.key = format!("Livechat_{}", call.key);
            next.run(call).await
        }
    }

    #[tokio::test]
    async fn test_add_goes_through_middleware() {
        let store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());
        let cache = SettingsCache::new(&CacheRegistry::new()).unwrap();
        let registry = SettingsRegistry::builder(store, cache)
            .layer(KeyFormat)
            .add_middleware(Prefix)
            .build()
            .await
            .unwrap();

        registry.add("enabled", true, SettingOptions::new()).await.unwrap();
        assert!(registry.is_defined("Livechat_enabled"));
        assert!(!registry.is_defined("enabled"));

        let err = registry.add("bad key", 1, SettingOptions::new()).await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation { .. }));

        let err = registry.add_group("bad group", GroupOptions::new()).await.unwrap_err();
        assert!(matches!(err, SettingsError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_every_registered_setting_is_readable() {
        let (registry, _) = registry().await;

        for i in 0..500_i32 {
            registry
                .add(format!("Setting_{i}"), i, SettingOptions::new())
                .await
                .unwrap();
        }
        registry.update("Setting_499", 1_000).await.unwrap();

        let missing: Vec<_> = (0..499_i32)
            .filter(|i| registry.get(&format!("Setting_{i}")) != Some(SettingValue::Number(f64::from(*i))))
            .collect();
        assert!(missing.is_empty(), "missing from cache: {missing:?}");
        assert_eq!(registry.get("Setting_499"), Some(SettingValue::Number(1_000.0)));
        assert_eq!(registry.reader().len(), 500);
    }

    #[tokio::test]
    async fn test_update_keeps_concurrent_redefinition() {
        let store = Arc::new(GatedStore::default());
        let registry = Arc::new(registry_with(store.clone()).await);
        registry
            .add("Max_Room_Members", 100, SettingOptions::new().redefine())
            .await
            .unwrap();

        store.hold_next.store(true, Ordering::SeqCst);
        let update = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.update("Max_Room_Members", 50).await }
        });
        store.entered.notified().await;

        registry
            .add(
                "Max_Room_Members",
                200,
                SettingOptions::new().redefine().description("Members per room"),
            )
            .await
            .unwrap();
        store.release.notify_one();
        update.await.unwrap().unwrap();

        let setting = registry.get_setting("Max_Room_Members").unwrap();
        assert_eq!(setting.package_value, SettingValue::Number(200.0));
        assert_eq!(setting.description.as_deref(), Some("Members per room"));
        assert_eq!(setting.value, SettingValue::Number(50.0));
        assert_eq!(registry.get("Max_Room_Members"), Some(SettingValue::Number(50.0)));
    }
}
