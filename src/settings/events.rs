//! Change notifications for settings.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;

use super::SettingValue;

/// What caused a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The setting was registered (or redefined).
    Added,
    /// The value was changed through `update` or `reset`.
    Updated,
    /// The value was refreshed from persistence.
    Reloaded,
    /// Delivered once by `watch` with the value present at registration.
    Current,
}

/// A committed change of one setting.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    pub key: String,
    pub kind: ChangeKind,
    /// Value before the change, if the key had one.
    pub previous: Option<SettingValue>,
    pub value: SettingValue,
    pub changed_at: DateTime<Utc>,
}

impl SettingChange {
    pub fn new(key: impl Into<String>, kind: ChangeKind, previous: Option<SettingValue>, value: SettingValue) -> Self {
        Self {
            key: key.into(),
            kind,
            previous,
            value,
            changed_at: Utc::now(),
        }
    }
}

/// Handle returned by `on_change`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler = Arc<dyn Fn(&SettingChange) + Send + Sync>;

/// Keyed listeners plus a broadcast feed of every change.
pub struct SettingsEvents {
    sender: broadcast::Sender<SettingChange>,
    listeners: DashMap<String, Vec<(ListenerId, Handler)>>,
    next_id: AtomicU64,
}

impl SettingsEvents {
    /// Create an event hub whose broadcast channel buffers `capacity` changes.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for changes of `key`.
    pub fn on_change<F>(&self, key: &str, handler: F) -> ListenerId
    where
        F: Fn(&SettingChange) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .entry(key.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.listeners.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(hid, _)| *hid != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        removed
    }

    /// Receive every change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.sender.subscribe()
    }

    /// Number of keyed listeners for `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.get(key).map_or(0, |h| h.len())
    }

    /// Deliver a committed change to keyed listeners and subscribers.
    pub fn emit(&self, change: SettingChange) {
        // Clone handlers out so a handler may register listeners itself.
        let handlers: Vec<Handler> = self
            .listeners
            .get(&change.key)
            .map(|h| h.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(&change);
        }

        // No subscribers is fine.
        let _ = self.sender.send(change);
    }
}

impl Default for SettingsEvents {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for SettingsEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsEvents")
            .field("keys_watched", &self.listeners.len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
