//! Settings module - typed, persisted configuration with live updates.
//!
//! ## Architecture
//!
//! - `SettingsRegistry` - owns definitions and groups, mediates every write
//! - `SettingsStore` - persistence contract (MongoDB in production)
//! - `SettingsCache` - read-only value mirror shared with consumers
//! - `middleware` - interceptors composed around `add` / `add_group`
//! - `events` - per-key listeners and a broadcast feed of changes
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry = SettingsRegistry::builder(store, cache)
//!     .layer(AuditLog)
//!     .build()
//!     .await?;
//!
//! registry.add("Max_Room_Members", 100, SettingOptions::new().min(1.0)).await?;
//! registry.update("Max_Room_Members", 250).await?;
//! assert_eq!(registry.reader().get_number("Max_Room_Members"), Some(250.0));
//! ```

mod cache;
pub mod defaults;
mod error;
mod events;
pub mod middleware;
mod registry;
mod setting;
mod store;
mod value;

pub use cache::{SETTINGS_CACHE, SettingsCache};
pub use error::{Result, SettingsError};
pub use events::{ChangeKind, ListenerId, SettingChange, SettingsEvents};
pub use middleware::{AuditLog, KeyFormat};
pub use registry::{GroupScope, SettingsRegistry, SettingsRegistryBuilder};
pub use setting::{Constraints, GroupOptions, GroupOutcome, Setting, SettingGroup, SettingOptions};
pub use store::{MemorySettingsStore, SettingsStore};
pub use value::{SettingType, SettingValue};
