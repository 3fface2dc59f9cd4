//! Cache module - named, typed in-memory caches backed by Moka.
//!
//! ## Architecture
//!
//! - `CacheRegistry` - holds every named cache of the process
//! - `CacheConfig` - optional capacity and expiry per cache
//! - `TypedCache` - cheap-to-clone typed handle over a Moka cache
//!
//! ## Usage
//!
//! ```rust,ignore
//! let values: TypedCache<String, SettingValue> =
//!     registry.get_or_create("settings", CacheConfig::pinned())?;
//!
//! values.insert(key.clone(), value);
//! let value = values.get(&key);
//! ```

mod config;
mod registry;
mod typed;

pub use config::CacheConfig;
pub use registry::{CacheError, CacheRegistry};
pub use typed::TypedCache;
