//! Livedesk - support-desk backend core.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration and repositories
//! - `cache` - Named caches backed by Moka
//! - `settings` - Persisted settings registry with middleware and change events
//! - `rooms` - Omnichannel room queries
//! - `app` - Shared application state and runtime

pub mod app;
pub mod cache;
pub mod config;
pub mod database;
pub mod rooms;
pub mod settings;
