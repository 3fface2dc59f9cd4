//! Shared application state.
//!
//! Built once at startup and handed to every consumer; there is no global
//! registry.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::cache::CacheRegistry;
use crate::config::Config;
use crate::database::{Database, RoomRepository, SettingsRepository};
use crate::rooms::{DepartmentScope, RestrictionHooks, RoomQuery};
use crate::settings::{AuditLog, KeyFormat, SettingsCache, SettingsRegistry, defaults};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Arc<Database>,

    /// Cache registry for creating/accessing caches.
    pub cache: Arc<CacheRegistry>,

    /// Settings registry; the only writer of settings.
    pub settings: Arc<SettingsRegistry>,

    /// Omnichannel room queries.
    pub rooms: Arc<RoomQuery>,
}

impl AppState {
    /// Connect to MongoDB, load settings and register the built-in ones.
    ///
    /// # Errors
    /// Returns error if the database is unreachable or settings can't be
    /// loaded or registered.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        info!("Connecting to MongoDB...");
        let db = Arc::new(Database::connect(&config.mongodb_uri, &config.mongodb_database).await?);
        info!("Database connected");

        let cache = Arc::new(CacheRegistry::new());
        let values = SettingsCache::new(&cache)?;

        let store = Arc::new(SettingsRepository::new(&db, &config.settings_collection));
        let settings = SettingsRegistry::builder(store, values)
            .event_capacity(config.settings_event_capacity)
            .layer(AuditLog)
            .layer(KeyFormat)
            .build()
            .await?;
        defaults::register(&settings).await?;
        info!("Registered {} settings in {} groups", settings.settings().len(), settings.groups().len());

        let mut restrictions = RestrictionHooks::new();
        if !config.restricted_departments.is_empty() {
            info!("Room queries restricted to departments {:?}", config.restricted_departments);
            restrictions = restrictions.with(DepartmentScope::new(config.restricted_departments.clone()));
        }

        let room_store = Arc::new(RoomRepository::new(
            &db,
            &config.rooms_collection,
            &config.departments_collection,
        ));
        let rooms = RoomQuery::new(room_store)
            .with_restrictions(restrictions)
            .with_settings(settings.reader());

        Ok(Self {
            db,
            cache,
            settings: Arc::new(settings),
            rooms: Arc::new(rooms),
        })
    }
}
