//! Settings repository.
//!
//! Persists settings as one document per key. Reads are served by the
//! registry's cache, so this layer does no caching of its own.

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::doc;
use tracing::debug;

use crate::database::Database;
use crate::settings::{Setting, SettingsStore};

/// Repository for the `settings` collection.
#[derive(Clone)]
pub struct SettingsRepository {
    collection: Collection<Setting>,
}

impl SettingsRepository {
    pub fn new(db: &Database, collection: &str) -> Self {
        Self {
            collection: db.collection(collection),
        }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn find_settings(&self) -> Result<Vec<Setting>> {
        let cursor = self.collection.find(doc! {}).await?;
        let settings: Vec<Setting> = cursor.try_collect().await?;
        debug!("Loaded {} settings from DB", settings.len());
        Ok(settings)
    }

    async fn upsert_setting(&self, setting: &Setting) -> Result<()> {
        let filter = doc! { "_id": setting.key.as_str() };
        let options = mongodb::options::ReplaceOptions::builder()
            .upsert(true)
            .build();

        self.collection
            .replace_one(filter, setting)
            .with_options(options)
            .await?;

        debug!("Saved setting {}", setting.key);
        Ok(())
    }
}
