//! Configuration module for Livedesk.
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    /// Collection holding persisted settings.
    pub settings_collection: String,
    /// Collection holding omnichannel rooms.
    pub rooms_collection: String,
    /// Collection holding omnichannel departments.
    pub departments_collection: String,

    /// Buffer size of the settings change broadcast channel.
    pub settings_event_capacity: usize,

    /// Department IDs room queries are restricted to (comma-separated).
    /// Empty means no restriction.
    pub restricted_departments: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns error if `MONGODB_URI` is not set or a numeric variable
    /// does not parse.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let restricted_departments = env::var("RESTRICT_DEPARTMENTS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            mongodb_uri: env::var("MONGODB_URI").context("MONGODB_URI must be set")?,
            mongodb_database: var_or("MONGODB_DATABASE", "livedesk"),
            settings_collection: var_or("SETTINGS_COLLECTION", "settings"),
            rooms_collection: var_or("ROOMS_COLLECTION", "livechat_rooms"),
            departments_collection: var_or("DEPARTMENTS_COLLECTION", "livechat_departments"),
            settings_event_capacity: parse_var("SETTINGS_EVENT_CAPACITY", 256)?,
            restricted_departments,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got '{raw}'")),
        _ => Ok(default),
    }
}
