//! Settings error taxonomy.

use thiserror::Error;

use super::SettingType;

/// Errors returned by the settings registry.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("setting '{key}' is already defined")]
    DuplicateKey { key: String },

    #[error("setting '{key}' is not registered")]
    UnknownKey { key: String },

    #[error("setting '{key}' is declared as {expected} but its default is {actual}")]
    InvalidType {
        key: String,
        expected: SettingType,
        actual: SettingType,
    },

    #[error("invalid value for '{key}': {reason}")]
    Validation { key: String, reason: String },

    #[error("group '{name}' is already registered with different options")]
    GroupConflict { name: String },

    #[error("persistence failure: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl SettingsError {
    pub(crate) fn validation(key: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for registry operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
