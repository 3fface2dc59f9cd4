//! Setting definitions, registration options and groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{Result, SettingsError};
use super::{SettingType, SettingValue};

/// Value constraints checked on registration and on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Inclusive lower bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive upper bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Allowed values for enums.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl Constraints {
    /// Check `value` against these constraints.
    pub fn check(&self, key: &str, value: &SettingValue) -> Result<()> {
        match value {
            SettingValue::Number(n) => {
                if !n.is_finite() {
                    return Err(SettingsError::validation(key, "number must be finite"));
                }
                if let Some(min) = self.min
                    && *n < min
                {
                    return Err(SettingsError::validation(key, format!("{n} is below the minimum {min}")));
                }
                if let Some(max) = self.max
                    && *n > max
                {
                    return Err(SettingsError::validation(key, format!("{n} is above the maximum {max}")));
                }
            }
            SettingValue::Enum(choice) => {
                if !self.values.iter().any(|allowed| allowed == choice) {
                    return Err(SettingsError::validation(
                        key,
                        format!("'{choice}' is not one of [{}]", self.values.join(", ")),
                    ));
                }
            }
            SettingValue::Boolean(_) | SettingValue::String(_) | SettingValue::Structured(_) => {}
        }
        Ok(())
    }
}

/// Options accepted by `SettingsRegistry::add`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingOptions {
    /// Declared type. Inferred from the default value when `None`.
    pub kind: Option<SettingType>,
    pub group: Option<String>,
    pub section: Option<String>,
    /// Exposed to clients that are not logged in.
    pub public: bool,
    pub hidden: bool,
    pub read_only: bool,
    pub description: Option<String>,
    pub sorter: Option<i32>,
    pub constraints: Constraints,
    /// Allow a later `add` of the same key to replace this definition.
    pub redefine: bool,
}

impl SettingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn kind(mut self, kind: SettingType) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn sorter(mut self, sorter: i32) -> Self {
        self.sorter = Some(sorter);
        self
    }

    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.constraints.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.constraints.max = Some(max);
        self
    }

    /// Declare the setting as an enum with the given choices.
    #[must_use]
    pub fn values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = Some(SettingType::Enum);
        self.constraints.values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn redefine(mut self) -> Self {
        self.redefine = true;
        self
    }
}

/// A registered setting as stored in the `settings` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    /// Setting key, also the document ID.
    #[serde(rename = "_id")]
    pub key: String,

    #[serde(rename = "type")]
    pub kind: SettingType,

    /// Current value.
    pub value: SettingValue,

    /// Default value the setting was registered with.
    pub package_value: SettingValue,

    #[serde(default)]
    pub group: Option<String>,

    #[serde(default)]
    pub section: Option<String>,

    #[serde(default)]
    pub public: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default, rename = "readonly")]
    pub read_only: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub sorter: Option<i32>,

    #[serde(default)]
    pub constraints: Constraints,

    #[serde(default, skip_serializing)]
    pub redefine: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Setting {
    /// Build a definition from a validated default.
    pub fn new(key: impl Into<String>, default: SettingValue, options: SettingOptions) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            kind: default.kind(),
            value: default.clone(),
            package_value: default,
            group: options.group,
            section: options.section,
            public: options.public,
            hidden: options.hidden,
            read_only: options.read_only,
            description: options.description,
            sorter: options.sorter,
            constraints: options.constraints,
            redefine: options.redefine,
            created_at: now,
            updated_at: now,
        }
    }

    /// Coerce `value` to this setting's type and check its constraints.
    pub fn validate(&self, value: SettingValue) -> Result<SettingValue> {
        let value = value.coerce(self.kind).map_err(|rejected| {
            SettingsError::validation(
                &self.key,
                format!("expected {}, got {}", self.kind, rejected.kind()),
            )
        })?;
        self.constraints.check(&self.key, &value)?;
        Ok(value)
    }

    /// Whether the current value differs from the registered default.
    pub fn is_customized(&self) -> bool {
        self.value != self.package_value
    }
}

/// Options accepted by `SettingsRegistry::add_group`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupOptions {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sorter: Option<i32>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub public: bool,
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn sorter(mut self, sorter: i32) -> Self {
        self.sorter = Some(sorter);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }
}

/// A named group of settings. Presentation only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingGroup {
    pub name: String,
    #[serde(flatten)]
    pub options: GroupOptions,
}

/// Result of `add_group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    Created,
    /// The group already existed with identical options.
    Unchanged,
}
