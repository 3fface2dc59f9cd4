//! Setting values and their types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    Boolean,
    String,
    Number,
    Enum,
    Structured,
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Number => "number",
            Self::Enum => "enum",
            Self::Structured => "structured",
        };
        f.write_str(name)
    }
}

/// A typed setting value.
///
/// Persisted as `{ "type": "<kind>", "value": <payload> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SettingValue {
    Boolean(bool),
    String(String),
    Number(f64),
    /// One of the setting's allowed values.
    Enum(String),
    /// Arbitrary JSON document (layouts, mappings, lists).
    Structured(serde_json::Value),
}

impl SettingValue {
    /// Get the type this value carries.
    pub fn kind(&self) -> SettingType {
        match self {
            Self::Boolean(_) => SettingType::Boolean,
            Self::String(_) => SettingType::String,
            Self::Number(_) => SettingType::Number,
            Self::Enum(_) => SettingType::Enum,
            Self::Structured(_) => SettingType::Structured,
        }
    }

    /// Convert this value into `kind` where the conversion is lossless.
    ///
    /// Only plain strings become enum values; every other mismatch hands the
    /// value back unchanged as the error.
    pub fn coerce(self, kind: SettingType) -> Result<Self, Self> {
        match (self, kind) {
            (Self::String(s), SettingType::Enum) => Ok(Self::Enum(s)),
            (value, kind) if value.kind() == kind => Ok(value),
            (value, _) => Err(value),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String payload of `String` and `Enum` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::String(s) | Self::Enum(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<serde_json::Value> for SettingValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Structured(value)
    }
}
