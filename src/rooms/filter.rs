//! Room filters and pagination.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// On-hold filter as sent by clients: a flag or a flag-like string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OnHold {
    Flag(bool),
    Text(String),
}

impl OnHold {
    /// Strings accepted as "true". Matched exactly, without case folding.
    pub const TRUTHY: [&'static str; 3] = ["t", "true", "1"];

    /// Whether the query should be limited to rooms on hold.
    pub fn is_set(&self) -> bool {
        match self {
            Self::Flag(flag) => Self::TRUTHY.contains(&flag.to_string().as_str()),
            Self::Text(text) => Self::TRUTHY.contains(&text.as_str()),
        }
    }
}

impl From<bool> for OnHold {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<&str> for OnHold {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Inclusive time range; either end may be open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DateRange {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Criteria for `RoomQuery::find_rooms`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFilter {
    /// Agent IDs or usernames serving the room.
    #[serde(default)]
    pub agents: Option<Vec<String>>,
    /// Substring of the room's display name.
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    /// `true` for open rooms, `false` for closed ones.
    #[serde(default)]
    pub open: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateRange>,
    #[serde(default)]
    pub closed_at: Option<DateRange>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub custom_fields: Option<HashMap<String, String>>,
    #[serde(default)]
    pub onhold: Option<OnHold>,
}

/// Sort direction of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Page selection for `RoomQuery::find_rooms`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagination {
    pub offset: u64,
    /// Page size; `0` means no limit (subject to the configured upper bound).
    pub count: u64,
    /// Field projection, e.g. `{"fname": 1}`.
    pub fields: Option<BTreeMap<String, i32>>,
    /// Sort fields in priority order. Defaults to newest first.
    pub sort: Option<Vec<(String, SortDirection)>>,
}

impl Pagination {
    pub fn new(offset: u64, count: u64) -> Self {
        Self {
            offset,
            count,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.get_or_insert_with(Vec::new).push((field.into(), direction));
        self
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.get_or_insert_with(BTreeMap::new).insert(field.into(), 1);
        self
    }
}
