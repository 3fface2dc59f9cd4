//! Omnichannel room and department documents.

use std::collections::HashMap;

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Agent currently serving a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedBy {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// A support department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// An omnichannel room.
///
/// Every field is optional because queries may project fields away, the ID
/// included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(rename = "_id", default)]
    pub id: String,

    /// Display name (usually the visitor's name).
    #[serde(default)]
    pub fname: Option<String>,

    #[serde(default)]
    pub department_id: Option<String>,

    #[serde(default)]
    pub open: Option<bool>,

    #[serde(default)]
    pub served_by: Option<ServedBy>,

    /// Creation time.
    #[serde(default)]
    pub ts: Option<DateTime>,

    #[serde(default)]
    pub closed_at: Option<DateTime>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Custom fields.
    #[serde(default)]
    pub livechat_data: HashMap<String, serde_json::Value>,

    #[serde(default)]
    pub on_hold: Option<bool>,

    /// Attached by `RoomQuery::find_rooms`; never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fname: None,
            department_id: None,
            open: None,
            served_by: None,
            ts: None,
            closed_at: None,
            tags: Vec::new(),
            livechat_data: HashMap::new(),
            on_hold: None,
            department: None,
        }
    }
}

/// One page of rooms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedRooms {
    pub rooms: Vec<Room>,
    /// Number of rooms in this page.
    pub count: usize,
    pub offset: u64,
    /// Number of rooms matching the filter.
    pub total: u64,
}
