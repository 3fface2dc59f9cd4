//! Data access contract for rooms and departments.

use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::Document;

use super::{Department, Room};

/// Options for one page of rooms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindRoomsOptions {
    pub skip: u64,
    /// `None` means no limit.
    pub limit: Option<i64>,
    pub sort: Document,
    pub projection: Option<Document>,
}

/// Read access to rooms and departments.
#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn find_rooms(&self, query: Document, options: FindRoomsOptions) -> Result<Vec<Room>>;

    async fn count_rooms(&self, query: Document) -> Result<u64>;

    /// Departments with the given IDs, name only.
    async fn find_departments(&self, ids: &[String]) -> Result<Vec<Department>>;
}
