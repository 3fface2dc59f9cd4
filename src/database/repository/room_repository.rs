//! Room repository.
//!
//! Read-only access to omnichannel rooms and departments. Nothing is
//! cached: room lists change constantly and department names are fetched
//! in one batch per page.

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::{Document, doc};
use mongodb::options::FindOptions;
use tracing::debug;

use crate::database::Database;
use crate::rooms::{Department, FindRoomsOptions, Room, RoomStore};

/// Repository for rooms and departments.
#[derive(Clone)]
pub struct RoomRepository {
    rooms: Collection<Room>,
    departments: Collection<Department>,
}

impl RoomRepository {
    pub fn new(db: &Database, rooms: &str, departments: &str) -> Self {
        Self {
            rooms: db.collection(rooms),
            departments: db.collection(departments),
        }
    }
}

#[async_trait]
impl RoomStore for RoomRepository {
    async fn find_rooms(&self, query: Document, options: FindRoomsOptions) -> Result<Vec<Room>> {
        let mut find_options = FindOptions::default();
        find_options.skip = Some(options.skip);
        find_options.limit = options.limit;
        find_options.sort = Some(options.sort);
        find_options.projection = options.projection;

        let cursor = self.rooms.find(query).with_options(find_options).await?;
        let rooms: Vec<Room> = cursor.try_collect().await?;
        debug!("DB find rooms: {} results", rooms.len());
        Ok(rooms)
    }

    async fn count_rooms(&self, query: Document) -> Result<u64> {
        Ok(self.rooms.count_documents(query).await?)
    }

    async fn find_departments(&self, ids: &[String]) -> Result<Vec<Department>> {
        let filter = doc! { "_id": { "$in": ids.to_vec() } };
        let options = FindOptions::builder()
            .projection(doc! { "name": 1 })
            .build();

        let cursor = self.departments.find(filter).with_options(options).await?;
        let departments: Vec<Department> = cursor.try_collect().await?;
        debug!("DB find departments: {} of {} found", departments.len(), ids.len());
        Ok(departments)
    }
}
