//! Room listing for the omnichannel API.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use mongodb::bson::{Bson, Document, doc};
use tracing::debug;

use super::criteria::rooms_query;
use super::filter::{Pagination, RoomFilter};
use super::restriction::RestrictionHooks;
use super::store::{FindRoomsOptions, RoomStore};
use super::{Department, PaginatedRooms, Room};
use crate::settings::SettingsCache;
use crate::settings::defaults::API_UPPER_COUNT_LIMIT;

/// Paginated, filtered room queries with department names attached.
#[derive(Clone)]
pub struct RoomQuery {
    store: Arc<dyn RoomStore>,
    restrictions: RestrictionHooks,
    settings: Option<SettingsCache>,
}

impl RoomQuery {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self {
            store,
            restrictions: RestrictionHooks::new(),
            settings: None,
        }
    }

    #[must_use]
    pub fn with_restrictions(mut self, restrictions: RestrictionHooks) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Read the page size limit from `settings`.
    #[must_use]
    pub fn with_settings(mut self, settings: SettingsCache) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Find one page of rooms matching `filter`.
    ///
    /// The page and the total count are fetched concurrently. Rooms that
    /// reference a department get it attached from a single batched lookup.
    pub async fn find_rooms(&self, filter: &RoomFilter, pagination: &Pagination) -> Result<PaginatedRooms> {
        let restriction = self.restrictions.apply().await?;
        let query = rooms_query(filter, restriction);
        let options = self.find_options(pagination);
        debug!("Finding rooms: {} ({:?})", query, options);

        let (mut rooms, total) = futures::try_join!(
            self.store.find_rooms(query.clone(), options),
            self.store.count_rooms(query),
        )?;

        self.attach_departments(&mut rooms).await?;

        Ok(PaginatedRooms {
            count: rooms.len(),
            rooms,
            offset: pagination.offset,
            total,
        })
    }

    fn find_options(&self, pagination: &Pagination) -> FindRoomsOptions {
        let sort = match pagination.sort.as_deref() {
            Some(fields) if !fields.is_empty() => fields
                .iter()
                .map(|(field, direction)| (field.clone(), Bson::from(direction.as_i32())))
                .collect(),
            _ => doc! { "ts": -1 },
        };

        let projection = pagination.fields.as_ref().filter(|f| !f.is_empty()).map(|fields| {
            fields
                .iter()
                .map(|(field, include)| (field.clone(), Bson::from(*include)))
                .collect::<Document>()
        });

        FindRoomsOptions {
            skip: pagination.offset,
            limit: self.page_limit(pagination.count),
            sort,
            projection,
        }
    }

    /// Clamp the requested page size to `API_Upper_Count_Limit`.
    fn page_limit(&self, count: u64) -> Option<i64> {
        let upper = self
            .settings
            .as_ref()
            .and_then(|s| s.get_number(API_UPPER_COUNT_LIMIT))
            .filter(|limit| *limit >= 1.0)
            .map(|limit| limit as u64);

        let limit = match (count, upper) {
            (0, None) => return None,
            (0, Some(upper)) => upper,
            (count, Some(upper)) => count.min(upper),
            (count, None) => count,
        };
        Some(i64::try_from(limit).unwrap_or(i64::MAX))
    }

    async fn attach_departments(&self, rooms: &mut [Room]) -> Result<()> {
        let ids: BTreeSet<&str> = rooms
            .iter()
            .filter_map(|room| room.department_id.as_deref())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = ids.into_iter().map(str::to_string).collect();
        let departments: HashMap<String, Department> = self
            .store
            .find_departments(&ids)
            .await?
            .into_iter()
            .map(|department| (department.id.clone(), department))
            .collect();

        for room in rooms.iter_mut() {
            if let Some(id) = room.department_id.as_deref()
                && let Some(department) = departments.get(id)
            {
                room.department = Some(department.clone());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RoomQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomQuery")
            .field("restrictions", &self.restrictions)
            .field("reads_settings", &self.settings.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::cache::CacheRegistry;
    use crate::rooms::filter::{OnHold, SortDirection};
    use crate::rooms::restriction::DepartmentScope;
    use crate::settings::{MemorySettingsStore, SettingOptions, SettingsRegistry};

    /// Returns canned rooms and records what it was asked.
    #[derive(Default)]
    struct FakeStore {
        rooms: Vec<Room>,
        departments: Vec<Department>,
        total: u64,
        queries: Mutex<Vec<Document>>,
        options: Mutex<Vec<FindRoomsOptions>>,
        department_lookups: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl RoomStore for FakeStore {
        async fn find_rooms(&self, query: Document, options: FindRoomsOptions) -> Result<Vec<Room>> {
            self.queries.lock().push(query);
            self.options.lock().push(options);
            Ok(self.rooms.clone())
        }

        async fn count_rooms(&self, _query: Document) -> Result<u64> {
            Ok(self.total)
        }

        async fn find_departments(&self, ids: &[String]) -> Result<Vec<Department>> {
            self.department_lookups.lock().push(ids.to_vec());
            Ok(self
                .departments
                .iter()
                .filter(|d| ids.contains(&d.id))
                .cloned()
                .collect())
        }
    }

    /// Refuses to return the page unless the count query started while the
    /// page query was still pending.
    #[derive(Default)]
    struct OverlapStore {
        count_started: AtomicBool,
    }

    #[async_trait]
    impl RoomStore for OverlapStore {
        async fn find_rooms(&self, _query: Document, _options: FindRoomsOptions) -> Result<Vec<Room>> {
            tokio::task::yield_now().await;
            anyhow::ensure!(
                self.count_started.load(Ordering::SeqCst),
                "page fetched before the count started"
            );
            Ok(vec![Room::new("r1")])
        }

        async fn count_rooms(&self, _query: Document) -> Result<u64> {
            self.count_started.store(true, Ordering::SeqCst);
            Ok(1)
        }

        async fn find_departments(&self, _ids: &[String]) -> Result<Vec<Department>> {
            Ok(Vec::new())
        }
    }

    fn room(id: &str, department_id: Option<&str>) -> Room {
        let mut room = Room::new(id);
        room.department_id = department_id.map(str::to_string);
        room
    }

    fn department(id: &str, name: &str) -> Department {
        Department {
            id: id.to_string(),
            name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn test_departments_looked_up_once() {
        let store = Arc::new(FakeStore {
            rooms: vec![
                room("r1", Some("dep1")),
                room("r2", Some("dep1")),
                room("r3", None),
                room("r4", Some("gone")),
            ],
            departments: vec![department("dep1", "Sales")],
            total: 4,
            ..Default::default()
        });
        let query = RoomQuery::new(store.clone());

        let page = query
            .find_rooms(&RoomFilter::default(), &Pagination::new(0, 25))
            .await
            .unwrap();

        assert_eq!(
            *store.department_lookups.lock(),
            vec![vec!["dep1".to_string(), "gone".to_string()]]
        );
        let sales = Some(department("dep1", "Sales"));
        assert_eq!(page.rooms[0].department, sales);
        assert_eq!(page.rooms[1].department, sales);
        assert_eq!(page.rooms[2].department, None);
        assert_eq!(page.rooms[3].department, None);
    }

    #[tokio::test]
    async fn test_no_department_lookup_without_departments() {
        let store = Arc::new(FakeStore {
            rooms: vec![room("r1", None), room("r2", Some(""))],
            total: 2,
            ..Default::default()
        });
        let query = RoomQuery::new(store.clone());

        query
            .find_rooms(&RoomFilter::default(), &Pagination::new(0, 25))
            .await
            .unwrap();
        assert!(store.department_lookups.lock().is_empty());
    }

    #[tokio::test]
    async fn test_page_shape() {
        let store = Arc::new(FakeStore {
            rooms: vec![room("r1", None), room("r2", None)],
            total: 42,
            ..Default::default()
        });
        let query = RoomQuery::new(store);

        let page = query
            .find_rooms(&RoomFilter::default(), &Pagination::new(10, 2))
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.offset, 10);
        assert_eq!(page.total, 42);
    }

    #[tokio::test]
    async fn test_onhold_string_matches_flag() {
        let store = Arc::new(FakeStore {
            rooms: vec![room("r1", None)],
            total: 1,
            ..Default::default()
        });
        let query = RoomQuery::new(store.clone());

        let as_text = RoomFilter {
            onhold: Some(OnHold::from("true")),
            ..Default::default()
        };
        let as_flag = RoomFilter {
            onhold: Some(OnHold::from(true)),
            ..Default::default()
        };
        let page_text = query.find_rooms(&as_text, &Pagination::new(0, 10)).await.unwrap();
        let page_flag = query.find_rooms(&as_flag, &Pagination::new(0, 10)).await.unwrap();

        assert_eq!(page_text, page_flag);
        let queries = store.queries.lock();
        assert_eq!(queries[0], queries[1]);
        assert!(queries[0].contains_key("onHold"));
    }

    #[tokio::test]
    async fn test_sort_projection_and_skip() {
        let store = Arc::new(FakeStore::default());
        let query = RoomQuery::new(store.clone());

        query
            .find_rooms(&RoomFilter::default(), &Pagination::new(5, 0))
            .await
            .unwrap();
        let pagination = Pagination::new(0, 10)
            .sort_by("closedAt", SortDirection::Ascending)
            .field("fname");
        query.find_rooms(&RoomFilter::default(), &pagination).await.unwrap();

        let options = store.options.lock();
        assert_eq!(options[0].skip, 5);
        assert_eq!(options[0].limit, None);
        assert_eq!(options[0].sort, doc! { "ts": -1 });
        assert_eq!(options[0].projection, None);

        assert_eq!(options[1].limit, Some(10));
        assert_eq!(options[1].sort, doc! { "closedAt": 1 });
        assert_eq!(options[1].projection, Some(doc! { "fname": 1 }));
    }

    #[tokio::test]
    async fn test_count_clamped_by_setting() {
        let settings = SettingsRegistry::builder(
            Arc::new(MemorySettingsStore::new()),
            SettingsCache::new(&CacheRegistry::new()).unwrap(),
        )
        .build()
        .await
        .unwrap();
        settings
            .add(API_UPPER_COUNT_LIMIT, 50, SettingOptions::new())
            .await
            .unwrap();

        let store = Arc::new(FakeStore::default());
        let query = RoomQuery::new(store.clone()).with_settings(settings.reader());

        query
            .find_rooms(&RoomFilter::default(), &Pagination::new(0, 500))
            .await
            .unwrap();
        query
            .find_rooms(&RoomFilter::default(), &Pagination::new(0, 0))
            .await
            .unwrap();
        settings.update(API_UPPER_COUNT_LIMIT, 1000).await.unwrap();
        query
            .find_rooms(&RoomFilter::default(), &Pagination::new(0, 500))
            .await
            .unwrap();

        let limits: Vec<Option<i64>> = store.options.lock().iter().map(|o| o.limit).collect();
        assert_eq!(limits, vec![Some(50), Some(50), Some(500)]);
    }

    #[tokio::test]
    async fn test_restrictions_applied() {
        let store = Arc::new(FakeStore::default());
        let query = RoomQuery::new(store.clone())
            .with_restrictions(RestrictionHooks::new().with(DepartmentScope::new(["dep1"])));

        query
            .find_rooms(&RoomFilter::default(), &Pagination::new(0, 10))
            .await
            .unwrap();

        let queries = store.queries.lock();
        assert_eq!(
            queries[0],
            doc! { "$and": [{ "t": "l" }, { "departmentId": { "$in": ["dep1"] } }] }
        );
    }

    #[tokio::test]
    async fn test_page_and_count_fetched_together() {
        let query = RoomQuery::new(Arc::new(OverlapStore::default()));

        let page = query
            .find_rooms(&RoomFilter::default(), &Pagination::new(0, 25))
            .await
            .unwrap();

        assert_eq!(page.count, 1);
        assert_eq!(page.total, 1);
    }
}
