//! Rooms module - omnichannel room listing.
//!
//! `RoomQuery::find_rooms` turns a `RoomFilter` plus `Pagination` into a
//! MongoDB query, narrows it with the configured `RoomRestriction` hooks and
//! returns one page of rooms with their department attached.

mod criteria;
mod filter;
mod models;
mod restriction;
mod service;
mod store;

pub use criteria::{escape_regex, rooms_query};
pub use filter::{DateRange, OnHold, Pagination, RoomFilter, SortDirection};
pub use models::{Department, PaginatedRooms, Room, ServedBy};
pub use restriction::{DepartmentScope, RestrictionHooks, RoomRestriction};
pub use service::RoomQuery;
pub use store::{FindRoomsOptions, RoomStore};
