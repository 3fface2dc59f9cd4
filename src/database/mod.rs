//! Database module exports.

mod mongo;
mod repository;

pub use mongo::Database;
pub use repository::{RoomRepository, SettingsRepository};
