//! Repository module - MongoDB implementations of the store contracts.

mod room_repository;
mod settings_repository;

pub use room_repository::RoomRepository;
pub use settings_repository::SettingsRepository;
