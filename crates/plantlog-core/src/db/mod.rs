//! Database layer for Plantlog

mod conflict_store;
mod connection;
mod history_store;
mod migrations;
mod record_store;
mod settings_store;

pub use conflict_store::{ConflictStore, SqliteConflictStore};
pub use connection::{CollectionCounts, Database, StoreInfo};
pub use history_store::{HistoryStore, SqliteHistoryStore};
pub use record_store::{RecordStore, SqliteRecordStore};
pub use settings_store::{SettingsStore, SqliteSettingsStore};
