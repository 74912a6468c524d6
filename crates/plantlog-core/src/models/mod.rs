//! Data models for Plantlog

mod collection;
mod conflict;
mod history;
mod record;
mod settings;

pub use collection::Collection;
pub use conflict::{conflict_id, SyncConflict};
pub use history::{SyncHistoryEntry, SyncOutcome, SyncType};
pub use record::{ListFilter, NewRecord, Page, Record, RecordPatch, SyncStatus};
pub use settings::SyncSettings;
