//! Durable on-device persistence for user, history, and preference records.

pub mod store;
pub mod types;

pub use store::LocalRecordStore;
pub use types::{HistoryRecord, HistoryStats, PreferenceRecord, UserRecord};
