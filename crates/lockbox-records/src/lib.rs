//! lockbox-records: persisted metadata for every stored file
//!
//! The record is the source of truth: it is the only place the IV and tag of
//! an encrypted payload live. All queries bind caller values as parameters.

pub mod sqlite;
pub mod store;

pub use sqlite::SqliteRecordStore;
pub use store::{RecordError, RecordStore};
