use lockbox_core::{FileId, FileRecord, LockboxError, NewFileRecord, UserId};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    /// No such record, or it belongs to someone other than the required owner.
    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),

    /// A row that violates the record invariants (half-set cipher material,
    /// bad stored name, undecodable IV/tag).
    #[error("corrupt record {id}: {detail}")]
    Corrupt { id: i64, detail: String },
}

impl From<sqlx::Error> for RecordError {
    fn from(e: sqlx::Error) -> Self {
        RecordError::Database(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for RecordError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        RecordError::Database(format!("migration: {e}"))
    }
}

impl From<RecordError> for LockboxError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound => LockboxError::NotFoundOrDenied,
            other => LockboxError::Persistence(other.to_string()),
        }
    }
}

/// Ownership-scoped access to file records.
///
/// Wherever `require_owner` is `Some`, a record owned by anyone else behaves
/// exactly like a missing one.
pub trait RecordStore: Send + Sync {
    /// Records owned by `owner`, newest first. Each call is a fresh query.
    fn list_by_owner(
        &self,
        owner: UserId,
    ) -> impl Future<Output = Result<Vec<FileRecord>, RecordError>> + Send;

    fn find_by_id(
        &self,
        id: FileId,
        require_owner: Option<UserId>,
    ) -> impl Future<Output = Result<FileRecord, RecordError>> + Send;

    fn insert(
        &self,
        record: &NewFileRecord,
    ) -> impl Future<Output = Result<FileId, RecordError>> + Send;

    fn delete(
        &self,
        id: FileId,
        require_owner: Option<UserId>,
    ) -> impl Future<Output = Result<(), RecordError>> + Send;
}
