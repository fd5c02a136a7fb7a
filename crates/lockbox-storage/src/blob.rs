//! Blob store: raw ciphertext (or legacy plaintext) under an opaque name

use lockbox_core::{LockboxError, StoredName};
use opendal::{ErrorKind, Operator};
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob {op} failed for {name}: {detail}")]
    Io {
        op: &'static str,
        name: String,
        detail: String,
    },
}

impl From<StorageError> for LockboxError {
    fn from(e: StorageError) -> Self {
        LockboxError::StorageIo(e.to_string())
    }
}

/// Payload storage keyed by [`StoredName`].
///
/// Names are always server-generated, so implementations may map them
/// straight onto keys or paths.
pub trait BlobStore: Send + Sync {
    fn put(
        &self,
        name: &StoredName,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn get(&self, name: &StoredName) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    /// Remove a payload. Removing a name that holds nothing succeeds.
    fn delete(&self, name: &StoredName) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn exists(&self, name: &StoredName) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// [`BlobStore`] over any OpenDAL operator (fs in production, memory in tests)
#[derive(Clone)]
pub struct OperatorBlobStore {
    op: Operator,
}

impl OperatorBlobStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Every generated payload name currently stored. Used for orphan scans.
    pub async fn list_names(&self) -> Result<Vec<StoredName>, StorageError> {
        let entries = self.op.list("/").await.map_err(|e| StorageError::Io {
            op: "list",
            name: "/".into(),
            detail: e.to_string(),
        })?;

        Ok(entries
            .iter()
            .filter(|entry| entry.metadata().is_file())
            .filter_map(|entry| StoredName::parse_generated(entry.name()).ok())
            .collect())
    }
}

fn io_error(op: &'static str, name: &StoredName, err: opendal::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::Io {
            op,
            name: name.to_string(),
            detail: err.to_string(),
        }
    }
}

impl BlobStore for OperatorBlobStore {
    async fn put(&self, name: &StoredName, bytes: Vec<u8>) -> Result<(), StorageError> {
        let len = bytes.len();
        self.op
            .write(name.as_str(), bytes)
            .await
            .map_err(|e| io_error("write", name, e))?;
        tracing::debug!(stored_name = %name, bytes = len, "blob written");
        Ok(())
    }

    async fn get(&self, name: &StoredName) -> Result<Vec<u8>, StorageError> {
        let buf = self
            .op
            .read(name.as_str())
            .await
            .map_err(|e| io_error("read", name, e))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, name: &StoredName) -> Result<(), StorageError> {
        match self.op.delete(name.as_str()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", name, e)),
        }
    }

    async fn exists(&self, name: &StoredName) -> Result<bool, StorageError> {
        self.op
            .exists(name.as_str())
            .await
            .map_err(|e| io_error("stat", name, e))
    }
}
