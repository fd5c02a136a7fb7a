use lockbox_core::{FileId, FileRecord, LockboxError, LockboxResult, Principal};
use lockbox_crypto::MasterKey;
use lockbox_records::RecordStore;
use lockbox_storage::BlobStore;

use crate::gate::{check_access, owner_scope, Access};

/// Encrypted file store: master key, record store, and blob store behind
/// the four principal-scoped operations.
pub struct Vault<R, B> {
    pub(crate) master: MasterKey,
    pub(crate) records: R,
    pub(crate) blobs: B,
}

impl<R: RecordStore, B: BlobStore> Vault<R, B> {
    pub fn new(master: MasterKey, records: R, blobs: B) -> Self {
        Self {
            master,
            records,
            blobs,
        }
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// The principal's own files, newest first.
    ///
    /// Admins get their own uploads here too; admin reach applies to
    /// lookups by id.
    pub async fn list_files(&self, principal: &Principal) -> LockboxResult<Vec<FileRecord>> {
        Ok(self.records.list_by_owner(principal.id).await?)
    }

    /// Record lookup through the access gate. Missing and foreign records
    /// both come back as `NotFoundOrDenied`.
    pub(crate) async fn find_visible(
        &self,
        principal: &Principal,
        id: FileId,
    ) -> LockboxResult<FileRecord> {
        let record = self.records.find_by_id(id, owner_scope(principal)).await?;
        match check_access(principal, &record) {
            Access::Allowed => Ok(record),
            Access::Denied => Err(LockboxError::NotFoundOrDenied),
        }
    }
}
