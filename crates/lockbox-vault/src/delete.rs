use lockbox_core::{FileId, LockboxResult, Principal};
use lockbox_records::RecordStore;
use lockbox_storage::BlobStore;

use crate::gate::owner_scope;
use crate::vault::Vault;

impl<R: RecordStore, B: BlobStore> Vault<R, B> {
    /// Remove a file: payload first, then the record.
    ///
    /// If the payload cannot be removed the record stays, so the file is
    /// still listed and the delete can be retried.
    pub async fn delete_file(&self, principal: &Principal, id: FileId) -> LockboxResult<()> {
        let record = self.find_visible(principal, id).await?;

        self.blobs.delete(&record.stored_name).await.map_err(|e| {
            tracing::error!(file_id = %id, error = %e, "payload delete failed, keeping record");
            e
        })?;
        self.records.delete(id, owner_scope(principal)).await?;

        tracing::info!(file_id = %id, by = %principal.id, "file deleted");
        Ok(())
    }
}
