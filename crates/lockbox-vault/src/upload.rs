use chrono::{SubsecRound, Utc};
use lockbox_core::{
    CipherMaterial, FileRecord, LockboxError, LockboxResult, NewFileRecord, Principal, StoredName,
};
use lockbox_records::RecordStore;
use lockbox_storage::BlobStore;
use zeroize::Zeroize;

use crate::vault::Vault;

/// Display name used when the client sends none
pub const DEFAULT_DISPLAY_NAME: &str = "upload.bin";

impl<R: RecordStore, B: BlobStore> Vault<R, B> {
    /// Encrypt and store `plaintext` for `principal`.
    ///
    /// The payload is written before the record; if the record insert fails
    /// the payload is removed again, so a failed upload leaves nothing behind.
    pub async fn upload_file(
        &self,
        principal: &Principal,
        mut plaintext: Vec<u8>,
        display_name: &str,
    ) -> LockboxResult<FileRecord> {
        let display_name = match display_name.trim() {
            "" => DEFAULT_DISPLAY_NAME.to_string(),
            name => name.to_string(),
        };
        let size = plaintext.len();

        let sealed = lockbox_crypto::encrypt(&self.master, &plaintext);
        plaintext.zeroize();
        let sealed = sealed.map_err(|e| LockboxError::Other(e.into()))?;

        let stored_name = StoredName::generate();
        if let Err(e) = self.blobs.put(&stored_name, sealed.ciphertext).await {
            // A partial write may have left bytes under the name.
            self.discard_orphan(&stored_name).await;
            return Err(e.into());
        }

        let new = NewFileRecord {
            owner_id: principal.id,
            display_name,
            stored_name,
            cipher: Some(CipherMaterial {
                iv: sealed.iv,
                auth_tag: sealed.tag,
            }),
            created_at: Utc::now().trunc_subsecs(6),
        };

        let id = match self.records.insert(&new).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    stored_name = %new.stored_name,
                    error = %e,
                    "record insert failed after payload write"
                );
                self.discard_orphan(&new.stored_name).await;
                return Err(e.into());
            }
        };

        tracing::info!(file_id = %id, owner = %principal.id, bytes = size, "file uploaded");

        Ok(FileRecord {
            id,
            owner_id: new.owner_id,
            display_name: new.display_name,
            stored_name: new.stored_name,
            cipher: new.cipher,
            created_at: new.created_at,
        })
    }

    async fn discard_orphan(&self, name: &StoredName) {
        if let Err(e) = self.blobs.delete(name).await {
            tracing::warn!(stored_name = %name, error = %e, "could not remove orphaned payload");
        }
    }
}
