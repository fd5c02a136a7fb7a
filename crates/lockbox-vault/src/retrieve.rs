use lockbox_core::{Disposition, FileId, LockboxError, LockboxResult, Principal, RetrievedFile};
use lockbox_crypto::CodecError;
use lockbox_records::RecordStore;
use lockbox_storage::{BlobStore, StorageError};

use crate::content::{sniff_mime, suggested_filename};
use crate::vault::Vault;

impl<R: RecordStore, B: BlobStore> Vault<R, B> {
    /// Fetch, authenticate, and decrypt a file for `principal`.
    ///
    /// Records without cipher material are pre-encryption uploads and are
    /// served as stored.
    pub async fn retrieve_file(
        &self,
        principal: &Principal,
        id: FileId,
        as_attachment: bool,
    ) -> LockboxResult<RetrievedFile> {
        let record = self.find_visible(principal, id).await?;

        let stored = match self.blobs.get(&record.stored_name).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(name)) => {
                tracing::error!(file_id = %id, stored_name = %name, "record has no payload");
                return Err(LockboxError::StorageIo(format!("payload missing for file {id}")));
            }
            Err(e) => return Err(e.into()),
        };

        let (bytes, encrypted) = match &record.cipher {
            Some(cipher) => {
                let plain = lockbox_crypto::decrypt(
                    &self.master,
                    &stored,
                    &cipher.iv,
                    &cipher.auth_tag,
                )
                .map_err(|e| match e {
                    CodecError::AuthenticationFailure => {
                        tracing::warn!(file_id = %id, "payload failed authentication");
                        LockboxError::AuthenticationFailure
                    }
                    other => LockboxError::Other(other.into()),
                })?;
                (plain, true)
            }
            None => {
                tracing::debug!(file_id = %id, "serving legacy plaintext payload");
                (stored, false)
            }
        };

        Ok(RetrievedFile {
            mime_type: sniff_mime(&bytes).to_string(),
            suggested_filename: suggested_filename(&record.display_name),
            disposition: Disposition::from_attachment_flag(as_attachment),
            encrypted,
            bytes,
        })
    }
}
