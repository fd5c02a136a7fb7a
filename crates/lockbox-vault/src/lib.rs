//! lockbox-vault: the encrypted file store as seen by its callers
//!
//! Four boundary operations, each taking the authenticated [`Principal`]
//! explicitly:
//!
//! ```text
//! upload_file(principal, bytes, display_name) -> FileRecord
//! list_files(principal)                       -> [FileRecord]
//! retrieve_file(principal, id, as_attachment) -> RetrievedFile
//! delete_file(principal, id)                  -> ()
//! ```
//!
//! Write ordering keeps every live record backed by a live payload:
//! upload writes the payload before the record, delete removes the payload
//! before the record.
//!
//! [`Principal`]: lockbox_core::Principal

pub mod content;
pub mod gate;
mod delete;
mod retrieve;
mod upload;
mod vault;

pub use gate::{check_access, owner_scope, Access};
pub use upload::DEFAULT_DISPLAY_NAME;
pub use vault::Vault;
