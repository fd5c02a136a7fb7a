pub mod config;
pub mod error;
pub mod types;

pub use error::{LockboxError, LockboxResult};
pub use types::{
    CipherMaterial, Disposition, FileId, FileRecord, NewFileRecord, Principal, RetrievedFile, Role,
    StoredName, UserId,
};
