//! lockbox-storage: payload blobs keyed by server-generated opaque names

pub mod blob;
pub mod health;
pub mod operator;

pub use blob::{BlobStore, OperatorBlobStore, StorageError};
pub use health::check_health;
pub use operator::{build_operator, memory_operator};
