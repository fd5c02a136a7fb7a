//! lockbox-crypto: at-rest encryption for stored files
//!
//! Every payload is sealed with AES-256-GCM under one process-wide master key:
//! ```text
//! encrypt(plaintext, master) -> ciphertext (same length), iv (96-bit random), tag (128-bit)
//! decrypt(ciphertext, master, iv, tag) -> plaintext | AuthenticationFailure
//! ```
//! IV and tag travel detached from the ciphertext: the ciphertext goes to the
//! blob store, the IV and tag go to the file record. No associated data is
//! bound, which keeps payloads written by earlier deployments readable.

pub mod codec;
pub mod keys;
pub mod source;

pub use codec::{decrypt, encrypt, CodecError, Sealed};
pub use keys::{decode_master_key, encode_master_key, generate_master_key, KeyError, MasterKey};
pub use source::{load_master_key, LoadedKey};

/// Size of the master key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Same sizes as [`lockbox_core::CipherMaterial`]
pub use lockbox_core::types::{IV_LEN, TAG_LEN};
