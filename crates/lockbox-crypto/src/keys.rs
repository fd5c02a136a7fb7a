//! The process-wide master key: generation and base64 encoding

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use zeroize::Zeroize;

use crate::KEY_SIZE;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("master key is not valid base64")]
    Encoding,

    #[error("master key has wrong size: {0} bytes (expected {KEY_SIZE})")]
    Length(usize),

    #[error("reading master key from {source_name}: {error}")]
    Read {
        source_name: String,
        error: std::io::Error,
    },

    #[error("no master key found (tried {0})")]
    Missing(String),
}

/// 256-bit AES key shared by every stored payload.
///
/// Zeroized on drop; `Debug` never prints the bytes.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random master key.
pub fn generate_master_key() -> MasterKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    MasterKey::from_bytes(bytes)
}

/// Standard base64 form, as accepted by [`decode_master_key`].
pub fn encode_master_key(key: &MasterKey) -> SecretString {
    SecretString::from(B64.encode(key.as_bytes()))
}

/// Parse a base64 master key. Surrounding whitespace is ignored.
pub fn decode_master_key(encoded: &SecretString) -> Result<MasterKey, KeyError> {
    let mut raw = B64
        .decode(encoded.expose_secret().trim())
        .map_err(|_| KeyError::Encoding)?;

    if raw.len() != KEY_SIZE {
        let len = raw.len();
        raw.zeroize();
        return Err(KeyError::Length(len));
    }

    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&raw);
    raw.zeroize();
    Ok(MasterKey::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        let k1 = generate_master_key();
        let k2 = generate_master_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_encode_decode() {
        let key = generate_master_key();
        let encoded = encode_master_key(&key);
        assert_eq!(encoded.expose_secret().len(), 44);

        let decoded = decode_master_key(&encoded).unwrap();
        assert_eq!(key.as_bytes(), decoded.as_bytes());
    }

    #[test]
    fn test_decode_ignores_trailing_newline() {
        let key = MasterKey::from_bytes([9u8; KEY_SIZE]);
        let encoded = format!("{}\n", encode_master_key(&key).expose_secret());

        let decoded = decode_master_key(&SecretString::from(encoded)).unwrap();
        assert_eq!(decoded.as_bytes(), &[9u8; KEY_SIZE]);
    }

    #[test]
    fn test_decode_wrong_length() {
        let short = SecretString::from(B64.encode([1u8; 16]));
        assert!(matches!(decode_master_key(&short), Err(KeyError::Length(16))));
    }

    #[test]
    fn test_decode_garbage() {
        let garbage = SecretString::from("not base64 at all!".to_string());
        assert!(matches!(decode_master_key(&garbage), Err(KeyError::Encoding)));
    }

    #[test]
    fn test_debug_redacts() {
        let key = MasterKey::from_bytes([0xAB; KEY_SIZE]);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"));
    }
}
