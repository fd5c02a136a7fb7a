//! AES-256-GCM payload sealing with detached IV and tag
//!
//! Stored form:
//! ```text
//! blob store:  [N bytes: ciphertext]           (same length as the plaintext)
//! file record: iv = 12 random bytes, tag = 16 bytes
//! ```

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroize;

use crate::keys::MasterKey;
use crate::{IV_LEN, TAG_LEN};

#[derive(Debug, Error)]
pub enum CodecError {
    /// Tag did not verify: tampering, wrong key, wrong IV, or corruption.
    #[error("authentication tag verification failed")]
    AuthenticationFailure,

    #[error("encryption failed")]
    Encrypt,
}

/// Output of [`encrypt`]
#[derive(Debug, Clone)]
pub struct Sealed {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
}

/// Encrypt `plaintext` under the master key with a fresh random IV.
pub fn encrypt(master: &MasterKey, plaintext: &[u8]) -> Result<Sealed, CodecError> {
    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    seal_with_iv(master, iv, plaintext)
}

fn seal_with_iv(
    master: &MasterKey,
    iv: [u8; IV_LEN],
    plaintext: &[u8],
) -> Result<Sealed, CodecError> {
    let cipher = Aes256Gcm::new(master.as_bytes().into());

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CodecError::Encrypt)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(Sealed {
        ciphertext: buffer,
        iv,
        tag: tag_bytes,
    })
}

/// Decrypt a payload sealed by [`encrypt`].
///
/// All-or-nothing: on a tag mismatch no plaintext is returned and the
/// working buffer is wiped.
pub fn decrypt(
    master: &MasterKey,
    ciphertext: &[u8],
    iv: &[u8; IV_LEN],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>, CodecError> {
    let cipher = Aes256Gcm::new(master.as_bytes().into());

    let mut buffer = ciphertext.to_vec();
    match cipher.decrypt_in_place_detached(
        Nonce::from_slice(iv),
        b"",
        &mut buffer,
        Tag::from_slice(tag),
    ) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            buffer.zeroize();
            Err(CodecError::AuthenticationFailure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_key() -> MasterKey {
        MasterKey::from_bytes([42u8; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"quarterly numbers, do not share";

        let sealed = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &sealed.ciphertext, &sealed.iv, &sealed.tag).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let key = test_key();

        let sealed = encrypt(&key, b"").unwrap();
        assert!(sealed.ciphertext.is_empty());

        let decrypted = decrypt(&key, &sealed.ciphertext, &sealed.iv, &sealed.tag).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_ciphertext_same_length_as_plaintext() {
        let key = test_key();
        let sealed = encrypt(&key, &[7u8; 1000]).unwrap();
        assert_eq!(sealed.ciphertext.len(), 1000);
        assert_ne!(sealed.ciphertext, vec![7u8; 1000]);
    }

    #[test]
    fn test_decrypt_wrong_key() {
        let sealed = encrypt(&MasterKey::from_bytes([1u8; 32]), b"secret data").unwrap();
        let result = decrypt(
            &MasterKey::from_bytes([2u8; 32]),
            &sealed.ciphertext,
            &sealed.iv,
            &sealed.tag,
        );

        assert!(matches!(result, Err(CodecError::AuthenticationFailure)));
    }

    #[test]
    fn test_empty_payload_tag_still_verified() {
        let key = test_key();
        let mut sealed = encrypt(&key, b"").unwrap();
        sealed.tag[0] ^= 0x01;

        let result = decrypt(&key, &sealed.ciphertext, &sealed.iv, &sealed.tag);
        assert!(matches!(result, Err(CodecError::AuthenticationFailure)));
    }

    #[test]
    fn test_iv_fresh_per_call() {
        let key = test_key();
        let a = encrypt(&key, b"same input").unwrap();
        let b = encrypt(&key, b"same input").unwrap();

        assert_ne!(a.iv, b.iv, "IV must never repeat under one key");
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_sealed_output_fits_file_record() {
        let sealed = encrypt(&test_key(), b"record me").unwrap();
        let cipher = lockbox_core::CipherMaterial {
            iv: sealed.iv,
            auth_tag: sealed.tag,
        };
        assert_eq!(cipher.iv.len(), 12);
        assert_eq!(cipher.auth_tag.len(), 16);
    }

    // McGrew & Viega GCM test case 14 (zero key, zero IV, one zero block)
    #[test]
    fn test_known_answer_vector() {
        let key = MasterKey::from_bytes([0u8; 32]);
        let sealed = seal_with_iv(&key, [0u8; IV_LEN], &[0u8; 16]).unwrap();

        assert_eq!(
            sealed.ciphertext,
            [
                0xce, 0xa7, 0x40, 0x3d, 0x4d, 0x60, 0x6b, 0x6e, 0x07, 0x4e, 0xc5, 0xd3, 0xba, 0xf3,
                0x9d, 0x18
            ]
        );
        assert_eq!(
            sealed.tag,
            [
                0xd0, 0xd1, 0xc8, 0xa7, 0x99, 0x99, 0x6b, 0xf0, 0x26, 0x5b, 0x98, 0xb5, 0xd4, 0x8a,
                0xb9, 0x19
            ]
        );

        let decrypted = decrypt(&key, &sealed.ciphertext, &[0u8; IV_LEN], &sealed.tag).unwrap();
        assert_eq!(decrypted, [0u8; 16]);
    }

    proptest! {
        #[test]
        fn roundtrip_any_payload(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
            let key = test_key();
            let sealed = encrypt(&key, &data).unwrap();
            let decrypted = decrypt(&key, &sealed.ciphertext, &sealed.iv, &sealed.tag).unwrap();
            prop_assert_eq!(decrypted, data);
        }

        #[test]
        fn flipped_ciphertext_bit_fails(
            data in proptest::collection::vec(any::<u8>(), 1..=512),
            pos in any::<proptest::sample::Index>(),
            bit in 0u8..8,
        ) {
            let key = test_key();
            let mut sealed = encrypt(&key, &data).unwrap();
            let i = pos.index(sealed.ciphertext.len());
            sealed.ciphertext[i] ^= 1 << bit;

            let result = decrypt(&key, &sealed.ciphertext, &sealed.iv, &sealed.tag);
            prop_assert!(matches!(result, Err(CodecError::AuthenticationFailure)));
        }

        #[test]
        fn flipped_iv_bit_fails(
            data in proptest::collection::vec(any::<u8>(), 0..=512),
            i in 0usize..IV_LEN,
            bit in 0u8..8,
        ) {
            let key = test_key();
            let mut sealed = encrypt(&key, &data).unwrap();
            sealed.iv[i] ^= 1 << bit;

            let result = decrypt(&key, &sealed.ciphertext, &sealed.iv, &sealed.tag);
            prop_assert!(matches!(result, Err(CodecError::AuthenticationFailure)));
        }

        #[test]
        fn flipped_tag_bit_fails(
            data in proptest::collection::vec(any::<u8>(), 0..=512),
            i in 0usize..TAG_LEN,
            bit in 0u8..8,
        ) {
            let key = test_key();
            let mut sealed = encrypt(&key, &data).unwrap();
            sealed.tag[i] ^= 1 << bit;

            let result = decrypt(&key, &sealed.ciphertext, &sealed.iv, &sealed.tag);
            prop_assert!(matches!(result, Err(CodecError::AuthenticationFailure)));
        }
    }
}
