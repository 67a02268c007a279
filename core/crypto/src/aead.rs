//! Authenticated encryption using XChaCha20-Poly1305.
//!
//! XChaCha20-Poly1305 provides both confidentiality and authenticity,
//! with a 24-byte nonce that is safe for random generation.
//!
//! Ciphertext wire format: `nonce(24) || ciphertext || tag(16)`.
//!
//! Associated data is mandatory wherever a ciphertext is logically bound
//! to an identifier (note id, keyring version tag); a ciphertext copied
//! into a different slot then fails authentication instead of decrypting
//! into the wrong context.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    XChaCha20Poly1305, XNonce,
};

use crate::keys::KEY_LENGTH;
use quillvault_common::{Error, Result};

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// Encrypt plaintext with a random nonce and associated data.
///
/// # Preconditions
/// - `key` must be exactly KEY_LENGTH bytes
///
/// # Postconditions
/// - Returns `nonce || ciphertext || tag`
/// - Output length is plaintext length + NONCE_SIZE + TAG_SIZE
///
/// # Errors
/// - Returns error if key length is incorrect
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("Cipher init failed: {}", e)))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt wire-format bytes (`nonce || ciphertext || tag`).
///
/// # Errors
/// - `AuthenticationFailure` on tag mismatch, wrong key, or wrong
///   associated data. This is never downgraded: it signals corruption
///   or active tampering and must propagate to the caller.
pub fn decrypt(key: &[u8], data: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LENGTH {
        return Err(Error::Crypto(format!(
            "Invalid key length: expected {}, got {}",
            KEY_LENGTH,
            key.len()
        )));
    }

    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::Crypto("Ciphertext too short".to_string()));
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);

    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("Cipher init failed: {}", e)))?;

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| Error::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Hello, World!";

        let ciphertext = encrypt(&key, plaintext, b"").unwrap();
        let decrypted = decrypt(&key, &ciphertext, b"").unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_size() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Test message";

        let ciphertext = encrypt(&key, plaintext, b"").unwrap();

        assert_eq!(ciphertext.len(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = [42u8; KEY_LENGTH];
        let plaintext = b"Same plaintext";

        let ct1 = encrypt(&key, plaintext, b"").unwrap();
        let ct2 = encrypt(&key, plaintext, b"").unwrap();

        assert_ne!(&ct1[..NONCE_SIZE], &ct2[..NONCE_SIZE]);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let key1 = [1u8; KEY_LENGTH];
        let key2 = [2u8; KEY_LENGTH];

        let ciphertext = encrypt(&key1, b"Secret data", b"").unwrap();

        assert!(matches!(
            decrypt(&key2, &ciphertext, b""),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_every_flipped_byte_fails_authentication() {
        let key = [42u8; KEY_LENGTH];
        let ciphertext = encrypt(&key, b"Important data", b"").unwrap();

        for i in 0..ciphertext.len() {
            let mut tampered = ciphertext.clone();
            tampered[i] ^= 0xFF;
            assert!(
                matches!(
                    decrypt(&key, &tampered, b""),
                    Err(Error::AuthenticationFailure)
                ),
                "byte {} flip not detected",
                i
            );
        }
    }

    #[test]
    fn test_aad_binding() {
        let key = [42u8; KEY_LENGTH];
        let ciphertext = encrypt(&key, b"payload", b"note-a").unwrap();

        assert!(decrypt(&key, &ciphertext, b"note-a").is_ok());
        assert!(matches!(
            decrypt(&key, &ciphertext, b"note-b"),
            Err(Error::AuthenticationFailure)
        ));
        assert!(matches!(
            decrypt(&key, &ciphertext, b""),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        let short_key = [0u8; 16];
        assert!(encrypt(&short_key, b"data", b"").is_err());
    }

    #[test]
    fn test_empty_plaintext() {
        let key = [42u8; KEY_LENGTH];

        let ciphertext = encrypt(&key, b"", b"").unwrap();
        let decrypted = decrypt(&key, &ciphertext, b"").unwrap();

        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let key = [42u8; KEY_LENGTH];
        let ciphertext = encrypt(&key, b"data", b"").unwrap();

        assert!(decrypt(&key, &ciphertext[..NONCE_SIZE + TAG_SIZE - 1], b"").is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(plaintext in proptest::collection::vec(any::<u8>(), 0..2048),
                          key in any::<[u8; KEY_LENGTH]>(),
                          aad in proptest::collection::vec(any::<u8>(), 0..64)) {
            let ciphertext = encrypt(&key, &plaintext, &aad).unwrap();
            let decrypted = decrypt(&key, &ciphertext, &aad).unwrap();
            prop_assert_eq!(decrypted, plaintext);
        }
    }
}
