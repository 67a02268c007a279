//! Content hashing and blind search tokens using BLAKE2b.
//!
//! Object addresses are hashes of ciphertext, not plaintext: identical
//! plaintexts produce different addresses because nonces differ, so the
//! store never becomes a confirmation-of-content oracle.

use blake2::digest::consts::{U16, U32};
use blake2::digest::{FixedOutput, KeyInit, Update};
use blake2::{Blake2b, Blake2bMac, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::SearchIndexKey;
use quillvault_common::{Error, Result};

/// Length of a content hash in bytes (256-bit BLAKE2b).
pub const HASH_LENGTH: usize = 32;

/// Length of a blind search token in bytes (128-bit keyed BLAKE2b).
pub const TOKEN_LENGTH: usize = 16;

/// Content address of an encrypted blob: BLAKE2b-256 of the ciphertext.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHash([u8; HASH_LENGTH]);

impl ObjectHash {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse from lowercase hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::InvalidInput(format!("Invalid object hash: {}", e)))?;
        let arr: [u8; HASH_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::InvalidInput("Object hash must be 32 bytes".to_string()))?;
        Ok(Self(arr))
    }

    /// Get the hash bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Split into the sharded storage form: (`hash[0:2]`, `hash[2:]`).
    pub fn shard(&self) -> (String, String) {
        let hex = self.to_hex();
        (hex[..2].to_string(), hex[2..].to_string())
    }
}

impl fmt::Debug for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHash({})", self.to_hex())
    }
}

impl fmt::Display for ObjectHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Compute the content address of a ciphertext.
pub fn content_hash(ciphertext: &[u8]) -> ObjectHash {
    let mut hasher = Blake2b::<U32>::new();
    Digest::update(&mut hasher, ciphertext);
    let digest = hasher.finalize();

    let mut bytes = [0u8; HASH_LENGTH];
    bytes.copy_from_slice(&digest);
    ObjectHash::from_bytes(bytes)
}

/// Derive a blind search token for a normalized word.
///
/// Keyed BLAKE2b under the vault's search index key, truncated to
/// 128 bits. Without the key the token reveals nothing about the word;
/// with it, the same word always maps to the same token.
pub fn blind_token(key: &SearchIndexKey, word: &str) -> Result<[u8; TOKEN_LENGTH]> {
    let mut mac = Blake2bMac::<U16>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Crypto(format!("Blind token MAC init failed: {}", e)))?;
    Update::update(&mut mac, word.as_bytes());
    let out = mac.finalize_fixed();

    let mut token = [0u8; TOKEN_LENGTH];
    token.copy_from_slice(&out);
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LENGTH;

    #[test]
    fn test_content_hash_stable() {
        let data = b"some ciphertext bytes";
        assert_eq!(content_hash(data), content_hash(data));
    }

    #[test]
    fn test_content_hash_distinguishes_inputs() {
        assert_ne!(content_hash(b"aaa"), content_hash(b"aab"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = content_hash(b"blob");
        let parsed = ObjectHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_shard_layout() {
        let hash = content_hash(b"blob");
        let (prefix, rest) = hash.shard();
        assert_eq!(prefix.len(), 2);
        assert_eq!(rest.len(), 62);
        assert_eq!(format!("{}{}", prefix, rest), hash.to_hex());
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(ObjectHash::from_hex("zz").is_err());
        assert!(ObjectHash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_blind_token_deterministic_per_key() {
        let key = SearchIndexKey::from_bytes([3u8; KEY_LENGTH]);

        let t1 = blind_token(&key, "alpha").unwrap();
        let t2 = blind_token(&key, "alpha").unwrap();
        assert_eq!(t1, t2);

        let t3 = blind_token(&key, "beta").unwrap();
        assert_ne!(t1, t3);
    }

    #[test]
    fn test_blind_token_varies_per_key() {
        let key1 = SearchIndexKey::from_bytes([1u8; KEY_LENGTH]);
        let key2 = SearchIndexKey::from_bytes([2u8; KEY_LENGTH]);

        assert_ne!(
            blind_token(&key1, "alpha").unwrap(),
            blind_token(&key2, "alpha").unwrap()
        );
    }
}
