//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Master unlock key derived from the workspace password.
///
/// The MUK is the root of the key hierarchy: it seals the keyring and
/// nothing else. It exists only in memory for the lifetime of an
/// unlocked session and is never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterUnlockKey {
    key: [u8; KEY_LENGTH],
}

impl MasterUnlockKey {
    /// Create a master unlock key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for MasterUnlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterUnlockKey([REDACTED])")
    }
}

/// Root secret for one vault.
///
/// Generated randomly at vault creation, never password-derived, and
/// persisted only as ciphertext inside the keyring. All per-vault keys
/// (content, search index, identity seeds) fan out from this key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; KEY_LENGTH],
}

impl VaultKey {
    /// Create a vault key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Generate a random vault key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaultKey([REDACTED])")
    }
}

/// Key for encrypting a single note's content.
///
/// Derived per note from the vault key; recomputed or cached per
/// session, never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKey {
    key: [u8; KEY_LENGTH],
}

impl ContentKey {
    /// Create a content key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey([REDACTED])")
    }
}

/// Key for the encrypted metadata index and blind search tokens.
///
/// Derived once per vault from the vault key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SearchIndexKey {
    key: [u8; KEY_LENGTH],
}

impl SearchIndexKey {
    /// Create a search index key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for SearchIndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchIndexKey([REDACTED])")
    }
}

/// Salt for master key derivation. Not secret; stored in the plaintext
/// workspace file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    /// Generate a random salt.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut salt = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}
