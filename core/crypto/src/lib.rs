//! Cryptographic primitives for QuillVault.
//!
//! This module provides:
//! - Master-key derivation from passwords using Argon2id
//! - Subkey derivation using HKDF-SHA256 with versioned context strings
//! - Authenticated encryption using XChaCha20-Poly1305
//! - Content hashing and blind search tokens using BLAKE2b
//! - The workspace keyring, sealed under the master unlock key
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time operations for sensitive comparisons

pub mod aead;
pub mod hash;
pub mod kdf;
pub mod keyring;
pub mod keys;
pub mod subkey;

pub use aead::{decrypt, encrypt, NONCE_SIZE, TAG_SIZE};
pub use hash::{blind_token, content_hash, ObjectHash};
pub use kdf::{derive_master_key, KdfParams, MIN_MEMORY_COST};
pub use keyring::Keyring;
pub use keys::{ContentKey, MasterUnlockKey, Salt, SearchIndexKey, VaultKey, KEY_LENGTH};
pub use subkey::{derive_subkey, VaultKeyDeriver};
