//! Identity key management for QuillVault.
//!
//! Each *user* identity is derived deterministically from a vault key:
//! the same vault key always reproduces the same Ed25519 signing pair
//! and X25519 exchange pair, so an identity is recoverable from the
//! password-derived key hierarchy alone.
//!
//! Each *device* identity is generated randomly (devices are not
//! recoverable from a password, only re-registered) and its secret
//! halves live in a platform secure keystore behind the
//! `SecureKeystore` contract.

pub mod identity;
pub mod keystore;

pub use identity::{verify, DeviceIdentity, UserIdentity, SIGNATURE_LENGTH};
pub use keystore::{MemoryKeystore, SecureKeystore};
