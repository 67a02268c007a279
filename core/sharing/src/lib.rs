//! Sharing engine for QuillVault.
//!
//! Scope keys (notebook keys, note share keys) are transported to
//! recipients by wrapping: an ephemeral X25519 exchange produces a wrap
//! key via HKDF, and the scope key travels inside an AEAD envelope.
//! Revocation is key rotation: a fresh scope key re-wrapped for every
//! remaining recipient; the revoked recipient simply receives nothing.

pub mod rotation;
pub mod share;
pub mod wrap;

pub use rotation::{extend, rotate, RotationOutcome};
pub use share::{Share, ShareRole, ShareType};
pub use wrap::{unwrap_key, wrap_key, ScopeKey, WrappedKey};
