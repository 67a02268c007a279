//! Key wrapping via ephemeral ECDH + HKDF + AEAD.
//!
//! Each wrap operation generates a fresh ephemeral X25519 key pair, so
//! compromising one wrapped key does not compromise others. The wrap key
//! is bound to both the ephemeral and the recipient public key through
//! the HKDF info input; an envelope moved between recipients fails
//! authentication instead of decrypting.

use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use quillvault_common::{Error, Result};
use quillvault_crypto::{aead, subkey, KEY_LENGTH};

/// Associated data for scope-key envelopes, versioned with the scheme.
const WRAP_AAD: &[u8] = b"share.wrap.v1";

/// A symmetric key scoping access to a shared resource (notebook or
/// single note). Generated randomly; transported only inside wrapped
/// envelopes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ScopeKey {
    key: [u8; KEY_LENGTH],
}

impl ScopeKey {
    /// Generate a random scope key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; KEY_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Create from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeKey([REDACTED])")
    }
}

/// A scope key encrypted for one recipient. Immutable once created;
/// superseded by a new WrappedKey on rotation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Ephemeral X25519 public key (sender side of the exchange).
    pub ephemeral_public_key: [u8; 32],
    /// The recipient this envelope was wrapped for.
    pub recipient_public_key: [u8; 32],
    /// AEAD envelope: `nonce || ciphertext || tag`.
    pub ciphertext: Vec<u8>,
}

/// Derive the wrap key from the ECDH output, bound to both public keys
/// and the scheme version.
fn derive_wrap_key(
    shared_secret: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
    let mut info = String::with_capacity(subkey::CONTEXT_SHARE_WRAP.len() + 128);
    info.push_str(subkey::CONTEXT_SHARE_WRAP);
    info.push('.');
    info.push_str(&hex::encode(ephemeral_public));
    info.push('.');
    info.push_str(&hex::encode(recipient_public));

    let mut wrap = Zeroizing::new([0u8; KEY_LENGTH]);
    subkey::derive_subkey(shared_secret, &info, wrap.as_mut())?;
    Ok(wrap)
}

/// Wrap a scope key for a recipient.
///
/// # Postconditions
/// - A fresh ephemeral key pair is used; the ephemeral secret is
///   dropped before returning
/// - The returned envelope can only be opened with the recipient's
///   X25519 secret key
pub fn wrap_key(scope_key: &ScopeKey, recipient_public: &X25519Public) -> Result<WrappedKey> {
    let ephemeral = StaticSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = X25519Public::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(recipient_public);
    let wrap = derive_wrap_key(
        shared.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient_public.as_bytes(),
    )?;

    let ciphertext = aead::encrypt(wrap.as_ref(), scope_key.as_bytes(), WRAP_AAD)?;

    Ok(WrappedKey {
        ephemeral_public_key: *ephemeral_public.as_bytes(),
        recipient_public_key: *recipient_public.as_bytes(),
        ciphertext,
    })
}

/// Unwrap a scope key with our X25519 secret key.
///
/// # Errors
/// - `AuthenticationFailure` if we are not the recipient the envelope
///   was wrapped for, or the envelope was tampered with
pub fn unwrap_key(wrapped: &WrappedKey, our_secret: &StaticSecret) -> Result<ScopeKey> {
    let ephemeral_public = X25519Public::from(wrapped.ephemeral_public_key);

    let shared = our_secret.diffie_hellman(&ephemeral_public);
    let wrap = derive_wrap_key(
        shared.as_bytes(),
        &wrapped.ephemeral_public_key,
        &wrapped.recipient_public_key,
    )?;

    let mut plaintext = aead::decrypt(wrap.as_ref(), &wrapped.ciphertext, WRAP_AAD)?;

    let result = <[u8; KEY_LENGTH]>::try_from(plaintext.as_slice())
        .map(ScopeKey::from_bytes)
        .map_err(|_| Error::Crypto("Unwrapped key has wrong length".to_string()));
    plaintext.zeroize();
    result
}
