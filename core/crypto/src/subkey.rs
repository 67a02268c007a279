//! Subkey derivation using HKDF-SHA256.
//!
//! Every key below the vault key is derived here with a versioned
//! context string. Context strings MUST be unique per logical purpose;
//! reusing one across two derivations is a protocol-breaking bug caught
//! by review and the independence tests below, not validated at runtime.
//!
//! All constants live in this module so the full derivation surface is
//! auditable in one place.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::keys::{ContentKey, SearchIndexKey, VaultKey, KEY_LENGTH};
use quillvault_common::{Error, NoteId, Result};

/// Fixed extract salt, versioned with the derivation scheme.
const HKDF_SALT: &[u8] = b"quillvault.hkdf.v1";

/// Context for per-note content keys; completed with the note id.
const CONTEXT_CONTENT_PREFIX: &str = "vault.content.";
const CONTEXT_CONTENT_SUFFIX: &str = ".v1";

/// Context for the per-vault search index key.
pub const CONTEXT_SEARCH_INDEX: &str = "vault.search_index.v1";

/// Context for the Ed25519 signing identity seed.
pub const CONTEXT_IDENTITY_SIGNING: &str = "vault.identity.signing.v1";

/// Context for the X25519 encryption identity seed.
pub const CONTEXT_IDENTITY_ENCRYPTION: &str = "vault.identity.encryption.v1";

/// Context for share wrap keys (ECDH output -> AEAD key).
pub const CONTEXT_SHARE_WRAP: &str = "share.wrap.v1";

/// Associated data binding the sealed keyring to its format version.
pub const KEYRING_AAD: &[u8] = b"workspace.keyring.v1";

/// Associated data binding the device-wrapped MUK to its format version.
pub const DEVICE_UNLOCK_AAD: &[u8] = b"workspace.device_unlock.v1";

/// Derive `output.len()` bytes of key material from `ikm` under `context`.
///
/// HKDF-SHA256 extract-then-expand with a fixed app-scoped salt.
/// Deterministic: identical inputs always yield identical output, and
/// distinct contexts yield independent output.
pub fn derive_subkey(ikm: &[u8], context: &str, output: &mut [u8]) -> Result<()> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), ikm);
    hk.expand(context.as_bytes(), output)
        .map_err(|e| Error::Crypto(format!("Subkey derivation failed: {}", e)))
}

fn derive_key_bytes(ikm: &[u8], context: &str) -> Result<[u8; KEY_LENGTH]> {
    let mut out = [0u8; KEY_LENGTH];
    derive_subkey(ikm, context, &mut out)?;
    Ok(out)
}

/// Derives the per-vault key family from a vault key.
///
/// Holds a borrow of the vault key so the deriver cannot outlive the
/// session that owns it.
pub struct VaultKeyDeriver<'a> {
    vault_key: &'a VaultKey,
}

impl<'a> VaultKeyDeriver<'a> {
    pub fn new(vault_key: &'a VaultKey) -> Self {
        Self { vault_key }
    }

    /// Per-note content key: `HKDF(VK, "vault.content.{noteId}.v1")`.
    pub fn content_key(&self, note_id: &NoteId) -> Result<ContentKey> {
        let context = format!(
            "{}{}{}",
            CONTEXT_CONTENT_PREFIX, note_id, CONTEXT_CONTENT_SUFFIX
        );
        Ok(ContentKey::from_bytes(derive_key_bytes(
            self.vault_key.as_bytes(),
            &context,
        )?))
    }

    /// Per-vault search index key: `HKDF(VK, "vault.search_index.v1")`.
    pub fn search_index_key(&self) -> Result<SearchIndexKey> {
        Ok(SearchIndexKey::from_bytes(derive_key_bytes(
            self.vault_key.as_bytes(),
            CONTEXT_SEARCH_INDEX,
        )?))
    }

    /// Seed for the Ed25519 signing identity.
    pub fn signing_identity_seed(&self) -> Result<[u8; KEY_LENGTH]> {
        derive_key_bytes(self.vault_key.as_bytes(), CONTEXT_IDENTITY_SIGNING)
    }

    /// Seed for the X25519 encryption identity.
    pub fn encryption_identity_seed(&self) -> Result<[u8; KEY_LENGTH]> {
        derive_key_bytes(self.vault_key.as_bytes(), CONTEXT_IDENTITY_ENCRYPTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_subkey_deterministic() {
        let ikm = [7u8; 32];
        let mut out1 = [0u8; 32];
        let mut out2 = [0u8; 32];

        derive_subkey(&ikm, "test.context.v1", &mut out1).unwrap();
        derive_subkey(&ikm, "test.context.v1", &mut out2).unwrap();

        assert_eq!(out1, out2);
    }

    #[test]
    fn test_distinct_contexts_independent() {
        let ikm = [7u8; 32];
        let mut out1 = [0u8; 32];
        let mut out2 = [0u8; 32];

        derive_subkey(&ikm, "test.context-a.v1", &mut out1).unwrap();
        derive_subkey(&ikm, "test.context-b.v1", &mut out2).unwrap();

        assert_ne!(out1, out2);
    }

    #[test]
    fn test_all_vault_subkeys_distinct() {
        let vk = VaultKey::from_bytes([9u8; KEY_LENGTH]);
        let deriver = VaultKeyDeriver::new(&vk);
        let note = NoteId::generate();

        let content = deriver.content_key(&note).unwrap();
        let search = deriver.search_index_key().unwrap();
        let signing = deriver.signing_identity_seed().unwrap();
        let encryption = deriver.encryption_identity_seed().unwrap();

        assert_ne!(content.as_bytes(), search.as_bytes());
        assert_ne!(search.as_bytes(), &signing);
        assert_ne!(signing, encryption);
        assert_ne!(content.as_bytes(), &encryption);
    }

    #[test]
    fn test_content_key_varies_per_note() {
        let vk = VaultKey::from_bytes([9u8; KEY_LENGTH]);
        let deriver = VaultKeyDeriver::new(&vk);

        let note1 = NoteId::generate();
        let note2 = NoteId::generate();

        let key1 = deriver.content_key(&note1).unwrap();
        let key1_again = deriver.content_key(&note1).unwrap();
        let key2 = deriver.content_key(&note2).unwrap();

        assert_eq!(key1.as_bytes(), key1_again.as_bytes());
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_content_key_varies_per_vault() {
        let vk1 = VaultKey::from_bytes([1u8; KEY_LENGTH]);
        let vk2 = VaultKey::from_bytes([2u8; KEY_LENGTH]);
        let note = NoteId::generate();

        let key1 = VaultKeyDeriver::new(&vk1).content_key(&note).unwrap();
        let key2 = VaultKeyDeriver::new(&vk2).content_key(&note).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }
}
