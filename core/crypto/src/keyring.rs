//! The workspace keyring: vault id -> vault key, sealed under the MUK.
//!
//! The keyring is the single source of truth for which vaults exist in a
//! workspace. It is loaded at unlock, mutated on vault create/delete/
//! rotate, and persisted as one AEAD envelope on every mutation. A wrong
//! password fails authentication here, before any vault key exists in
//! memory.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use zeroize::Zeroize;

use crate::aead;
use crate::keys::{MasterUnlockKey, VaultKey, KEY_LENGTH};
use crate::subkey::KEYRING_AAD;
use quillvault_common::{Error, Result, SecretBytes, VaultId};

/// Serialized form; key bytes are base64 inside the AEAD envelope only.
#[derive(Serialize, Deserialize)]
struct KeyringDoc {
    version: u32,
    vaults: BTreeMap<String, String>,
}

const KEYRING_VERSION: u32 = 1;

/// Ordered mapping of vault id to vault key. One per workspace.
#[derive(Default)]
pub struct Keyring {
    vaults: BTreeMap<VaultId, VaultKey>,
}

impl Keyring {
    /// Create an empty keyring.
    pub fn new() -> Self {
        Self {
            vaults: BTreeMap::new(),
        }
    }

    /// Number of vaults.
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    /// Whether the keyring holds no vaults.
    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// Whether a vault is present.
    pub fn contains(&self, vault_id: &VaultId) -> bool {
        self.vaults.contains_key(vault_id)
    }

    /// Get the key for a vault.
    pub fn get(&self, vault_id: &VaultId) -> Option<&VaultKey> {
        self.vaults.get(vault_id)
    }

    /// Insert a vault key.
    ///
    /// # Errors
    /// - `AlreadyExists` if the vault id is already present
    pub fn insert(&mut self, vault_id: VaultId, key: VaultKey) -> Result<()> {
        if self.vaults.contains_key(&vault_id) {
            return Err(Error::AlreadyExists(format!(
                "Vault already in keyring: {}",
                vault_id
            )));
        }
        self.vaults.insert(vault_id, key);
        Ok(())
    }

    /// Replace the key for an existing vault (key rotation).
    ///
    /// # Errors
    /// - `NotFound` if the vault is not present
    pub fn replace(&mut self, vault_id: &VaultId, key: VaultKey) -> Result<()> {
        match self.vaults.get_mut(vault_id) {
            Some(slot) => {
                *slot = key;
                Ok(())
            }
            None => Err(Error::NotFound(format!("Vault not in keyring: {}", vault_id))),
        }
    }

    /// Remove a vault key. The removed key is zeroized on drop.
    ///
    /// # Errors
    /// - `NotFound` if the vault is not present
    pub fn remove(&mut self, vault_id: &VaultId) -> Result<()> {
        self.vaults
            .remove(vault_id)
            .map(drop)
            .ok_or_else(|| Error::NotFound(format!("Vault not in keyring: {}", vault_id)))
    }

    /// Vault ids in order.
    pub fn vault_ids(&self) -> Vec<VaultId> {
        self.vaults.keys().cloned().collect()
    }

    /// Drop all keys. Each VaultKey zeroizes on drop.
    pub fn clear(&mut self) {
        self.vaults.clear();
    }

    /// Serialize and encrypt the keyring under the master unlock key.
    ///
    /// Output is `nonce || ciphertext || tag`, bound to the keyring
    /// format version via associated data. The serialized plaintext is
    /// zeroized after encryption.
    pub fn seal(&self, muk: &MasterUnlockKey) -> Result<Vec<u8>> {
        let doc = KeyringDoc {
            version: KEYRING_VERSION,
            vaults: self
                .vaults
                .iter()
                .map(|(id, key)| (id.as_str().to_string(), STANDARD.encode(key.as_bytes())))
                .collect(),
        };

        let mut plaintext = serde_json::to_vec(&doc)
            .map_err(|e| Error::Serialization(format!("Keyring serialization failed: {}", e)))?;
        let sealed = aead::encrypt(muk.as_bytes(), &plaintext, KEYRING_AAD);
        plaintext.zeroize();
        sealed
    }

    /// Decrypt and deserialize a keyring.
    ///
    /// # Errors
    /// - `AuthenticationFailure` if the MUK is wrong (wrong password) or
    ///   the ciphertext was tampered with; surfaced before any vault
    ///   key is exposed
    /// - `Serialization` if the plaintext does not parse
    pub fn open(muk: &MasterUnlockKey, sealed: &[u8]) -> Result<Self> {
        let plaintext = SecretBytes::new(aead::decrypt(muk.as_bytes(), sealed, KEYRING_AAD)?);

        let doc: KeyringDoc = serde_json::from_slice(plaintext.as_bytes())
            .map_err(|e| Error::Serialization(format!("Keyring parse failed: {}", e)))?;

        if doc.version != KEYRING_VERSION {
            return Err(Error::Serialization(format!(
                "Unsupported keyring version: {}",
                doc.version
            )));
        }

        let mut vaults = BTreeMap::new();
        for (id, key_b64) in doc.vaults {
            let vault_id = VaultId::new(id)?;
            let mut key_bytes = STANDARD
                .decode(&key_b64)
                .map_err(|e| Error::Serialization(format!("Keyring key decode failed: {}", e)))?;
            let arr: [u8; KEY_LENGTH] = key_bytes
                .as_slice()
                .try_into()
                .map_err(|_| Error::Serialization("Vault key must be 32 bytes".to_string()))?;
            vaults.insert(vault_id, VaultKey::from_bytes(arr));
            key_bytes.zeroize();
        }

        Ok(Self { vaults })
    }
}
