//! Secure keystore contract for device secrets.
//!
//! Platform credential stores (macOS Keychain, Windows Credential
//! Manager, Secret Service) live behind this contract, outside the
//! engine. The engine only ever stores opaque secret bytes, scoped per
//! device.

use std::collections::HashMap;
use std::sync::RwLock;

use quillvault_common::{Error, Result, SecretBytes};

/// Opaque store/retrieve of device secret key material.
pub trait SecureKeystore: Send + Sync {
    /// Store a secret under an entry name, replacing any previous value.
    fn store(&self, entry: &str, secret: SecretBytes) -> Result<()>;

    /// Retrieve a secret, or `None` if the entry does not exist.
    fn retrieve(&self, entry: &str) -> Result<Option<SecretBytes>>;

    /// Delete a secret. Deleting a missing entry is a no-op.
    fn delete(&self, entry: &str) -> Result<()>;
}

/// In-memory keystore for tests and development.
#[derive(Default)]
pub struct MemoryKeystore {
    entries: RwLock<HashMap<String, SecretBytes>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureKeystore for MemoryKeystore {
    fn store(&self, entry: &str, secret: SecretBytes) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Storage("Keystore lock poisoned".to_string()))?;
        entries.insert(entry.to_string(), secret);
        Ok(())
    }

    fn retrieve(&self, entry: &str) -> Result<Option<SecretBytes>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Storage("Keystore lock poisoned".to_string()))?;
        Ok(entries.get(entry).cloned())
    }

    fn delete(&self, entry: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Storage("Keystore lock poisoned".to_string()))?;
        entries.remove(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_retrieve_delete() {
        let keystore = MemoryKeystore::new();

        keystore
            .store("device-1", SecretBytes::new(vec![1, 2, 3]))
            .unwrap();

        let secret = keystore.retrieve("device-1").unwrap().unwrap();
        assert_eq!(secret.as_bytes(), &[1, 2, 3]);

        keystore.delete("device-1").unwrap();
        assert!(keystore.retrieve("device-1").unwrap().is_none());

        // Deleting a missing entry is a no-op
        keystore.delete("device-1").unwrap();
    }

    #[test]
    fn test_store_replaces() {
        let keystore = MemoryKeystore::new();

        keystore.store("e", SecretBytes::new(vec![1])).unwrap();
        keystore.store("e", SecretBytes::new(vec![2])).unwrap();

        assert_eq!(keystore.retrieve("e").unwrap().unwrap().as_bytes(), &[2]);
    }
}
