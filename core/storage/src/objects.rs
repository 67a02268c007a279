//! Content-addressed encrypted object store.
//!
//! Blobs are addressed by the BLAKE2b hash of their ciphertext, laid out
//! as `{vault}/objects/{hash[0:2]}/{hash[2:]}`. Addressing the
//! ciphertext (not the plaintext) means identical plaintexts land at
//! different addresses, so the store cannot be used to confirm content.
//!
//! Objects are immutable once written and never mutated, only
//! superseded. Deleting a logical note does not delete its blob; orphan
//! blobs are reclaimed by a separate collector, outside this crate.

use std::sync::Arc;
use tracing::debug;

use crate::fs::FileSystem;
use quillvault_common::{Error, Result};
use quillvault_crypto::{content_hash, ObjectHash};

/// Content-addressed blob store for one vault.
pub struct ContentAddressedStore {
    fs: Arc<dyn FileSystem>,
    vault_root: String,
}

impl ContentAddressedStore {
    /// Create a store rooted at `{vault_root}/objects`.
    pub fn new(fs: Arc<dyn FileSystem>, vault_root: impl Into<String>) -> Self {
        Self {
            fs,
            vault_root: vault_root.into(),
        }
    }

    fn object_path(&self, hash: &ObjectHash) -> String {
        let (prefix, rest) = hash.shard();
        format!("{}/objects/{}/{}", self.vault_root, prefix, rest)
    }

    /// Write a ciphertext blob, returning its content address.
    ///
    /// Idempotent: writing the same ciphertext twice is a no-op after
    /// the first write, so concurrent writers may race safely.
    pub async fn write(&self, ciphertext: &[u8]) -> Result<ObjectHash> {
        let hash = content_hash(ciphertext);
        let path = self.object_path(&hash);

        if self.fs.exists(&path).await? {
            debug!(hash = %hash, "Object already present, skipping write");
            return Ok(hash);
        }

        self.fs.write_atomic(&path, ciphertext).await?;
        debug!(hash = %hash, size = ciphertext.len(), "Object written");
        Ok(hash)
    }

    /// Read a blob by content address.
    ///
    /// # Errors
    /// - `NotFound` if no object with this hash exists
    pub async fn read(&self, hash: &ObjectHash) -> Result<Vec<u8>> {
        let path = self.object_path(hash);
        self.fs
            .read_if_exists(&path)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Object not found: {}", hash)))
    }

    /// Check whether a blob exists.
    pub async fn contains(&self, hash: &ObjectHash) -> Result<bool> {
        self.fs.exists(&self.object_path(hash)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFileSystem;

    fn store() -> (MemoryFileSystem, ContentAddressedStore) {
        let fs = MemoryFileSystem::new();
        let store = ContentAddressedStore::new(Arc::new(fs.clone()), "vault-1");
        (fs, store)
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (_fs, store) = store();

        let hash = store.write(b"ciphertext bytes").await.unwrap();
        let read = store.read(&hash).await.unwrap();

        assert_eq!(read, b"ciphertext bytes");
    }

    #[tokio::test]
    async fn test_address_is_hash_of_ciphertext() {
        let (_fs, store) = store();

        let hash = store.write(b"ciphertext bytes").await.unwrap();
        assert_eq!(hash, content_hash(b"ciphertext bytes"));
    }

    #[tokio::test]
    async fn test_write_idempotent() {
        let (fs, store) = store();

        let hash1 = store.write(b"same bytes").await.unwrap();
        let hash2 = store.write(b"same bytes").await.unwrap();

        assert_eq!(hash1, hash2);

        let (prefix, rest) = hash1.shard();
        let path = format!("vault-1/objects/{}/{}", prefix, rest);
        assert!(fs.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let (_fs, store) = store();
        let hash = content_hash(b"never written");

        assert!(matches!(
            store.read(&hash).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sharded_layout() {
        let (fs, store) = store();

        let hash = store.write(b"blob").await.unwrap();
        let hex = hash.to_hex();
        let path = format!("vault-1/objects/{}/{}", &hex[..2], &hex[2..]);

        assert!(fs.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_vaults_isolated() {
        let fs = MemoryFileSystem::new();
        let store_a = ContentAddressedStore::new(Arc::new(fs.clone()), "vault-a");
        let store_b = ContentAddressedStore::new(Arc::new(fs.clone()), "vault-b");

        let hash = store_a.write(b"blob").await.unwrap();

        assert!(store_a.contains(&hash).await.unwrap());
        assert!(!store_b.contains(&hash).await.unwrap());
    }
}
