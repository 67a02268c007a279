//! Sync backend contract.
//!
//! The engine only ever produces and consumes already-encrypted payloads
//! across this boundary; it performs no plaintext network I/O. Transport
//! authentication and conflict resolution live outside the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use quillvault_common::{Error, Result, VaultId};

/// One opaque encrypted operation in a vault's sync log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedOp {
    /// Stable operation id assigned by the producer.
    pub op_id: String,
    /// AEAD ciphertext; the backend never sees the plaintext shape.
    pub payload: Vec<u8>,
}

/// One page of pulled operations plus the cursor for the next pull.
#[derive(Debug, Clone)]
pub struct PullPage {
    pub ops: Vec<EncryptedOp>,
    pub cursor: u64,
}

/// Push/pull/blob contract toward a sync transport.
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Append operations to a vault's log.
    async fn push_operations(&self, vault_id: &VaultId, ops: Vec<EncryptedOp>) -> Result<()>;

    /// Pull up to `limit` operations starting at `cursor`.
    async fn pull_operations(
        &self,
        vault_id: &VaultId,
        cursor: u64,
        limit: usize,
    ) -> Result<PullPage>;

    /// Upload an encrypted blob.
    async fn upload_blob(&self, vault_id: &VaultId, blob_id: &str, data: Vec<u8>) -> Result<()>;

    /// Download an encrypted blob.
    async fn download_blob(&self, vault_id: &VaultId, blob_id: &str) -> Result<Vec<u8>>;

    /// Check whether a blob exists.
    async fn blob_exists(&self, vault_id: &VaultId, blob_id: &str) -> Result<bool>;

    /// Delete a blob.
    async fn delete_blob(&self, vault_id: &VaultId, blob_id: &str) -> Result<()>;
}

/// In-memory sync backend for tests.
#[derive(Default)]
pub struct MemorySyncBackend {
    ops: RwLock<HashMap<VaultId, Vec<EncryptedOp>>>,
    blobs: RwLock<HashMap<(VaultId, String), Vec<u8>>>,
}

impl MemorySyncBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SyncBackend for MemorySyncBackend {
    async fn push_operations(&self, vault_id: &VaultId, ops: Vec<EncryptedOp>) -> Result<()> {
        let mut log = self.ops.write().unwrap();
        log.entry(vault_id.clone()).or_default().extend(ops);
        Ok(())
    }

    async fn pull_operations(
        &self,
        vault_id: &VaultId,
        cursor: u64,
        limit: usize,
    ) -> Result<PullPage> {
        let log = self.ops.read().unwrap();
        let all = log.get(vault_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = (cursor as usize).min(all.len());
        let end = (start + limit).min(all.len());

        Ok(PullPage {
            ops: all[start..end].to_vec(),
            cursor: end as u64,
        })
    }

    async fn upload_blob(&self, vault_id: &VaultId, blob_id: &str, data: Vec<u8>) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap();
        blobs.insert((vault_id.clone(), blob_id.to_string()), data);
        Ok(())
    }

    async fn download_blob(&self, vault_id: &VaultId, blob_id: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().unwrap();
        blobs
            .get(&(vault_id.clone(), blob_id.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", blob_id)))
    }

    async fn blob_exists(&self, vault_id: &VaultId, blob_id: &str) -> Result<bool> {
        let blobs = self.blobs.read().unwrap();
        Ok(blobs.contains_key(&(vault_id.clone(), blob_id.to_string())))
    }

    async fn delete_blob(&self, vault_id: &VaultId, blob_id: &str) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap();
        blobs
            .remove(&(vault_id.clone(), blob_id.to_string()))
            .map(drop)
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", blob_id)))
    }
}
