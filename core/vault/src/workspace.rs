//! Workspace lifecycle: configuration, keyring, unlock paths.
//!
//! A workspace is one directory tree holding the plaintext config file,
//! the sealed keyring, and one subdirectory per vault. The keyring is
//! the single source of truth for which vaults exist.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use zeroize::Zeroizing;

use quillvault_common::{Error, Result, SecretBytes, VaultId};
use quillvault_crypto::{
    aead, derive_master_key, subkey::DEVICE_UNLOCK_AAD, KdfParams, Keyring, MasterUnlockKey, Salt,
    VaultKey, KEY_LENGTH,
};
use quillvault_identity::SecureKeystore;
use quillvault_storage::FileSystem;

use crate::session::VaultSession;

/// Plaintext workspace descriptor in the workspace root.
pub const WORKSPACE_FILENAME: &str = ".quillvault-workspace";

/// Sealed keyring in the workspace root.
pub const KEYRING_FILENAME: &str = ".quillvault-keyring.enc";

/// Plaintext per-vault descriptor inside each vault directory.
pub const VAULT_META_FILENAME: &str = ".vault-meta.json";

/// Workspace format version for migration support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceVersion {
    pub major: u32,
    pub minor: u32,
}

impl WorkspaceVersion {
    /// Current workspace format version.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Check if this version is compatible with the current version.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

/// Plaintext workspace configuration.
///
/// Holds only non-secret derivation inputs: format version, the KDF
/// salt and parameters, and a creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: WorkspaceVersion,
    pub salt: Salt,
    pub kdf_params: KdfParams,
    pub created_at: DateTime<Utc>,
}

impl WorkspaceConfig {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Plaintext, non-secret vault descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultMeta {
    pub id: VaultId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

fn device_unlock_path(device_id: &str) -> String {
    format!(".quillvault-device-{}.enc", device_id)
}

fn device_keystore_entry(device_id: &str) -> String {
    format!("quillvault.device-unlock.{}", device_id)
}

/// Derive the MUK off the async executor; Argon2id is CPU-bound.
async fn derive_muk(
    password: &[u8],
    salt: &Salt,
    params: &KdfParams,
) -> Result<MasterUnlockKey> {
    let password = Zeroizing::new(password.to_vec());
    let salt = salt.clone();
    let params = params.clone();

    tokio::task::spawn_blocking(move || derive_master_key(&password, &salt, &params))
        .await
        .map_err(|e| Error::Crypto(format!("Key derivation task failed: {}", e)))?
}

/// An on-disk workspace, not yet unlocked.
pub struct Workspace {
    fs: Arc<dyn FileSystem>,
    config: WorkspaceConfig,
}

impl Workspace {
    /// Create a new workspace at the filesystem root.
    ///
    /// # Postconditions
    /// - Config and an empty sealed keyring are persisted
    /// - Returns an unlocked session
    ///
    /// # Errors
    /// - `AlreadyExists` if the root already holds a workspace
    /// - `WeakParameters` if the KDF params are below the floor
    pub async fn create(
        fs: Arc<dyn FileSystem>,
        password: &[u8],
        kdf_params: KdfParams,
    ) -> Result<WorkspaceSession> {
        if fs.exists(WORKSPACE_FILENAME).await? {
            return Err(Error::AlreadyExists(
                "Workspace already initialized".to_string(),
            ));
        }

        let config = WorkspaceConfig {
            version: WorkspaceVersion::CURRENT,
            salt: Salt::generate(),
            kdf_params,
            created_at: Utc::now(),
        };

        let muk = derive_muk(password, &config.salt, &config.kdf_params).await?;

        let keyring = Keyring::new();
        let sealed = keyring.seal(&muk)?;
        fs.write_atomic(KEYRING_FILENAME, &sealed).await?;
        fs.write_atomic(WORKSPACE_FILENAME, &config.to_bytes()?).await?;

        info!("Workspace created");

        Ok(WorkspaceSession {
            fs,
            config,
            muk: Some(muk),
            keyring,
        })
    }

    /// Open an existing workspace.
    ///
    /// # Errors
    /// - `NotFound` if no workspace exists at the root
    /// - Incompatible format version
    pub async fn open(fs: Arc<dyn FileSystem>) -> Result<Self> {
        let bytes = fs
            .read_if_exists(WORKSPACE_FILENAME)
            .await?
            .ok_or_else(|| Error::NotFound("Workspace not initialized".to_string()))?;
        let config = WorkspaceConfig::from_bytes(&bytes)?;

        if !config.version.is_compatible() {
            return Err(Error::InvalidInput(format!(
                "Incompatible workspace version: {}.{}",
                config.version.major, config.version.minor
            )));
        }

        Ok(Self { fs, config })
    }

    /// Get the workspace configuration.
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Unlock with the workspace password.
    ///
    /// A wrong password fails with `AuthenticationFailure` on the
    /// keyring decrypt, before any vault key is ever exposed.
    pub async fn unlock(&self, password: &[u8]) -> Result<WorkspaceSession> {
        let muk = derive_muk(password, &self.config.salt, &self.config.kdf_params).await?;
        self.unlock_with_muk(muk).await
    }

    /// Unlock with an enrolled device instead of the password.
    ///
    /// The device secret comes from the platform keystore and unwraps
    /// the MUK persisted at enrollment time.
    ///
    /// # Errors
    /// - `NotFound` if the device was never enrolled here
    /// - `AuthenticationFailure` if the wrapped MUK was tampered with,
    ///   or is stale after a password change
    pub async fn unlock_with_device(
        &self,
        keystore: &dyn SecureKeystore,
        device_id: &str,
    ) -> Result<WorkspaceSession> {
        let secret = keystore
            .retrieve(&device_keystore_entry(device_id))?
            .ok_or_else(|| Error::NotFound(format!("Device not enrolled: {}", device_id)))?;

        let wrapped = self
            .fs
            .read_if_exists(&device_unlock_path(device_id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("No device unlock file: {}", device_id)))?;

        let muk_bytes = SecretBytes::new(aead::decrypt(
            secret.as_bytes(),
            &wrapped,
            DEVICE_UNLOCK_AAD,
        )?);
        let arr: [u8; KEY_LENGTH] = muk_bytes
            .as_bytes()
            .try_into()
            .map_err(|_| Error::Crypto("Device-wrapped MUK has wrong length".to_string()))?;

        self.unlock_with_muk(MasterUnlockKey::from_bytes(arr)).await
    }

    async fn unlock_with_muk(&self, muk: MasterUnlockKey) -> Result<WorkspaceSession> {
        let sealed = self
            .fs
            .read_if_exists(KEYRING_FILENAME)
            .await?
            .ok_or_else(|| Error::NotFound("Keyring not found".to_string()))?;

        let keyring = Keyring::open(&muk, &sealed)?;
        debug!(vaults = keyring.len(), "Workspace unlocked");

        Ok(WorkspaceSession {
            fs: self.fs.clone(),
            config: self.config.clone(),
            muk: Some(muk),
            keyring,
        })
    }
}

/// An unlocked workspace holding the MUK and the open keyring.
///
/// Workspace-scoped mutable state; callers serialize mutations. `lock`
/// synchronously clears all key material.
pub struct WorkspaceSession {
    fs: Arc<dyn FileSystem>,
    config: WorkspaceConfig,
    muk: Option<MasterUnlockKey>,
    keyring: Keyring,
}

impl WorkspaceSession {
    fn muk(&self) -> Result<&MasterUnlockKey> {
        self.muk.as_ref().ok_or(Error::Locked)
    }

    /// Whether the session has been locked.
    pub fn is_locked(&self) -> bool {
        self.muk.is_none()
    }

    /// Ids of all vaults in the keyring, in order.
    pub fn vault_ids(&self) -> Result<Vec<VaultId>> {
        self.muk()?;
        Ok(self.keyring.vault_ids())
    }

    async fn persist_keyring(&self) -> Result<()> {
        let sealed = self.keyring.seal(self.muk()?)?;
        self.fs.write_atomic(KEYRING_FILENAME, &sealed).await
    }

    /// Create a new vault with a random vault key.
    ///
    /// # Postconditions
    /// - The keyring holds the new key and is persisted
    /// - The vault directory holds a plaintext descriptor
    pub async fn create_vault(&mut self, name: &str) -> Result<VaultId> {
        self.muk()?;

        let vault_id = VaultId::generate();
        let vault_key = VaultKey::generate();

        self.keyring.insert(vault_id.clone(), vault_key)?;
        if let Err(e) = self.persist_keyring().await {
            // Keep the in-memory keyring consistent with disk
            let _ = self.keyring.remove(&vault_id);
            return Err(e);
        }

        let meta = VaultMeta {
            id: vault_id.clone(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let meta_bytes =
            serde_json::to_vec_pretty(&meta).map_err(|e| Error::Serialization(e.to_string()))?;
        self.fs
            .write_atomic(&format!("{}/{}", vault_id, VAULT_META_FILENAME), &meta_bytes)
            .await?;

        info!(vault = %vault_id, "Vault created");
        Ok(vault_id)
    }

    /// Open a vault session, loading its encrypted indexes.
    pub async fn open_vault(&self, vault_id: &VaultId) -> Result<VaultSession> {
        self.muk()?;
        let vault_key = self
            .keyring
            .get(vault_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Vault not found: {}", vault_id)))?;

        VaultSession::open(self.fs.clone(), vault_id.clone(), vault_key).await
    }

    /// Read a vault's plaintext descriptor.
    pub async fn vault_meta(&self, vault_id: &VaultId) -> Result<VaultMeta> {
        let bytes = self
            .fs
            .read_if_exists(&format!("{}/{}", vault_id, VAULT_META_FILENAME))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Vault meta not found: {}", vault_id)))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Delete a vault: its directory, then its keyring entry.
    ///
    /// The directory is removed first; if that fails the keyring stays
    /// in its pre-delete state. The reverse order could drop the only
    /// copy of the vault key while its data still exists.
    pub async fn delete_vault(&mut self, vault_id: &VaultId) -> Result<()> {
        self.muk()?;
        if !self.keyring.contains(vault_id) {
            return Err(Error::NotFound(format!("Vault not found: {}", vault_id)));
        }

        self.fs.remove_dir_all(vault_id.as_str()).await?;

        self.keyring.remove(vault_id)?;
        self.persist_keyring().await?;

        info!(vault = %vault_id, "Vault deleted");
        Ok(())
    }

    /// Change the workspace password.
    ///
    /// Verifies the old password in constant time against the session
    /// MUK, derives a new MUK from a fresh salt, and re-seals the
    /// keyring. Enrolled devices hold a wrapped copy of the old MUK and
    /// must re-enroll.
    pub async fn change_password(
        &mut self,
        old_password: &[u8],
        new_password: &[u8],
    ) -> Result<()> {
        let current = self.muk()?;

        let old_muk = derive_muk(old_password, &self.config.salt, &self.config.kdf_params).await?;
        if old_muk.as_bytes().ct_eq(current.as_bytes()).unwrap_u8() != 1 {
            return Err(Error::AuthenticationFailure);
        }

        let new_salt = Salt::generate();
        let new_muk = derive_muk(new_password, &new_salt, &self.config.kdf_params).await?;

        let sealed = self.keyring.seal(&new_muk)?;
        self.fs.write_atomic(KEYRING_FILENAME, &sealed).await?;

        self.config.salt = new_salt;
        self.fs
            .write_atomic(WORKSPACE_FILENAME, &self.config.to_bytes()?)
            .await?;

        self.muk = Some(new_muk);
        info!("Workspace password changed");
        Ok(())
    }

    /// Enroll a device for fast unlock.
    ///
    /// Generates a random 32-byte device secret, stores it in the
    /// platform keystore, and persists the MUK wrapped under it.
    pub async fn enroll_device(
        &self,
        keystore: &dyn SecureKeystore,
        device_id: &str,
    ) -> Result<()> {
        let muk = self.muk()?;

        let mut secret = [0u8; KEY_LENGTH];
        {
            use rand::RngCore;
            rand::rngs::OsRng.fill_bytes(&mut secret);
        }

        let wrapped = aead::encrypt(&secret, muk.as_bytes(), DEVICE_UNLOCK_AAD)?;

        keystore.store(
            &device_keystore_entry(device_id),
            SecretBytes::new(secret.to_vec()),
        )?;
        {
            use zeroize::Zeroize;
            secret.zeroize();
        }

        self.fs
            .write_atomic(&device_unlock_path(device_id), &wrapped)
            .await?;

        info!(device = %device_id, "Device enrolled for fast unlock");
        Ok(())
    }

    /// Remove a device's fast-unlock material.
    pub async fn revoke_device(
        &self,
        keystore: &dyn SecureKeystore,
        device_id: &str,
    ) -> Result<()> {
        keystore.delete(&device_keystore_entry(device_id))?;
        let path = device_unlock_path(device_id);
        if self.fs.exists(&path).await? {
            self.fs.remove_file(&path).await?;
        }
        info!(device = %device_id, "Device fast unlock revoked");
        Ok(())
    }

    /// Lock the workspace session.
    ///
    /// Synchronously clears the MUK and every vault key from memory
    /// before returning; all buffers zeroize on drop. No operation on
    /// this session succeeds afterwards.
    pub fn lock(&mut self) {
        self.muk.take();
        self.keyring.clear();
        info!("Workspace locked");
    }
}

impl Drop for WorkspaceSession {
    fn drop(&mut self) {
        self.muk.take();
        self.keyring.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillvault_identity::MemoryKeystore;
    use quillvault_storage::MemoryFileSystem;

    fn fs() -> Arc<MemoryFileSystem> {
        Arc::new(MemoryFileSystem::new())
    }

    #[tokio::test]
    async fn test_create_and_unlock() {
        let fs = fs();
        let session = Workspace::create(fs.clone(), b"correct-horse-battery-staple", KdfParams::moderate())
            .await
            .unwrap();
        assert!(!session.is_locked());
        drop(session);

        let workspace = Workspace::open(fs).await.unwrap();
        let reopened = workspace
            .unlock(b"correct-horse-battery-staple")
            .await
            .unwrap();
        assert!(reopened.vault_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_password_fails_on_keyring() {
        let fs = fs();
        Workspace::create(fs.clone(), b"correct-horse-battery-staple", KdfParams::moderate())
            .await
            .unwrap();

        let workspace = Workspace::open(fs).await.unwrap();
        assert!(matches!(
            workspace.unlock(b"wrong-password").await,
            Err(Error::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn test_double_create_rejected() {
        let fs = fs();
        Workspace::create(fs.clone(), b"pw-one-two-three", KdfParams::moderate())
            .await
            .unwrap();

        assert!(matches!(
            Workspace::create(fs, b"pw-one-two-three", KdfParams::moderate()).await,
            Err(Error::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_open_missing_workspace() {
        assert!(matches!(
            Workspace::open(fs()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_vault_persists_keyring() {
        let fs = fs();
        let mut session =
            Workspace::create(fs.clone(), b"pw-one-two-three", KdfParams::moderate())
                .await
                .unwrap();

        let vault_id = session.create_vault("Personal").await.unwrap();
        drop(session);

        let workspace = Workspace::open(fs).await.unwrap();
        let reopened = workspace.unlock(b"pw-one-two-three").await.unwrap();

        assert_eq!(reopened.vault_ids().unwrap(), vec![vault_id.clone()]);
        let meta = reopened.vault_meta(&vault_id).await.unwrap();
        assert_eq!(meta.name, "Personal");
    }

    #[tokio::test]
    async fn test_delete_vault_removes_both() {
        let fs = fs();
        let mut session =
            Workspace::create(fs.clone(), b"pw-one-two-three", KdfParams::moderate())
                .await
                .unwrap();

        let vault_id = session.create_vault("Scratch").await.unwrap();
        session.delete_vault(&vault_id).await.unwrap();

        assert!(session.vault_ids().unwrap().is_empty());
        assert!(!fs.exists(vault_id.as_str()).await.unwrap());
        assert!(session.delete_vault(&vault_id).await.is_err());
    }

    #[tokio::test]
    async fn test_change_password() {
        let fs = fs();
        let mut session =
            Workspace::create(fs.clone(), b"old-password-123", KdfParams::moderate())
                .await
                .unwrap();
        let vault_id = session.create_vault("Personal").await.unwrap();

        session
            .change_password(b"old-password-123", b"new-password-456")
            .await
            .unwrap();
        drop(session);

        let workspace = Workspace::open(fs).await.unwrap();
        assert!(matches!(
            workspace.unlock(b"old-password-123").await,
            Err(Error::AuthenticationFailure)
        ));

        let reopened = workspace.unlock(b"new-password-456").await.unwrap();
        assert_eq!(reopened.vault_ids().unwrap(), vec![vault_id]);
    }

    #[tokio::test]
    async fn test_change_password_wrong_old_rejected() {
        let fs = fs();
        let mut session =
            Workspace::create(fs.clone(), b"old-password-123", KdfParams::moderate())
                .await
                .unwrap();

        assert!(matches!(
            session.change_password(b"not-the-password", b"new-password-456").await,
            Err(Error::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn test_lock_blocks_operations() {
        let fs = fs();
        let mut session =
            Workspace::create(fs.clone(), b"pw-one-two-three", KdfParams::moderate())
                .await
                .unwrap();

        session.lock();

        assert!(session.is_locked());
        assert!(matches!(session.vault_ids(), Err(Error::Locked)));
        assert!(matches!(
            session.create_vault("Nope").await,
            Err(Error::Locked)
        ));
    }

    #[tokio::test]
    async fn test_device_enroll_and_fast_unlock() {
        let fs = fs();
        let keystore = MemoryKeystore::new();
        let mut session =
            Workspace::create(fs.clone(), b"pw-one-two-three", KdfParams::moderate())
                .await
                .unwrap();
        let vault_id = session.create_vault("Personal").await.unwrap();

        session.enroll_device(&keystore, "laptop-1").await.unwrap();
        drop(session);

        let workspace = Workspace::open(fs).await.unwrap();
        let fast = workspace
            .unlock_with_device(&keystore, "laptop-1")
            .await
            .unwrap();
        assert_eq!(fast.vault_ids().unwrap(), vec![vault_id]);

        // Unenrolled device fails
        assert!(matches!(
            workspace.unlock_with_device(&keystore, "laptop-2").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_device_revoke() {
        let fs = fs();
        let keystore = MemoryKeystore::new();
        let session =
            Workspace::create(fs.clone(), b"pw-one-two-three", KdfParams::moderate())
                .await
                .unwrap();

        session.enroll_device(&keystore, "laptop-1").await.unwrap();
        session.revoke_device(&keystore, "laptop-1").await.unwrap();

        let workspace = Workspace::open(fs).await.unwrap();
        assert!(workspace
            .unlock_with_device(&keystore, "laptop-1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stale_device_after_password_change() {
        let fs = fs();
        let keystore = MemoryKeystore::new();
        let mut session =
            Workspace::create(fs.clone(), b"old-password-123", KdfParams::moderate())
                .await
                .unwrap();

        session.enroll_device(&keystore, "laptop-1").await.unwrap();
        session
            .change_password(b"old-password-123", b"new-password-456")
            .await
            .unwrap();
        drop(session);

        // The device still unwraps the old MUK, which no longer opens
        // the re-sealed keyring.
        let workspace = Workspace::open(fs).await.unwrap();
        assert!(matches!(
            workspace.unlock_with_device(&keystore, "laptop-1").await,
            Err(Error::AuthenticationFailure)
        ));
    }
}
