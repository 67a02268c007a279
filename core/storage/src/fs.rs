//! Filesystem contract definition.

use async_trait::async_trait;

use quillvault_common::Result;

/// The narrow read/write/atomic-write contract the engine consumes.
///
/// Paths are workspace-root-relative, `/`-separated strings. One
/// implementation exists per platform/environment and is selected at
/// construction time, never via runtime type inspection.
///
/// Everything written through this trait is either non-secret plaintext
/// (workspace config, vault metadata stubs) or AEAD ciphertext; the
/// backend never sees key material.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Get the backend name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Read a file, returning `None` if it does not exist.
    async fn read_if_exists(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write a file atomically.
    ///
    /// # Postconditions
    /// - A reader observes either the previous content or the full new
    ///   content, never a partial file (write-temp-then-rename)
    /// - Parent directories are created as needed
    async fn write_atomic(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Check whether a path exists.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Delete a file.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    async fn remove_file(&self, path: &str) -> Result<()>;

    /// Recursively delete a directory, if present.
    async fn remove_dir_all(&self, path: &str) -> Result<()>;
}
