//! Local filesystem backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::fs::FileSystem;
use quillvault_common::{Error, Result};

/// Local filesystem backend rooted at a workspace directory.
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Create a new local backend with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Invalid path
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Sync for constructor
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    /// Convert a workspace-relative path to a filesystem path.
    ///
    /// Rejects absolute paths and `..` components so a crafted path
    /// cannot escape the workspace root.
    fn to_fs_path(&self, path: &str) -> Result<PathBuf> {
        let mut fs_path = self.root.clone();
        for component in path.split('/') {
            if component.is_empty() {
                continue;
            }
            if component == ".." || component == "." {
                return Err(Error::InvalidInput(format!(
                    "Path component not allowed: {}",
                    component
                )));
            }
            fs_path.push(component);
        }
        Ok(fs_path)
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn name(&self) -> &str {
        "local"
    }

    async fn read_if_exists(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let fs_path = self.to_fs_path(path)?;

        match fs::read(&fs_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(&self, path: &str, data: &[u8]) -> Result<()> {
        let fs_path = self.to_fs_path(path)?;

        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Temp file in the same directory so the rename stays on one
        // filesystem and is atomic.
        let mut temp_path = fs_path.clone();
        let temp_name = format!(
            ".{}.{}.tmp",
            fs_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("write"),
            Uuid::new_v4()
        );
        temp_path.set_file_name(temp_name);

        fs::write(&temp_path, data).await?;

        if let Err(e) = fs::rename(&temp_path, &fs_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let fs_path = self.to_fs_path(path)?;
        Ok(fs_path.exists())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let fs_path = self.to_fs_path(path)?;

        match fs::remove_file(&fs_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("File not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_dir_all(&self, path: &str) -> Result<()> {
        let fs_path = self.to_fs_path(path)?;

        match fs::remove_dir_all(&fs_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp.path()).unwrap();

        fs.write_atomic("refs/notes.jsonl.enc", b"ciphertext")
            .await
            .unwrap();
        let read = fs.read_if_exists("refs/notes.jsonl.enc").await.unwrap();

        assert_eq!(read.as_deref(), Some(b"ciphertext".as_ref()));
    }

    #[tokio::test]
    async fn test_read_missing_returns_none() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp.path()).unwrap();

        assert!(fs.read_if_exists("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_whole_file() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp.path()).unwrap();

        fs.write_atomic("index", b"old-version-content").await.unwrap();
        fs.write_atomic("index", b"new").await.unwrap();

        assert_eq!(
            fs.read_if_exists("index").await.unwrap().as_deref(),
            Some(b"new".as_ref())
        );
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp.path()).unwrap();

        fs.write_atomic("file", b"data").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec!["file"]);
    }

    #[tokio::test]
    async fn test_parent_traversal_rejected() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp.path()).unwrap();

        assert!(fs.write_atomic("../escape", b"data").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_file() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp.path()).unwrap();

        fs.write_atomic("file", b"data").await.unwrap();
        fs.remove_file("file").await.unwrap();

        assert!(!fs.exists("file").await.unwrap());
        assert!(fs.remove_file("file").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_dir_all() {
        let temp = TempDir::new().unwrap();
        let fs = LocalFileSystem::new(temp.path()).unwrap();

        fs.write_atomic("vault-a/objects/ab/cdef", b"blob").await.unwrap();
        fs.remove_dir_all("vault-a").await.unwrap();

        assert!(!fs.exists("vault-a").await.unwrap());
        // Removing again is a no-op
        fs.remove_dir_all("vault-a").await.unwrap();
    }
}
