//! In-memory filesystem backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::fs::FileSystem;
use quillvault_common::{Error, Result};

/// In-memory filesystem backend.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Writes are trivially atomic.
#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileSystem {
    /// Create a new empty memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(path: &str) -> String {
        path.split('/')
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_if_exists(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let files = self.files.read().unwrap();
        Ok(files.get(&Self::normalize(path)).cloned())
    }

    async fn write_atomic(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.write().unwrap();
        files.insert(Self::normalize(path), data.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let key = Self::normalize(path);
        let files = self.files.read().unwrap();
        Ok(files.contains_key(&key)
            || files.keys().any(|k| k.starts_with(&format!("{}/", key))))
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        let mut files = self.files.write().unwrap();
        files
            .remove(&Self::normalize(path))
            .map(drop)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }

    async fn remove_dir_all(&self, path: &str) -> Result<()> {
        let prefix = format!("{}/", Self::normalize(path));
        let mut files = self.files.write().unwrap();
        files.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}
