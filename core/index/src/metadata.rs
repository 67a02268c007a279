//! Encrypted metadata index for notes and notebooks.
//!
//! Metadata records are plaintext-shaped structs that only ever touch
//! disk serialized as JSONL and sealed inside an AEAD envelope under the
//! vault's search index key. The index is loaded once per session and
//! persisted wholesale on every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use quillvault_common::{Error, NoteId, NotebookId, Result};
use quillvault_crypto::{aead, ObjectHash, SearchIndexKey};
use quillvault_storage::FileSystem;

/// On-disk location of the notes index, relative to the vault root.
pub const NOTES_INDEX_FILE: &str = "refs/notes.jsonl.enc";

/// On-disk location of the notebooks index, relative to the vault root.
pub const NOTEBOOKS_INDEX_FILE: &str = "refs/notebooks.jsonl.enc";

/// Binds each index ciphertext to the file it belongs in.
const NOTES_AAD: &[u8] = b"vault.refs.notes.v1";
const NOTEBOOKS_AAD: &[u8] = b"vault.refs.notebooks.v1";

/// Metadata for one note. The content itself lives in the object store,
/// referenced by content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub id: NoteId,
    pub notebook_id: Option<NotebookId>,
    pub title: String,
    pub content_hash: ObjectHash,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata for one notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub id: NotebookId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory view of a vault's metadata, backed by two encrypted JSONL
/// files. Vault-session-scoped: invalidated entirely on lock and rebuilt
/// on the next unlock. Callers serialize mutations per vault.
pub struct MetadataIndex {
    fs: Arc<dyn FileSystem>,
    vault_root: String,
    key: SearchIndexKey,
    notes: HashMap<NoteId, NoteMetadata>,
    notebooks: HashMap<NotebookId, Notebook>,
}

impl MetadataIndex {
    /// Load the index for a vault, decrypting both files if present.
    ///
    /// A missing file means an empty index (fresh vault). A file that
    /// fails to decrypt or parse is `CorruptedIndex`: fatal for the
    /// session, never partially recovered, since guessing at a corrupted
    /// encrypted index risks silently dropping notes.
    pub async fn load(
        fs: Arc<dyn FileSystem>,
        vault_root: impl Into<String>,
        key: SearchIndexKey,
    ) -> Result<Self> {
        let vault_root = vault_root.into();

        let notes = Self::load_records::<NoteMetadata>(
            &*fs,
            &format!("{}/{}", vault_root, NOTES_INDEX_FILE),
            &key,
            NOTES_AAD,
        )
        .await?
        .into_iter()
        .map(|m| (m.id.clone(), m))
        .collect();

        let notebooks = Self::load_records::<Notebook>(
            &*fs,
            &format!("{}/{}", vault_root, NOTEBOOKS_INDEX_FILE),
            &key,
            NOTEBOOKS_AAD,
        )
        .await?
        .into_iter()
        .map(|n| (n.id.clone(), n))
        .collect();

        Ok(Self {
            fs,
            vault_root,
            key,
            notes,
            notebooks,
        })
    }

    async fn load_records<T: serde::de::DeserializeOwned>(
        fs: &dyn FileSystem,
        path: &str,
        key: &SearchIndexKey,
        aad: &[u8],
    ) -> Result<Vec<T>> {
        let Some(sealed) = fs.read_if_exists(path).await? else {
            return Ok(Vec::new());
        };

        let plaintext = aead::decrypt(key.as_bytes(), &sealed, aad).map_err(|e| match e {
            Error::AuthenticationFailure => {
                Error::CorruptedIndex(format!("Index failed to decrypt: {}", path))
            }
            other => other,
        })?;

        let text = String::from_utf8(plaintext)
            .map_err(|_| Error::CorruptedIndex(format!("Index is not valid UTF-8: {}", path)))?;

        let mut records = Vec::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|e| {
                Error::CorruptedIndex(format!("Index line failed to parse: {} ({})", path, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    async fn persist_records<T: Serialize>(
        &self,
        path: &str,
        records: Vec<&T>,
        aad: &[u8],
    ) -> Result<()> {
        let mut lines = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| Error::Serialization(format!("Index serialization failed: {}", e)))?;
            lines.push_str(&line);
            lines.push('\n');
        }

        let sealed = aead::encrypt(self.key.as_bytes(), lines.as_bytes(), aad)?;
        self.fs.write_atomic(path, &sealed).await
    }

    async fn persist_notes(&self) -> Result<()> {
        // Sort for a stable on-disk order
        let mut records: Vec<&NoteMetadata> = self.notes.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        self.persist_records(
            &format!("{}/{}", self.vault_root, NOTES_INDEX_FILE),
            records,
            NOTES_AAD,
        )
        .await
    }

    async fn persist_notebooks(&self) -> Result<()> {
        let mut records: Vec<&Notebook> = self.notebooks.values().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        self.persist_records(
            &format!("{}/{}", self.vault_root, NOTEBOOKS_INDEX_FILE),
            records,
            NOTEBOOKS_AAD,
        )
        .await
    }

    /// Insert or update a note record and persist the index.
    pub async fn upsert_note(&mut self, meta: NoteMetadata) -> Result<()> {
        self.notes.insert(meta.id.clone(), meta);
        self.persist_notes().await
    }

    /// Get a note record.
    pub fn note(&self, id: &NoteId) -> Option<&NoteMetadata> {
        self.notes.get(id)
    }

    /// Remove a note record and persist the index.
    ///
    /// # Errors
    /// - `NotFound` if the note is not indexed
    pub async fn remove_note(&mut self, id: &NoteId) -> Result<()> {
        if self.notes.remove(id).is_none() {
            return Err(Error::NotFound(format!("Note not found: {}", id)));
        }
        debug!(note = %id, "Note removed from metadata index");
        self.persist_notes().await
    }

    /// All notes matching a predicate.
    pub fn notes_where(&self, predicate: impl Fn(&NoteMetadata) -> bool) -> Vec<&NoteMetadata> {
        self.notes.values().filter(|m| predicate(m)).collect()
    }

    /// Number of indexed notes.
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Insert or update a notebook and persist the index.
    pub async fn upsert_notebook(&mut self, notebook: Notebook) -> Result<()> {
        self.notebooks.insert(notebook.id.clone(), notebook);
        self.persist_notebooks().await
    }

    /// Get a notebook.
    pub fn notebook(&self, id: &NotebookId) -> Option<&Notebook> {
        self.notebooks.get(id)
    }

    /// Remove a notebook and persist the index. Notes keep their
    /// (now dangling) notebook reference; reassignment is a caller
    /// concern.
    ///
    /// # Errors
    /// - `NotFound` if the notebook is not indexed
    pub async fn remove_notebook(&mut self, id: &NotebookId) -> Result<()> {
        if self.notebooks.remove(id).is_none() {
            return Err(Error::NotFound(format!("Notebook not found: {}", id)));
        }
        self.persist_notebooks().await
    }

    /// All notebooks.
    pub fn notebooks(&self) -> Vec<&Notebook> {
        self.notebooks.values().collect()
    }

    /// Drop all in-memory records. Called on lock; the on-disk files are
    /// untouched.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.notebooks.clear();
    }
}
