//! Vault session: note operations over one unlocked vault.
//!
//! A session owns the vault key and everything derived from it: the
//! search index key, the per-session content key cache, and the
//! decrypted in-memory indexes. Locking clears all of it synchronously;
//! the on-disk state is untouched.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use quillvault_common::{Error, NoteId, NotebookId, Result, VaultId};
use quillvault_crypto::{aead, subkey::VaultKeyDeriver, ContentKey, VaultKey};
use quillvault_identity::UserIdentity;
use quillvault_index::{BlindSearchIndex, MetadataIndex, NoteMetadata, Notebook};
use quillvault_storage::{ContentAddressedStore, FileSystem};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One decrypted note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
}

impl Note {
    /// Create a note with a fresh id.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: NoteId::generate(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// An unlocked vault.
///
/// Vault-session-scoped mutable state: only the owning session mutates
/// the caches and indexes, and callers serialize mutations per vault
/// (content-addressed blob writes are the one operation safe to race).
pub struct VaultSession {
    vault_id: VaultId,
    vault_key: Option<VaultKey>,
    content_keys: HashMap<NoteId, ContentKey>,
    objects: ContentAddressedStore,
    metadata: MetadataIndex,
    search: BlindSearchIndex,
}

impl VaultSession {
    /// Open a vault session: derive the search index key and load both
    /// encrypted indexes.
    ///
    /// # Errors
    /// - `CorruptedIndex` if either index fails to decrypt or parse;
    ///   fatal for this vault session
    pub(crate) async fn open(
        fs: Arc<dyn FileSystem>,
        vault_id: VaultId,
        vault_key: VaultKey,
    ) -> Result<Self> {
        let deriver = VaultKeyDeriver::new(&vault_key);
        let search_key = deriver.search_index_key()?;

        let metadata = MetadataIndex::load(
            fs.clone(),
            vault_id.as_str(),
            deriver.search_index_key()?,
        )
        .await?;
        let search = BlindSearchIndex::load(fs.clone(), vault_id.as_str(), search_key).await?;

        let objects = ContentAddressedStore::new(fs, vault_id.as_str());

        debug!(vault = %vault_id, notes = metadata.note_count(), "Vault session opened");

        Ok(Self {
            vault_id,
            vault_key: Some(vault_key),
            content_keys: HashMap::new(),
            objects,
            metadata,
            search,
        })
    }

    /// The vault this session belongs to.
    pub fn vault_id(&self) -> &VaultId {
        &self.vault_id
    }

    /// Whether the session has been locked.
    pub fn is_locked(&self) -> bool {
        self.vault_key.is_none()
    }

    fn vault_key(&self) -> Result<&VaultKey> {
        self.vault_key.as_ref().ok_or(Error::Locked)
    }

    /// Content key for a note, derived on first use and cached for the
    /// session.
    fn content_key(&mut self, note_id: &NoteId) -> Result<ContentKey> {
        if let Some(key) = self.content_keys.get(note_id) {
            return Ok(key.clone());
        }
        let key = VaultKeyDeriver::new(self.vault_key()?).content_key(note_id)?;
        self.content_keys.insert(note_id.clone(), key.clone());
        Ok(key)
    }

    /// The deterministic user identity for this vault.
    pub fn identity(&self) -> Result<UserIdentity> {
        UserIdentity::derive(self.vault_key()?)
    }

    /// Save a note: encrypt its serialized form bound to its id, write
    /// the blob content-addressed, and update both indexes.
    ///
    /// An existing note is superseded, never mutated in place; the old
    /// blob is left for the garbage collector.
    pub async fn save_note(&mut self, note: &Note) -> Result<()> {
        self.vault_key()?;

        let plaintext = serde_json::to_vec(note)
            .map_err(|e| Error::Serialization(format!("Note serialization failed: {}", e)))?;

        let content_key = self.content_key(&note.id)?;
        let ciphertext = aead::encrypt(content_key.as_bytes(), &plaintext, note.id.as_bytes())?;
        let content_hash = self.objects.write(&ciphertext).await?;

        let now = Utc::now();
        let meta = match self.metadata.note(&note.id) {
            Some(existing) => NoteMetadata {
                title: note.title.clone(),
                content_hash,
                updated_at: now,
                ..existing.clone()
            },
            None => NoteMetadata {
                id: note.id.clone(),
                notebook_id: None,
                title: note.title.clone(),
                content_hash,
                pinned: false,
                archived: false,
                created_at: now,
                updated_at: now,
            },
        };
        self.metadata.upsert_note(meta).await?;

        let text = format!("{} {}", note.title, note.content);
        self.search.index_note(&note.id, &text).await?;

        info!(vault = %self.vault_id, note = %note.id, "Note saved");
        Ok(())
    }

    /// Load and decrypt a note.
    ///
    /// # Errors
    /// - `NotFound` if the note is not in the metadata index
    /// - `AuthenticationFailure` if the blob does not belong to this
    ///   note id (substitution) or was tampered with
    pub async fn load_note(&mut self, note_id: &NoteId) -> Result<Note> {
        self.vault_key()?;

        let content_hash = self
            .metadata
            .note(note_id)
            .map(|m| m.content_hash)
            .ok_or_else(|| Error::NotFound(format!("Note not found: {}", note_id)))?;

        let ciphertext = self.objects.read(&content_hash).await?;
        let content_key = self.content_key(note_id)?;
        let plaintext = aead::decrypt(content_key.as_bytes(), &ciphertext, note_id.as_bytes())?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| Error::Serialization(format!("Note parse failed: {}", e)))
    }

    /// Note metadata, if indexed.
    pub fn note_meta(&self, note_id: &NoteId) -> Option<&NoteMetadata> {
        self.metadata.note(note_id)
    }

    /// All note metadata matching a predicate.
    pub fn notes_where(&self, predicate: impl Fn(&NoteMetadata) -> bool) -> Vec<&NoteMetadata> {
        self.metadata.notes_where(predicate)
    }

    /// Delete a note from both indexes.
    ///
    /// The content blob is deliberately left in place: it may still be
    /// referenced by in-flight sync state, and orphans are reclaimed by
    /// a separate collector.
    pub async fn delete_note(&mut self, note_id: &NoteId) -> Result<()> {
        self.vault_key()?;

        self.metadata.remove_note(note_id).await?;
        self.search.remove_note(note_id).await?;
        self.content_keys.remove(note_id);

        info!(vault = %self.vault_id, note = %note_id, "Note deleted");
        Ok(())
    }

    /// Exact-token search over the blind index. AND semantics across
    /// query tokens; ids are returned in stable order.
    pub fn search(&self, query: &str) -> Result<Vec<NoteId>> {
        self.vault_key()?;
        Ok(self.search.search(query)?.into_iter().collect())
    }

    /// Pin or unpin a note.
    pub async fn set_pinned(&mut self, note_id: &NoteId, pinned: bool) -> Result<()> {
        self.update_meta(note_id, |m| m.pinned = pinned).await
    }

    /// Archive or unarchive a note.
    pub async fn set_archived(&mut self, note_id: &NoteId, archived: bool) -> Result<()> {
        self.update_meta(note_id, |m| m.archived = archived).await
    }

    /// Move a note into a notebook, or out of all notebooks.
    pub async fn move_to_notebook(
        &mut self,
        note_id: &NoteId,
        notebook_id: Option<NotebookId>,
    ) -> Result<()> {
        if let Some(ref id) = notebook_id {
            if self.metadata.notebook(id).is_none() {
                return Err(Error::NotFound(format!("Notebook not found: {}", id)));
            }
        }
        self.update_meta(note_id, |m| m.notebook_id = notebook_id.clone())
            .await
    }

    async fn update_meta(
        &mut self,
        note_id: &NoteId,
        apply: impl FnOnce(&mut NoteMetadata),
    ) -> Result<()> {
        self.vault_key()?;
        let mut meta = self
            .metadata
            .note(note_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Note not found: {}", note_id)))?;
        apply(&mut meta);
        meta.updated_at = Utc::now();
        self.metadata.upsert_note(meta).await
    }

    /// Create a notebook.
    pub async fn create_notebook(&mut self, name: &str) -> Result<NotebookId> {
        self.vault_key()?;

        let notebook = Notebook {
            id: NotebookId::generate(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let id = notebook.id.clone();
        self.metadata.upsert_notebook(notebook).await?;
        Ok(id)
    }

    /// Delete a notebook; member notes fall back to no notebook.
    pub async fn delete_notebook(&mut self, notebook_id: &NotebookId) -> Result<()> {
        self.vault_key()?;

        let members: Vec<NoteId> = self
            .metadata
            .notes_where(|m| m.notebook_id.as_ref() == Some(notebook_id))
            .into_iter()
            .map(|m| m.id.clone())
            .collect();
        for note_id in members {
            self.update_meta(&note_id, |m| m.notebook_id = None).await?;
        }

        self.metadata.remove_notebook(notebook_id).await
    }

    /// All notebooks.
    pub fn notebooks(&self) -> Vec<&Notebook> {
        self.metadata.notebooks()
    }

    /// Lock the session.
    ///
    /// Synchronously clears the vault key, the content key cache and
    /// both in-memory indexes before returning. Every cleared buffer
    /// zeroizes; no operation on this session succeeds afterwards. The
    /// indexes are rebuilt from disk on the next unlock.
    pub fn lock(&mut self) {
        self.vault_key.take();
        self.content_keys.clear();
        self.metadata.clear();
        self.search.clear();
        info!(vault = %self.vault_id, "Vault session locked");
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        self.vault_key.take();
        self.content_keys.clear();
    }
}
