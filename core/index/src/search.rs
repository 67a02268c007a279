//! Blind-token search index.
//!
//! Tokens are keyed BLAKE2b hashes of normalized words under the vault's
//! search index key, so the persisted index reveals nothing about note
//! content without the key. Exact-token match only; no substring or
//! fuzzy matching, so the index leaks no more structure than necessary.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use quillvault_common::{Error, NoteId, Result};
use quillvault_crypto::{aead, blind_token, SearchIndexKey};
use quillvault_storage::FileSystem;

/// On-disk location of the search index, relative to the vault root.
pub const SEARCH_INDEX_FILE: &str = "refs/search-index.enc";

const SEARCH_AAD: &[u8] = b"vault.refs.search.v1";

/// Minimum token length; shorter tokens are dropped during tokenization.
const MIN_TOKEN_LEN: usize = 2;

/// Normalize text into search tokens.
///
/// Pipeline: lowercase, strip non-word characters, split on whitespace,
/// drop tokens shorter than two characters, deduplicate.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

#[derive(Serialize, Deserialize, Default)]
struct PostingsDoc {
    version: u32,
    /// hex blind token -> note ids
    postings: HashMap<String, BTreeSet<NoteId>>,
}

const POSTINGS_VERSION: u32 = 1;

/// Keyed-hash token index mapping blind token -> set of note ids.
///
/// Vault-session-scoped, like the metadata index: cleared on lock,
/// reloaded on unlock.
pub struct BlindSearchIndex {
    fs: Arc<dyn FileSystem>,
    vault_root: String,
    key: SearchIndexKey,
    postings: HashMap<String, BTreeSet<NoteId>>,
}

impl BlindSearchIndex {
    /// Load the search index for a vault, decrypting it if present.
    ///
    /// Missing file means an empty index; decrypt or parse failure is
    /// `CorruptedIndex`, surfaced to the caller without retry.
    pub async fn load(
        fs: Arc<dyn FileSystem>,
        vault_root: impl Into<String>,
        key: SearchIndexKey,
    ) -> Result<Self> {
        let vault_root = vault_root.into();
        let path = format!("{}/{}", vault_root, SEARCH_INDEX_FILE);

        let postings = match fs.read_if_exists(&path).await? {
            None => HashMap::new(),
            Some(sealed) => {
                let plaintext =
                    aead::decrypt(key.as_bytes(), &sealed, SEARCH_AAD).map_err(|e| match e {
                        Error::AuthenticationFailure => {
                            Error::CorruptedIndex(format!("Search index failed to decrypt: {}", path))
                        }
                        other => other,
                    })?;
                let doc: PostingsDoc = serde_json::from_slice(&plaintext).map_err(|e| {
                    Error::CorruptedIndex(format!("Search index failed to parse: {}", e))
                })?;
                if doc.version != POSTINGS_VERSION {
                    return Err(Error::CorruptedIndex(format!(
                        "Unsupported search index version: {}",
                        doc.version
                    )));
                }
                doc.postings
            }
        };

        Ok(Self {
            fs,
            vault_root,
            key,
            postings,
        })
    }

    async fn persist(&self) -> Result<()> {
        let doc = PostingsDoc {
            version: POSTINGS_VERSION,
            postings: self.postings.clone(),
        };
        let plaintext = serde_json::to_vec(&doc)
            .map_err(|e| Error::Serialization(format!("Search index serialization failed: {}", e)))?;
        let sealed = aead::encrypt(self.key.as_bytes(), &plaintext, SEARCH_AAD)?;
        self.fs
            .write_atomic(&format!("{}/{}", self.vault_root, SEARCH_INDEX_FILE), &sealed)
            .await
    }

    fn token_hex(&self, word: &str) -> Result<String> {
        Ok(hex::encode(blind_token(&self.key, word)?))
    }

    /// Index a note's text, replacing any previous postings for it.
    pub async fn index_note(&mut self, id: &NoteId, text: &str) -> Result<()> {
        self.remove_postings(id);

        for word in tokenize(text) {
            let token = self.token_hex(&word)?;
            self.postings.entry(token).or_default().insert(id.clone());
        }

        debug!(note = %id, "Note indexed");
        self.persist().await
    }

    /// Remove a note from all postings.
    pub async fn remove_note(&mut self, id: &NoteId) -> Result<()> {
        self.remove_postings(id);
        self.persist().await
    }

    fn remove_postings(&mut self, id: &NoteId) {
        self.postings.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
    }

    /// Search for notes containing every token of the query.
    ///
    /// AND semantics: the result is the intersection of the posting sets
    /// of all query tokens. If any token has no postings the result is
    /// empty; there are no partial matches. A query with no usable
    /// tokens also returns the empty set.
    pub fn search(&self, query: &str) -> Result<BTreeSet<NoteId>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut result: Option<BTreeSet<NoteId>> = None;
        for word in tokens {
            let token = self.token_hex(&word)?;
            let Some(ids) = self.postings.get(&token) else {
                return Ok(BTreeSet::new());
            };
            result = Some(match result {
                None => ids.clone(),
                Some(acc) => acc.intersection(ids).cloned().collect(),
            });
            if result.as_ref().is_some_and(BTreeSet::is_empty) {
                return Ok(BTreeSet::new());
            }
        }

        Ok(result.unwrap_or_default())
    }

    /// Drop all in-memory postings. Called on lock.
    pub fn clear(&mut self) {
        self.postings.clear();
    }
}
