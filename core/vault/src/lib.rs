//! Vault engine for QuillVault.
//!
//! This module composes the crypto, storage and index layers into the
//! workspace and vault session surface the application consumes:
//! - Workspace creation, unlock (password or enrolled device), password
//!   change and lock
//! - Vault lifecycle: create, open, delete, backed by the keyring
//! - Note operations: save, load, delete, search, notebooks
//!
//! # Architecture
//! The engine sits between the user interface and the filesystem
//! backend, handling all encryption/decryption transparently. Every
//! service object is constructed explicitly and passed down from the
//! composition root; there are no ambient globals.

pub mod session;
pub mod workspace;

pub use session::{Note, VaultSession};
pub use workspace::{VaultMeta, Workspace, WorkspaceConfig, WorkspaceSession};
