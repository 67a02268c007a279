//! Storage abstraction for QuillVault.
//!
//! This module provides the narrow filesystem contract the engine
//! consumes, one implementation per platform selected at construction
//! time, the content-addressed encrypted object store, and the opaque
//! sync backend contract.
//!
//! # Design Principles
//! - Backend isolation: no backend-specific logic in vault or crypto modules
//! - Async operations: all I/O operations are async
//! - The engine only ever hands ciphertext across these boundaries

pub mod fs;
pub mod local;
pub mod memory;
pub mod objects;
pub mod sync;

pub use fs::FileSystem;
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;
pub use objects::ContentAddressedStore;
pub use sync::{EncryptedOp, MemorySyncBackend, PullPage, SyncBackend};
