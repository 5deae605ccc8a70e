//! Storage abstractions and implementations.
//!
//! - [`KeyStore`] and [`FileRegistry`] hold catalog records; [`SqliteStore`]
//!   persists both, [`MemoryStore`] keeps them in memory.
//! - [`BlobStore`] holds ciphertext; [`LocalBlobStore`] writes to a directory,
//!   [`MemoryBlobStore`] keeps bytes in memory.

pub mod blob;
pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use blob::LocalBlobStore;
pub use memory::{MemoryBlobStore, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::{BlobStore, FileRegistry, KeyStore, StagedBlob};
pub use types::{EncryptedFile, KeyPair};
