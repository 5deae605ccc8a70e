//! # QFile Core
//!
//! Core library for QFile - per-user asymmetric file encryption.
//!
//! Each user owns an X25519 key pair whose private half is sealed under a
//! passphrase. Files are encrypted for a recipient's public key, stored as
//! opaque blobs under random names, and decrypted only by the recipient.
//!
//! ## Architecture
//!
//! - **crypto**: Key generation, container format and the streaming engine
//! - **auth**: Passphrase hashing and verification
//! - **storage**: Key store, file registry and blob store traits and backends
//! - **service**: The three user-facing operations
//! - **pool**: Bounded async execution with timeouts and cancellation
//! - **config**: Tunables for the service

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod pool;
pub mod service;
pub mod storage;

pub use age::secrecy::{ExposeSecret, SecretString};
pub use auth::{Argon2Verifier, PassphraseVerifier};
pub use config::{HashingConfig, ServiceConfig};
pub use crypto::{AgeEngine, CancelFlag, CryptoEngine, PublicKey};
pub use error::{QfeError, Result};
pub use pool::WorkerPool;
pub use service::{DecryptedFile, FileEncryptionService, KeyPairInfo};
pub use storage::{
    BlobStore, EncryptedFile, FileRegistry, KeyPair, KeyStore, LocalBlobStore, MemoryBlobStore,
    MemoryStore, SqliteStore,
};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
