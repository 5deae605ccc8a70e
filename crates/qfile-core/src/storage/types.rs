//! Core data types for the storage layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crypto::{PublicKey, SealedPrivateKey};

/// A user's key pair and the metadata needed to use it.
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// Identity owning this key pair (unique)
    pub username: String,

    /// Extra name others may address files to (unique, never another
    /// identity's username). `None` means the username is the only address.
    pub recipient_id: Option<String>,

    /// One-way hash of the passphrase, never the passphrase itself
    pub passphrase_hash: String,

    /// Public key handle
    pub public_key: PublicKey,

    /// Private key handle (sealed under the passphrase)
    pub private_key: SealedPrivateKey,

    /// When this key pair was created
    pub created_at: DateTime<Utc>,
}

impl KeyPair {
    /// Name this key pair is advertised under.
    pub fn address(&self) -> &str {
        self.recipient_id.as_deref().unwrap_or(&self.username)
    }
}

/// Metadata about an encrypted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptedFile {
    /// Random, globally unique name; also the file's public reference
    pub unique_filename: String,

    /// User-facing name of the plaintext
    pub original_name: String,

    /// Identity that encrypted the file
    pub owner_username: String,

    /// Address the file was encrypted to, as given by the owner
    pub recipient_id: String,

    /// Blob key of the ciphertext
    pub storage_path: String,

    /// Plaintext length in bytes
    pub size_bytes: u64,

    /// When this file was encrypted
    pub created_at: DateTime<Utc>,
}

impl EncryptedFile {
    /// Blob key for a unique filename.
    pub fn storage_path_for(unique_filename: &str) -> String {
        format!("{}.enc", unique_filename)
    }
}
