//! Storage trait definitions.
//!
//! The service talks to three independent stores: key pairs, file metadata,
//! and ciphertext blobs. Each trait is small enough to back with a database,
//! an object store, or plain memory.

use std::io::{Read, Write};

use super::types::{EncryptedFile, KeyPair};
use crate::error::Result;

/// Persists per-user key pairs.
///
/// Usernames and explicit recipient ids share one address space. A username
/// always addresses its own key pair; an explicit recipient id must not equal
/// another key pair's recipient id or an existing username.
///
/// Implementations must make `save` an atomic check-and-insert: two
/// concurrent saves for the same username (or recipient id) must not both
/// succeed.
pub trait KeyStore: Send + Sync {
    /// Look up a key pair by the identity that owns it.
    fn find_by_username(&self, username: &str) -> Result<Option<KeyPair>>;

    /// Look up a key pair by its explicit recipient id.
    fn find_by_recipient(&self, recipient_id: &str) -> Result<Option<KeyPair>>;

    /// Insert a new key pair.
    ///
    /// # Errors
    ///
    /// Returns `QfeError::DuplicateKey` if the username is taken, or if the
    /// explicit recipient id is already a recipient id or a username.
    fn save(&self, key_pair: &KeyPair) -> Result<()>;

    /// Delete a key pair. Returns whether a record existed.
    fn remove(&self, username: &str) -> Result<bool>;
}

/// Persists metadata about encrypted files.
pub trait FileRegistry: Send + Sync {
    fn find_by_unique_filename(&self, unique_filename: &str) -> Result<Option<EncryptedFile>>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// Returns `QfeError::DuplicateFilename` if the unique filename is taken.
    fn save(&self, file: &EncryptedFile) -> Result<()>;

    /// Delete a record. Returns whether a record existed.
    fn remove(&self, unique_filename: &str) -> Result<bool>;

    /// Files encrypted by `owner`, newest first.
    fn list_by_owner(&self, owner: &str) -> Result<Vec<EncryptedFile>>;
}

/// Byte storage for ciphertext blobs, addressed by flat keys.
pub trait BlobStore: Send + Sync {
    /// Start writing a blob that is invisible until committed.
    fn stage(&self) -> Result<Box<dyn StagedBlob>>;

    /// Open a committed blob for streaming reads.
    ///
    /// Returns `QfeError::NotFound` if the key does not exist.
    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>>;
}

/// A blob being written. Dropping it without committing discards the data.
pub trait StagedBlob: Write + Send {
    /// Publish the blob under `key`.
    ///
    /// # Errors
    ///
    /// Returns `QfeError::DuplicateFilename` if `key` already exists; the
    /// existing blob is left untouched.
    fn commit(self: Box<Self>, key: &str) -> Result<()>;
}

/// Reject keys that could escape a flat namespace.
pub fn validate_blob_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.starts_with('.')
        || key.contains(['/', '\\', '\0'])
    {
        return Err(crate::error::QfeError::InvalidArgument(format!(
            "Invalid blob key: {:?}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traits_are_object_safe() {
        fn _accepts(_k: &dyn KeyStore, _f: &dyn FileRegistry, _b: &dyn BlobStore) {}
    }

    #[test]
    fn test_blob_key_validation() {
        assert!(validate_blob_key("abc123.enc").is_ok());
        for bad in ["", ".", "..", ".hidden", "a/b", "a\\b", "../etc/passwd", "nul\0"] {
            assert!(validate_blob_key(bad).is_err(), "{:?} was accepted", bad);
        }
    }
}
