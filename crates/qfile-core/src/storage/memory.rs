//! In-memory stores (for testing and embedding).
//!
//! Thread-safe via `RwLock`. Nothing is persisted.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::traits::{validate_blob_key, BlobStore, FileRegistry, KeyStore, StagedBlob};
use super::types::{EncryptedFile, KeyPair};
use crate::error::{QfeError, Result};

fn poisoned() -> QfeError {
    QfeError::Storage("In-memory store lock poisoned".to_string())
}

#[derive(Default)]
struct Catalog {
    key_pairs: HashMap<String, KeyPair>,
    files: HashMap<String, EncryptedFile>,
}

/// In-memory [`KeyStore`] and [`FileRegistry`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Catalog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Catalog>> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Catalog>> {
        self.inner.write().map_err(|_| poisoned())
    }

    /// Number of stored key pairs
    pub fn key_pair_count(&self) -> usize {
        self.read().map(|c| c.key_pairs.len()).unwrap_or(0)
    }

    /// Number of stored file records
    pub fn file_count(&self) -> usize {
        self.read().map(|c| c.files.len()).unwrap_or(0)
    }
}

impl KeyStore for MemoryStore {
    fn find_by_username(&self, username: &str) -> Result<Option<KeyPair>> {
        Ok(self.read()?.key_pairs.get(username).cloned())
    }

    fn find_by_recipient(&self, recipient_id: &str) -> Result<Option<KeyPair>> {
        Ok(self
            .read()?
            .key_pairs
            .values()
            .find(|kp| kp.recipient_id.as_deref() == Some(recipient_id))
            .cloned())
    }

    fn save(&self, key_pair: &KeyPair) -> Result<()> {
        let mut catalog = self.write()?;
        if let Some(recipient) = &key_pair.recipient_id {
            let taken = catalog.key_pairs.contains_key(recipient)
                || catalog
                    .key_pairs
                    .values()
                    .any(|kp| kp.recipient_id.as_ref() == Some(recipient));
            if taken {
                return Err(QfeError::DuplicateKey(recipient.clone()));
            }
        }
        match catalog.key_pairs.entry(key_pair.username.clone()) {
            Entry::Occupied(_) => Err(QfeError::DuplicateKey(key_pair.username.clone())),
            Entry::Vacant(slot) => {
                slot.insert(key_pair.clone());
                Ok(())
            }
        }
    }

    fn remove(&self, username: &str) -> Result<bool> {
        Ok(self.write()?.key_pairs.remove(username).is_some())
    }
}

impl FileRegistry for MemoryStore {
    fn find_by_unique_filename(&self, unique_filename: &str) -> Result<Option<EncryptedFile>> {
        Ok(self.read()?.files.get(unique_filename).cloned())
    }

    fn save(&self, file: &EncryptedFile) -> Result<()> {
        match self.write()?.files.entry(file.unique_filename.clone()) {
            Entry::Occupied(_) => Err(QfeError::DuplicateFilename(file.unique_filename.clone())),
            Entry::Vacant(slot) => {
                slot.insert(file.clone());
                Ok(())
            }
        }
    }

    fn remove(&self, unique_filename: &str) -> Result<bool> {
        Ok(self.write()?.files.remove(unique_filename).is_some())
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<EncryptedFile>> {
        let mut files: Vec<EncryptedFile> = self
            .read()?
            .files
            .values()
            .filter(|f| f.owner_username == owner)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(files)
    }
}

type Blobs = Arc<RwLock<HashMap<String, Vec<u8>>>>;

/// In-memory [`BlobStore`].
#[derive(Default, Clone)]
pub struct MemoryBlobStore {
    blobs: Blobs,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed blobs
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of a committed blob
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().ok()?.get(key).cloned()
    }

    /// Overwrite a committed blob in place (used to simulate tampering)
    pub fn replace(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned())?;
        match blobs.get_mut(key) {
            Some(existing) => {
                *existing = data;
                Ok(())
            }
            None => Err(QfeError::NotFound(format!("Blob {}", key))),
        }
    }
}

struct MemoryStagedBlob {
    buf: Vec<u8>,
    blobs: Blobs,
}

impl Write for MemoryStagedBlob {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StagedBlob for MemoryStagedBlob {
    fn commit(self: Box<Self>, key: &str) -> Result<()> {
        validate_blob_key(key)?;
        let MemoryStagedBlob { buf, blobs } = *self;
        let mut blobs = blobs.write().map_err(|_| poisoned())?;
        match blobs.entry(key.to_string()) {
            Entry::Occupied(_) => Err(QfeError::DuplicateFilename(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(buf);
                Ok(())
            }
        }
    }
}

impl BlobStore for MemoryBlobStore {
    fn stage(&self) -> Result<Box<dyn StagedBlob>> {
        Ok(Box::new(MemoryStagedBlob {
            buf: Vec::new(),
            blobs: Arc::clone(&self.blobs),
        }))
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        validate_blob_key(key)?;
        let data = self
            .blobs
            .read()
            .map_err(|_| poisoned())?
            .get(key)
            .cloned()
            .ok_or_else(|| QfeError::NotFound(format!("Blob {}", key)))?;
        Ok(Box::new(Cursor::new(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{PublicKey, SealedPrivateKey};
    use chrono::{Duration, Utc};

    const PUBLIC_KEY: &str = "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p";

    fn key_pair(username: &str, recipient: Option<&str>) -> KeyPair {
        KeyPair {
            username: username.to_string(),
            recipient_id: recipient.map(str::to_string),
            passphrase_hash: "$argon2id$stub".to_string(),
            public_key: PUBLIC_KEY.parse::<PublicKey>().unwrap(),
            private_key: SealedPrivateKey::from_bytes(vec![1, 2, 3]),
            created_at: Utc::now(),
        }
    }

    fn file(name: &str, owner: &str, age_secs: i64) -> EncryptedFile {
        EncryptedFile {
            unique_filename: name.to_string(),
            original_name: format!("{}.txt", name),
            owner_username: owner.to_string(),
            recipient_id: owner.to_string(),
            storage_path: EncryptedFile::storage_path_for(name),
            size_bytes: 1,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_key_pair_uniqueness() {
        let store = MemoryStore::new();
        KeyStore::save(&store, &key_pair("alice", Some("alice@example.com"))).unwrap();

        let dup_user = KeyStore::save(&store, &key_pair("alice", Some("other@example.com")));
        assert!(matches!(dup_user, Err(QfeError::DuplicateKey(_))));

        let dup_recipient = KeyStore::save(&store, &key_pair("bob", Some("alice@example.com")));
        assert!(matches!(dup_recipient, Err(QfeError::DuplicateKey(_))));

        assert_eq!(store.key_pair_count(), 1);
        assert!(store.find_by_recipient("alice@example.com").unwrap().is_some());
    }

    #[test]
    fn test_recipient_id_cannot_take_a_username() {
        let store = MemoryStore::new();
        KeyStore::save(&store, &key_pair("erin", None)).unwrap();

        let squat = KeyStore::save(&store, &key_pair("mallory", Some("erin")));
        assert!(matches!(squat, Err(QfeError::DuplicateKey(name)) if name == "erin"));

        // Claimed first, the id does not block the identity of the same name.
        KeyStore::save(&store, &key_pair("carol", Some("dave"))).unwrap();
        KeyStore::save(&store, &key_pair("dave", None)).unwrap();
        KeyStore::save(&store, &key_pair("frank", None)).unwrap();
        assert_eq!(store.key_pair_count(), 4);
        assert!(store.find_by_recipient("frank").unwrap().is_none());
    }

    #[test]
    fn test_file_registry_list_newest_first() {
        let store = MemoryStore::new();
        FileRegistry::save(&store, &file("old", "alice", 60)).unwrap();
        FileRegistry::save(&store, &file("new", "alice", 0)).unwrap();
        FileRegistry::save(&store, &file("bobs", "bob", 0)).unwrap();

        let listed = store.list_by_owner("alice").unwrap();
        let names: Vec<_> = listed.iter().map(|f| f.unique_filename.as_str()).collect();
        assert_eq!(names, vec!["new", "old"]);

        let dup = FileRegistry::save(&store, &file("old", "alice", 0));
        assert!(matches!(dup, Err(QfeError::DuplicateFilename(_))));
    }

    #[test]
    fn test_staged_blob_invisible_until_commit() {
        let blobs = MemoryBlobStore::new();
        let mut staged = blobs.stage().unwrap();
        staged.write_all(b"ciphertext").unwrap();
        assert!(blobs.is_empty());

        staged.commit("a.enc").unwrap();
        assert_eq!(blobs.get("a.enc").unwrap(), b"ciphertext");

        let mut second = blobs.stage().unwrap();
        second.write_all(b"other").unwrap();
        assert!(matches!(
            second.commit("a.enc"),
            Err(QfeError::DuplicateFilename(_))
        ));
        assert_eq!(blobs.get("a.enc").unwrap(), b"ciphertext");
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let blobs = MemoryBlobStore::new();
        {
            let mut staged = blobs.stage().unwrap();
            staged.write_all(b"partial").unwrap();
        }
        assert!(blobs.is_empty());
        assert!(matches!(blobs.open("a.enc"), Err(QfeError::NotFound(_))));
    }
}
