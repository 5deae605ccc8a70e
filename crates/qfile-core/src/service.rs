//! File encryption service.
//!
//! Coordinates the key store, file registry, blob store, crypto engine and
//! passphrase verifier. All operations are blocking; see
//! [`WorkerPool`](crate::pool::WorkerPool) for the async front.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use age::secrecy::SecretString;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{Argon2Verifier, PassphraseVerifier};
use crate::config::ServiceConfig;
use crate::crypto::{
    validate_passphrase, AgeEngine, CancelFlag, CryptoEngine, PublicKey, CHUNK_SIZE,
};
use crate::error::{QfeError, Result};
use crate::fs::create_private_dir_all;
use crate::storage::{BlobStore, EncryptedFile, FileRegistry, KeyPair, KeyStore};

/// Public view of a stored key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPairInfo {
    pub username: String,
    /// Address other users encrypt to
    pub recipient_id: String,
    pub public_key: PublicKey,
    pub created_at: DateTime<Utc>,
}

impl From<&KeyPair> for KeyPairInfo {
    fn from(key_pair: &KeyPair) -> Self {
        Self {
            username: key_pair.username.clone(),
            recipient_id: key_pair.address().to_string(),
            public_key: key_pair.public_key.clone(),
            created_at: key_pair.created_at,
        }
    }
}

/// Plaintext produced by a decryption.
///
/// The data lives in a private temp file that is deleted when this value is
/// dropped, unless it is moved out with [`DecryptedFile::persist`].
#[derive(Debug)]
pub struct DecryptedFile {
    original_name: String,
    size_bytes: u64,
    file: NamedTempFile,
}

impl DecryptedFile {
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Plaintext length in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Location of the temp file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Fresh read handle positioned at the start of the plaintext.
    pub fn reader(&self) -> Result<File> {
        Ok(self.file.reopen()?)
    }

    /// Move the plaintext to `destination`, never overwriting an existing file.
    ///
    /// Falls back to copying when the temp file cannot be renamed into place
    /// (for example across filesystems).
    pub fn persist(self, destination: &Path) -> Result<()> {
        let file = match self.file.persist_noclobber(destination) {
            Ok(_) => return Ok(()),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(QfeError::AlreadyExists(destination.display().to_string()));
            }
            Err(e) => {
                debug!(error = %e.error, "rename failed, copying plaintext instead");
                e.file
            }
        };

        let mut output = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    QfeError::AlreadyExists(destination.display().to_string())
                }
                _ => QfeError::Storage(format!(
                    "Failed to create {}: {}",
                    destination.display(),
                    e
                )),
            })?;
        io::copy(&mut file.reopen()?, &mut output)?;
        output.sync_all()?;
        Ok(())
    }
}

/// Per-user asymmetric file encryption.
pub struct FileEncryptionService {
    keys: Arc<dyn KeyStore>,
    files: Arc<dyn FileRegistry>,
    blobs: Arc<dyn BlobStore>,
    engine: Arc<dyn CryptoEngine>,
    verifier: Arc<dyn PassphraseVerifier>,
    config: ServiceConfig,
}

impl FileEncryptionService {
    /// Wire a service from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns `QfeError::Config` if `config` is out of range.
    pub fn new(
        keys: Arc<dyn KeyStore>,
        files: Arc<dyn FileRegistry>,
        blobs: Arc<dyn BlobStore>,
        engine: Arc<dyn CryptoEngine>,
        verifier: Arc<dyn PassphraseVerifier>,
        config: ServiceConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            keys,
            files,
            blobs,
            engine,
            verifier,
            config,
        })
    }

    /// Service using [`AgeEngine`] and [`Argon2Verifier`] tuned by `config`.
    pub fn with_default_crypto(
        keys: Arc<dyn KeyStore>,
        files: Arc<dyn FileRegistry>,
        blobs: Arc<dyn BlobStore>,
        config: ServiceConfig,
    ) -> Result<Self> {
        let engine = Arc::new(AgeEngine::from_config(&config));
        let verifier = Arc::new(Argon2Verifier::new(&config.hashing)?);
        Self::new(keys, files, blobs, engine, verifier, config)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Create a key pair for `identity`, addressed by the identity itself.
    pub fn generate_key_pair(
        &self,
        identity: &str,
        passphrase: &SecretString,
    ) -> Result<KeyPairInfo> {
        self.generate_key_pair_cancellable(identity, None, passphrase, &CancelFlag::new())
    }

    /// Create a key pair for `identity` that others may also address as
    /// `recipient_id`.
    pub fn generate_key_pair_for_recipient(
        &self,
        identity: &str,
        recipient_id: &str,
        passphrase: &SecretString,
    ) -> Result<KeyPairInfo> {
        self.generate_key_pair_cancellable(
            identity,
            Some(recipient_id),
            passphrase,
            &CancelFlag::new(),
        )
    }

    /// Key generation that stores nothing once `cancel` is raised.
    ///
    /// The username always addresses the new key pair. An explicit
    /// `recipient_id` adds a second address, which must not already be a
    /// recipient id or another identity's username.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty identity, passphrase or recipient id
    /// - `AlreadyExists` if the identity already has a key pair, or the
    ///   recipient id is taken
    /// - `KeyGeneration` if the engine or hasher fails
    /// - `Cancelled` if `cancel` was raised before the key pair was saved
    pub fn generate_key_pair_cancellable(
        &self,
        identity: &str,
        recipient_id: Option<&str>,
        passphrase: &SecretString,
        cancel: &CancelFlag,
    ) -> Result<KeyPairInfo> {
        if identity.trim().is_empty() {
            return Err(QfeError::InvalidArgument(
                "Identity cannot be empty".to_string(),
            ));
        }
        validate_passphrase(passphrase)?;
        let recipient_id = match recipient_id {
            Some(id) if id.trim().is_empty() => {
                return Err(QfeError::InvalidArgument(
                    "Recipient id cannot be empty".to_string(),
                ));
            }
            Some(id) if id == identity => None,
            other => other,
        };

        if self.keys.find_by_username(identity)?.is_some() {
            return Err(QfeError::AlreadyExists(format!(
                "Key pair for {}",
                identity
            )));
        }
        if let Some(id) = recipient_id {
            if self.keys.find_by_recipient(id)?.is_some()
                || self.keys.find_by_username(id)?.is_some()
            {
                return Err(QfeError::AlreadyExists(format!("Recipient {}", id)));
            }
        }

        let generated = self.engine.generate_key_pair(identity, passphrase)?;
        let passphrase_hash = self.verifier.hash(passphrase)?;
        let key_pair = KeyPair {
            username: identity.to_string(),
            recipient_id: recipient_id.map(str::to_string),
            passphrase_hash,
            public_key: generated.public_key,
            private_key: generated.private_key,
            created_at: Utc::now(),
        };

        cancel.begin_commit()?;
        // A concurrent request may have won the insert since the lookup.
        self.keys.save(&key_pair).map_err(|e| match e {
            QfeError::DuplicateKey(name) if Some(name.as_str()) == recipient_id => {
                QfeError::AlreadyExists(format!("Recipient {}", name))
            }
            QfeError::DuplicateKey(_) => {
                QfeError::AlreadyExists(format!("Key pair for {}", identity))
            }
            other => other,
        })?;

        info!(identity, address = key_pair.address(), "key pair generated");
        Ok(KeyPairInfo::from(&key_pair))
    }

    /// Encrypt the file at `path` for `recipient_id` on behalf of `owner`.
    pub fn encrypt_file(
        &self,
        path: &Path,
        owner: &str,
        recipient_id: &str,
    ) -> Result<EncryptedFile> {
        self.encrypt_file_cancellable(path, owner, recipient_id, &CancelFlag::new())
    }

    /// [`encrypt_file`](Self::encrypt_file) that stops between chunks once
    /// `cancel` is raised.
    pub fn encrypt_file_cancellable(
        &self,
        path: &Path,
        owner: &str,
        recipient_id: &str,
        cancel: &CancelFlag,
    ) -> Result<EncryptedFile> {
        let not_found = || QfeError::NotFound(format!("File {}", path.display()));

        let metadata = fs::metadata(path).map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }
        let original_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(not_found)?;
        let file = File::open(path).map_err(|e| {
            debug!(path = %path.display(), error = %e, "input not readable");
            not_found()
        })?;

        let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
        self.encrypt_reader(&mut reader, &original_name, owner, recipient_id, cancel)
    }

    /// Encrypt a caller-supplied stream.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty name or recipient id
    /// - `NoKeyPair` if `owner` has no key pair
    /// - `UnknownRecipient` if `recipient_id` resolves to no key pair
    /// - `Cancelled` if `cancel` was raised before the record was written
    pub fn encrypt_reader(
        &self,
        reader: &mut dyn Read,
        original_name: &str,
        owner: &str,
        recipient_id: &str,
        cancel: &CancelFlag,
    ) -> Result<EncryptedFile> {
        if original_name.is_empty() {
            return Err(QfeError::InvalidArgument(
                "File name cannot be empty".to_string(),
            ));
        }
        if self.keys.find_by_username(owner)?.is_none() {
            return Err(QfeError::NoKeyPair(owner.to_string()));
        }
        if recipient_id.is_empty() {
            return Err(QfeError::InvalidArgument(
                "Recipient id cannot be empty".to_string(),
            ));
        }
        let recipient = self.resolve_recipient(recipient_id)?;

        let mut staged = self.blobs.stage()?;
        let size_bytes = self
            .engine
            .encrypt(reader, &mut staged, &recipient.public_key, cancel)?;

        cancel.begin_commit()?;
        let record = self.register(original_name, owner, recipient_id, size_bytes)?;

        if let Err(e) = staged.commit(&record.storage_path) {
            if let Err(cleanup) = self.files.remove(&record.unique_filename) {
                warn!(
                    unique_filename = %record.unique_filename,
                    error = %cleanup,
                    "failed to roll back file record"
                );
            }
            return Err(e);
        }

        info!(
            owner,
            recipient = %recipient.username,
            recipient_id = %record.recipient_id,
            unique_filename = %record.unique_filename,
            size_bytes,
            "file encrypted"
        );
        Ok(record)
    }

    /// Decrypt a stored file with the requester's private key.
    pub fn decrypt_file(
        &self,
        unique_filename: &str,
        requester: &str,
        passphrase: &SecretString,
    ) -> Result<DecryptedFile> {
        self.decrypt_file_cancellable(unique_filename, requester, passphrase, &CancelFlag::new())
    }

    /// [`decrypt_file`](Self::decrypt_file) that stops between chunks once
    /// `cancel` is raised.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record or its blob is missing
    /// - `NoKeyPair` if `requester` has no key pair
    /// - `BadPassphrase` if the passphrase does not match
    /// - `Decryption` if the container is not addressed to the requester or
    ///   fails authentication
    pub fn decrypt_file_cancellable(
        &self,
        unique_filename: &str,
        requester: &str,
        passphrase: &SecretString,
        cancel: &CancelFlag,
    ) -> Result<DecryptedFile> {
        let record = self
            .files
            .find_by_unique_filename(unique_filename)?
            .ok_or_else(|| QfeError::NotFound(format!("File {}", unique_filename)))?;
        let key_pair = self.require_key_pair(requester)?;
        self.check_passphrase(&key_pair, passphrase)?;

        let key = self.engine.unlock(&key_pair.private_key, passphrase)?;
        let mut input = self.blobs.open(&record.storage_path)?;

        let scratch = self.scratch_dir();
        create_private_dir_all(&scratch).map_err(|e| {
            QfeError::Storage(format!(
                "Failed to create scratch directory {}: {}",
                scratch.display(),
                e
            ))
        })?;
        let mut temp = tempfile::Builder::new()
            .prefix("qfe-")
            .tempfile_in(&scratch)
            .map_err(|e| QfeError::Storage(format!("Temp file create failed: {}", e)))?;

        let size_bytes = {
            let mut writer = BufWriter::with_capacity(CHUNK_SIZE, temp.as_file_mut());
            let written = self
                .engine
                .decrypt_with(&mut input, &mut writer, &key, cancel)?;
            writer.flush()?;
            written
        };

        if size_bytes != record.size_bytes {
            warn!(
                unique_filename,
                recorded = record.size_bytes,
                actual = size_bytes,
                "decrypted size differs from registry"
            );
        }

        info!(requester, unique_filename, size_bytes, "file decrypted");
        Ok(DecryptedFile {
            original_name: record.original_name,
            size_bytes,
            file: temp,
        })
    }

    /// Delete the key pair of `identity` after checking its passphrase.
    ///
    /// Files addressed to the revoked key keep their records but can no
    /// longer be decrypted.
    pub fn revoke_key_pair(&self, identity: &str, passphrase: &SecretString) -> Result<()> {
        self.revoke_key_pair_cancellable(identity, passphrase, &CancelFlag::new())
    }

    /// [`revoke_key_pair`](Self::revoke_key_pair) that deletes nothing once
    /// `cancel` is raised.
    pub fn revoke_key_pair_cancellable(
        &self,
        identity: &str,
        passphrase: &SecretString,
        cancel: &CancelFlag,
    ) -> Result<()> {
        let key_pair = self.require_key_pair(identity)?;
        self.check_passphrase(&key_pair, passphrase)?;

        cancel.begin_commit()?;
        if !self.keys.remove(identity)? {
            return Err(QfeError::NoKeyPair(identity.to_string()));
        }
        info!(identity, "key pair revoked");
        Ok(())
    }

    /// Files encrypted by `owner`, newest first.
    pub fn list_files(&self, owner: &str) -> Result<Vec<EncryptedFile>> {
        self.files.list_by_owner(owner)
    }

    pub fn find_key_pair(&self, identity: &str) -> Result<Option<KeyPairInfo>> {
        Ok(self
            .keys
            .find_by_username(identity)?
            .as_ref()
            .map(KeyPairInfo::from))
    }

    fn require_key_pair(&self, identity: &str) -> Result<KeyPair> {
        self.keys
            .find_by_username(identity)?
            .ok_or_else(|| QfeError::NoKeyPair(identity.to_string()))
    }

    fn check_passphrase(&self, key_pair: &KeyPair, passphrase: &SecretString) -> Result<()> {
        if self.verifier.verify(passphrase, &key_pair.passphrase_hash)? {
            Ok(())
        } else {
            warn!(identity = %key_pair.username, "passphrase rejected");
            Err(QfeError::BadPassphrase)
        }
    }

    /// Usernames are matched first, then explicit recipient ids.
    fn resolve_recipient(&self, recipient_id: &str) -> Result<KeyPair> {
        if let Some(key_pair) = self.keys.find_by_username(recipient_id)? {
            return Ok(key_pair);
        }
        self.keys
            .find_by_recipient(recipient_id)?
            .ok_or_else(|| QfeError::UnknownRecipient(recipient_id.to_string()))
    }

    /// Insert a registry record under a fresh random name.
    fn register(
        &self,
        original_name: &str,
        owner: &str,
        recipient_id: &str,
        size_bytes: u64,
    ) -> Result<EncryptedFile> {
        let created_at = Utc::now();
        for attempt in 1..=self.config.filename_attempts {
            let unique_filename = Uuid::new_v4().simple().to_string();
            let record = EncryptedFile {
                storage_path: EncryptedFile::storage_path_for(&unique_filename),
                unique_filename,
                original_name: original_name.to_string(),
                owner_username: owner.to_string(),
                recipient_id: recipient_id.to_string(),
                size_bytes,
                created_at,
            };
            match self.files.save(&record) {
                Ok(()) => return Ok(record),
                Err(QfeError::DuplicateFilename(name)) => {
                    debug!(attempt, name = %name, "unique filename taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        Err(QfeError::Storage(format!(
            "No free unique filename after {} attempts",
            self.config.filename_attempts
        )))
    }

    fn scratch_dir(&self) -> PathBuf {
        self.config
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}
