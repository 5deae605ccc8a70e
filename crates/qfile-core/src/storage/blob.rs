//! Directory-backed blob storage.
//!
//! Blobs are written to a temp file under `<root>/.staging` and published
//! with an atomic no-clobber link, so readers never see partial ciphertext
//! and an existing blob is never overwritten.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::traits::{validate_blob_key, BlobStore, StagedBlob};
use crate::crypto::CHUNK_SIZE;
use crate::error::{QfeError, Result};
use crate::fs::{create_private_dir_all, sync_dir};

const STAGING_DIR: &str = ".staging";

/// [`BlobStore`] rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Open (creating if needed) a blob directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        create_private_dir_all(&root.join(STAGING_DIR)).map_err(|e| {
            QfeError::Storage(format!(
                "Failed to create blob directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a committed blob.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_blob_key(key)?;
        Ok(self.root.join(key))
    }
}

struct LocalStagedBlob {
    writer: BufWriter<NamedTempFile>,
    root: PathBuf,
}

impl Write for LocalStagedBlob {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl StagedBlob for LocalStagedBlob {
    fn commit(self: Box<Self>, key: &str) -> Result<()> {
        validate_blob_key(key)?;
        let LocalStagedBlob { writer, root } = *self;

        let temp = writer
            .into_inner()
            .map_err(|e| QfeError::Storage(format!("Blob flush failed: {}", e.error())))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| QfeError::Storage(format!("Blob sync failed: {}", e)))?;

        let destination = root.join(key);
        temp.persist_noclobber(&destination).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                QfeError::DuplicateFilename(key.to_string())
            } else {
                QfeError::Storage(format!("Blob publish failed: {}", e.error))
            }
        })?;
        sync_dir(&root);
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    fn stage(&self) -> Result<Box<dyn StagedBlob>> {
        let temp = tempfile::Builder::new()
            .prefix("blob-")
            .tempfile_in(self.root.join(STAGING_DIR))
            .map_err(|e| QfeError::Storage(format!("Temp file create failed: {}", e)))?;
        Ok(Box::new(LocalStagedBlob {
            writer: BufWriter::with_capacity(CHUNK_SIZE, temp),
            root: self.root.clone(),
        }))
    }

    fn open(&self, key: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.path_for(key)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => QfeError::NotFound(format!("Blob {}", key)),
            _ => QfeError::Storage(format!("Failed to open blob {}: {}", key, e)),
        })?;
        Ok(Box::new(BufReader::with_capacity(CHUNK_SIZE, file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_commit_then_read() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::open(dir.path().join("blobs")).unwrap();

        let mut staged = store.stage().unwrap();
        staged.write_all(b"ciphertext").unwrap();
        staged.commit("abc.enc").unwrap();

        let mut data = Vec::new();
        store.open("abc.enc").unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, b"ciphertext");
        assert!(store.path_for("abc.enc").unwrap().is_file());
    }

    #[test]
    fn test_commit_never_overwrites() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::open(dir.path()).unwrap();

        let mut first = store.stage().unwrap();
        first.write_all(b"first").unwrap();
        first.commit("same.enc").unwrap();

        let mut second = store.stage().unwrap();
        second.write_all(b"second").unwrap();
        let result = second.commit("same.enc");
        assert!(matches!(result, Err(QfeError::DuplicateFilename(_))));

        assert_eq!(fs::read(dir.path().join("same.enc")).unwrap(), b"first");
    }

    #[test]
    fn test_dropped_stage_is_cleaned_up() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::open(dir.path()).unwrap();
        {
            let mut staged = store.stage().unwrap();
            staged.write_all(b"partial").unwrap();
        }
        let leftovers = fs::read_dir(dir.path().join(STAGING_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::open(dir.path()).unwrap();
        assert!(matches!(store.open("nope.enc"), Err(QfeError::NotFound(_))));
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.open("../secret"),
            Err(QfeError::InvalidArgument(_))
        ));
    }
}
