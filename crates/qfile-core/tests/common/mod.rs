#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use qfile_core::{
    FileEncryptionService, HashingConfig, LocalBlobStore, MemoryBlobStore, MemoryStore,
    SecretString, ServiceConfig, SqliteStore,
};

/// Cheap KDF settings so tests stay fast.
pub fn test_config(scratch: &Path) -> ServiceConfig {
    ServiceConfig {
        scratch_dir: Some(scratch.to_path_buf()),
        scrypt_work_factor: 10,
        scrypt_max_work_factor: 12,
        hashing: HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..ServiceConfig::default()
    }
}

pub fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

/// Service backed by SQLite and a blob directory under `root`.
pub fn disk_service(root: &Path) -> (FileEncryptionService, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::open(&root.join("catalog.db")).expect("open catalog"));
    let blobs = LocalBlobStore::open(root.join("blobs")).expect("open blob dir");
    let service = FileEncryptionService::with_default_crypto(
        store.clone(),
        store.clone(),
        Arc::new(blobs),
        test_config(&root.join("scratch")),
    )
    .expect("build service");
    (service, store)
}

/// Service backed entirely by memory.
pub fn memory_service(
    scratch: &Path,
) -> (FileEncryptionService, Arc<MemoryStore>, MemoryBlobStore) {
    let store = Arc::new(MemoryStore::new());
    let blobs = MemoryBlobStore::new();
    let service = FileEncryptionService::with_default_crypto(
        store.clone(),
        store.clone(),
        Arc::new(blobs.clone()),
        test_config(scratch),
    )
    .expect("build service");
    (service, store, blobs)
}
