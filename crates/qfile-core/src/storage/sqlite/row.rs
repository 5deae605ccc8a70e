//! Row types for catalog queries.

use chrono::{DateTime, Utc};

use crate::crypto::{PublicKey, SealedPrivateKey};
use crate::error::{QfeError, Result};
use crate::storage::types::{EncryptedFile, KeyPair};

/// Raw row data from the key_pairs table, before parsing into domain types.
#[derive(Debug)]
pub struct KeyPairRow {
    pub username: String,
    pub recipient_id: Option<String>,
    pub passphrase_hash: String,
    pub public_key: String,
    pub sealed_private_key: Vec<u8>,
    pub created_at: String,
}

impl KeyPairRow {
    pub const COLUMNS: &'static str =
        "username, recipient_id, passphrase_hash, public_key, sealed_private_key, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            username: row.get(0)?,
            recipient_id: row.get(1)?,
            passphrase_hash: row.get(2)?,
            public_key: row.get(3)?,
            sealed_private_key: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl TryFrom<KeyPairRow> for KeyPair {
    type Error = QfeError;

    fn try_from(row: KeyPairRow) -> Result<Self> {
        let public_key = row
            .public_key
            .parse::<PublicKey>()
            .map_err(|e| QfeError::Storage(format!("Invalid public key: {}", e)))?;

        Ok(KeyPair {
            username: row.username,
            recipient_id: row.recipient_id,
            passphrase_hash: row.passphrase_hash,
            public_key,
            private_key: SealedPrivateKey::from_bytes(row.sealed_private_key),
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Raw row data from the encrypted_files table.
#[derive(Debug)]
pub struct EncryptedFileRow {
    pub unique_filename: String,
    pub original_name: String,
    pub owner_username: String,
    pub recipient_id: String,
    pub storage_path: String,
    pub size_bytes: i64,
    pub created_at: String,
}

impl EncryptedFileRow {
    pub const COLUMNS: &'static str = "unique_filename, original_name, owner_username, \
         recipient_id, storage_path, size_bytes, created_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            unique_filename: row.get(0)?,
            original_name: row.get(1)?,
            owner_username: row.get(2)?,
            recipient_id: row.get(3)?,
            storage_path: row.get(4)?,
            size_bytes: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TryFrom<EncryptedFileRow> for EncryptedFile {
    type Error = QfeError;

    fn try_from(row: EncryptedFileRow) -> Result<Self> {
        let size_bytes = u64::try_from(row.size_bytes)
            .map_err(|_| QfeError::Storage(format!("Invalid file size: {}", row.size_bytes)))?;

        Ok(EncryptedFile {
            unique_filename: row.unique_filename,
            original_name: row.original_name,
            owner_username: row.owner_username,
            recipient_id: row.recipient_id,
            storage_path: row.storage_path,
            size_bytes,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| QfeError::Storage(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc))
}
