//! SQLite-backed key store and file registry.
//!
//! Both catalogs live in one database. Uniqueness is enforced by table
//! constraints, so a lost race surfaces as a constraint violation rather
//! than a duplicate row.

mod row;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::SecondsFormat;
use rusqlite::{Connection, ErrorCode, OptionalExtension};

use crate::error::{QfeError, Result};
use crate::storage::traits::{FileRegistry, KeyStore};
use crate::storage::types::{EncryptedFile, KeyPair};

use row::{EncryptedFileRow, KeyPairRow};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS key_pairs (
    username TEXT PRIMARY KEY,
    recipient_id TEXT UNIQUE,
    passphrase_hash TEXT NOT NULL,
    public_key TEXT NOT NULL,
    sealed_private_key BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS encrypted_files (
    unique_filename TEXT PRIMARY KEY,
    original_name TEXT NOT NULL,
    owner_username TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS encrypted_files_owner
    ON encrypted_files (owner_username, created_at);
"#;

/// SQLite catalog implementing [`KeyStore`] and [`FileRegistry`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) a catalog database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::init(conn)
    }

    /// A private catalog that disappears when dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QfeError::Storage("SQLite connection poisoned".to_string()))
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn timestamp(value: &chrono::DateTime<chrono::Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl KeyStore for SqliteStore {
    fn find_by_username(&self, username: &str) -> Result<Option<KeyPair>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM key_pairs WHERE username = ?",
                    KeyPairRow::COLUMNS
                ),
                [username],
                KeyPairRow::from_row,
            )
            .optional()?;
        row.map(KeyPair::try_from).transpose()
    }

    fn find_by_recipient(&self, recipient_id: &str) -> Result<Option<KeyPair>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM key_pairs WHERE recipient_id = ?",
                    KeyPairRow::COLUMNS
                ),
                [recipient_id],
                KeyPairRow::from_row,
            )
            .optional()?;
        row.map(KeyPair::try_from).transpose()
    }

    fn save(&self, key_pair: &KeyPair) -> Result<()> {
        let conn = self.lock_conn()?;
        // One statement, so the username check and the insert are atomic.
        let inserted = conn
            .execute(
                &format!(
                    "INSERT INTO key_pairs ({}) SELECT ?1, ?2, ?3, ?4, ?5, ?6 \
                     WHERE ?2 IS NULL \
                     OR NOT EXISTS (SELECT 1 FROM key_pairs WHERE username = ?2)",
                    KeyPairRow::COLUMNS
                ),
                (
                    &key_pair.username,
                    &key_pair.recipient_id,
                    &key_pair.passphrase_hash,
                    key_pair.public_key.as_str(),
                    key_pair.private_key.as_bytes(),
                    timestamp(&key_pair.created_at),
                ),
            )
            .map_err(|e| match (&e, &key_pair.recipient_id) {
                (rusqlite::Error::SqliteFailure(_, Some(msg)), Some(recipient))
                    if is_constraint_violation(&e) && msg.contains("recipient_id") =>
                {
                    QfeError::DuplicateKey(recipient.clone())
                }
                _ if is_constraint_violation(&e) => {
                    QfeError::DuplicateKey(key_pair.username.clone())
                }
                _ => e.into(),
            })?;

        if inserted == 0 {
            // Only reachable when the recipient id names an existing user.
            let recipient = key_pair.address().to_string();
            return Err(QfeError::DuplicateKey(recipient));
        }
        Ok(())
    }

    fn remove(&self, username: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute("DELETE FROM key_pairs WHERE username = ?", [username])?;
        Ok(removed > 0)
    }
}

impl FileRegistry for SqliteStore {
    fn find_by_unique_filename(&self, unique_filename: &str) -> Result<Option<EncryptedFile>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM encrypted_files WHERE unique_filename = ?",
                    EncryptedFileRow::COLUMNS
                ),
                [unique_filename],
                EncryptedFileRow::from_row,
            )
            .optional()?;
        row.map(EncryptedFile::try_from).transpose()
    }

    fn save(&self, file: &EncryptedFile) -> Result<()> {
        let size_bytes = i64::try_from(file.size_bytes)
            .map_err(|_| QfeError::Storage(format!("File too large: {}", file.size_bytes)))?;
        let conn = self.lock_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO encrypted_files ({}) VALUES (?, ?, ?, ?, ?, ?, ?)",
                EncryptedFileRow::COLUMNS
            ),
            (
                &file.unique_filename,
                &file.original_name,
                &file.owner_username,
                &file.recipient_id,
                &file.storage_path,
                size_bytes,
                timestamp(&file.created_at),
            ),
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                QfeError::DuplicateFilename(file.unique_filename.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn remove(&self, unique_filename: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM encrypted_files WHERE unique_filename = ?",
            [unique_filename],
        )?;
        Ok(removed > 0)
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<EncryptedFile>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM encrypted_files WHERE owner_username = ? \
             ORDER BY created_at DESC, unique_filename",
            EncryptedFileRow::COLUMNS
        ))?;
        let rows = stmt.query_map([owner], EncryptedFileRow::from_row)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(EncryptedFile::try_from(row?)?);
        }
        Ok(files)
    }
}
