//! Key material handles and passphrase sealing of private keys.
//!
//! Private keys are X25519 identities encoded as `AGE-SECRET-KEY-1...`
//! strings. At rest they are wrapped with age's passphrase encryption
//! (scrypt KDF feeding ChaCha20-Poly1305), so only the passphrase is
//! needed to unlock them.

use std::fmt;
use std::io::{Read, Write};
use std::iter;
use std::str::FromStr;

use age::secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{QfeError, Result};

/// Public key handle: an `age1...` X25519 recipient string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(String);

impl PublicKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn to_recipient(&self) -> Result<age::x25519::Recipient> {
        self.0
            .parse::<age::x25519::Recipient>()
            .map_err(|e| QfeError::Encryption(format!("Invalid public key: {}", e)))
    }
}

impl FromStr for PublicKey {
    type Err = QfeError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<age::x25519::Recipient>()
            .map_err(|e| QfeError::InvalidArgument(format!("Invalid public key: {}", e)))?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for PublicKey {
    type Error = QfeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PublicKey> for String {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Private key handle: the passphrase-sealed identity. Opaque bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SealedPrivateKey(Vec<u8>);

impl SealedPrivateKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SealedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedPrivateKey")
            .field("len", &self.0.len())
            .finish()
    }
}

/// A private key unlocked for the duration of one operation.
///
/// The wrapped identity zeroizes its key material when dropped.
pub struct UnlockedKey {
    identity: age::x25519::Identity,
}

impl UnlockedKey {
    pub(crate) fn identity(&self) -> &age::x25519::Identity {
        &self.identity
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.identity.to_public().to_string())
    }
}

impl fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("identity", &"[REDACTED]")
            .finish()
    }
}

/// Output of key generation, before it is bound to a store record.
#[derive(Debug, Clone)]
pub struct GeneratedKeys {
    pub public_key: PublicKey,
    pub private_key: SealedPrivateKey,
}

/// Generate a fresh X25519 identity and seal it under `passphrase`.
pub fn generate(passphrase: &SecretString, work_factor: u8) -> Result<GeneratedKeys> {
    let identity = age::x25519::Identity::generate();
    let public_key = PublicKey(identity.to_public().to_string());
    let private_key = seal(&identity, passphrase, work_factor)?;
    Ok(GeneratedKeys {
        public_key,
        private_key,
    })
}

/// Encrypt an identity with age passphrase encryption.
pub fn seal(
    identity: &age::x25519::Identity,
    passphrase: &SecretString,
    work_factor: u8,
) -> Result<SealedPrivateKey> {
    let mut recipient = age::scrypt::Recipient::new(passphrase.clone());
    recipient.set_work_factor(work_factor);

    let encryptor =
        age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
            .map_err(|e| QfeError::KeyGeneration(format!("Failed to create encryptor: {}", e)))?;

    let mut sealed = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut sealed)
        .map_err(|e| QfeError::KeyGeneration(format!("Failed to create encryptor: {}", e)))?;

    let encoded = identity.to_string();
    writer
        .write_all(encoded.expose_secret().as_bytes())
        .map_err(|e| QfeError::KeyGeneration(format!("Sealing write failed: {}", e)))?;
    writer
        .finish()
        .map_err(|e| QfeError::KeyGeneration(format!("Sealing finish failed: {}", e)))?;

    Ok(SealedPrivateKey(sealed))
}

/// Decrypt a sealed identity.
///
/// Every failure to open the sealed key under `passphrase` is reported as
/// [`QfeError::BadPassphrase`]; callers must not learn more than that.
pub fn unseal(
    sealed: &SealedPrivateKey,
    passphrase: &SecretString,
    max_work_factor: u8,
) -> Result<UnlockedKey> {
    let decryptor = age::Decryptor::new(sealed.as_bytes()).map_err(|e| {
        tracing::warn!(error = %e, "sealed private key is not a valid age file");
        QfeError::BadPassphrase
    })?;

    let mut identity = age::scrypt::Identity::new(passphrase.clone());
    identity.set_max_work_factor(max_work_factor);

    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| {
            tracing::debug!(error = %e, "private key unlock failed");
            QfeError::BadPassphrase
        })?;

    let mut encoded = Zeroizing::new(String::new());
    reader
        .read_to_string(&mut encoded)
        .map_err(|_| QfeError::BadPassphrase)?;

    let identity = encoded
        .trim()
        .parse::<age::x25519::Identity>()
        .map_err(|_| QfeError::BadPassphrase)?;

    Ok(UnlockedKey { identity })
}
