//! Envelope encryption engine.
//!
//! Each file gets a random content key; the content is encrypted with it in
//! authenticated 64 KiB chunks and the content key is wrapped for the
//! recipient's X25519 public key. Both steps are delegated to age and framed
//! by the [`ContainerHeader`](super::container::ContainerHeader).

use std::io::{self, BufReader, Read, Write};
use std::iter;

use age::secrecy::SecretString;

use crate::config::ServiceConfig;
use crate::crypto::container::ContainerHeader;
use crate::crypto::keys::{self, GeneratedKeys, PublicKey, SealedPrivateKey, UnlockedKey};
use crate::crypto::passphrase::validate_passphrase;
use crate::crypto::stream::{copy_chunked, CancelFlag, CopyError, CHUNK_SIZE};
use crate::error::{QfeError, Result};

/// Key generation, encryption and decryption.
///
/// Implementations hold no per-user state; key material is passed in on
/// every call.
pub trait CryptoEngine: Send + Sync {
    /// Produce a key pair for `identity` with the private half sealed under `passphrase`.
    fn generate_key_pair(&self, identity: &str, passphrase: &SecretString)
        -> Result<GeneratedKeys>;

    /// Stream `input` into a container addressed to `recipient`.
    ///
    /// Returns the number of plaintext bytes consumed.
    fn encrypt(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        recipient: &PublicKey,
        cancel: &CancelFlag,
    ) -> Result<u64>;

    /// Open a sealed private key. Fails only with [`QfeError::BadPassphrase`].
    fn unlock(&self, private_key: &SealedPrivateKey, passphrase: &SecretString)
        -> Result<UnlockedKey>;

    /// Stream a container through an unlocked key.
    ///
    /// Output written before an error must be discarded by the caller.
    fn decrypt_with(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        key: &UnlockedKey,
        cancel: &CancelFlag,
    ) -> Result<u64>;

    /// Unlock then decrypt.
    fn decrypt(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        private_key: &SealedPrivateKey,
        passphrase: &SecretString,
        cancel: &CancelFlag,
    ) -> Result<u64> {
        let key = self.unlock(private_key, passphrase)?;
        self.decrypt_with(input, output, &key, cancel)
    }
}

/// [`CryptoEngine`] backed by age X25519 recipients and scrypt-sealed identities.
#[derive(Debug, Clone)]
pub struct AgeEngine {
    work_factor: u8,
    max_work_factor: u8,
}

impl AgeEngine {
    pub fn new(work_factor: u8, max_work_factor: u8) -> Self {
        Self {
            work_factor,
            max_work_factor,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.scrypt_work_factor, config.scrypt_max_work_factor)
    }
}

impl CryptoEngine for AgeEngine {
    fn generate_key_pair(
        &self,
        identity: &str,
        passphrase: &SecretString,
    ) -> Result<GeneratedKeys> {
        if identity.is_empty() {
            return Err(QfeError::InvalidArgument(
                "Identity cannot be empty".to_string(),
            ));
        }
        validate_passphrase(passphrase)?;

        let keys = keys::generate(passphrase, self.work_factor)?;
        tracing::debug!(identity, public_key = %keys.public_key, "generated key pair");
        Ok(keys)
    }

    fn encrypt(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        recipient: &PublicKey,
        cancel: &CancelFlag,
    ) -> Result<u64> {
        let recipient = recipient.to_recipient()?;
        let encryptor =
            age::Encryptor::with_recipients(iter::once(&recipient as &dyn age::Recipient))
                .map_err(|e| QfeError::Encryption(format!("Failed to create encryptor: {}", e)))?;

        ContainerHeader::current()
            .write_to(output)
            .map_err(|e| QfeError::Storage(format!("Failed to write container header: {}", e)))?;

        let mut writer = encryptor
            .wrap_output(output)
            .map_err(|e| QfeError::Encryption(format!("Failed to create encryptor: {}", e)))?;

        let copied = copy_chunked(input, &mut writer, cancel).map_err(|e| match e {
            CopyError::Read(e) => QfeError::Storage(format!("Failed to read plaintext: {}", e)),
            CopyError::Write(e) => QfeError::Encryption(format!("Encryption write failed: {}", e)),
            CopyError::Cancelled => QfeError::Cancelled,
        })?;

        writer
            .finish()
            .map_err(|e| QfeError::Encryption(format!("Encryption finish failed: {}", e)))?;

        Ok(copied)
    }

    fn unlock(
        &self,
        private_key: &SealedPrivateKey,
        passphrase: &SecretString,
    ) -> Result<UnlockedKey> {
        keys::unseal(private_key, passphrase, self.max_work_factor)
    }

    fn decrypt_with(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        key: &UnlockedKey,
        cancel: &CancelFlag,
    ) -> Result<u64> {
        ContainerHeader::read_from(input)?;

        let decryptor = age::Decryptor::new_buffered(BufReader::with_capacity(CHUNK_SIZE, input))
            .map_err(envelope_error)?;

        let mut reader = decryptor
            .decrypt(iter::once(key.identity() as &dyn age::Identity))
            .map_err(envelope_error)?;

        copy_chunked(&mut reader, output, cancel).map_err(|e| match e {
            CopyError::Read(e) if is_integrity_failure(&e) => {
                QfeError::Decryption(format!("Ciphertext integrity check failed: {}", e))
            }
            CopyError::Read(e) => QfeError::Storage(format!("Failed to read container: {}", e)),
            CopyError::Write(e) => {
                QfeError::Storage(format!("Failed to write plaintext: {}", e))
            }
            CopyError::Cancelled => QfeError::Cancelled,
        })
    }
}

/// Authentication failures and truncation surface from age as these kinds.
fn is_integrity_failure(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof
    )
}

fn envelope_error(err: age::DecryptError) -> QfeError {
    match err {
        age::DecryptError::NoMatchingKeys => {
            QfeError::Decryption("Container is not addressed to this key".to_string())
        }
        age::DecryptError::Io(e) if !is_integrity_failure(&e) => {
            QfeError::Storage(format!("Failed to read container: {}", e))
        }
        other => QfeError::Decryption(format!("Invalid container envelope: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn engine() -> AgeEngine {
        AgeEngine::new(10, 20)
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn encrypt_bytes(engine: &AgeEngine, data: &[u8], recipient: &PublicKey) -> Vec<u8> {
        let mut out = Vec::new();
        engine
            .encrypt(&mut Cursor::new(data), &mut out, recipient, &CancelFlag::new())
            .unwrap();
        out
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let engine = engine();
        let keys = engine.generate_key_pair("alice", &secret("correct-horse")).unwrap();
        let plaintext = b"Hello, World! This is secret data.";

        let container = encrypt_bytes(&engine, plaintext, &keys.public_key);
        assert!(container.starts_with(b"QFEC"));

        let mut out = Vec::new();
        let n = engine
            .decrypt(
                &mut Cursor::new(&container),
                &mut out,
                &keys.private_key,
                &secret("correct-horse"),
                &CancelFlag::new(),
            )
            .unwrap();
        assert_eq!(n, plaintext.len() as u64);
        assert_eq!(out, plaintext);
    }

    #[test]
    fn test_empty_plaintext() {
        let engine = engine();
        let keys = engine.generate_key_pair("alice", &secret("pw")).unwrap();
        let container = encrypt_bytes(&engine, b"", &keys.public_key);

        let unlocked = engine.unlock(&keys.private_key, &secret("pw")).unwrap();
        let mut out = Vec::new();
        engine
            .decrypt_with(&mut Cursor::new(&container), &mut out, &unlocked, &CancelFlag::new())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_wrong_passphrase_yields_no_plaintext() {
        let engine = engine();
        let keys = engine.generate_key_pair("alice", &secret("correct-horse")).unwrap();
        let container = encrypt_bytes(&engine, b"secret data", &keys.public_key);

        let mut out = Vec::new();
        let result = engine.decrypt(
            &mut Cursor::new(&container),
            &mut out,
            &keys.private_key,
            &secret("wrong"),
            &CancelFlag::new(),
        );
        assert!(matches!(result, Err(QfeError::BadPassphrase)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_other_recipient_cannot_decrypt() {
        let engine = engine();
        let alice = engine.generate_key_pair("alice", &secret("a")).unwrap();
        let bob = engine.generate_key_pair("bob", &secret("b")).unwrap();
        let container = encrypt_bytes(&engine, b"for alice", &alice.public_key);

        let mut out = Vec::new();
        let result = engine.decrypt(
            &mut Cursor::new(&container),
            &mut out,
            &bob.private_key,
            &secret("b"),
            &CancelFlag::new(),
        );
        assert!(matches!(result, Err(QfeError::Decryption(_))));
    }

    #[test]
    fn test_truncated_container_fails_integrity() {
        let engine = engine();
        let keys = engine.generate_key_pair("alice", &secret("pw")).unwrap();
        let plaintext = vec![0x42u8; CHUNK_SIZE + 100];
        let container = encrypt_bytes(&engine, &plaintext, &keys.public_key);

        let unlocked = engine.unlock(&keys.private_key, &secret("pw")).unwrap();
        let truncated = &container[..container.len() - 50];
        let mut out = Vec::new();
        let result =
            engine.decrypt_with(&mut Cursor::new(truncated), &mut out, &unlocked, &CancelFlag::new());
        assert!(matches!(result, Err(QfeError::Decryption(_))));
    }

    #[test]
    fn test_cancelled_encrypt() {
        let engine = engine();
        let keys = engine.generate_key_pair("alice", &secret("pw")).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let mut out = Vec::new();
        let result = engine.encrypt(
            &mut Cursor::new(vec![1u8; 1024]),
            &mut out,
            &keys.public_key,
            &cancel,
        );
        assert!(matches!(result, Err(QfeError::Cancelled)));
    }

    #[test]
    fn test_generate_rejects_empty_inputs() {
        let engine = engine();
        assert!(matches!(
            engine.generate_key_pair("", &secret("pw")),
            Err(QfeError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.generate_key_pair("alice", &secret("")),
            Err(QfeError::InvalidArgument(_))
        ));
    }
}
