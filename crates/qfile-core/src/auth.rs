//! Passphrase hashing collaborator.
//!
//! The service checks a passphrase against the stored hash before it touches
//! any key material. How that hash is produced is up to the embedding
//! application; [`Argon2Verifier`] is the bundled default.

use age::secrecy::{ExposeSecret, SecretString};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::config::HashingConfig;
use crate::error::{QfeError, Result};

/// Hashes and verifies passphrases.
pub trait PassphraseVerifier: Send + Sync {
    /// One-way hash suitable for storage.
    fn hash(&self, passphrase: &SecretString) -> Result<String>;

    /// Returns `Ok(false)` on mismatch; errors only for unreadable hashes.
    fn verify(&self, passphrase: &SecretString, hash: &str) -> Result<bool>;
}

/// Argon2id PHC-string verifier.
#[derive(Debug, Clone)]
pub struct Argon2Verifier {
    params: Params,
}

impl Argon2Verifier {
    pub fn new(config: &HashingConfig) -> Result<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| QfeError::Config(format!("Failed to create Argon2 params: {}", e)))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PassphraseVerifier for Argon2Verifier {
    fn hash(&self, passphrase: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(passphrase.expose_secret().as_bytes(), &salt)
            .map_err(|e| QfeError::KeyGeneration(format!("Passphrase hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify(&self, passphrase: &SecretString, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| QfeError::Storage(format!("Stored passphrase hash is invalid: {}", e)))?;
        // Parameters are read from the PHC string, so older hashes keep verifying.
        match self
            .argon2()
            .verify_password(passphrase.expose_secret().as_bytes(), &parsed)
        {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(QfeError::Storage(format!(
                "Passphrase verification failed: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> Argon2Verifier {
        Argon2Verifier::new(&HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_hash_then_verify() {
        let verifier = verifier();
        let hash = verifier.hash(&secret("correct-horse")).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verifier.verify(&secret("correct-horse"), &hash).unwrap());
        assert!(!verifier.verify(&secret("wrong"), &hash).unwrap());
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let hash = verifier().hash(&secret("correct-horse")).unwrap();
        assert!(!hash.contains("correct-horse"));
    }

    #[test]
    fn test_salts_differ() {
        let verifier = verifier();
        let a = verifier.hash(&secret("same")).unwrap();
        let b = verifier.hash(&secret("same")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        let result = verifier().verify(&secret("pw"), "not-a-phc-string");
        assert!(matches!(result, Err(QfeError::Storage(_))));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = Argon2Verifier::new(&HashingConfig {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert!(matches!(result, Err(QfeError::Config(_))));
    }
}
