//! Service configuration.
//!
//! All fields have defaults so a partial TOML table deserializes cleanly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QfeError, Result};

/// Lowest scrypt work factor accepted when sealing private keys.
pub const MIN_SCRYPT_WORK_FACTOR: u8 = 10;

/// Highest scrypt work factor accepted (2^22 * 1 KiB = 4 GiB of memory).
pub const MAX_SCRYPT_WORK_FACTOR: u8 = 22;

/// Runtime settings for [`crate::FileEncryptionService`] and [`crate::WorkerPool`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory for per-request decrypted output. `None` uses the system temp dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,

    /// Worker pool size. `0` sizes the pool to the available cores.
    pub max_concurrency: usize,

    /// Deadline for a single pooled operation.
    pub operation_timeout_secs: u64,

    /// How many unique filenames to try before giving up.
    pub filename_attempts: u32,

    /// scrypt `log2(N)` used when sealing a new private key.
    pub scrypt_work_factor: u8,

    /// Largest scrypt `log2(N)` accepted when unlocking a private key.
    pub scrypt_max_work_factor: u8,

    /// Passphrase hashing parameters for [`crate::auth::Argon2Verifier`].
    pub hashing: HashingConfig,
}

/// Argon2id parameters for passphrase hashes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            max_concurrency: 0,
            operation_timeout_secs: 300,
            filename_attempts: 8,
            scrypt_work_factor: 16,
            scrypt_max_work_factor: 20,
            hashing: HashingConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Check ranges that would otherwise surface as confusing runtime errors.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SCRYPT_WORK_FACTOR..=MAX_SCRYPT_WORK_FACTOR).contains(&self.scrypt_work_factor) {
            return Err(QfeError::Config(format!(
                "scrypt_work_factor must be between {} and {} (got {})",
                MIN_SCRYPT_WORK_FACTOR, MAX_SCRYPT_WORK_FACTOR, self.scrypt_work_factor
            )));
        }
        if self.scrypt_max_work_factor < self.scrypt_work_factor
            || self.scrypt_max_work_factor > MAX_SCRYPT_WORK_FACTOR
        {
            return Err(QfeError::Config(format!(
                "scrypt_max_work_factor must be between scrypt_work_factor and {} (got {})",
                MAX_SCRYPT_WORK_FACTOR, self.scrypt_max_work_factor
            )));
        }
        if self.filename_attempts == 0 {
            return Err(QfeError::Config(
                "filename_attempts must be at least 1".to_string(),
            ));
        }
        if self.operation_timeout_secs == 0 {
            return Err(QfeError::Config(
                "operation_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.hashing.iterations == 0 || self.hashing.parallelism == 0 {
            return Err(QfeError::Config(
                "hashing iterations and parallelism must be at least 1".to_string(),
            ));
        }
        if self.hashing.memory_kib < 8 * self.hashing.parallelism {
            return Err(QfeError::Config(format!(
                "hashing memory_kib must be at least {} for parallelism {}",
                8 * self.hashing.parallelism,
                self.hashing.parallelism
            )));
        }
        Ok(())
    }

    /// Pool size after resolving `0` to the core count.
    pub fn effective_concurrency(&self) -> usize {
        if self.max_concurrency > 0 {
            return self.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        ServiceConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ServiceConfig = toml::from_str("scrypt_work_factor = 12\n").unwrap();
        assert_eq!(config.scrypt_work_factor, 12);
        assert_eq!(config.filename_attempts, 8);
        assert_eq!(config.hashing, HashingConfig::default());
    }

    #[test]
    fn test_work_factor_out_of_range_rejected() {
        let config = ServiceConfig {
            scrypt_work_factor: 4,
            ..ServiceConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scrypt_work_factor"));
    }

    #[test]
    fn test_max_below_work_factor_rejected() {
        let config = ServiceConfig {
            scrypt_work_factor: 16,
            scrypt_max_work_factor: 14,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_resolves_to_cores() {
        let config = ServiceConfig::default();
        assert!(config.effective_concurrency() >= 1);

        let fixed = ServiceConfig {
            max_concurrency: 3,
            ..ServiceConfig::default()
        };
        assert_eq!(fixed.effective_concurrency(), 3);
    }
}
