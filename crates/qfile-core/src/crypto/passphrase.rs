//! Passphrase validation.

use age::secrecy::{ExposeSecret, SecretString};

use crate::error::{QfeError, Result};

/// Upper bound on passphrase length in bytes.
const MAX_PASSPHRASE_BYTES: usize = 1024;

/// Validate a passphrase before it is used to seal or unlock a key.
///
/// # Requirements
///
/// - Not empty
/// - At most 1024 bytes
///
/// # Examples
///
/// ```
/// use qfile_core::crypto::validate_passphrase;
/// use qfile_core::SecretString;
///
/// assert!(validate_passphrase(&SecretString::from("correct-horse".to_string())).is_ok());
/// assert!(validate_passphrase(&SecretString::from(String::new())).is_err());
/// ```
pub fn validate_passphrase(passphrase: &SecretString) -> Result<()> {
    let value = passphrase.expose_secret();

    if value.is_empty() {
        return Err(QfeError::InvalidArgument(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if value.len() > MAX_PASSPHRASE_BYTES {
        return Err(QfeError::InvalidArgument(format!(
            "Passphrase must be at most {} bytes",
            MAX_PASSPHRASE_BYTES
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_valid_passphrase() {
        assert!(validate_passphrase(&secret("correct-horse")).is_ok());
        assert!(validate_passphrase(&secret("x")).is_ok());
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let result = validate_passphrase(&secret(""));
        assert!(matches!(result, Err(QfeError::InvalidArgument(ref msg)) if msg.contains("empty")));
    }

    #[test]
    fn test_overlong_passphrase_rejected() {
        let long = "a".repeat(MAX_PASSPHRASE_BYTES + 1);
        assert!(validate_passphrase(&secret(&long)).is_err());
        let exact = "a".repeat(MAX_PASSPHRASE_BYTES);
        assert!(validate_passphrase(&secret(&exact)).is_ok());
    }

    #[test]
    fn test_error_does_not_echo_passphrase() {
        let long = format!("{}{}", "secret-marker-", "b".repeat(MAX_PASSPHRASE_BYTES));
        let err = validate_passphrase(&secret(&long)).unwrap_err();
        assert!(!err.to_string().contains("secret-marker"));
    }
}
