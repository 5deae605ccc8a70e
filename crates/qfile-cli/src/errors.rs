//! Mapping from errors to process exit codes.

use qfile_core::QfeError;

use crate::constants::exit_codes;

/// Exit code for an error bubbling out of a command.
///
/// Core errors keep their kind through `anyhow` context, so the first
/// [`QfeError`] in the chain decides the code.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<QfeError>())
        .map(code_for)
        .unwrap_or(exit_codes::FAILURE)
}

fn code_for(err: &QfeError) -> i32 {
    match err {
        QfeError::NotFound(_) | QfeError::NoKeyPair(_) | QfeError::UnknownRecipient(_) => {
            exit_codes::NOT_FOUND
        }
        QfeError::InvalidArgument(_) | QfeError::AlreadyExists(_) | QfeError::Config(_) => {
            exit_codes::INVALID_INPUT
        }
        QfeError::BadPassphrase => exit_codes::AUTH_FAILED,
        QfeError::Decryption(_) => exit_codes::INTEGRITY_FAILED,
        _ => exit_codes::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_core_errors_map_to_codes() {
        let cases = [
            (QfeError::NotFound("x".into()), exit_codes::NOT_FOUND),
            (QfeError::NoKeyPair("x".into()), exit_codes::NOT_FOUND),
            (QfeError::AlreadyExists("x".into()), exit_codes::INVALID_INPUT),
            (QfeError::BadPassphrase, exit_codes::AUTH_FAILED),
            (QfeError::Decryption("x".into()), exit_codes::INTEGRITY_FAILED),
            (QfeError::Storage("x".into()), exit_codes::FAILURE),
        ];
        for (err, expected) in cases {
            assert_eq!(exit_code(&anyhow::Error::new(err)), expected);
        }
    }

    #[test]
    fn test_context_keeps_code() {
        let result: Result<(), QfeError> = Err(QfeError::BadPassphrase);
        let err = result.context("Failed to decrypt abc").unwrap_err();
        assert_eq!(exit_code(&err), exit_codes::AUTH_FAILED);
    }

    #[test]
    fn test_plain_anyhow_is_general_failure() {
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), exit_codes::FAILURE);
    }
}
