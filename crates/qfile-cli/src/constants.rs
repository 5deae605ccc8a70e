//! Constants used throughout the CLI.

/// Exit codes for the CLI.
///
/// These follow common Unix conventions:
/// - 0: Success
/// - 1: General error (used by anyhow for unhandled errors)
/// - 2: Misuse of shell command (reserved by shells)
/// - 3+: Application-specific errors
pub mod exit_codes {
    /// General failure.
    pub const FAILURE: i32 = 1;

    /// Resource not found (input file, stored file, key pair, recipient).
    pub const NOT_FOUND: i32 = 3;

    /// Invalid user input, config, or an existing target.
    pub const INVALID_INPUT: i32 = 4;

    /// Authentication failed (wrong passphrase).
    pub const AUTH_FAILED: i32 = 5;

    /// Ciphertext failed authentication or is not addressed to the user.
    pub const INTEGRITY_FAILED: i32 = 6;
}

/// Environment variable holding the passphrase for non-interactive use.
pub const PASSPHRASE_ENV: &str = "QFE_PASSPHRASE";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "QFE_LOG";
