//! Input helper functions for the CLI.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use dialoguer::Password;
use qfile_core::SecretString;

use crate::constants::PASSPHRASE_ENV;

/// Prompt for passphrase, or read from QFE_PASSPHRASE env var.
pub fn prompt_passphrase() -> anyhow::Result<SecretString> {
    if let Some(value) = passphrase_from_env() {
        return Ok(value);
    }
    ensure_terminal()?;
    Password::new()
        .with_prompt("Passphrase")
        .interact()
        .map(SecretString::from)
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

/// Prompt for a new passphrase with confirmation, or read from QFE_PASSPHRASE env var.
pub fn prompt_new_passphrase() -> anyhow::Result<SecretString> {
    if let Some(value) = passphrase_from_env() {
        return Ok(value);
    }
    ensure_terminal()?;
    Password::new()
        .with_prompt("Enter passphrase")
        .with_confirmation("Confirm passphrase", "Passphrases do not match")
        .interact()
        .map(SecretString::from)
        .map_err(|e| anyhow::anyhow!("Failed to read passphrase: {}", e))
}

fn passphrase_from_env() -> Option<SecretString> {
    std::env::var(PASSPHRASE_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

fn ensure_terminal() -> anyhow::Result<()> {
    if io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "No passphrase provided and no TTY available. Set {}.",
            PASSPHRASE_ENV
        ))
    }
}

/// Default decrypt destination: the original file name in the current directory.
///
/// Only the final path component is used, so a stored name cannot point
/// outside the working directory.
pub fn default_output_path(original_name: &str) -> anyhow::Result<PathBuf> {
    let name = Path::new(original_name)
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Stored file name {:?} is not usable", original_name))?;
    Ok(PathBuf::from(name))
}
