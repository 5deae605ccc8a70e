use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use qfile_core::VERSION;

/// QFile - per-user asymmetric file encryption
#[derive(Parser)]
#[command(name = "qfe")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "QFE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `gen-key` command
#[derive(Args)]
pub struct GenKeyArgs {
    /// Identity that will own the key pair
    #[arg(short, long)]
    pub username: String,

    /// Name others use to address files to this key (defaults to the username)
    #[arg(short, long)]
    pub recipient: Option<String>,
}

/// Arguments for the `encrypt` command
#[derive(Args)]
pub struct EncryptArgs {
    /// Identity performing the encryption
    #[arg(short, long)]
    pub username: String,

    /// Recipient id (or username) the file is encrypted for
    #[arg(short, long)]
    pub recipient: String,

    /// File to encrypt
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for the `decrypt` command
#[derive(Args)]
pub struct DecryptArgs {
    /// Identity whose private key opens the file
    #[arg(short, long)]
    pub username: String,

    /// Unique filename returned by `encrypt`
    #[arg(value_name = "ID")]
    pub id: String,

    /// Where to write the plaintext (defaults to the original name in the current directory)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Owner whose files are listed
    #[arg(short, long)]
    pub username: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `revoke` command
#[derive(Args)]
pub struct RevokeArgs {
    /// Identity whose key pair is deleted
    #[arg(short, long)]
    pub username: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file
    Init(InitArgs),

    /// Generate a key pair for a user
    GenKey(GenKeyArgs),

    /// Encrypt a file for a recipient
    Encrypt(EncryptArgs),

    /// Decrypt a stored file
    Decrypt(DecryptArgs),

    /// List files encrypted by a user
    List(ListArgs),

    /// Delete a user's key pair
    Revoke(RevokeArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}
