//! Cryptographic operations for QFile.
//!
//! This module provides per-user asymmetric file encryption using
//! well-audited libraries:
//! - **Age**: X25519 key wrapping and ChaCha20-Poly1305 STREAM encryption
//!   (https://age-encryption.org/)
//! - **scrypt** (via age): passphrase-derived key sealing each private key
//!
//! ## Security Model
//!
//! - One X25519 key pair per identity; the private key is only stored sealed
//! - Envelope encryption: a random content key per file, wrapped for the recipient
//! - Chunked authenticated encryption, so tampering and truncation are detected
//! - Unlocked keys and plaintext buffers are zeroized from memory on drop
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of ciphertext blobs and the key catalog
//! - Offline brute-force attacks on passphrases (memory-hard KDF)
//! - Modification of stored ciphertext
//!
//! We do NOT defend against:
//! - Compromised host / keylogger
//! - Access to the decrypted output of a live request

pub mod container;
pub mod engine;
pub mod keys;
pub mod passphrase;
pub mod stream;

pub use container::ContainerHeader;
pub use engine::{AgeEngine, CryptoEngine};
pub use keys::{GeneratedKeys, PublicKey, SealedPrivateKey, UnlockedKey};
pub use passphrase::validate_passphrase;
pub use stream::{CancelFlag, CHUNK_SIZE};
