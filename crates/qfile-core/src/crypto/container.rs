//! Ciphertext container header.
//!
//! Layout (version 1):
//!
//! ```text
//! offset  size  field
//! 0       4     magic "QFEC"
//! 4       1     format version (1)
//! 5       1     key-wrap algorithm (1 = X25519 stanza in an age v1 header)
//! 6       1     content algorithm (1 = ChaCha20-Poly1305 STREAM, 64 KiB chunks)
//! 7       1     reserved, must be 0
//! 8       ..    age v1 envelope: wrapped content key, header MAC, STREAM payload
//! ```

use std::io::{self, Read, Write};

use crate::error::{QfeError, Result};

pub const MAGIC: [u8; 4] = *b"QFEC";
pub const FORMAT_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 8;

/// How the content key is wrapped for the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyWrap {
    X25519 = 1,
}

/// How the content itself is encrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentCipher {
    ChaCha20Poly1305Stream = 1,
}

/// Parsed fixed-size container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u8,
    pub key_wrap: KeyWrap,
    pub content: ContentCipher,
}

impl ContainerHeader {
    /// Header written by this version of the crate.
    pub fn current() -> Self {
        Self {
            version: FORMAT_VERSION,
            key_wrap: KeyWrap::X25519,
            content: ContentCipher::ChaCha20Poly1305Stream,
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&MAGIC);
        out[4] = self.version;
        out[5] = self.key_wrap as u8;
        out[6] = self.content as u8;
        out
    }

    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        if bytes[..4] != MAGIC {
            return Err(QfeError::Decryption(
                "Not a QFile container (bad magic)".to_string(),
            ));
        }
        if bytes[4] != FORMAT_VERSION {
            return Err(QfeError::Decryption(format!(
                "Unsupported container version {}",
                bytes[4]
            )));
        }
        let key_wrap = match bytes[5] {
            1 => KeyWrap::X25519,
            other => {
                return Err(QfeError::Decryption(format!(
                    "Unsupported key-wrap algorithm {}",
                    other
                )))
            }
        };
        let content = match bytes[6] {
            1 => ContentCipher::ChaCha20Poly1305Stream,
            other => {
                return Err(QfeError::Decryption(format!(
                    "Unsupported content algorithm {}",
                    other
                )))
            }
        };
        if bytes[7] != 0 {
            return Err(QfeError::Decryption(
                "Reserved header byte is not zero".to_string(),
            ));
        }
        Ok(Self {
            version: bytes[4],
            key_wrap,
            content,
        })
    }

    pub fn write_to(self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Read and validate the header. A short read is a malformed container.
    pub fn read_from(reader: &mut dyn Read) -> Result<Self> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                QfeError::Decryption("Container is truncated".to_string())
            }
            _ => QfeError::Storage(format!("Failed to read container header: {}", e)),
        })?;
        Self::parse(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_current_header_layout() {
        let bytes = ContainerHeader::current().to_bytes();
        assert_eq!(&bytes, b"QFEC\x01\x01\x01\x00");
    }

    #[test]
    fn test_read_back_current_header() {
        let mut buf = Vec::new();
        ContainerHeader::current().write_to(&mut buf).unwrap();
        let parsed = ContainerHeader::read_from(&mut Cursor::new(buf)).unwrap();
        assert_eq!(parsed, ContainerHeader::current());
    }

    #[test]
    fn test_every_header_bit_is_checked() {
        let good = ContainerHeader::current().to_bytes();
        for byte in 0..HEADER_LEN {
            for bit in 0..8 {
                let mut bad = good;
                bad[byte] ^= 1 << bit;
                assert!(
                    matches!(ContainerHeader::parse(&bad), Err(QfeError::Decryption(_))),
                    "flip at byte {} bit {} was accepted",
                    byte,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_truncated_header() {
        let result = ContainerHeader::read_from(&mut Cursor::new(b"QFE".to_vec()));
        assert!(matches!(result, Err(QfeError::Decryption(_))));
    }
}
