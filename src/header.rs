//! Registry policy file header parsing.
//!
//! A `registry.pol` file starts with an 8-byte header: the ASCII signature
//! `PReg` followed by a 32-bit little-endian version (always 1 in practice).
//! Entries follow immediately after.

use crate::error::{PolicyError, Result};
use crate::utils::read_u32_le;
use std::fmt;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Smallest buffer accepted as a policy file.
pub const MIN_FILE_SIZE: usize = 16;

/// Expected signature for a registry policy file ("PReg").
pub const PREG_SIGNATURE: &[u8; 4] = b"PReg";

/// Version written by Windows.
pub const PREG_VERSION: u32 = 1;

/// Registry policy file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolHeader {
    /// Signature, always "PReg".
    pub signature: [u8; 4],

    /// Format version. Not validated.
    pub version: u32,
}

impl PolHeader {
    /// Parses the header from the start of a policy file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Data is shorter than [`MIN_FILE_SIZE`]
    /// - Signature is not `PReg`
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_FILE_SIZE {
            return Err(PolicyError::FileTooSmall {
                size: data.len(),
                minimum: MIN_FILE_SIZE,
            });
        }

        let mut signature = [0u8; 4];
        signature.copy_from_slice(&data[0..4]);

        if &signature != PREG_SIGNATURE {
            return Err(PolicyError::invalid_signature(PREG_SIGNATURE, &signature));
        }

        let version = read_u32_le(data, 4)?;

        Ok(PolHeader { signature, version })
    }

    /// Returns the header bytes as written to disk.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.signature);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes
    }
}

impl Default for PolHeader {
    fn default() -> Self {
        PolHeader {
            signature: *PREG_SIGNATURE,
            version: PREG_VERSION,
        }
    }
}

impl fmt::Display for PolHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PReg version {}", self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_signature() {
        let mut data = vec![0u8; MIN_FILE_SIZE];
        data[0..4].copy_from_slice(b"XXXX");

        let result = PolHeader::parse(&data);
        assert!(matches!(result.unwrap_err(), PolicyError::InvalidSignature { .. }));
    }

    #[test]
    fn test_too_small() {
        let result = PolHeader::parse(b"PReg\x01\x00\x00\x00");
        assert!(matches!(result.unwrap_err(), PolicyError::FileTooSmall { size: 8, .. }));
    }

    #[test]
    fn test_header_bytes() {
        let header = PolHeader::default();
        let mut data = header.to_bytes().to_vec();
        data.resize(MIN_FILE_SIZE, 0);

        let parsed = PolHeader::parse(&data).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.to_string(), "PReg version 1");
    }
}
