//! Error types for policy file decoding and ADMX matching.
//!
//! Most per-file failures are recoverable: callers log them and move on to the
//! next file. Only the precondition errors (`DirectoryNotFound`,
//! `NoPolicyFiles`) are meant to stop a run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Errors that can occur while decoding policy files or scanning ADMX stores.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// I/O error occurred while reading an input file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with the `PReg` signature.
    #[error("Invalid signature: expected {}, found {}", hex::encode(.expected), hex::encode(.found))]
    InvalidSignature {
        expected: Vec<u8>,
        found: Vec<u8>,
    },

    /// Policy file is too small to hold a header and one entry.
    #[error("Policy file too small: {size} bytes (minimum: {minimum} bytes)")]
    FileTooSmall {
        size: usize,
        minimum: usize,
    },

    /// Data truncated or incomplete.
    #[error("Truncated data at offset {offset:#x}: expected {expected} bytes, got {actual} bytes")]
    TruncatedData {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// A policy entry does not follow the bracketed layout.
    #[error("Malformed policy entry at offset {offset:#x}: {reason}")]
    MalformedEntry {
        offset: usize,
        reason: String,
    },

    /// An ADMX or ADML document could not be parsed.
    #[error("Failed to parse {file}: {message}")]
    AdmxParse {
        file: String,
        message: String,
    },

    /// A GPO settings report could not be parsed.
    #[error("Failed to parse GPO report: {0}")]
    ReportParse(String),

    /// The ADMX store directory does not exist.
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Neither the Machine nor the User policy file exists for a GPO.
    #[error("No registry.pol files found under {}", .0.display())]
    NoPolicyFiles(PathBuf),

    /// Entry data cannot be encoded back into a policy file.
    #[error("Unsupported data: {0}")]
    UnsupportedData(String),
}

impl PolicyError {
    /// Creates an invalid signature error with context.
    ///
    /// # Arguments
    ///
    /// * `expected` - Expected signature bytes
    /// * `found` - Actual signature bytes found
    pub fn invalid_signature(expected: &[u8], found: &[u8]) -> Self {
        Self::InvalidSignature {
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// Creates an ADMX parse error for the named file.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use pol_parser::error::PolicyError;
    /// let err = PolicyError::admx_parse("chrome.admx", "unexpected end of stream");
    /// assert!(err.to_string().contains("chrome.admx"));
    /// ```
    pub fn admx_parse(file: &str, message: impl ToString) -> Self {
        Self::AdmxParse {
            file: file.to_string(),
            message: message.to_string(),
        }
    }

    /// Returns true for the header failures a caller treats as "file absent".
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            PolicyError::InvalidSignature { .. } | PolicyError::FileTooSmall { .. }
        )
    }
}
