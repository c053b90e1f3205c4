//! Registry policy (`registry.pol`) decoding.
//!
//! After the 8-byte header the file is a flat run of bracketed entries,
//! every delimiter being a UTF-16LE code unit:
//!
//! ```text
//! [key\0;valueName\0;type;size;data]
//!  |    | |          | |    |    |
//!  |    | |          | |    |    +-- size bytes of payload
//!  |    | |          | |    +------- u32 LE
//!  |    | |          | +------------ u32 LE
//!  |    | +----------+-------------- UTF-16LE, NUL terminated
//!  +----+--------------------------- UTF-16LE, NUL terminated
//! ```
//!
//! Decoding is a single forward scan. A malformed or truncated entry ends the
//! scan and whatever was decoded before it is returned.

use crate::error::{PolicyError, Result};
use crate::header::{PolHeader, HEADER_SIZE, MIN_FILE_SIZE};
use crate::utils::{find_utf16_nul, read_u16_le, read_u32_le, read_utf16_lossy};
use crate::value::{PolicyData, PolicyValueType};
use memmap2::Mmap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

pub(crate) const OPEN_BRACKET: u16 = b'[' as u16;
pub(crate) const SEMICOLON: u16 = b';' as u16;
pub(crate) const CLOSE_BRACKET: u16 = b']' as u16;

/// Bytes left at the end of a file that are never treated as an entry.
const TRAILER_SLACK: usize = 8;

/// Which half of a GPO a policy file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolicyScope {
    /// Computer configuration (`Machine\registry.pol`).
    Machine,
    /// User configuration (`User\registry.pol`).
    User,
}

impl PolicyScope {
    /// Both scopes, Machine first.
    pub const ALL: [PolicyScope; 2] = [PolicyScope::Machine, PolicyScope::User];

    /// Name of the GPO subfolder holding this scope's policy file.
    pub fn folder_name(&self) -> &'static str {
        match self {
            PolicyScope::Machine => "Machine",
            PolicyScope::User => "User",
        }
    }
}

impl fmt::Display for PolicyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.folder_name())
    }
}

/// One decoded entry of a policy file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PolicyEntry {
    /// Full registry path, e.g. `Software\Policies\Google\Chrome`.
    pub registry_key: String,

    /// Value name within the key.
    pub value_name: String,

    /// Value type as stored in the file.
    pub value_type: PolicyValueType,

    /// Decoded payload.
    pub data: PolicyData,

    /// File the entry came from.
    pub scope: PolicyScope,
}

impl PolicyEntry {
    /// Creates a REG_SZ entry.
    pub fn string(scope: PolicyScope, key: &str, value_name: &str, data: &str) -> Self {
        PolicyEntry {
            registry_key: key.to_string(),
            value_name: value_name.to_string(),
            value_type: PolicyValueType::String,
            data: PolicyData::String(data.to_string()),
            scope,
        }
    }

    /// Creates a REG_DWORD entry.
    pub fn dword(scope: PolicyScope, key: &str, value_name: &str, data: u32) -> Self {
        PolicyEntry {
            registry_key: key.to_string(),
            value_name: value_name.to_string(),
            value_type: PolicyValueType::Dword,
            data: PolicyData::Dword(data),
            scope,
        }
    }

    /// Returns true if both the key and the value name are present.
    pub fn is_usable(&self) -> bool {
        !self.registry_key.is_empty() && !self.value_name.is_empty()
    }
}

impl fmt::Display for PolicyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}\\{} ({}) = {}",
            self.scope,
            self.registry_key,
            self.value_name,
            self.value_type.name(),
            self.data
        )
    }
}

/// A decoded registry policy file.
#[derive(Debug, Clone)]
pub struct PolicyFile {
    /// Parsed header.
    pub header: PolHeader,

    /// Scope the file was read for.
    pub scope: PolicyScope,

    /// Usable entries in file order.
    pub entries: Vec<PolicyEntry>,

    /// Entries decoded but dropped for a missing key or value name.
    pub skipped_entries: usize,

    /// True if the scan stopped inside an entry that began with `[`.
    ///
    /// Trailing bytes that do not start an entry end the scan without
    /// setting this.
    pub truncated: bool,
}

impl PolicyFile {
    /// Opens and decodes a policy file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its header is invalid.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, scope: PolicyScope) -> Result<Self> {
        debug!("Opening policy file");
        let file = File::open(&path)?;

        // Validate file size BEFORE creating memory map
        let file_size = file.metadata()?.len() as usize;
        if file_size < MIN_FILE_SIZE {
            return Err(PolicyError::FileTooSmall {
                size: file_size,
                minimum: MIN_FILE_SIZE,
            });
        }

        // SAFETY: the file is opened read-only, is non-empty, and the map is
        // dropped before this function returns. All reads are bounds-checked.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(size = mmap.len(), "Memory mapped policy file");

        let policy_file = Self::parse(&mmap, scope)?;
        info!(
            scope = %scope,
            entries = policy_file.entries.len(),
            truncated = policy_file.truncated,
            "Decoded policy file"
        );
        Ok(policy_file)
    }

    /// Decodes a policy file from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error only for a bad header. Problems in the entry stream
    /// end the scan early; a cut-off entry also sets [`PolicyFile::truncated`].
    pub fn parse(data: &[u8], scope: PolicyScope) -> Result<Self> {
        let header = PolHeader::parse(data)?;

        let mut entries = Vec::new();
        let mut skipped_entries = 0;
        let mut truncated = false;
        let mut cursor = HEADER_SIZE;
        let limit = data.len() - TRAILER_SLACK;

        while cursor < limit {
            match decode_entry(data, cursor, scope) {
                Ok((entry, next)) => {
                    if entry.is_usable() {
                        entries.push(entry);
                    } else {
                        skipped_entries += 1;
                    }
                    cursor = next;
                }
                Err(e) => {
                    // Only a cut-off entry counts; padding after the last one does not.
                    truncated = matches!(read_u16_le(data, cursor), Ok(OPEN_BRACKET));
                    debug!(
                        offset = %format!("{:#x}", cursor),
                        truncated,
                        error = %e,
                        "Stopping policy scan"
                    );
                    break;
                }
            }
        }

        Ok(PolicyFile {
            header,
            scope,
            entries,
            skipped_entries,
            truncated,
        })
    }

    /// Consumes the file, returning its entries.
    pub fn into_entries(self) -> Vec<PolicyEntry> {
        self.entries
    }
}

/// Decodes the entries of a policy file.
///
/// # Errors
///
/// Fails with a format error ([`PolicyError::is_format_error`]) if the buffer
/// is shorter than 16 bytes or does not start with `PReg`.
///
/// # Examples
///
/// ```rust
/// use pol_parser::{decode, PolicyScope};
///
/// assert!(decode(b"not a policy file", PolicyScope::Machine).is_err());
/// ```
pub fn decode(data: &[u8], scope: PolicyScope) -> Result<Vec<PolicyEntry>> {
    PolicyFile::parse(data, scope).map(PolicyFile::into_entries)
}

/// Decodes a policy file, treating an unusable file as empty.
///
/// Header failures are logged and yield no entries so that the other scope
/// of a GPO can still be processed.
pub fn decode_lossy(data: &[u8], scope: PolicyScope) -> Vec<PolicyEntry> {
    match decode(data, scope) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(scope = %scope, error = %e, "Ignoring unusable policy file");
            Vec::new()
        }
    }
}

/// Decodes one bracketed entry starting at `offset`.
///
/// Returns the entry and the offset just past its closing bracket.
fn decode_entry(data: &[u8], offset: usize, scope: PolicyScope) -> Result<(PolicyEntry, usize)> {
    let mut pos = expect_delimiter(data, offset, OPEN_BRACKET)?;

    let (registry_key, next) = read_terminated_string(data, pos)?;
    pos = expect_delimiter(data, next, SEMICOLON)?;

    let (value_name, next) = read_terminated_string(data, pos)?;
    pos = expect_delimiter(data, next, SEMICOLON)?;

    let value_type = PolicyValueType::from_u32(read_u32_le(data, pos)?);
    pos = expect_delimiter(data, pos + 4, SEMICOLON)?;

    let data_size = read_u32_le(data, pos)? as usize;
    pos = expect_delimiter(data, pos + 4, SEMICOLON)?;

    let data_end = pos
        .checked_add(data_size)
        .filter(|&end| end <= data.len())
        .ok_or(PolicyError::TruncatedData {
            offset: pos,
            expected: data_size,
            actual: data.len().saturating_sub(pos),
        })?;
    let payload = &data[pos..data_end];

    let next = expect_delimiter(data, data_end, CLOSE_BRACKET)?;

    let entry = PolicyEntry {
        registry_key,
        value_name,
        value_type,
        data: PolicyData::decode(payload, value_type),
        scope,
    };
    Ok((entry, next))
}

/// Checks for a delimiter code unit and returns the offset after it.
fn expect_delimiter(data: &[u8], offset: usize, expected: u16) -> Result<usize> {
    let found = read_u16_le(data, offset)?;
    if found != expected {
        return Err(PolicyError::MalformedEntry {
            offset,
            reason: format!(
                "expected '{}' but found code unit {:#06x}",
                char::from(expected as u8),
                found
            ),
        });
    }
    Ok(offset + 2)
}

/// Reads a NUL-terminated UTF-16LE string, returning it and the offset after the NUL.
fn read_terminated_string(data: &[u8], offset: usize) -> Result<(String, usize)> {
    let end = find_utf16_nul(data, offset).ok_or(PolicyError::MalformedEntry {
        offset,
        reason: "unterminated string".to_string(),
    })?;
    Ok((read_utf16_lossy(&data[offset..end]), end + 2))
}
