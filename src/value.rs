//! Registry value types and decoded policy data.

use crate::utils::{read_u32_le, read_utf16_lossy};
use std::fmt;

/// Longest REG_SZ payload kept from a policy file, in UTF-16 code units.
pub const MAX_STRING_UNITS: usize = 1000;

/// Placeholder shown for payloads that are not decoded.
pub const BINARY_PLACEHOLDER: &str = "<binary data>";

/// Registry value data types as stored in the type field of a policy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolicyValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// 64-bit little-endian integer.
    Qword,

    /// Any other type code.
    Unknown(u32),
}

impl PolicyValueType {
    /// Maps a raw type code to a value type. Every code is accepted.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => PolicyValueType::None,
            1 => PolicyValueType::String,
            2 => PolicyValueType::ExpandString,
            3 => PolicyValueType::Binary,
            4 => PolicyValueType::Dword,
            5 => PolicyValueType::DwordBigEndian,
            6 => PolicyValueType::Link,
            7 => PolicyValueType::MultiString,
            11 => PolicyValueType::Qword,
            _ => PolicyValueType::Unknown(value),
        }
    }

    /// Returns the raw type code.
    pub fn code(&self) -> u32 {
        match self {
            PolicyValueType::None => 0,
            PolicyValueType::String => 1,
            PolicyValueType::ExpandString => 2,
            PolicyValueType::Binary => 3,
            PolicyValueType::Dword => 4,
            PolicyValueType::DwordBigEndian => 5,
            PolicyValueType::Link => 6,
            PolicyValueType::MultiString => 7,
            PolicyValueType::Qword => 11,
            PolicyValueType::Unknown(value) => *value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            PolicyValueType::None => "REG_NONE".to_string(),
            PolicyValueType::String => "REG_SZ".to_string(),
            PolicyValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            PolicyValueType::Binary => "REG_BINARY".to_string(),
            PolicyValueType::Dword => "REG_DWORD".to_string(),
            PolicyValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            PolicyValueType::Link => "REG_LINK".to_string(),
            PolicyValueType::MultiString => "REG_MULTI_SZ".to_string(),
            PolicyValueType::Qword => "REG_QWORD".to_string(),
            PolicyValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }
}

/// Decoded payload of a policy entry.
///
/// Only REG_SZ and REG_DWORD are decoded. Everything else is kept as an
/// opaque marker; the raw bytes are not retained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolicyData {
    /// Zero-length data, or a DWORD shorter than four bytes.
    None,

    /// String value.
    String(String),

    /// 32-bit integer.
    Dword(u32),

    /// Any other type, not decoded.
    Binary,
}

impl PolicyData {
    /// Decodes a payload according to its type.
    ///
    /// Never fails: invalid UTF-16 in a string is replaced rather than
    /// rejected, so a single odd value cannot hide the rest of the file.
    pub fn decode(data: &[u8], value_type: PolicyValueType) -> Self {
        if data.is_empty() {
            return PolicyData::None;
        }

        match value_type {
            PolicyValueType::String => {
                let capped = &data[..data.len().min(MAX_STRING_UNITS * 2)];
                PolicyData::String(read_utf16_lossy(capped))
            }

            PolicyValueType::Dword => match read_u32_le(data, 0) {
                Ok(value) => PolicyData::Dword(value),
                Err(_) => PolicyData::None,
            },

            _ => PolicyData::Binary,
        }
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PolicyData::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the DWORD payload, if any.
    pub fn as_dword(&self) -> Option<u32> {
        match self {
            PolicyData::Dword(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyData::None => write!(f, "(none)"),
            PolicyData::String(s) => write!(f, "{}", s),
            PolicyData::Dword(d) => write!(f, "{} (0x{:08X})", d, d),
            PolicyData::Binary => write!(f, "{}", BINARY_PLACEHOLDER),
        }
    }
}
