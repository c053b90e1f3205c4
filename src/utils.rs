//! Utility functions for binary parsing and string conversion.

use crate::error::{PolicyError, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use encoding_rs::{Encoding, UTF_16LE, UTF_8};
use std::borrow::Cow;
use std::io::Cursor;

/// Reads a u32 from a byte slice at the given offset.
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    if offset.checked_add(4).map_or(true, |end| end > data.len()) {
        return Err(PolicyError::TruncatedData {
            offset,
            expected: 4,
            actual: data.len().saturating_sub(offset),
        });
    }

    let mut cursor = Cursor::new(&data[offset..offset + 4]);
    Ok(cursor.read_u32::<LittleEndian>()?)
}

/// Reads a u16 from a byte slice at the given offset.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    if offset.checked_add(2).map_or(true, |end| end > data.len()) {
        return Err(PolicyError::TruncatedData {
            offset,
            expected: 2,
            actual: data.len().saturating_sub(offset),
        });
    }

    let mut cursor = Cursor::new(&data[offset..offset + 2]);
    Ok(cursor.read_u16::<LittleEndian>()?)
}

/// Decodes UTF-16LE bytes, replacing invalid sequences and trimming null terminators.
///
/// A trailing odd byte is ignored, since policy data sizes are written by
/// third-party tools and are not always even.
pub fn read_utf16_lossy(data: &[u8]) -> String {
    let (decoded, _) = UTF_16LE.decode_without_bom_handling(&data[..data.len() & !1]);
    decoded.trim_end_matches('\0').to_string()
}

/// Finds the next UTF-16 NUL code unit at or after `start`.
///
/// Scans in 2-byte steps relative to `start`. Returns the offset of the
/// terminator, or `None` if the buffer ends first.
pub fn find_utf16_nul(data: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    while pos + 2 <= data.len() {
        if data[pos] == 0 && data[pos + 1] == 0 {
            return Some(pos);
        }
        pos += 2;
    }
    None
}

/// Decodes an XML document to text, honouring a UTF-8 or UTF-16 byte order mark.
///
/// ADMX files are normally UTF-8 while `Get-GPOReport` writes UTF-16LE, so
/// both have to be accepted. Without a BOM the input is taken as UTF-8.
pub fn decode_text(data: &[u8]) -> Cow<'_, str> {
    let encoding = Encoding::for_bom(data)
        .map(|(encoding, _)| encoding)
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(data);
    text
}

/// Case-insensitive substring test (ASCII folding, like the rest of the matcher).
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}
