//! Registry policy file encoding.
//!
//! Produces `registry.pol` bytes from decoded entries. Only entries whose data
//! was fully decoded (REG_SZ, REG_DWORD, or empty) can be written, since the
//! decoder does not keep raw bytes for other types.

use crate::error::{PolicyError, Result};
use crate::header::PolHeader;
use crate::policy_file::{PolicyEntry, CLOSE_BRACKET, OPEN_BRACKET, SEMICOLON};
use crate::value::{PolicyData, PolicyValueType};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Encodes entries into a complete policy file buffer.
///
/// # Errors
///
/// Returns [`PolicyError::UnsupportedData`] for an entry holding
/// [`PolicyData::Binary`], or whose data does not fit its declared type.
///
/// # Examples
///
/// ```rust
/// use pol_parser::{decode, encode_entries, PolicyEntry, PolicyScope};
///
/// let entry = PolicyEntry::dword(PolicyScope::Machine, "Software\\Policies\\Vendor", "Enabled", 1);
/// let bytes = encode_entries(&[entry.clone()]).unwrap();
/// assert_eq!(decode(&bytes, PolicyScope::Machine).unwrap(), vec![entry]);
/// ```
pub fn encode_entries(entries: &[PolicyEntry]) -> Result<Vec<u8>> {
    let mut buf = PolHeader::default().to_bytes().to_vec();
    for entry in entries {
        encode_entry(&mut buf, entry)?;
    }
    Ok(buf)
}

/// Encodes entries and writes them to `path`.
pub fn write_policy_file<P: AsRef<Path>>(path: P, entries: &[PolicyEntry]) -> Result<()> {
    let bytes = encode_entries(entries)?;
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.flush()?;
    Ok(())
}

fn encode_entry(buf: &mut Vec<u8>, entry: &PolicyEntry) -> Result<()> {
    let payload = encode_payload(entry)?;
    let size = u32::try_from(payload.len()).map_err(|_| {
        PolicyError::UnsupportedData(format!(
            "{}\\{}: payload of {} bytes is too large",
            entry.registry_key,
            entry.value_name,
            payload.len()
        ))
    })?;

    push_unit(buf, OPEN_BRACKET);
    push_terminated(buf, &entry.registry_key);
    push_unit(buf, SEMICOLON);
    push_terminated(buf, &entry.value_name);
    push_unit(buf, SEMICOLON);
    buf.extend_from_slice(&entry.value_type.code().to_le_bytes());
    push_unit(buf, SEMICOLON);
    buf.extend_from_slice(&size.to_le_bytes());
    push_unit(buf, SEMICOLON);
    buf.extend_from_slice(&payload);
    push_unit(buf, CLOSE_BRACKET);
    Ok(())
}

fn encode_payload(entry: &PolicyEntry) -> Result<Vec<u8>> {
    match (&entry.data, entry.value_type) {
        (PolicyData::None, _) => Ok(Vec::new()),
        (PolicyData::String(s), PolicyValueType::String) => {
            let mut payload = Vec::with_capacity((s.len() + 1) * 2);
            push_terminated(&mut payload, s);
            Ok(payload)
        }
        (PolicyData::Dword(d), PolicyValueType::Dword) => Ok(d.to_le_bytes().to_vec()),
        (data, value_type) => Err(PolicyError::UnsupportedData(format!(
            "{}\\{}: cannot encode {:?} as {}",
            entry.registry_key,
            entry.value_name,
            data,
            value_type.name()
        ))),
    }
}

fn push_unit(buf: &mut Vec<u8>, unit: u16) {
    buf.extend_from_slice(&unit.to_le_bytes());
}

fn push_terminated(buf: &mut Vec<u8>, s: &str) {
    for unit in s.encode_utf16() {
        push_unit(buf, unit);
    }
    push_unit(buf, 0);
}
