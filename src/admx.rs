//! ADMX policy definitions and ADML string tables.
//!
//! Only the parts of the templates the matcher needs are extracted: each
//! `<policy>` element's name, display-name reference, class, and registry
//! `key`/`valueName` attributes, and the ADML `<string id="…">` table used to
//! resolve `$(string.id)` references.

use crate::error::{PolicyError, Result};
use crate::utils::decode_text;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Extension of ADMX template files.
pub const ADMX_EXTENSION: &str = "admx";

/// Extension of ADML language files.
pub const ADML_EXTENSION: &str = "adml";

const STRING_REF_PREFIX: &str = "$(string.";

/// Which configuration a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PolicyClass {
    /// Computer configuration.
    Machine,
    /// User configuration.
    User,
    /// Either.
    Both,
}

impl PolicyClass {
    fn from_attribute(value: Option<&str>) -> Option<Self> {
        match value? {
            v if v.eq_ignore_ascii_case("Machine") => Some(PolicyClass::Machine),
            v if v.eq_ignore_ascii_case("User") => Some(PolicyClass::User),
            v if v.eq_ignore_ascii_case("Both") => Some(PolicyClass::Both),
            _ => None,
        }
    }
}

/// One `<policy>` element of an ADMX file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdmxPolicyDefinition {
    /// File the policy was read from, e.g. `chrome.admx`.
    pub admx_file: String,

    /// The policy's `name` attribute.
    pub name: String,

    /// The `displayName` attribute, usually `$(string.id)`.
    pub display_name_ref: String,

    /// The `class` attribute, if recognized.
    pub class: Option<PolicyClass>,

    /// The policy's own `key` attribute.
    pub registry_key: Option<String>,

    /// The policy's own `valueName` attribute.
    pub registry_value_name: Option<String>,
}

impl AdmxPolicyDefinition {
    /// Returns the display-name reference without its `$(string.` `)` wrapper.
    pub fn display_name_id(&self) -> &str {
        strip_string_ref(&self.display_name_ref)
    }
}

/// Strips the `$(string.` prefix and `)` suffix from a string reference.
///
/// Text without the wrapper is returned unchanged.
pub fn strip_string_ref(reference: &str) -> &str {
    let s = reference.trim();
    let s = s.strip_prefix(STRING_REF_PREFIX).unwrap_or(s);
    s.strip_suffix(')').unwrap_or(s)
}

/// Parses the policy definitions out of ADMX text.
///
/// # Errors
///
/// Returns [`PolicyError::AdmxParse`] if the XML is malformed or the root
/// element is not `policyDefinitions`.
pub fn parse_admx(admx_file: &str, text: &str) -> Result<Vec<AdmxPolicyDefinition>> {
    let doc =
        roxmltree::Document::parse(text).map_err(|e| PolicyError::admx_parse(admx_file, e))?;

    let root = doc.root_element();
    if root.tag_name().name() != "policyDefinitions" {
        return Err(PolicyError::admx_parse(
            admx_file,
            format!("unexpected root element <{}>", root.tag_name().name()),
        ));
    }

    let policies: Vec<AdmxPolicyDefinition> = root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "policy")
        .filter_map(|node| {
            let name = node.attribute("name")?;
            Some(AdmxPolicyDefinition {
                admx_file: admx_file.to_string(),
                name: name.to_string(),
                display_name_ref: node.attribute("displayName").unwrap_or_default().to_string(),
                class: PolicyClass::from_attribute(node.attribute("class")),
                registry_key: node.attribute("key").map(str::to_string),
                registry_value_name: node.attribute("valueName").map(str::to_string),
            })
        })
        .collect();

    debug!(file = admx_file, policies = policies.len(), "Parsed ADMX file");
    Ok(policies)
}

/// Reads and parses an ADMX file from disk.
pub fn load_admx<P: AsRef<Path>>(path: P) -> Result<Vec<AdmxPolicyDefinition>> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = fs::read(path)?;
    parse_admx(&file_name, &decode_text(&bytes))
}

/// Returns the ADML file name paired with an ADMX file name.
///
/// # Examples
///
/// ```rust
/// assert_eq!(pol_parser::admx::adml_name_for("chrome.admx"), "chrome.adml");
/// assert_eq!(pol_parser::admx::adml_name_for("Chrome.ADMX"), "Chrome.adml");
/// ```
pub fn adml_name_for(admx_file: &str) -> String {
    let stem = Path::new(admx_file)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| admx_file.to_string());
    format!("{}.{}", stem, ADML_EXTENSION)
}

/// The string table of an ADML file.
#[derive(Debug, Clone, Default)]
pub struct AdmlStrings {
    strings: HashMap<String, String>,
}

impl AdmlStrings {
    /// Parses the `<stringTable>` of ADML text.
    pub fn parse(adml_file: &str, text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| PolicyError::admx_parse(adml_file, e))?;

        let strings = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "string")
            .filter_map(|n| {
                let id = n.attribute("id")?;
                Some((id.to_string(), n.text().unwrap_or_default().trim().to_string()))
            })
            .collect();

        Ok(AdmlStrings { strings })
    }

    /// Reads the ADML companion of `admx_file` from `<admx_dir>/<language>/`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn load_for(admx_dir: &Path, language: &str, admx_file: &str) -> Result<Option<Self>> {
        let adml_file = adml_name_for(admx_file);
        let path = admx_dir.join(language).join(&adml_file);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Self::parse(&adml_file, &decode_text(&bytes)).map(Some)
    }

    /// Looks up a string by id.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.strings.get(id).map(String::as_str)
    }

    /// Resolves a `$(string.id)` reference.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        self.get(strip_string_ref(reference))
    }

    /// Number of strings in the table.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
