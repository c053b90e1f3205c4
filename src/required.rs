//! Derivation of the ADMX/ADML files a GPO needs.

use crate::admx::adml_name_for;
use crate::matcher::AdmxMatch;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Whether an ADML companion exists in the language folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdmlStatus {
    /// Found at `<admx_dir>/<language>/<name>.adml`.
    Available,
    /// Not found.
    Missing,
}

impl fmt::Display for AdmlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmlStatus::Available => f.pad("Available"),
            AdmlStatus::Missing => f.pad("Missing"),
        }
    }
}

/// One required template.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequiredFile {
    /// ADMX file name.
    pub admx_file: String,

    /// Expected ADML file name.
    pub adml_file: String,

    /// Presence of the ADML file.
    pub adml_status: AdmlStatus,

    /// Matches that made this file required.
    pub match_count: usize,
}

/// The templates needed to reproduce a GPO's Administrative Template settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequiredFileSet {
    /// Language folder the ADML files were looked up in.
    pub language: String,

    /// Files sorted by ADMX name.
    pub files: Vec<RequiredFile>,
}

impl RequiredFileSet {
    /// Returns true if no template is required.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files whose ADML companion is missing.
    pub fn missing_adml(&self) -> impl Iterator<Item = &RequiredFile> {
        self.files
            .iter()
            .filter(|f| f.adml_status == AdmlStatus::Missing)
    }
}

/// Groups matches by ADMX file and checks each ADML companion on disk.
///
/// # Examples
///
/// ```rust
/// use pol_parser::required_files;
///
/// let set = required_files(&[], std::path::Path::new("PolicyDefinitions"), "en-US");
/// assert!(set.is_empty());
/// ```
pub fn required_files(matches: &[AdmxMatch], admx_dir: &Path, language: &str) -> RequiredFileSet {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for m in matches {
        *counts.entry(m.admx_file.as_str()).or_insert(0) += 1;
    }

    let language_dir = admx_dir.join(language);
    let files = counts
        .into_iter()
        .map(|(admx_file, match_count)| {
            let adml_file = adml_name_for(admx_file);
            let adml_status = if language_dir.join(&adml_file).is_file() {
                AdmlStatus::Available
            } else {
                AdmlStatus::Missing
            };
            RequiredFile {
                admx_file: admx_file.to_string(),
                adml_file,
                adml_status,
                match_count,
            }
        })
        .collect();

    RequiredFileSet {
        language: language.to_string(),
        files,
    }
}
