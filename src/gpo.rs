//! Locating and loading the policy files of a Group Policy Object.
//!
//! A GPO's Administrative Template settings live in SYSVOL at
//! `<sysvol>\<domain>\Policies\{<GUID>}\Machine\registry.pol` and the
//! matching `User\registry.pol`. Either file may be absent.

use crate::error::{PolicyError, Result};
use crate::header::{HEADER_SIZE, PREG_SIGNATURE};
use crate::policy_file::{PolicyEntry, PolicyFile, PolicyScope};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of a registry policy file inside a scope folder.
pub const POLICY_FILE_NAME: &str = "registry.pol";

/// Where a GPO's files live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpoLocation {
    root: PathBuf,
}

impl GpoLocation {
    /// Builds the SYSVOL location of a GPO.
    ///
    /// The GUID is accepted with or without braces.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pol_parser::GpoLocation;
    ///
    /// let gpo = GpoLocation::in_sysvol("/mnt/SYSVOL", "corp.example.com", "31B2F340-016D-11D2-945F-00C04FB984F9");
    /// assert!(gpo.root().ends_with("Policies/{31B2F340-016D-11D2-945F-00C04FB984F9}"));
    /// ```
    pub fn in_sysvol<P: AsRef<Path>>(sysvol: P, domain: &str, guid: &str) -> Self {
        GpoLocation {
            root: sysvol
                .as_ref()
                .join(domain)
                .join("Policies")
                .join(braced_guid(guid)),
        }
    }

    /// Uses an existing GPO folder (one holding `Machine` and `User`).
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Self {
        GpoLocation {
            root: dir.as_ref().to_path_buf(),
        }
    }

    /// Returns the GPO folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the expected path of a scope's `registry.pol`.
    pub fn policy_file(&self, scope: PolicyScope) -> PathBuf {
        self.root.join(scope.folder_name()).join(POLICY_FILE_NAME)
    }
}

/// Normalizes a GPO GUID to the braced, upper-case form used in SYSVOL.
pub fn braced_guid(guid: &str) -> String {
    let bare = guid.trim().trim_start_matches('{').trim_end_matches('}');
    format!("{{{}}}", bare.to_ascii_uppercase())
}

/// Outcome of loading one scope's policy file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "snake_case"))]
pub enum ScopeStatus {
    /// The file was decoded.
    Loaded {
        /// Usable entries decoded.
        entries: usize,
        /// True if the scan stopped early.
        truncated: bool,
    },
    /// The file holds only the `PReg` header: the scope has no settings.
    Empty,
    /// No file at the expected path.
    Missing,
    /// The file exists but could not be decoded.
    Unreadable {
        /// Why decoding failed.
        reason: String,
    },
}

/// Entries of every scope of a GPO, plus per-scope outcome.
#[derive(Debug, Clone)]
pub struct GpoPolicies {
    /// Entries in scope order (Machine, then User), file order within a scope.
    pub entries: Vec<PolicyEntry>,

    /// Outcome per scope, Machine first.
    pub scopes: Vec<(PolicyScope, ScopeStatus)>,
}

impl GpoPolicies {
    /// Number of entries decoded for one scope.
    pub fn entry_count(&self, scope: PolicyScope) -> usize {
        self.entries.iter().filter(|e| e.scope == scope).count()
    }
}

/// Loads both scopes of a GPO.
///
/// # Errors
///
/// Returns [`PolicyError::NoPolicyFiles`] when neither scope has a policy
/// file. A file that exists but fails to decode is reported in
/// [`GpoPolicies::scopes`] and contributes no entries.
pub fn load_gpo(location: &GpoLocation) -> Result<GpoPolicies> {
    let paths: Vec<(PolicyScope, PathBuf)> = PolicyScope::ALL
        .iter()
        .map(|&scope| (scope, location.policy_file(scope)))
        .collect();
    load_policy_files(location.root(), &paths)
}

/// Loads explicitly named policy files.
///
/// `origin` is only used in the error when none of the files exist.
pub fn load_policy_files(origin: &Path, paths: &[(PolicyScope, PathBuf)]) -> Result<GpoPolicies> {
    let mut entries = Vec::new();
    let mut scopes = Vec::with_capacity(paths.len());

    for (scope, path) in paths {
        let scope = *scope;
        if !path.is_file() {
            info!(scope = %scope, path = %path.display(), "No policy file for scope");
            scopes.push((scope, ScopeStatus::Missing));
            continue;
        }

        match PolicyFile::open(path, scope) {
            Ok(file) => {
                scopes.push((
                    scope,
                    ScopeStatus::Loaded {
                        entries: file.entries.len(),
                        truncated: file.truncated,
                    },
                ));
                entries.extend(file.into_entries());
            }
            Err(PolicyError::FileTooSmall { .. }) if is_header_only(path) => {
                info!(scope = %scope, path = %path.display(), "Policy file has no settings");
                scopes.push((scope, ScopeStatus::Empty));
            }
            Err(e) => {
                warn!(
                    scope = %scope,
                    path = %path.display(),
                    error = %e,
                    "Skipping unreadable policy file"
                );
                scopes.push((scope, ScopeStatus::Unreadable { reason: e.to_string() }));
            }
        }
    }

    if scopes.iter().all(|(_, status)| *status == ScopeStatus::Missing) {
        return Err(PolicyError::NoPolicyFiles(origin.to_path_buf()));
    }

    Ok(GpoPolicies { entries, scopes })
}

fn is_header_only(path: &Path) -> bool {
    fs::read(path).map_or(false, |bytes| {
        bytes.len() == HEADER_SIZE && bytes.starts_with(PREG_SIGNATURE)
    })
}
