//! Matching decoded policy entries against ADMX policy definitions.
//!
//! Each `<policy>` element is tried against four strategies in a fixed order.
//! The first strategy that finds anything wins for that policy, so a single
//! real-world setting is never counted under two reasons:
//!
//! 1. `DirectName` - policy name equals a configured setting name
//! 2. `NamespaceStrippedName` - same, after dropping a `prefix:` qualifier
//! 3. `DisplayName` - display-name reference (or its resolved ADML text)
//!    equals or contains the setting name, or the other way round
//! 4. `RegistryKeyValue` - policy `key` and `valueName` both equal those of a
//!    decoded registry entry
//!
//! Strategies 1-3 need a GPO settings report; without one only strategy 4
//! can produce matches.

use crate::admx::{load_admx, AdmlStrings, AdmxPolicyDefinition, ADMX_EXTENSION};
use crate::error::{PolicyError, Result};
use crate::policy_file::PolicyEntry;
use crate::settings_report::ConfiguredSetting;
use crate::utils::contains_ignore_case;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// How a policy definition was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchStrategy {
    /// Policy name equals the setting name.
    DirectName,
    /// Policy name without its namespace prefix equals the setting name.
    NamespaceStrippedName,
    /// Display name equals or overlaps the setting name.
    DisplayName,
    /// Registry key and value name equal those of a policy entry.
    RegistryKeyValue,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchStrategy::DirectName => "DirectName",
            MatchStrategy::NamespaceStrippedName => "NamespaceStrippedName",
            MatchStrategy::DisplayName => "DisplayName",
            MatchStrategy::RegistryKeyValue => "RegistryKeyValue",
        };
        f.pad(name)
    }
}

/// What a policy definition was matched against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchedItem {
    /// A decoded `registry.pol` entry.
    Entry(PolicyEntry),
    /// A setting from a GPO settings report.
    Setting(ConfiguredSetting),
}

/// One policy definition matched to one entry or setting.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdmxMatch {
    /// ADMX file holding the policy.
    pub admx_file: String,

    /// The policy's internal name.
    pub policy_name: String,

    /// The entry or setting that matched.
    pub matched: MatchedItem,

    /// Strategy that produced the match.
    pub strategy: MatchStrategy,
}

impl AdmxMatch {
    fn new(policy: &AdmxPolicyDefinition, matched: MatchedItem, strategy: MatchStrategy) -> Self {
        AdmxMatch {
            admx_file: policy.admx_file.clone(),
            policy_name: policy.name.clone(),
            matched,
            strategy,
        }
    }
}

/// Removes repeated `(admx_file, policy_name, matched)` triples, keeping the first.
pub fn dedup_matches(matches: Vec<AdmxMatch>) -> Vec<AdmxMatch> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| seen.insert((m.admx_file.clone(), m.policy_name.clone(), m.matched.clone())))
        .collect()
}

/// An ADMX file that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SkippedFile {
    /// File name.
    pub file: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of scanning an ADMX store.
#[derive(Debug, Clone, Default)]
pub struct MatchReport {
    /// De-duplicated matches, in scan order.
    pub matches: Vec<AdmxMatch>,

    /// ADMX files parsed successfully.
    pub admx_files_scanned: usize,

    /// ADMX files that failed to parse.
    pub skipped_files: Vec<SkippedFile>,

    /// Policy definitions examined across all files.
    pub policies_examined: usize,
}

impl MatchReport {
    /// Number of matches per strategy.
    pub fn counts_by_strategy(&self) -> BTreeMap<MatchStrategy, usize> {
        let mut counts = BTreeMap::new();
        for m in &self.matches {
            *counts.entry(m.strategy).or_insert(0) += 1;
        }
        counts
    }

    /// Number of distinct ADMX files with at least one match.
    pub fn matched_file_count(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.admx_file.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Matches registry entries and configured settings against ADMX policies.
#[derive(Debug, Clone, Copy)]
pub struct PolicyMatcher<'a> {
    entries: &'a [PolicyEntry],
    settings: &'a [ConfiguredSetting],
}

impl<'a> PolicyMatcher<'a> {
    /// Creates a matcher over decoded registry entries.
    pub fn new(entries: &'a [PolicyEntry]) -> Self {
        PolicyMatcher {
            entries,
            settings: &[],
        }
    }

    /// Adds configured settings from a GPO report, enabling the name strategies.
    pub fn with_settings(mut self, settings: &'a [ConfiguredSetting]) -> Self {
        self.settings = settings;
        self
    }

    /// Matches a single policy definition, stopping at the first strategy that succeeds.
    ///
    /// `strings` is the companion ADML table, used to resolve the display name.
    pub fn match_policy(
        &self,
        policy: &AdmxPolicyDefinition,
        strings: Option<&AdmlStrings>,
    ) -> Vec<AdmxMatch> {
        let direct = self.settings_where(|s| s.name.eq_ignore_ascii_case(&policy.name));
        if !direct.is_empty() {
            return tag(policy, direct, MatchStrategy::DirectName);
        }

        if let Some((_, local)) = policy.name.rsplit_once(':') {
            let stripped = self.settings_where(|s| s.name.eq_ignore_ascii_case(local));
            if !stripped.is_empty() {
                return tag(policy, stripped, MatchStrategy::NamespaceStrippedName);
            }
        }

        let id = policy.display_name_id();
        let resolved = strings.and_then(|t| t.resolve(&policy.display_name_ref));
        let display = self.settings_where(|s| {
            names_overlap(&s.name, id)
                || resolved.map_or(false, |text| names_overlap(&s.name, text))
        });
        if !display.is_empty() {
            return tag(policy, display, MatchStrategy::DisplayName);
        }

        match (&policy.registry_key, &policy.registry_value_name) {
            (Some(key), Some(value_name)) => {
                let registry: Vec<MatchedItem> = self
                    .entries
                    .iter()
                    .filter(|e| {
                        e.registry_key.eq_ignore_ascii_case(key)
                            && e.value_name.eq_ignore_ascii_case(value_name)
                    })
                    .cloned()
                    .map(MatchedItem::Entry)
                    .collect();
                tag(policy, registry, MatchStrategy::RegistryKeyValue)
            }
            _ => Vec::new(),
        }
    }

    /// Matches every definition in order. Results are not de-duplicated.
    pub fn match_definitions(
        &self,
        policies: &[AdmxPolicyDefinition],
        strings: Option<&AdmlStrings>,
    ) -> Vec<AdmxMatch> {
        policies
            .iter()
            .flat_map(|policy| self.match_policy(policy, strings))
            .collect()
    }

    /// Scans every `.admx` file in `admx_dir`.
    ///
    /// Files are processed in name order. A file that fails to parse is
    /// logged and listed in [`MatchReport::skipped_files`]; scanning continues.
    /// When `language` is given and settings are present, each file's ADML
    /// companion is loaded from `<admx_dir>/<language>/` to resolve display names.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::DirectoryNotFound`] if `admx_dir` is not a directory.
    #[instrument(skip(self, admx_dir), fields(dir = %admx_dir.display()))]
    pub fn scan_directory(&self, admx_dir: &Path, language: Option<&str>) -> Result<MatchReport> {
        let files = list_admx_files(admx_dir)?;
        let total = files.len();
        let progress_step = (total / 10).max(1);
        info!(
            files = total,
            entries = self.entries.len(),
            settings = self.settings.len(),
            "Scanning ADMX store"
        );

        let mut report = MatchReport::default();
        let mut matches = Vec::new();

        for (index, path) in files.iter().enumerate() {
            let file_name = file_name_of(path);

            match load_admx(path) {
                Ok(policies) => {
                    let strings = match language {
                        Some(language) if !self.settings.is_empty() => {
                            load_strings(admx_dir, language, &file_name)
                        }
                        _ => None,
                    };

                    let found = self.match_definitions(&policies, strings.as_ref());
                    if !found.is_empty() {
                        debug!(file = %file_name, matches = found.len(), "Matched policies");
                    }
                    report.policies_examined += policies.len();
                    report.admx_files_scanned += 1;
                    matches.extend(found);
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Skipping ADMX file");
                    report.skipped_files.push(SkippedFile {
                        file: file_name,
                        reason: e.to_string(),
                    });
                }
            }

            let scanned = index + 1;
            if scanned % progress_step == 0 || scanned == total {
                info!(scanned, total, matches = matches.len(), "ADMX scan progress");
            }
        }

        report.matches = dedup_matches(matches);
        info!(
            scanned = report.admx_files_scanned,
            skipped = report.skipped_files.len(),
            matches = report.matches.len(),
            "ADMX scan complete"
        );
        Ok(report)
    }

    fn settings_where<F>(&self, predicate: F) -> Vec<MatchedItem>
    where
        F: Fn(&ConfiguredSetting) -> bool,
    {
        self.settings
            .iter()
            .filter(|s| predicate(*s))
            .cloned()
            .map(MatchedItem::Setting)
            .collect()
    }
}

/// Matches decoded entries against every ADMX file in a directory.
///
/// Shorthand for [`PolicyMatcher::new`] followed by
/// [`PolicyMatcher::scan_directory`] without a settings report.
pub fn match_admx_directory(entries: &[PolicyEntry], admx_dir: &Path) -> Result<MatchReport> {
    PolicyMatcher::new(entries).scan_directory(admx_dir, None)
}

/// Lists the `.admx` files of a directory, sorted case-insensitively by name.
///
/// # Errors
///
/// Returns [`PolicyError::DirectoryNotFound`] if `dir` is not a directory.
pub fn list_admx_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PolicyError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case(ADMX_EXTENSION))
        })
        .collect();

    files.sort_by_key(|path| file_name_of(path).to_ascii_lowercase());
    Ok(files)
}

fn load_strings(admx_dir: &Path, language: &str, admx_file: &str) -> Option<AdmlStrings> {
    match AdmlStrings::load_for(admx_dir, language, admx_file) {
        Ok(strings) => strings,
        Err(e) => {
            warn!(file = admx_file, language, error = %e, "Ignoring unreadable ADML file");
            None
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn tag(
    policy: &AdmxPolicyDefinition,
    items: Vec<MatchedItem>,
    strategy: MatchStrategy,
) -> Vec<AdmxMatch> {
    items
        .into_iter()
        .map(|item| AdmxMatch::new(policy, item, strategy))
        .collect()
}

/// Equal, or one contains the other. Empty names never match.
fn names_overlap(setting_name: &str, policy_name: &str) -> bool {
    if setting_name.is_empty() || policy_name.is_empty() {
        return false;
    }
    setting_name.eq_ignore_ascii_case(policy_name)
        || contains_ignore_case(setting_name, policy_name)
        || contains_ignore_case(policy_name, setting_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy_file::PolicyScope;

    fn policy(
        name: &str,
        display: &str,
        key: Option<&str>,
        value: Option<&str>,
    ) -> AdmxPolicyDefinition {
        AdmxPolicyDefinition {
            admx_file: "chrome.admx".to_string(),
            name: name.to_string(),
            display_name_ref: display.to_string(),
            class: None,
            registry_key: key.map(str::to_string),
            registry_value_name: value.map(str::to_string),
        }
    }

    fn setting(name: &str) -> ConfiguredSetting {
        ConfiguredSetting {
            name: name.to_string(),
            state: "Enabled".to_string(),
            category: None,
            scope: PolicyScope::Machine,
        }
    }

    #[test]
    fn test_namespace_stripped_name() {
        let settings = [setting("ShowHomeButton")];
        let matcher = PolicyMatcher::new(&[]).with_settings(&settings);
        let found = matcher.match_policy(&policy("chrome:ShowHomeButton", "", None, None), None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].strategy, MatchStrategy::NamespaceStrippedName);
    }

    #[test]
    fn test_display_name_containment() {
        let settings = [setting("Home button")];
        let matcher = PolicyMatcher::new(&[]).with_settings(&settings);
        let found = matcher.match_policy(
            &policy("ShowHomeButton", "$(string.Show Home button on toolbar)", None, None),
            None,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].strategy, MatchStrategy::DisplayName);
    }

    #[test]
    fn test_display_name_resolved_through_adml() {
        let adml = r#"<policyDefinitionResources><resources><stringTable>
            <string id="ShowHomeButton">Show Home button on toolbar</string>
        </stringTable></resources></policyDefinitionResources>"#;
        let strings = AdmlStrings::parse("chrome.adml", adml).unwrap();
        let settings = [setting("Show Home button on toolbar")];
        let matcher = PolicyMatcher::new(&[]).with_settings(&settings);
        let p = policy("ShowHomeButton", "$(string.ShowHomeButton)", None, None);

        assert!(matcher.match_policy(&p, None).is_empty());
        let found = matcher.match_policy(&p, Some(&strings));
        assert_eq!(found[0].strategy, MatchStrategy::DisplayName);
    }

    #[test]
    fn test_empty_display_name_never_matches() {
        let settings = [setting("Anything")];
        let matcher = PolicyMatcher::new(&[]).with_settings(&settings);
        assert!(matcher.match_policy(&policy("Other", "", None, None), None).is_empty());
    }

    #[test]
    fn test_key_only_match_is_rejected() {
        let entries = [PolicyEntry::dword(
            PolicyScope::Machine,
            "Software\\Policies\\Vendor",
            "Enabled",
            1,
        )];
        let matcher = PolicyMatcher::new(&entries);
        let p = policy("VendorOther", "", Some("Software\\Policies\\Vendor"), Some("Disabled"));
        assert!(matcher.match_policy(&p, None).is_empty());

        let p = policy("VendorNoValue", "", Some("Software\\Policies\\Vendor"), None);
        assert!(matcher.match_policy(&p, None).is_empty());
    }

    #[test]
    fn test_registry_match_is_case_insensitive() {
        let entries = [PolicyEntry::dword(
            PolicyScope::User,
            "SOFTWARE\\Policies\\Vendor",
            "ENABLED",
            1,
        )];
        let matcher = PolicyMatcher::new(&entries);
        let p = policy("VendorEnabled", "", Some("Software\\Policies\\Vendor"), Some("Enabled"));
        assert_eq!(matcher.match_policy(&p, None).len(), 1);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let entry = PolicyEntry::dword(PolicyScope::Machine, "K", "V", 1);
        let p = policy("P", "", Some("K"), Some("V"));
        let m = AdmxMatch::new(&p, MatchedItem::Entry(entry), MatchStrategy::RegistryKeyValue);
        let deduped = dedup_matches(vec![m.clone(), m.clone()]);
        assert_eq!(deduped, vec![m]);
    }

    #[test]
    fn test_missing_directory() {
        let result = list_admx_files(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(PolicyError::DirectoryNotFound(_))));
    }
}
