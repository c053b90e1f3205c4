//! Migration report assembly and rendering.

use crate::gpo::{GpoPolicies, ScopeStatus};
use crate::matcher::{AdmxMatch, MatchReport, MatchStrategy, MatchedItem, SkippedFile};
use crate::policy_file::PolicyScope;
use crate::required::RequiredFileSet;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Everything a run found, ready to print or serialize.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MigrationReport {
    /// When the report was produced (RFC 3339, UTC).
    pub generated_at: String,

    /// GPO folder or policy files analysed.
    pub source: String,

    /// GPO display name from the settings report, if one was given.
    pub gpo_name: Option<String>,

    /// Outcome per scope.
    pub scopes: Vec<(PolicyScope, ScopeStatus)>,

    /// Usable entries decoded across scopes.
    pub entries_decoded: usize,

    /// Settings read from the settings report.
    pub settings_read: usize,

    /// ADMX files parsed.
    pub admx_files_scanned: usize,

    /// ADMX files that failed to parse.
    pub skipped_files: Vec<SkippedFile>,

    /// Policy definitions examined.
    pub policies_examined: usize,

    /// Matches per strategy.
    pub matches_by_strategy: BTreeMap<MatchStrategy, usize>,

    /// Templates required by the matches.
    pub required: RequiredFileSet,

    /// Every match, for auditing.
    pub matches: Vec<AdmxMatch>,
}

impl MigrationReport {
    /// Assembles a report from the pipeline stages.
    pub fn new(
        source: String,
        gpo_name: Option<String>,
        settings_read: usize,
        policies: GpoPolicies,
        scan: MatchReport,
        required: RequiredFileSet,
    ) -> Self {
        MigrationReport {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            source,
            gpo_name,
            entries_decoded: policies.entries.len(),
            scopes: policies.scopes,
            settings_read,
            matches_by_strategy: scan.counts_by_strategy(),
            admx_files_scanned: scan.admx_files_scanned,
            skipped_files: scan.skipped_files,
            policies_examined: scan.policies_examined,
            required,
            matches: scan.matches,
        }
    }

    /// Serializes the report as pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GPO ADMX requirements")?;
        writeln!(f, "  Source:    {}", self.source)?;
        if let Some(name) = &self.gpo_name {
            writeln!(f, "  GPO:       {}", name)?;
        }
        writeln!(f, "  Generated: {}", self.generated_at)?;
        writeln!(f)?;

        writeln!(f, "Policy files")?;
        for (scope, status) in &self.scopes {
            match status {
                ScopeStatus::Loaded { entries, truncated } => {
                    let note = if *truncated { " (truncated)" } else { "" };
                    writeln!(f, "  {:<8} {} entries{}", scope, entries, note)?;
                }
                ScopeStatus::Empty => writeln!(f, "  {:<8} empty (no settings)", scope)?,
                ScopeStatus::Missing => writeln!(f, "  {:<8} not present", scope)?,
                ScopeStatus::Unreadable { reason } => {
                    writeln!(f, "  {:<8} unreadable: {}", scope, reason)?
                }
            }
        }
        if self.settings_read > 0 {
            writeln!(f, "  Settings report: {} settings", self.settings_read)?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "ADMX scan: {} files, {} policies, {} skipped",
            self.admx_files_scanned,
            self.policies_examined,
            self.skipped_files.len()
        )?;
        for skipped in &self.skipped_files {
            writeln!(f, "  skipped {}: {}", skipped.file, skipped.reason)?;
        }
        writeln!(f)?;

        if self.required.is_empty() {
            writeln!(f, "No matching ADMX templates found.")?;
            return Ok(());
        }

        writeln!(f, "Required templates ({})", self.required.language)?;
        for file in &self.required.files {
            writeln!(
                f,
                "  {:<32} {:<32} {:<9} {} match(es)",
                file.admx_file, file.adml_file, file.adml_status, file.match_count
            )?;
        }
        writeln!(f)?;

        let by_strategy = self
            .matches_by_strategy
            .iter()
            .map(|(strategy, count)| format!("{}: {}", strategy, count))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "Matches ({})", by_strategy)?;
        for m in &self.matches {
            let subject = match &m.matched {
                MatchedItem::Entry(entry) => entry.to_string(),
                MatchedItem::Setting(setting) => format!("[{}] {}", setting.scope, setting.name),
            };
            writeln!(f, "  {} / {} [{}] {}", m.admx_file, m.policy_name, m.strategy, subject)?;
        }
        Ok(())
    }
}
