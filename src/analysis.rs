//! End-to-end GPO analysis: policy files in, required templates out.
//!
//! [`AnalysisConfig`] carries every input of a run and is passed by reference;
//! there is no global state.

use crate::error::Result;
use crate::gpo::{load_gpo, load_policy_files, GpoLocation, GpoPolicies};
use crate::matcher::PolicyMatcher;
use crate::policy_file::PolicyScope;
use crate::report::MigrationReport;
use crate::required::required_files;
use crate::settings_report::GpoReport;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Default ADML language folder.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Where the policy files of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// A GPO folder, either in SYSVOL or a copy of one.
    Gpo(GpoLocation),
    /// Individual policy files.
    Files {
        /// Computer configuration file.
        machine: Option<PathBuf>,
        /// User configuration file.
        user: Option<PathBuf>,
    },
}

impl PolicySource {
    fn describe(&self) -> String {
        match self {
            PolicySource::Gpo(location) => location.root().display().to_string(),
            PolicySource::Files { machine, user } => machine
                .iter()
                .chain(user.iter())
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn load(&self) -> Result<GpoPolicies> {
        match self {
            PolicySource::Gpo(location) => load_gpo(location),
            PolicySource::Files { machine, user } => {
                let paths: Vec<(PolicyScope, PathBuf)> = [
                    (PolicyScope::Machine, machine),
                    (PolicyScope::User, user),
                ]
                .into_iter()
                .filter_map(|(scope, path)| path.clone().map(|p| (scope, p)))
                .collect();
                let origin = paths.first().map(|(_, p)| p.clone()).unwrap_or_default();
                load_policy_files(&origin, &paths)
            }
        }
    }
}

/// Inputs of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Policy files to decode.
    pub source: PolicySource,

    /// ADMX store (a `PolicyDefinitions` folder).
    pub admx_dir: PathBuf,

    /// Language subfolder holding the ADML files.
    pub language: String,

    /// Optional `Get-GPOReport` XML, enabling name-based matching.
    pub settings_report: Option<PathBuf>,
}

impl AnalysisConfig {
    /// Creates a configuration with the default language and no settings report.
    pub fn new(source: PolicySource, admx_dir: impl Into<PathBuf>) -> Self {
        AnalysisConfig {
            source,
            admx_dir: admx_dir.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            settings_report: None,
        }
    }
}

/// Runs the whole pipeline.
///
/// # Errors
///
/// Fails only on preconditions: no policy file for either scope, a missing
/// ADMX store, or an unreadable settings report. Individual bad policy or
/// ADMX files are recorded in the report and skipped.
#[instrument(skip(config), fields(admx_dir = %config.admx_dir.display()))]
pub fn run_analysis(config: &AnalysisConfig) -> Result<MigrationReport> {
    let policies = config.source.load()?;
    info!(entries = policies.entries.len(), "Loaded policy entries");

    let gpo_report = match &config.settings_report {
        Some(path) => Some(GpoReport::open(path)?),
        None => None,
    };
    let settings = gpo_report
        .as_ref()
        .map(|r| r.settings.as_slice())
        .unwrap_or_default();

    let matcher = PolicyMatcher::new(&policies.entries).with_settings(settings);
    let scan = matcher.scan_directory(&config.admx_dir, Some(&config.language))?;
    let required = required_files(&scan.matches, &config.admx_dir, &config.language);

    let gpo_name = gpo_report.as_ref().and_then(|r| r.gpo_name.clone());
    Ok(MigrationReport::new(
        config.source.describe(),
        gpo_name,
        settings.len(),
        policies,
        scan,
        required,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use std::path::Path;

    #[test]
    fn test_files_source_without_paths() {
        let source = PolicySource::Files {
            machine: None,
            user: None,
        };
        assert_eq!(source.describe(), "");

        let config = AnalysisConfig::new(source, "PolicyDefinitions");
        assert_eq!(config.language, DEFAULT_LANGUAGE);
        assert!(matches!(
            run_analysis(&config),
            Err(PolicyError::NoPolicyFiles(ref origin)) if origin.as_os_str().is_empty()
        ));
    }

    #[test]
    fn test_describe_lists_files() {
        let source = PolicySource::Files {
            machine: Some(PathBuf::from("machine.pol")),
            user: Some(PathBuf::from("user.pol")),
        };
        assert_eq!(source.describe(), "machine.pol, user.pol");

        let gpo = PolicySource::Gpo(GpoLocation::from_dir("gpo"));
        assert_eq!(gpo.describe(), Path::new("gpo").display().to_string());
    }

    #[test]
    fn test_missing_files_are_reported_by_first_path() {
        let dir = tempfile::tempdir().unwrap();
        let user = dir.path().join("user.pol");
        let source = PolicySource::Files {
            machine: None,
            user: Some(user.clone()),
        };

        let err = source.load().unwrap_err();
        assert!(matches!(err, PolicyError::NoPolicyFiles(ref origin) if origin == &user));
    }
}
