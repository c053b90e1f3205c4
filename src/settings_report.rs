//! GPO settings report parsing.
//!
//! `Get-GPOReport -ReportType Xml` lists every configured Administrative
//! Template setting as a `Policy` element under a registry `Extension`,
//! inside either the `Computer` or the `User` section. Those names feed the
//! name-based matching strategies.

use crate::error::{PolicyError, Result};
use crate::policy_file::PolicyScope;
use crate::utils::decode_text;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

/// One configured setting from a GPO report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfiguredSetting {
    /// Setting name as shown in the report.
    pub name: String,

    /// `Enabled`, `Disabled`, or empty when the report omits it.
    pub state: String,

    /// Category path, e.g. `Google/Google Chrome/Startup`.
    pub category: Option<String>,

    /// Section the setting was listed under.
    pub scope: PolicyScope,
}

/// The parts of a GPO report used for matching.
#[derive(Debug, Clone, Default)]
pub struct GpoReport {
    /// The GPO display name, if present.
    pub gpo_name: Option<String>,

    /// Settings in document order.
    pub settings: Vec<ConfiguredSetting>,
}

impl GpoReport {
    /// Parses report text.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ReportParse`] if the XML is malformed or the
    /// root element is not `GPO`.
    pub fn parse(text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| PolicyError::ReportParse(e.to_string()))?;

        let root = doc.root_element();
        if root.tag_name().name() != "GPO" {
            return Err(PolicyError::ReportParse(format!(
                "unexpected root element <{}>",
                root.tag_name().name()
            )));
        }

        let gpo_name = child_text(root, "Name");

        let mut settings = Vec::new();
        for section in root.children().filter(|n| n.is_element()) {
            let scope = match section.tag_name().name() {
                "Computer" => PolicyScope::Machine,
                "User" => PolicyScope::User,
                _ => continue,
            };

            let policies = section.descendants().filter(|n| {
                n.is_element()
                    && n.tag_name().name() == "Policy"
                    && n.parent_element()
                        .map_or(false, |p| p.tag_name().name() == "Extension")
            });

            for policy in policies {
                let Some(name) = child_text(policy, "Name") else {
                    continue;
                };
                settings.push(ConfiguredSetting {
                    name,
                    state: child_text(policy, "State").unwrap_or_default(),
                    category: child_text(policy, "Category"),
                    scope,
                });
            }
        }

        debug!(settings = settings.len(), "Parsed GPO report");
        Ok(GpoReport { gpo_name, settings })
    }

    /// Reads a report file (UTF-8 or UTF-16 with BOM).
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::parse(&decode_text(&bytes))
    }
}

fn child_text(node: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
