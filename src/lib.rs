//! # Group Policy Registry Policy Parser
//!
//! Decodes Group Policy `registry.pol` files and works out which ADMX
//! templates a GPO's Administrative Template settings come from, so the
//! templates can be carried over when the GPO is migrated.
//!
//! ## Pipeline
//!
//! 1. **Locate**: `<sysvol>\<domain>\Policies\{GUID}\Machine|User\registry.pol`
//! 2. **Decode**: each policy file becomes a list of [`PolicyEntry`] records
//! 3. **Match**: every `<policy>` of every `.admx` file in a store is matched
//!    against the entries (and, if available, a GPO settings report)
//! 4. **Require**: matched ADMX files are listed with their ADML companions
//!
//! ## Binary Layout
//!
//! ```text
//! [Header - 8 bytes]
//!   - Signature: "PReg"
//!   - Version (u32 LE)
//!
//! [Entries - repeated until end of file]
//!   [ key ; valueName ; type ; size ; data ]
//!   - Delimiters and strings are UTF-16LE
//!   - type and size are u32 LE
//! ```
//!
//! ## Examples
//!
//! ### Decoding a policy file
//!
//! ```no_run
//! use pol_parser::{PolicyFile, PolicyScope};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = PolicyFile::open("Machine/registry.pol", PolicyScope::Machine)?;
//! for entry in &file.entries {
//!     println!("{}\\{} = {}", entry.registry_key, entry.value_name, entry.data);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Finding the templates a GPO needs
//!
//! ```no_run
//! use pol_parser::{load_gpo, required_files, GpoLocation, PolicyMatcher};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gpo = GpoLocation::in_sysvol(r"\\corp.example.com\SYSVOL", "corp.example.com", "31B2F340-016D-11D2-945F-00C04FB984F9");
//! let policies = load_gpo(&gpo)?;
//!
//! let store = Path::new(r"C:\Windows\PolicyDefinitions");
//! let scan = PolicyMatcher::new(&policies.entries).scan_directory(store, None)?;
//!
//! for file in required_files(&scan.matches, store, "en-US").files {
//!     println!("{} ({}: {})", file.admx_file, file.adml_file, file.adml_status);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod admx;
pub mod analysis;
pub mod error;
pub mod gpo;
pub mod header;
pub mod matcher;
pub mod policy_file;
pub mod report;
pub mod required;
pub mod settings_report;
pub mod utils;
pub mod value;
pub mod writer;

// Re-export main types for convenience
pub use admx::{AdmlStrings, AdmxPolicyDefinition, PolicyClass};
pub use analysis::{run_analysis, AnalysisConfig, PolicySource};
pub use error::{PolicyError, Result};
pub use gpo::{load_gpo, GpoLocation, GpoPolicies, ScopeStatus};
pub use header::PolHeader;
pub use matcher::{
    dedup_matches, match_admx_directory, AdmxMatch, MatchReport, MatchStrategy, MatchedItem,
    PolicyMatcher,
};
pub use policy_file::{decode, decode_lossy, PolicyEntry, PolicyFile, PolicyScope};
pub use report::MigrationReport;
pub use required::{required_files, AdmlStatus, RequiredFile, RequiredFileSet};
pub use settings_report::{ConfiguredSetting, GpoReport};
pub use value::{PolicyData, PolicyValueType};
pub use writer::{encode_entries, write_policy_file};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
