use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use pol_parser::{run_analysis, AnalysisConfig, GpoLocation, PolicySource};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// List the ADMX templates a GPO's Administrative Template settings depend on.
///
/// Decodes the GPO's Machine and User registry.pol files, matches them against
/// every ADMX file in a policy definitions store, and reports the ADMX/ADML
/// pairs needed to reproduce the settings elsewhere.
#[derive(Parser, Debug)]
#[command(name = "gpo2admx", version)]
struct Cli {
    /// GPO folder containing Machine\registry.pol and/or User\registry.pol.
    #[arg(long, conflicts_with_all = ["sysvol", "machine_pol", "user_pol"])]
    gpo_dir: Option<PathBuf>,

    /// SYSVOL root, used with --domain and --guid.
    #[arg(long, requires_all = ["domain", "guid"])]
    sysvol: Option<PathBuf>,

    /// Domain DNS name under SYSVOL.
    #[arg(long, requires = "sysvol")]
    domain: Option<String>,

    /// GPO GUID, with or without braces.
    #[arg(long, requires = "sysvol")]
    guid: Option<String>,

    /// Explicit Machine registry.pol.
    #[arg(long, conflicts_with = "sysvol")]
    machine_pol: Option<PathBuf>,

    /// Explicit User registry.pol.
    #[arg(long, conflicts_with = "sysvol")]
    user_pol: Option<PathBuf>,

    /// ADMX store (PolicyDefinitions folder).
    #[arg(long)]
    admx_store: PathBuf,

    /// ADML language subfolder.
    #[arg(long, default_value = pol_parser::analysis::DEFAULT_LANGUAGE)]
    language: String,

    /// Get-GPOReport XML; enables name-based matching.
    #[arg(long)]
    settings_report: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable debug logging (takes precedence over RUST_LOG).
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    fn policy_source(&self) -> Result<PolicySource> {
        if let Some(dir) = &self.gpo_dir {
            return Ok(PolicySource::Gpo(GpoLocation::from_dir(dir)));
        }
        if let (Some(sysvol), Some(domain), Some(guid)) = (&self.sysvol, &self.domain, &self.guid) {
            return Ok(PolicySource::Gpo(GpoLocation::in_sysvol(sysvol, domain, guid)));
        }
        if self.machine_pol.is_some() || self.user_pol.is_some() {
            return Ok(PolicySource::Files {
                machine: self.machine_pol.clone(),
                user: self.user_pol.clone(),
            });
        }
        bail!(
            "no policy source given: use --gpo-dir, --sysvol/--domain/--guid, \
             or --machine-pol/--user-pol"
        )
    }

    fn config(&self) -> Result<AnalysisConfig> {
        Ok(AnalysisConfig {
            source: self.policy_source()?,
            admx_dir: self.admx_store.clone(),
            language: self.language.clone(),
            settings_report: self.settings_report.clone(),
        })
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config()?;
    let report = run_analysis(&config).with_context(|| {
        format!("failed to analyse GPO against {}", config.admx_dir.display())
    })?;

    let rendered = match cli.format {
        OutputFormat::Text => report.to_string(),
        OutputFormat::Json => report.to_json().context("failed to serialize report")?,
    };

    match &cli.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write report to {}", path.display()))?,
        None => print!("{}", rendered),
    }

    Ok(())
}
