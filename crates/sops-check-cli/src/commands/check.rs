//! Check command implementation.

use anyhow::{Context, Result};
use sops_check_core::{Checker, Config, SarifLog};
use std::path::{Path, PathBuf};

use crate::config_resolver::{self, ConfigSource, PROJECT_CONFIG_NAMES};
use crate::OutputFormat;

/// Arguments of the check command.
#[derive(Debug, Clone)]
pub struct CheckArgs {
    /// Directory to check.
    pub path: PathBuf,
    /// Explicit config path or URL.
    pub config: Option<String>,
    /// Where to write the SARIF report, if anywhere.
    pub sarif_report_path: Option<PathBuf>,
    /// Gitignore-style ignore files.
    pub ignore_files: Vec<PathBuf>,
    /// Exclude glob patterns.
    pub exclude: Vec<String>,
    /// Output format.
    pub format: OutputFormat,
}

/// Runs the check command.
///
/// Policy violations are returned as an error after all files were checked
/// and the SARIF report (if requested) was written.
pub fn run(args: &CheckArgs) -> Result<()> {
    let source = config_resolver::resolve(&args.path, args.config.as_deref());
    let config = load_config(&args.path, &source)?;

    let checker = Checker::builder()
        .root(&args.path)
        .config(config)
        .ignore_files(args.ignore_files.iter().cloned())
        .excludes(args.exclude.iter().cloned())
        .build()?;

    let report = checker.check()?;

    super::output::print(&report, args.format)?;

    if let Some(path) = &args.sarif_report_path {
        SarifLog::from_diagnostics(report.diagnostics()).write_file(path)?;
    }

    if let Some(violation) = report.violation() {
        return Err(violation.into());
    }

    if args.format == OutputFormat::Text {
        println!("✅ No issues found.");
    }

    Ok(())
}

fn load_config(project_dir: &Path, source: &ConfigSource) -> Result<Config> {
    match source {
        ConfigSource::Remote(url) => {
            tracing::info!("Using remote config: {url}");
            Config::from_url(url).with_context(|| format!("Failed to load config from {url}"))
        }
        ConfigSource::Default => {
            // Report the conventional location as missing.
            Ok(Config::from_file(&project_dir.join(PROJECT_CONFIG_NAMES[0]))?)
        }
        other => {
            let p = other.path().context("resolved config has no path")?;
            if source.is_global() {
                tracing::info!("Using global config: {}", p.display());
            }
            Config::from_file(p)
                .with_context(|| format!("Failed to load config: {}", p.display()))
        }
    }
}
