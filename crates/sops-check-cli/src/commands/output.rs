//! Shared output formatting for check results.

use anyhow::Result;
use sops_check_core::utils::indent;
use sops_check_core::CheckReport;
use std::fmt::Write as _;

use crate::OutputFormat;

/// Print check results in the specified format.
pub fn print(report: &CheckReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render_text(report)),
        OutputFormat::Json => return print_json(report),
    }
    Ok(())
}

/// Renders an explanation for every file that has something to report.
fn render_text(report: &CheckReport) -> String {
    let mut out = String::new();

    for file in report.files.iter().filter(|f| !f.formatted.is_empty()) {
        let _ = write!(out, "Found issues in {}:\n\n", file.path.display());
        let _ = writeln!(out, "{}", indent(&file.formatted, 4, true));
    }

    out
}

fn print_json(report: &CheckReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    println!("{json}");
    Ok(())
}
