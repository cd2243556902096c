//! SARIF 2.1.0 report generation.
//!
//! Only the subset of the format needed to report policy violations is
//! modelled: one run, a rule descriptor per rule id, and one result per
//! diagnostic entry located at the offending file.

use crate::rules::DiagnosticEntry;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// SARIF version written to reports.
pub const SARIF_VERSION: &str = "2.1.0";

/// JSON schema of SARIF 2.1.0.
pub const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";

const TOOL_NAME: &str = "sops-check";

/// Errors that can occur while writing a SARIF report.
#[derive(Debug, Error)]
pub enum SarifError {
    /// Serialization failed.
    #[error("Could not serialize the report")]
    Serialize(#[from] serde_json::Error),

    /// The report file could not be written.
    #[error("Could not write the report to {}", .path.display())]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// A SARIF log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarifLog {
    /// Format version.
    pub version: String,
    /// Schema URI.
    #[serde(rename = "$schema")]
    pub schema: String,
    /// Tool runs.
    pub runs: Vec<Run>,
}

/// A single run of the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// The tool that produced the results.
    pub tool: Tool,
    /// Reported results.
    pub results: Vec<SarifResult>,
}

/// Tool information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
    /// The tool's driver component.
    pub driver: Driver,
}

/// Driver component of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    /// Tool name.
    pub name: String,
    /// Tool information URI.
    pub information_uri: String,
    /// Rules referenced by results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ReportingDescriptor>,
}

/// Describes a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingDescriptor {
    /// Rule id.
    pub id: String,
    /// Short description.
    pub short_description: Message,
}

/// A plain text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message text.
    pub text: String,
}

/// One reported result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    /// Id of the rule that produced the result.
    pub rule_id: String,
    /// Result kind (`pass` or `fail`).
    pub kind: String,
    /// Result level (`none` or `error`).
    pub level: String,
    /// Explanation.
    pub message: Message,
    /// Where the result was found.
    pub locations: Vec<Location>,
}

/// Location of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Physical location.
    pub physical_location: PhysicalLocation,
}

/// Physical location of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalLocation {
    /// The file.
    pub artifact_location: ArtifactLocation,
}

/// Reference to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    /// File path.
    pub uri: String,
}

impl SarifLog {
    /// Builds a log with a single run from diagnostic entries.
    ///
    /// Rule descriptors are deduplicated by rule id; the last description
    /// seen for an id wins.
    pub fn from_diagnostics<'a>(entries: impl IntoIterator<Item = &'a DiagnosticEntry>) -> Self {
        let mut rules: Vec<ReportingDescriptor> = Vec::new();
        let mut results = Vec::new();

        for entry in entries {
            let short_description = Message {
                text: entry.description.clone(),
            };
            match rules.iter_mut().find(|r| r.id == entry.rule_id) {
                Some(rule) => rule.short_description = short_description,
                None => rules.push(ReportingDescriptor {
                    id: entry.rule_id.clone(),
                    short_description,
                }),
            }

            results.push(SarifResult {
                rule_id: entry.rule_id.clone(),
                kind: entry.kind.to_string(),
                level: entry.level.to_string(),
                message: Message {
                    text: entry.message.clone(),
                },
                locations: vec![Location {
                    physical_location: PhysicalLocation {
                        artifact_location: ArtifactLocation {
                            uri: entry.file.display().to_string(),
                        },
                    },
                }],
            });
        }

        Self {
            version: SARIF_VERSION.to_string(),
            schema: SARIF_SCHEMA.to_string(),
            runs: vec![Run {
                tool: Tool {
                    driver: Driver {
                        name: TOOL_NAME.to_string(),
                        information_uri: TOOL_NAME.to_string(),
                        rules,
                    },
                },
                results,
            }],
        }
    }

    /// Serializes the log as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SarifError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the log to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_file(&self, path: &Path) -> Result<(), SarifError> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|source| SarifError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("SARIF report written to {}", path.display());
        Ok(())
    }
}
