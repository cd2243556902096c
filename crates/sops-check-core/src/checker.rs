//! Orchestration of a policy check over a directory tree.

use crate::config::Config;
use crate::rules::{self, CompileError, DiagnosticEntry, EvalContext, Rule};
use crate::sops::{self, DiscoveryError, PathFilter, SopsFile};

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while setting up or running a check.
#[derive(Debug, Error)]
pub enum CheckerError {
    /// The configured rules could not be compiled.
    #[error("failed to compile rules")]
    Compile(#[from] CompileError),

    /// SOPS files could not be discovered.
    #[error("failed to find sops files")]
    Discovery(#[from] DiscoveryError),
}

/// Builder for configuring a [`Checker`].
#[derive(Debug, Default)]
pub struct CheckerBuilder {
    root: Option<PathBuf>,
    config: Option<Config>,
    ignore_files: Vec<PathBuf>,
    exclude_patterns: Vec<String>,
}

impl CheckerBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory to check (default: `.`).
    #[must_use]
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Sets the policy configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Adds a gitignore-style ignore file.
    #[must_use]
    pub fn ignore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ignore_files.push(path.into());
        self
    }

    /// Adds multiple ignore files.
    #[must_use]
    pub fn ignore_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.ignore_files.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Adds an exclude glob pattern, relative to the root.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Adds multiple exclude glob patterns.
    #[must_use]
    pub fn excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Builds the checker, compiling the rules and the path filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the rules fail to compile, or if an ignore file
    /// or exclude pattern is invalid.
    pub fn build(self) -> Result<Checker, CheckerError> {
        let root = self.root.unwrap_or_else(|| PathBuf::from("."));
        let config = self.config.unwrap_or_default();

        let rule = rules::compile(&config.rules)?;
        let filter = PathFilter::new(&root, &self.ignore_files, &self.exclude_patterns)?;

        Ok(Checker {
            root,
            rule,
            allow_unmatched: config.allow_unmatched,
            filter,
        })
    }
}

/// Checks every SOPS file below a root directory against a compiled policy.
///
/// Use [`Checker::builder()`] to construct an instance.
#[derive(Debug)]
pub struct Checker {
    root: PathBuf,
    rule: Rule,
    allow_unmatched: bool,
    filter: PathFilter,
}

impl Checker {
    /// Creates a new builder for configuring a checker.
    #[must_use]
    pub fn builder() -> CheckerBuilder {
        CheckerBuilder::new()
    }

    /// Returns the root directory being checked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the compiled root rule.
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Discovers and checks all SOPS files.
    ///
    /// # Errors
    ///
    /// Returns an error if file discovery fails. Policy violations are not
    /// errors; they are part of the returned report.
    pub fn check(&self) -> Result<CheckReport, CheckerError> {
        info!("Checking SOPS files in {}", self.root.display());

        let files = sops::find_files(&self.root, &self.filter)?;
        info!("Found {} SOPS files", files.len());

        let report = CheckReport {
            files: files.iter().map(|file| self.check_file(file)).collect(),
        };

        info!(
            "Check complete: {} of {} files with issues",
            report.problematic_files().count(),
            report.files.len()
        );

        Ok(report)
    }

    /// Evaluates the policy against a single file.
    #[must_use]
    pub fn check_file(&self, file: &SopsFile) -> FileOutcome {
        let path = self.display_path(&file.path);
        let trust_anchors = file.trust_anchors();
        debug!("Checking {} ({} trust anchors)", path.display(), trust_anchors.len());

        let ctx = EvalContext::new(trust_anchors.iter().cloned());
        let result = self.rule.eval(&ctx);

        let diagnostic = result
            .is_problematic(self.allow_unmatched)
            .then(|| result.to_diagnostic(&path, self.allow_unmatched));

        FileOutcome {
            formatted: result.format(),
            success: result.success,
            unmatched: result.unmatched,
            trust_anchors,
            diagnostic,
            path,
        }
    }

    /// Drops a leading `./` when checking the current directory.
    fn display_path(&self, path: &Path) -> PathBuf {
        if self.root == Path::new(".") {
            path.strip_prefix(".").unwrap_or(path).to_path_buf()
        } else {
            path.to_path_buf()
        }
    }
}

/// The outcome of checking one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    /// Path of the file.
    pub path: PathBuf,
    /// Trust anchors found in the file's metadata.
    pub trust_anchors: Vec<String>,
    /// Whether the rules matched.
    pub success: bool,
    /// Trust anchors not matched by any successful rule.
    pub unmatched: BTreeSet<String>,
    /// Human readable explanation, empty when there is nothing to say.
    pub formatted: String,
    /// Set when the file violates the policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<DiagnosticEntry>,
}

impl FileOutcome {
    /// Returns `true` if the file violates the policy.
    #[must_use]
    pub fn is_problematic(&self) -> bool {
        self.diagnostic.is_some()
    }
}

/// Results of a check, one entry per discovered file in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Per-file outcomes.
    pub files: Vec<FileOutcome>,
}

impl CheckReport {
    /// Returns the files that violate the policy.
    pub fn problematic_files(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.is_problematic())
    }

    /// Returns the diagnostic entries of all problematic files.
    pub fn diagnostics(&self) -> impl Iterator<Item = &DiagnosticEntry> {
        self.files.iter().filter_map(|f| f.diagnostic.as_ref())
    }

    /// Returns `true` if any file violates the policy.
    #[must_use]
    pub fn has_issues(&self) -> bool {
        self.problematic_files().next().is_some()
    }

    /// Returns the aggregate error for all problematic files, if any.
    #[must_use]
    pub fn violation(&self) -> Option<PolicyViolation> {
        let files: Vec<PathBuf> = self.problematic_files().map(|f| f.path.clone()).collect();
        (!files.is_empty()).then_some(PolicyViolation { files })
    }
}

/// Error returned when one or more files violate the policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Found {} files with issues:{}", .files.len(), list_paths(.files))]
pub struct PolicyViolation {
    /// The problematic files.
    pub files: Vec<PathBuf>,
}

fn list_paths(files: &[PathBuf]) -> String {
    let mut out = String::new();
    for file in files {
        let _ = write!(out, "\n  - {}", file.display());
    }
    out
}
