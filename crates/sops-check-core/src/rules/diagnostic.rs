//! Mapping of evaluation results to structured report entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::EvalResult;

/// Report level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Nothing to report.
    None,
    /// The file violates the policy.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Outcome of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// The policy is satisfied.
    Pass,
    /// The policy is violated.
    Fail,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// A finding for one file, ready to be serialized into a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEntry {
    /// Kind of the (unflattened) rule that produced the result, e.g. "allOf".
    pub rule_id: String,
    /// Report level.
    pub level: Level,
    /// Pass or fail.
    pub kind: ResultKind,
    /// The formatted explanation.
    pub message: String,
    /// Description of the rule, empty if none was given.
    pub description: String,
    /// The checked file.
    pub file: PathBuf,
}

impl DiagnosticEntry {
    /// Returns `true` if the entry reports a policy violation.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.kind == ResultKind::Fail
    }
}

impl EvalResult<'_> {
    /// Converts the result into a [`DiagnosticEntry`] for `file`.
    ///
    /// A successful result still counts as a failure when trust anchors were
    /// left unmatched and `allow_unmatched` is `false`.
    #[must_use]
    pub fn to_diagnostic(&self, file: &Path, allow_unmatched: bool) -> DiagnosticEntry {
        let passed = !self.is_problematic(allow_unmatched);
        let (level, kind) = if passed {
            (Level::None, ResultKind::Pass)
        } else {
            (Level::Error, ResultKind::Fail)
        };

        DiagnosticEntry {
            rule_id: self.rule.kind().to_string(),
            level,
            kind,
            message: self.format(),
            description: self.rule.meta().description.clone().unwrap_or_default(),
            file: file.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{EvalContext, Meta, Rule};

    #[test]
    fn failed_result_is_error() {
        let rule = Rule::all_of(vec![Rule::literal("a")]);
        let entry = rule
            .eval(&EvalContext::new(["b"]))
            .to_diagnostic(Path::new("secrets/prod.yaml"), true);

        assert_eq!(entry.rule_id, "allOf");
        assert_eq!(entry.level, Level::Error);
        assert_eq!(entry.kind, ResultKind::Fail);
        assert!(entry.is_failure());
        assert_eq!(entry.file, PathBuf::from("secrets/prod.yaml"));
        assert_eq!(
            entry.message,
            "[match] Expected trust anchor \"a\" was not found.\n\
             \n\
             Unmatched trust anchors:\n  - b\n"
        );
    }

    #[test]
    fn unmatched_anchors_fail_unless_allowed() {
        let rule = Rule::literal("a");
        let result = rule.eval(&EvalContext::new(["a", "extra"]));

        let strict = result.to_diagnostic(Path::new("f.yaml"), false);
        assert_eq!(strict.level, Level::Error);
        assert_eq!(strict.kind, ResultKind::Fail);

        let lenient = result.to_diagnostic(Path::new("f.yaml"), true);
        assert_eq!(lenient.level, Level::None);
        assert_eq!(lenient.kind, ResultKind::Pass);
    }

    #[test]
    fn clean_success_passes() {
        let rule = Rule::literal("a");
        let entry = rule
            .eval(&EvalContext::new(["a"]))
            .to_diagnostic(Path::new("f.yaml"), false);
        assert_eq!(entry.kind, ResultKind::Pass);
        assert_eq!(entry.message, "");
    }

    #[test]
    fn description_comes_from_rule_meta() {
        let rule = Rule::literal("a").with_meta(Meta::new(Some("Ops key".to_string()), None));
        let entry = rule
            .eval(&EvalContext::new(["b"]))
            .to_diagnostic(Path::new("f.yaml"), false);
        assert_eq!(entry.rule_id, "match");
        assert_eq!(entry.description, "Ops key");
    }

    #[test]
    fn serializes_lowercase_levels() {
        let rule = Rule::literal("a");
        let entry = rule
            .eval(&EvalContext::new(["b"]))
            .to_diagnostic(Path::new("f.yaml"), false);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ruleId"], "match");
        assert_eq!(json["level"], "error");
        assert_eq!(json["kind"], "fail");
    }
}
