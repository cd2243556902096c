//! The trust anchor rule engine.
//!
//! A policy is a tree of [`Rule`]s. Leaves match trust anchors literally
//! ([`Kind::Match`]) or by regular expression ([`Kind::MatchRegex`]); inner
//! nodes combine nested rules (`allOf`, `anyOf`, `oneOf`, `not`).
//!
//! ```text
//! Config rules
//!   ↓ compile()
//! Rule tree (built once, shared read-only)
//!   ↓ Rule::eval(&EvalContext)       one context per checked file
//! EvalResult tree
//!   ↓ format() / to_diagnostic()
//! console text / SARIF entries
//! ```

use regex::Regex;
use std::fmt;

mod compile;
mod diagnostic;
mod eval;
mod format;

pub use compile::{compile, CompileError};
pub use diagnostic::{DiagnosticEntry, Level, ResultKind};
pub use eval::{EvalContext, EvalResult};

/// The kind of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// All of the nested rules must match.
    AllOf,
    /// At least one of the nested rules must match.
    AnyOf,
    /// Exactly one of the nested rules must match.
    OneOf,
    /// Inverts the outcome of the nested rule.
    Not,
    /// A trust anchor must equal a literal string.
    Match,
    /// At least one trust anchor must match a regular expression.
    MatchRegex,
}

impl Kind {
    /// Returns the identifier used in policy files, output and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllOf => "allOf",
            Self::AnyOf => "anyOf",
            Self::OneOf => "oneOf",
            Self::Not => "not",
            Self::Match => "match",
            Self::MatchRegex => "matchRegex",
        }
    }

    /// Returns `true` for rules that combine a list of nested rules.
    #[must_use]
    pub fn is_compound(self) -> bool {
        matches!(self, Self::AllOf | Self::AnyOf | Self::OneOf)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata common to all rules.
///
/// Both fields are optional and only used to enrich the messages presented
/// to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    /// Free-text description of what the rule enforces.
    pub description: Option<String>,
    /// Link to documentation explaining the purpose of the rule.
    pub url: Option<String>,
}

impl Meta {
    /// Creates metadata from optional description and URL.
    #[must_use]
    pub fn new(description: Option<String>, url: Option<String>) -> Self {
        Self { description, url }
    }
}

/// Rule that combines a list of nested rules (`allOf`, `anyOf`, `oneOf`).
#[derive(Debug, Clone)]
pub struct CompoundRule {
    rules: Vec<Rule>,
    meta: Meta,
}

impl CompoundRule {
    /// Returns the nested rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Rule that inverts the outcome of a nested rule.
#[derive(Debug, Clone)]
pub struct NotRule {
    rule: Box<Rule>,
    meta: Meta,
}

impl NotRule {
    /// Returns the inverted rule.
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }
}

/// Rule asserting that a trust anchor exactly equals a string.
#[derive(Debug, Clone)]
pub struct MatchRule {
    trust_anchor: String,
    meta: Meta,
}

impl MatchRule {
    /// Returns the expected trust anchor.
    #[must_use]
    pub fn trust_anchor(&self) -> &str {
        &self.trust_anchor
    }
}

/// Rule asserting that trust anchors match a regular expression.
#[derive(Debug, Clone)]
pub struct MatchRegexRule {
    pattern: Regex,
    meta: Meta,
}

impl MatchRegexRule {
    /// Returns the compiled pattern.
    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

/// A compiled rule.
///
/// Rules are immutable once built: metadata can only be attached through the
/// consuming [`Rule::with_meta`], and evaluation keeps all state in the
/// returned [`EvalResult`]. A rule tree can therefore be shared freely across
/// the evaluation of many files.
#[derive(Debug, Clone)]
pub enum Rule {
    /// See [`Kind::AllOf`].
    AllOf(CompoundRule),
    /// See [`Kind::AnyOf`].
    AnyOf(CompoundRule),
    /// See [`Kind::OneOf`].
    OneOf(CompoundRule),
    /// See [`Kind::Not`].
    Not(NotRule),
    /// See [`Kind::Match`].
    Match(MatchRule),
    /// See [`Kind::MatchRegex`].
    MatchRegex(MatchRegexRule),
}

impl Rule {
    /// Creates an `allOf` rule from zero or more rules.
    #[must_use]
    pub fn all_of(rules: Vec<Rule>) -> Self {
        Self::AllOf(CompoundRule {
            rules,
            meta: Meta::default(),
        })
    }

    /// Creates an `anyOf` rule from zero or more rules.
    #[must_use]
    pub fn any_of(rules: Vec<Rule>) -> Self {
        Self::AnyOf(CompoundRule {
            rules,
            meta: Meta::default(),
        })
    }

    /// Creates a `oneOf` rule from zero or more rules.
    #[must_use]
    pub fn one_of(rules: Vec<Rule>) -> Self {
        Self::OneOf(CompoundRule {
            rules,
            meta: Meta::default(),
        })
    }

    /// Creates a `not` rule inverting `rule`.
    #[must_use]
    pub fn not(rule: Rule) -> Self {
        Self::Not(NotRule {
            rule: Box::new(rule),
            meta: Meta::default(),
        })
    }

    /// Creates a `match` rule for the expected trust anchor.
    #[must_use]
    pub fn literal(trust_anchor: impl Into<String>) -> Self {
        Self::Match(MatchRule {
            trust_anchor: trust_anchor.into(),
            meta: Meta::default(),
        })
    }

    /// Creates a `matchRegex` rule for the given pattern.
    #[must_use]
    pub fn regex(pattern: Regex) -> Self {
        Self::MatchRegex(MatchRegexRule {
            pattern,
            meta: Meta::default(),
        })
    }

    /// Returns the rule with `meta` attached.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        *self.meta_mut() = meta;
        self
    }

    /// Returns the kind of the rule.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::AllOf(_) => Kind::AllOf,
            Self::AnyOf(_) => Kind::AnyOf,
            Self::OneOf(_) => Kind::OneOf,
            Self::Not(_) => Kind::Not,
            Self::Match(_) => Kind::Match,
            Self::MatchRegex(_) => Kind::MatchRegex,
        }
    }

    /// Returns the metadata associated with the rule.
    #[must_use]
    pub fn meta(&self) -> &Meta {
        match self {
            Self::AllOf(r) | Self::AnyOf(r) | Self::OneOf(r) => &r.meta,
            Self::Not(r) => &r.meta,
            Self::Match(r) => &r.meta,
            Self::MatchRegex(r) => &r.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut Meta {
        match self {
            Self::AllOf(r) | Self::AnyOf(r) | Self::OneOf(r) => &mut r.meta,
            Self::Not(r) => &mut r.meta,
            Self::Match(r) => &mut r.meta,
            Self::MatchRegex(r) => &mut r.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_match_policy_keys() {
        assert_eq!(Kind::AllOf.as_str(), "allOf");
        assert_eq!(Kind::AnyOf.as_str(), "anyOf");
        assert_eq!(Kind::OneOf.as_str(), "oneOf");
        assert_eq!(Kind::Not.as_str(), "not");
        assert_eq!(Kind::Match.as_str(), "match");
        assert_eq!(Kind::MatchRegex.to_string(), "matchRegex");
    }

    #[test]
    fn only_list_combinators_are_compound() {
        assert!(Kind::AllOf.is_compound());
        assert!(Kind::AnyOf.is_compound());
        assert!(Kind::OneOf.is_compound());
        assert!(!Kind::Not.is_compound());
        assert!(!Kind::Match.is_compound());
        assert!(!Kind::MatchRegex.is_compound());
    }

    #[test]
    fn constructors_produce_expected_kinds() {
        let re = Regex::new("^age1").unwrap();
        assert_eq!(Rule::all_of(vec![]).kind(), Kind::AllOf);
        assert_eq!(Rule::any_of(vec![]).kind(), Kind::AnyOf);
        assert_eq!(Rule::one_of(vec![]).kind(), Kind::OneOf);
        assert_eq!(Rule::not(Rule::literal("a")).kind(), Kind::Not);
        assert_eq!(Rule::literal("a").kind(), Kind::Match);
        assert_eq!(Rule::regex(re).kind(), Kind::MatchRegex);
    }

    #[test]
    fn with_meta_attaches_metadata() {
        let rule = Rule::not(Rule::literal("a")).with_meta(Meta::new(
            Some("no a".to_string()),
            Some("https://example.com".to_string()),
        ));
        assert_eq!(rule.meta().description.as_deref(), Some("no a"));
        assert_eq!(rule.meta().url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn new_rules_have_empty_metadata() {
        assert_eq!(Rule::literal("a").meta(), &Meta::default());
    }
}
