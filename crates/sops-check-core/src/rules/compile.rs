//! Compilation of declarative rule configuration into executable rules.

use miette::Diagnostic;
use regex::Regex;

use super::{Meta, Rule};
use crate::config::RuleConfig;

/// Errors raised while compiling rule configuration.
#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum CompileError {
    /// A `matchRegex` pattern is not a valid regular expression.
    #[error("{context}: invalid regular expression {pattern:?}")]
    #[diagnostic(
        code(sops_check::invalid_regex),
        help("patterns use the syntax of the Rust `regex` crate")
    )]
    InvalidRegex {
        /// Position of the rule (e.g., "rules[0].anyOf[1]").
        context: String,
        /// The offending pattern.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A rule has none of the supported conditions.
    #[error("{context}: rule has no conditions")]
    #[diagnostic(
        code(sops_check::no_conditions),
        help("set one of `match`, `matchRegex`, `not`, `allOf`, `anyOf` or `oneOf`")
    )]
    NoConditions {
        /// Position of the rule.
        context: String,
    },
}

/// Compiles a list of top-level rule configurations into a single rule.
///
/// The rules are wrapped in an implicit `allOf`, so every top-level rule must
/// match independently.
///
/// # Errors
///
/// Returns the first [`CompileError`] encountered.
pub fn compile(rules: &[RuleConfig]) -> Result<Rule, CompileError> {
    compile_rules(rules, "rules").map(Rule::all_of)
}

fn compile_rules(rules: &[RuleConfig], context: &str) -> Result<Vec<Rule>, CompileError> {
    rules
        .iter()
        .enumerate()
        .map(|(i, rule)| compile_rule(rule, &format!("{context}[{i}]")))
        .collect()
}

fn compile_rule(config: &RuleConfig, context: &str) -> Result<Rule, CompileError> {
    let compiled = compile_condition(config, context)?;

    Ok(compiled.with_meta(Meta::new(
        config.description.clone(),
        config.url.clone(),
    )))
}

fn compile_condition(config: &RuleConfig, context: &str) -> Result<Rule, CompileError> {
    if let Some(trust_anchor) = config.match_condition() {
        return Ok(Rule::literal(trust_anchor));
    }

    if let Some(pattern) = config.match_regex_condition() {
        let compiled = Regex::new(pattern).map_err(|source| CompileError::InvalidRegex {
            context: context.to_string(),
            pattern: pattern.to_string(),
            source,
        })?;
        return Ok(Rule::regex(compiled));
    }

    if let Some(inner) = &config.not {
        return compile_rule(inner, &format!("{context}.not")).map(Rule::not);
    }

    if !config.all_of.is_empty() {
        return compile_rules(&config.all_of, &format!("{context}.allOf")).map(Rule::all_of);
    }

    if !config.any_of.is_empty() {
        return compile_rules(&config.any_of, &format!("{context}.anyOf")).map(Rule::any_of);
    }

    if !config.one_of.is_empty() {
        return compile_rules(&config.one_of, &format!("{context}.oneOf")).map(Rule::one_of);
    }

    Err(CompileError::NoConditions {
        context: context.to_string(),
    })
}
