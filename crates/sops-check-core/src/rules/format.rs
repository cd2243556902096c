//! Human readable rendering of evaluation results.

use std::collections::BTreeSet;
use std::fmt::{self, Write};

use super::{EvalResult, Kind, Meta, Rule};
use crate::utils::indent;

/// Indentation applied per nesting level.
const INDENT: usize = 2;

/// Accumulates formatted output. Nested blocks are rendered into their own
/// buffer and indented as a whole when written back.
#[derive(Default)]
struct FormatBuffer {
    out: String,
}

impl Write for FormatBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.push_str(s);
        Ok(())
    }
}

impl FormatBuffer {
    /// Passes a fresh buffer to `f` and writes its content indented.
    fn write_indented(&mut self, indent_first: bool, f: impl FnOnce(&mut FormatBuffer)) {
        let mut inner = FormatBuffer::default();
        f(&mut inner);
        self.out.push_str(&indent(&inner.out, INDENT, indent_first));
    }

    /// Writes an indented, numbered list with one `f` rendering per result.
    fn write_indented_list(
        &mut self,
        results: &[&EvalResult<'_>],
        f: fn(&mut FormatBuffer, &EvalResult<'_>),
    ) {
        self.write_indented(true, |buf| {
            for (i, result) in results.iter().enumerate() {
                let _ = write!(buf, "\n{}) ", i + 1);
                buf.write_indented(false, |buf| f(buf, result));
            }
        });
    }
}

impl EvalResult<'_> {
    /// Formats the result as a human readable string.
    ///
    /// The output explains why the rules failed (if they did) and lists the
    /// trust anchors no rule accounted for (if any). A successful result
    /// without unmatched trust anchors formats to an empty string.
    #[must_use]
    pub fn format(&self) -> String {
        let result = self.flatten();
        let mut buf = FormatBuffer::default();

        if !result.success {
            format_failure(&mut buf, result);
        }

        if !result.unmatched.is_empty() {
            if !result.success {
                // Leave some space between the failure output and the
                // unmatched trust anchors.
                buf.out.push('\n');
            }

            buf.out.push_str("Unmatched trust anchors:\n");
            format_trust_anchors(&mut buf, &result.unmatched);
        }

        buf.out
    }
}

/// Explains a failed result. The caller must ensure `result.success` is false.
fn format_failure(buf: &mut FormatBuffer, result: &EvalResult<'_>) {
    let result = result.flatten();

    format_rule_kind(buf, result.rule.kind());
    format_rule_meta(buf, result.rule.meta());

    let (successes, failures) = result.partition_nested();

    match result.rule {
        Rule::Match(r) => {
            let _ = writeln!(buf, "Expected trust anchor {:?} was not found.", r.trust_anchor());
        }
        Rule::MatchRegex(r) => {
            let _ = writeln!(
                buf,
                "Trust anchor matching regular expression {:?} was not found.",
                r.pattern().as_str()
            );
        }
        Rule::Not(_) => {
            buf.out.push_str("Expected nested rule to fail, but it did not:\n");
            buf.write_indented_list(&successes, format_unexpected_success);
        }
        Rule::AllOf(_) => {
            buf.out
                .push_str("Expected ALL of the nested rules to match, but found ");
            if failures.len() == 1 {
                buf.out.push_str("one failure:\n");
            } else {
                let _ = writeln!(buf, "{} failures:", failures.len());
            }
            buf.write_indented_list(&failures, format_failure);
        }
        Rule::AnyOf(_) => {
            buf.out
                .push_str("Expected ANY of the nested rule to match, but none did:\n");
            buf.write_indented_list(&failures, format_failure);
        }
        Rule::OneOf(_) => {
            buf.out
                .push_str("Expected EXACTLY ONE nested rule to match, but ");
            if successes.is_empty() {
                buf.out.push_str("none did:\n");
                buf.write_indented_list(&failures, format_failure);
            } else {
                let _ = writeln!(buf, "found {}:", successes.len());
                buf.write_indented_list(&successes, format_unexpected_success);
            }
        }
    }
}

/// Renders a result that succeeded although it was expected to fail. The
/// caller must ensure `result.success` is true.
fn format_unexpected_success(buf: &mut FormatBuffer, result: &EvalResult<'_>) {
    let result = result.flatten();

    format_rule_kind(buf, result.rule.kind());
    format_rule_meta(buf, result.rule.meta());

    buf.out.push_str("Matched trust anchors:\n");
    format_trust_anchors(buf, &result.matched);
}

fn format_rule_kind(buf: &mut FormatBuffer, kind: Kind) {
    let _ = write!(buf, "[{kind}] ");
}

fn format_rule_meta(buf: &mut FormatBuffer, meta: &Meta) {
    let description = meta.description.as_deref().map_or("", str::trim);
    if !description.is_empty() {
        let _ = write!(buf, "{description}\n\n");
    }

    let url = meta.url.as_deref().map_or("", str::trim);
    if !url.is_empty() {
        let _ = write!(buf, "More details: {url}\n\n");
    }
}

/// Writes a bulleted list of trust anchors, in ascending order.
fn format_trust_anchors(buf: &mut FormatBuffer, items: &BTreeSet<String>) {
    for trust_anchor in items {
        buf.write_indented(true, |buf| {
            let _ = write!(buf, "- {trust_anchor}");
        });
        buf.out.push('\n');
    }
}
