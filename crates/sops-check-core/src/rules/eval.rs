//! Rule evaluation against the trust anchors of a single file.

use std::collections::BTreeSet;
use std::ptr;

use super::{CompoundRule, MatchRegexRule, MatchRule, NotRule, Rule};

/// Data needed during rule evaluation: the trust anchors found in one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalContext {
    trust_anchors: BTreeSet<String>,
}

impl EvalContext {
    /// Creates a context from a list of trust anchors. Duplicates collapse.
    #[must_use]
    pub fn new<I, S>(trust_anchors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trust_anchors: trust_anchors.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the set of trust anchors.
    #[must_use]
    pub fn trust_anchors(&self) -> &BTreeSet<String> {
        &self.trust_anchors
    }

    /// Returns all trust anchors that are not in `matched`.
    fn remainder(&self, matched: &BTreeSet<String>) -> BTreeSet<String> {
        self.trust_anchors.difference(matched).cloned().collect()
    }
}

/// The result of evaluating a rule.
///
/// Results form a tree with the same shape as the evaluated rules.
#[derive(Debug, Clone)]
pub struct EvalResult<'r> {
    /// The rule that produced this result.
    pub rule: &'r Rule,
    /// Whether the rule was matched by the input.
    pub success: bool,
    /// Trust anchors matched during evaluation. May be non-empty on failure,
    /// indicating partial matches.
    pub matched: BTreeSet<String>,
    /// All trust anchors of the context that are not in `matched`.
    pub unmatched: BTreeSet<String>,
    /// Results of the nested rules that were evaluated, in declaration order.
    pub nested: Vec<EvalResult<'r>>,
}

impl PartialEq for EvalResult<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.rule, other.rule)
            && self.success == other.success
            && self.matched == other.matched
            && self.unmatched == other.unmatched
            && self.nested == other.nested
    }
}

impl EvalResult<'_> {
    /// Splits nested results into successes and failures, keeping order.
    pub(crate) fn partition_nested(&self) -> (Vec<&Self>, Vec<&Self>) {
        self.nested.iter().partition(|result| result.success)
    }

    /// Collapses compound results with a single nested result into that
    /// result, repeatedly.
    #[must_use]
    pub fn flatten(&self) -> &Self {
        let mut result = self;
        while result.rule.kind().is_compound() && result.nested.len() == 1 {
            result = &result.nested[0];
        }
        result
    }

    /// Returns `true` if the file that produced this result should be
    /// reported: the rules failed, or trust anchors were left unmatched
    /// without `allow_unmatched`.
    #[must_use]
    pub fn is_problematic(&self, allow_unmatched: bool) -> bool {
        !self.success || (!self.unmatched.is_empty() && !allow_unmatched)
    }
}

impl Rule {
    /// Evaluates the rule against `ctx`.
    ///
    /// Evaluation is pure: the same rule and context always yield the same
    /// result. Compound rules evaluate every nested rule, even when the
    /// outcome is already decided, so the result carries full diagnostics.
    #[must_use]
    pub fn eval(&self, ctx: &EvalContext) -> EvalResult<'_> {
        match self {
            Self::AllOf(r) => eval_compound(self, r, ctx, |successes, total| successes == total),
            Self::AnyOf(r) => eval_compound(self, r, ctx, |successes, _| successes > 0),
            Self::OneOf(r) => eval_compound(self, r, ctx, |successes, _| successes == 1),
            Self::Not(r) => eval_not(self, r, ctx),
            Self::Match(r) => eval_match(self, r, ctx),
            Self::MatchRegex(r) => eval_match_regex(self, r, ctx),
        }
    }
}

fn eval_match<'r>(rule: &'r Rule, inner: &MatchRule, ctx: &EvalContext) -> EvalResult<'r> {
    let matched: BTreeSet<String> = ctx
        .trust_anchors
        .get(inner.trust_anchor())
        .cloned()
        .into_iter()
        .collect();

    leaf_result(rule, ctx, matched)
}

fn eval_match_regex<'r>(
    rule: &'r Rule,
    inner: &MatchRegexRule,
    ctx: &EvalContext,
) -> EvalResult<'r> {
    let matched: BTreeSet<String> = ctx
        .trust_anchors
        .iter()
        .filter(|anchor| inner.pattern().is_match(anchor))
        .cloned()
        .collect();

    leaf_result(rule, ctx, matched)
}

fn leaf_result<'r>(rule: &'r Rule, ctx: &EvalContext, matched: BTreeSet<String>) -> EvalResult<'r> {
    EvalResult {
        rule,
        success: !matched.is_empty(),
        unmatched: ctx.remainder(&matched),
        matched,
        nested: Vec::new(),
    }
}

fn eval_not<'r>(rule: &'r Rule, inner: &'r NotRule, ctx: &EvalContext) -> EvalResult<'r> {
    let result = inner.rule().eval(ctx);

    // Invert the result, swapping the nested accounting.
    EvalResult {
        rule,
        success: !result.success,
        matched: result.unmatched.clone(),
        unmatched: result.matched.clone(),
        nested: vec![result],
    }
}

fn eval_compound<'r>(
    rule: &'r Rule,
    inner: &'r CompoundRule,
    ctx: &EvalContext,
    succeeds: impl Fn(usize, usize) -> bool,
) -> EvalResult<'r> {
    let mut matched = BTreeSet::new();
    let mut success_count = 0;
    let mut nested = Vec::with_capacity(inner.rules().len());

    for child in inner.rules() {
        let result = child.eval(ctx);
        if result.success {
            matched.extend(result.matched.iter().cloned());
            success_count += 1;
        }
        nested.push(result);
    }

    EvalResult {
        rule,
        success: succeeds(success_count, inner.rules().len()),
        unmatched: ctx.remainder(&matched),
        matched,
        nested,
    }
}
