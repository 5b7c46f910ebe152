//! Governance rule evaluation.
//!
//! Pure functions over a tenant's rule set and a request's metadata. No state,
//! no locking: callers decide with [`is_approval_required`] whether to open an
//! approval request at all, and may use [`evaluate_rules`] to learn which
//! rules fired, who may approve, and how long the request should live.

use serde::Serialize;
use serde_json::Value;

use crate::models::approval::{Metadata, RequestType};
use crate::models::rule::{GovernanceRule, Operator, RuleCondition, RuleType};

// ── Public API ───────────────────────────────────────────────

/// Outcome of evaluating a rule set for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEvaluation {
    pub required: bool,
    pub matched_rule_ids: Vec<String>,
    /// Union of the matched rules' approvers, first-seen order.
    pub approvers: Vec<String>,
    /// Strictest `expirationHours` among matched rules.
    pub expiration_hours: Option<u32>,
}

/// Decide whether `request_type` with `metadata` needs human sign-off.
///
/// Ungoverned request types (no enabled rule for the type) never require
/// approval. Otherwise any single matching rule is enough.
pub fn is_approval_required(
    rules: &[GovernanceRule],
    request_type: RequestType,
    metadata: &Metadata,
) -> bool {
    evaluate_rules(rules, request_type, metadata).required
}

/// Full evaluation: which enabled rules for `request_type` match `metadata`.
pub fn evaluate_rules(
    rules: &[GovernanceRule],
    request_type: RequestType,
    metadata: &Metadata,
) -> RuleEvaluation {
    let mut outcome = RuleEvaluation::default();

    let applicable = rules
        .iter()
        .filter(|r| r.enabled && r.request_type == request_type);

    for rule in applicable {
        if !rule_matches(rule, metadata) {
            continue;
        }

        outcome.matched_rule_ids.push(rule.id.clone());
        for approver in &rule.approvers {
            if !outcome.approvers.contains(approver) {
                outcome.approvers.push(approver.clone());
            }
        }
        if let Some(hours) = rule.expiration_hours {
            outcome.expiration_hours = Some(match outcome.expiration_hours {
                Some(current) => current.min(hours),
                None => hours,
            });
        }
    }

    outcome.required = !outcome.matched_rule_ids.is_empty();

    tracing::debug!(
        request_type = %request_type,
        required = outcome.required,
        matched = ?outcome.matched_rule_ids,
        "governance rules evaluated"
    );

    outcome
}

/// A rule matches when it is `always_require_approval`, or when every one of
/// its conditions holds.
pub fn rule_matches(rule: &GovernanceRule, metadata: &Metadata) -> bool {
    if rule.rule_type == RuleType::AlwaysRequireApproval {
        return true;
    }
    rule.conditions
        .iter()
        .all(|c| evaluate_condition(c, metadata))
}

// ── Condition Evaluation ─────────────────────────────────────

/// Evaluate a single condition against the metadata map.
pub fn evaluate_condition(condition: &RuleCondition, metadata: &Metadata) -> bool {
    let actual = metadata.get(&condition.field);
    evaluate_operator(condition.operator, actual, &condition.value)
}

// ── Operator Evaluation ──────────────────────────────────────

fn evaluate_operator(op: Operator, actual: Option<&Value>, expected: &Value) -> bool {
    match op {
        Operator::Eq => actual.map(|a| a == expected).unwrap_or(false),
        // an absent field is strictly unequal to anything
        Operator::Ne => actual.map(|a| a != expected).unwrap_or(true),
        Operator::Gt => compare_numeric(actual, expected, |a, b| a > b),
        Operator::Gte => compare_numeric(actual, expected, |a, b| a >= b),
        Operator::Lt => compare_numeric(actual, expected, |a, b| a < b),
        Operator::Lte => compare_numeric(actual, expected, |a, b| a <= b),
        Operator::Contains => sequence_membership(actual, expected).unwrap_or(false),
        Operator::NotContains => sequence_membership(actual, expected)
            .map(|found| !found)
            .unwrap_or(false),
        Operator::Unknown => false,
    }
}

// ── Operator Implementations ─────────────────────────────────

/// Compare as f64. Anything that does not coerce to a finite number fails.
fn compare_numeric(actual: Option<&Value>, expected: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (actual.and_then(to_f64), to_f64(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn to_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// `Some(found)` when `actual` is an array, `None` when it is not a sequence.
fn sequence_membership(actual: Option<&Value>, expected: &Value) -> Option<bool> {
    match actual? {
        Value::Array(items) => Some(items.iter().any(|item| item == expected)),
        _ => None,
    }
}

// ── Tests ────────────────────────────────────────────────────
