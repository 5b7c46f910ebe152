//! Loading and linting governance rule sets.
//!
//! Rule sets live in YAML or JSON documents, either as a bare list of rules or
//! under a top-level `rules` key:
//!
//! ```yaml
//! rules:
//!   - id: large-audiences
//!     tenantId: acme
//!     requestType: activation
//!     type: threshold_based
//!     conditions:
//!       - { field: audienceSize, operator: gt, value: 10000 }
//!     approvers: [u-legal]
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::config::MAX_EXPIRY_HOURS;
use crate::models::rule::{GovernanceRule, Operator, RuleType};

#[derive(Deserialize)]
struct RuleDocument {
    rules: Vec<GovernanceRule>,
}

const SHAPE_ERROR: &str = "rule document must be a list of rules or a mapping with a `rules` key";

pub fn load_rules(path: &Path) -> anyhow::Result<Vec<GovernanceRule>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rule file {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let parsed = match ext.as_str() {
        "json" => parse_json(&raw),
        "yaml" | "yml" => parse_yaml(&raw),
        other => Err(anyhow::anyhow!(
            "unsupported rule file extension '{}' (expected .yaml, .yml or .json)",
            other
        )),
    };
    parsed.with_context(|| format!("failed to parse rule file {}", path.display()))
}

// The root shape is sniffed first and the text parsed again into the concrete
// type, so serde's error keeps the rule index, field and line.

pub fn parse_yaml(raw: &str) -> anyhow::Result<Vec<GovernanceRule>> {
    match serde_yaml::from_str::<serde_yaml::Value>(raw)? {
        serde_yaml::Value::Sequence(_) => Ok(serde_yaml::from_str(raw)?),
        serde_yaml::Value::Mapping(_) => {
            let doc: RuleDocument = serde_yaml::from_str(raw)?;
            Ok(doc.rules)
        }
        _ => anyhow::bail!(SHAPE_ERROR),
    }
}

pub fn parse_json(raw: &str) -> anyhow::Result<Vec<GovernanceRule>> {
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Array(_) => Ok(serde_json::from_str(raw)?),
        serde_json::Value::Object(_) => {
            let doc: RuleDocument = serde_json::from_str(raw)?;
            Ok(doc.rules)
        }
        _ => anyhow::bail!(SHAPE_ERROR),
    }
}

/// Rules belonging to one tenant, order preserved.
pub fn rules_for_tenant(rules: &[GovernanceRule], tenant_id: &str) -> Vec<GovernanceRule> {
    rules
        .iter()
        .filter(|r| r.tenant_id == tenant_id)
        .cloned()
        .collect()
}

// ── Lint ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleLint {
    pub rule_id: String,
    pub level: LintLevel,
    pub message: String,
}

impl RuleLint {
    fn warning(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            level: LintLevel::Warning,
            message: message.into(),
        }
    }

    fn error(rule_id: &str, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            level: LintLevel::Error,
            message: message.into(),
        }
    }
}

/// Flag rules that will not behave the way their author probably expects.
pub fn lint_rules(rules: &[GovernanceRule]) -> Vec<RuleLint> {
    let mut findings = Vec::new();
    let mut seen = HashSet::new();

    for rule in rules {
        if !seen.insert((rule.tenant_id.as_str(), rule.id.as_str())) {
            findings.push(RuleLint::error(
                &rule.id,
                format!("duplicate rule id for tenant '{}'", rule.tenant_id),
            ));
        }

        let always = rule.rule_type == RuleType::AlwaysRequireApproval;
        if always && !rule.conditions.is_empty() {
            findings.push(RuleLint::warning(
                &rule.id,
                "always_require_approval ignores its conditions",
            ));
        }
        if !always && rule.conditions.is_empty() {
            findings.push(RuleLint::warning(
                &rule.id,
                "rule has no conditions and matches every request",
            ));
        }

        for (idx, cond) in rule.conditions.iter().enumerate() {
            if cond.operator == Operator::Unknown && !always {
                findings.push(RuleLint::error(
                    &rule.id,
                    format!(
                        "condition #{} on '{}' uses an unknown operator and can never match",
                        idx, cond.field
                    ),
                ));
            }
        }

        match rule.expiration_hours {
            Some(0) => findings.push(RuleLint::warning(
                &rule.id,
                "expirationHours is 0: requests expire as soon as they are created",
            )),
            Some(hours) if hours > MAX_EXPIRY_HOURS => findings.push(RuleLint::error(
                &rule.id,
                format!(
                    "expirationHours {} exceeds the maximum of {}; requests cannot be created",
                    hours, MAX_EXPIRY_HOURS
                ),
            )),
            _ => {}
        }
        if rule.enabled && rule.approvers.is_empty() {
            findings.push(RuleLint::warning(&rule.id, "rule lists no approvers"));
        }
    }

    findings
}

pub fn has_errors(findings: &[RuleLint]) -> bool {
    findings.iter().any(|f| f.level == LintLevel::Error)
}
