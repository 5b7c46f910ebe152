use serde::{Deserialize, Serialize};

use super::approval::RequestType;

// ── Governance Rule ──────────────────────────────────────────

/// A tenant-scoped policy deciding whether a request type needs sign-off.
///
/// ```json
/// {
///   "id": "large-audiences",
///   "tenantId": "acme",
///   "requestType": "activation",
///   "type": "threshold_based",
///   "enabled": true,
///   "conditions": [{ "field": "audienceSize", "operator": "gt", "value": 10000 }],
///   "approvers": ["u-legal", "u-cmo"],
///   "expirationHours": 48
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceRule {
    pub id: String,
    pub tenant_id: String,
    pub request_type: RequestType,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// All conditions must hold for the rule to match.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    /// User ids entitled to decide. Enforced by the caller.
    #[serde(default)]
    pub approvers: Vec<String>,
    /// Overrides the default expiry window.
    #[serde(default)]
    pub expiration_hours: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

impl GovernanceRule {
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        request_type: RequestType,
        rule_type: RuleType,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            request_type,
            rule_type,
            enabled: true,
            conditions: Vec::new(),
            approvers: Vec::new(),
            expiration_hours: None,
        }
    }

    pub fn with_condition(
        mut self,
        field: impl Into<String>,
        operator: Operator,
        value: serde_json::Value,
    ) -> Self {
        self.conditions.push(RuleCondition {
            field: field.into(),
            operator,
            value,
        });
        self
    }

    pub fn with_approvers<I, S>(mut self, approvers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approvers = approvers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expiration_hours(mut self, hours: u32) -> Self {
        self.expiration_hours = Some(hours);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Informational tag. Only `AlwaysRequireApproval` changes evaluation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    AlwaysRequireApproval,
    ThresholdBased,
    RoleBased,
    ComplianceBased,
}

// ── Condition ────────────────────────────────────────────────

/// Leaf check: `metadata[field] <operator> value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleCondition {
    pub field: String,
    pub operator: Operator,
    pub value: serde_json::Value,
}

// ── Operator ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    /// Any operator this engine does not know. Never matches.
    #[serde(other)]
    Unknown,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::Unknown => "unknown",
        }
    }
}
