use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata payload attached to a request. Only the rule engine looks inside.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ── Request Type ─────────────────────────────────────────────

/// The kind of action awaiting sign-off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Activation,
    PlatformConfig,
    AgentPrompt,
    McpConnector,
    InfrastructureChange,
    CostThreshold,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Activation => "activation",
            RequestType::PlatformConfig => "platform_config",
            RequestType::AgentPrompt => "agent_prompt",
            RequestType::McpConnector => "mcp_connector",
            RequestType::InfrastructureChange => "infrastructure_change",
            RequestType::CostThreshold => "cost_threshold",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "activation" => Ok(RequestType::Activation),
            "platform_config" => Ok(RequestType::PlatformConfig),
            "agent_prompt" => Ok(RequestType::AgentPrompt),
            "mcp_connector" => Ok(RequestType::McpConnector),
            "infrastructure_change" => Ok(RequestType::InfrastructureChange),
            "cost_threshold" => Ok(RequestType::CostThreshold),
            other => Err(format!("unknown request type: {}", other)),
        }
    }
}

// ── Status ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
            ApprovalStatus::Expired => "expired",
            ApprovalStatus::Cancelled => "cancelled",
        }
    }

    /// Every status except `pending` is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Identities & Decisions ───────────────────────────────────

/// Who submitted or reviewed a request. Trusted as given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl UserIdentity {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            email: email.into(),
            role: role.into(),
        }
    }
}

/// The recorded outcome of a review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub reason: Option<String>,
    pub comments: Option<String>,
}

/// Reviewer input to approve/reject. `approved` is implied by the operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub reviewer: UserIdentity,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl ReviewDecision {
    pub fn by(reviewer: UserIdentity) -> Self {
        Self {
            reviewer,
            reason: None,
            comments: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }
}

// ── Approval Request ─────────────────────────────────────────

/// A proposed action waiting on a human decision.
///
/// `reviewed_by`, `reviewed_at` and `decision` are populated together, and
/// only when `status` is `approved` or `rejected`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub status: ApprovalStatus,
    pub title: String,
    pub description: String,
    pub requested_by: UserIdentity,
    pub tenant_id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reviewed_by: Option<UserIdentity>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub decision: Option<ApprovalDecision>,
}

impl ApprovalRequest {
    /// True once `now` is past the deadline. Says nothing about `status`:
    /// a stored `pending` request may be overdue until it is next observed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Milliseconds elapsed since creation, never negative.
    pub fn waiting_time_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_milliseconds().max(0)
    }
}

/// Caller-supplied fields for a new request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApprovalRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub requested_by: UserIdentity,
    pub tenant_id: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Defaults to `created_at` plus the configured expiry window.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewApprovalRequest {
    pub fn new(
        request_type: RequestType,
        tenant_id: impl Into<String>,
        title: impl Into<String>,
        requested_by: UserIdentity,
    ) -> Self {
        Self {
            request_type,
            title: title.into(),
            description: String::new(),
            requested_by,
            tenant_id: tenant_id.into(),
            metadata: Metadata::new(),
            expires_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

// ── Queue ────────────────────────────────────────────────────

/// Urgency bucket derived from how long a request has been waiting.
/// Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// `High` past `high_after`, `Medium` past `medium_after`, else `Low`.
    /// Both bounds are exclusive.
    pub fn from_waiting(waited: Duration, medium_after: Duration, high_after: Duration) -> Self {
        if waited > high_after {
            Priority::High
        } else if waited > medium_after {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// A pending request as presented to reviewers. Recomputed on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalQueueItem {
    pub request: ApprovalRequest,
    pub waiting_time_ms: i64,
    pub priority: Priority,
}
