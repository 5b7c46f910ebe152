use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry per state transition of an approval request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalEvent {
    pub request_id: Uuid,
    pub event_type: ApprovalEventType,
    /// Actor, when there is one. Expiry has no actor.
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalEventType {
    Created,
    Approved,
    Rejected,
    Expired,
    Cancelled,
}

/// An event as stored in the hash-chained log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub sequence: u64,
    pub previous_hash: String,
    pub hash: String,
    pub event: ApprovalEvent,
}
