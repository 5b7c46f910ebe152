//! Storage contract for approval requests and their audit trail.
//!
//! The manager serializes transitions itself; a backend must make
//! [`ApprovalStore::record_transition`] atomic, so that a request and the
//! audit event describing its change are persisted together or not at all.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::Result;
use crate::models::approval::ApprovalRequest;
use crate::models::audit::{ApprovalEvent, AuditRecord};

pub use memory::MemoryStore;

#[async_trait]
pub trait ApprovalStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ApprovalRequest>>;

    /// Every request for the tenant, in creation order.
    async fn scan_tenant(&self, tenant_id: &str) -> Result<Vec<ApprovalRequest>>;

    /// Upsert `request` and append `event` to the audit log as one unit.
    async fn record_transition(
        &self,
        request: ApprovalRequest,
        event: ApprovalEvent,
    ) -> Result<AuditRecord>;

    /// Audit events for one request, in append order.
    async fn events_for(&self, request_id: Uuid) -> Result<Vec<ApprovalEvent>>;

    async fn verify_audit_chain(&self) -> Result<()>;
}
