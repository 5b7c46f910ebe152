use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ApprovalStore;
use crate::audit::AuditLog;
use crate::errors::Result;
use crate::models::approval::ApprovalRequest;
use crate::models::audit::{ApprovalEvent, AuditRecord};

/// In-process store. One lock covers requests and audit log together.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    requests: HashMap<Uuid, ApprovalRequest>,
    /// tenant id -> request ids in creation order
    by_tenant: HashMap<String, Vec<Uuid>>,
    audit: AuditLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.requests.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.requests.is_empty()
    }

    pub async fn audit_records(&self) -> Vec<AuditRecord> {
        self.inner.read().await.audit.records().to_vec()
    }
}

#[async_trait]
impl ApprovalStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<ApprovalRequest>> {
        Ok(self.inner.read().await.requests.get(&id).cloned())
    }

    async fn scan_tenant(&self, tenant_id: &str) -> Result<Vec<ApprovalRequest>> {
        let inner = self.inner.read().await;
        let rows: Vec<ApprovalRequest> = inner
            .by_tenant
            .get(tenant_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.requests.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn record_transition(
        &self,
        request: ApprovalRequest,
        event: ApprovalEvent,
    ) -> Result<AuditRecord> {
        let mut inner = self.inner.write().await;
        // hash first: a failed append must leave the request untouched
        let record = inner.audit.append(event)?.clone();
        if !inner.requests.contains_key(&request.id) {
            inner
                .by_tenant
                .entry(request.tenant_id.clone())
                .or_default()
                .push(request.id);
        }
        inner.requests.insert(request.id, request);
        Ok(record)
    }

    async fn events_for(&self, request_id: Uuid) -> Result<Vec<ApprovalEvent>> {
        Ok(self.inner.read().await.audit.events_for(request_id))
    }

    async fn verify_audit_chain(&self) -> Result<()> {
        self.inner.read().await.audit.verify_chain()?;
        Ok(())
    }
}
