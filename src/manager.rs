//! Approval request life cycle.
//!
//! ```text
//!            create
//!   (none) ─────────► pending ──approve──► approved
//!                        │────reject───► rejected
//!                        │────cancel───► cancelled   (requester only)
//!                        └─(overdue, observed)─► expired
//! ```
//!
//! Only `pending` accepts a transition. Expiry is lazy: an overdue request is
//! flipped to `expired` (and audited) when approve, reject, cancel, the queue
//! listing or [`ApprovalManager::expire_overdue`] observes it. Plain reads via
//! [`ApprovalManager::get_request`] and [`ApprovalManager::list_requests`]
//! never mutate; use [`ApprovalRequest::is_overdue`] on their results.
//!
//! Every check-then-set runs under one manager-wide lock, so two racing
//! decisions on the same request cannot both succeed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::ManagerConfig;
use crate::engine::RuleEvaluation;
use crate::errors::{ApprovalError, Result};
use crate::models::approval::{
    ApprovalDecision, ApprovalQueueItem, ApprovalRequest, ApprovalStatus, NewApprovalRequest,
    Priority, ReviewDecision,
};
use crate::models::audit::{ApprovalEvent, ApprovalEventType};
use crate::store::{ApprovalStore, MemoryStore};

pub struct ApprovalManager {
    store: Arc<dyn ApprovalStore>,
    clock: Arc<dyn Clock>,
    config: ManagerConfig,
    transitions: Mutex<()>,
    events: broadcast::Sender<ApprovalEvent>,
}

impl ApprovalManager {
    pub fn new(store: Arc<dyn ApprovalStore>, clock: Arc<dyn Clock>) -> Self {
        Self::build(store, clock, ManagerConfig::default())
    }

    /// Like [`ApprovalManager::new`] with a custom config, which is validated first.
    pub fn with_config(
        store: Arc<dyn ApprovalStore>,
        clock: Arc<dyn Clock>,
        config: ManagerConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self::build(store, clock, config))
    }

    fn build(store: Arc<dyn ApprovalStore>, clock: Arc<dyn Clock>, config: ManagerConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            store,
            clock,
            config,
            transitions: Mutex::new(()),
            events,
        }
    }

    /// Wall clock, memory store, default config.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Every audit event appended from now on. Slow receivers lag; they never
    /// hold up an operation.
    pub fn subscribe(&self) -> broadcast::Receiver<ApprovalEvent> {
        self.events.subscribe()
    }

    // ── Creation ─────────────────────────────────────────────

    pub async fn create_request(&self, fields: NewApprovalRequest) -> Result<ApprovalRequest> {
        validate_new_request(&fields)?;
        let now = self.clock.now();
        let expires_at = match fields.expires_at {
            Some(at) => at,
            None => deadline(now, self.config.default_expiry())?,
        };
        self.insert_new(fields, now, expires_at, None).await
    }

    /// Create a request for a positive rule evaluation. Without an explicit
    /// deadline the strictest matched `expirationHours` applies.
    pub async fn create_from_evaluation(
        &self,
        fields: NewApprovalRequest,
        evaluation: &RuleEvaluation,
    ) -> Result<ApprovalRequest> {
        validate_new_request(&fields)?;
        let now = self.clock.now();
        let window = evaluation
            .expiration_hours
            .map(|h| Duration::hours(i64::from(h)))
            .unwrap_or_else(|| self.config.default_expiry());
        let expires_at = match fields.expires_at {
            Some(at) => at,
            None => deadline(now, window)?,
        };
        let governance = json!({
            "matchedRules": evaluation.matched_rule_ids,
            "approvers": evaluation.approvers,
        });
        self.insert_new(fields, now, expires_at, Some(governance)).await
    }

    async fn insert_new(
        &self,
        fields: NewApprovalRequest,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        governance: Option<serde_json::Value>,
    ) -> Result<ApprovalRequest> {
        let request = ApprovalRequest {
            id: Uuid::new_v4(),
            request_type: fields.request_type,
            status: ApprovalStatus::Pending,
            title: fields.title,
            description: fields.description,
            requested_by: fields.requested_by,
            tenant_id: fields.tenant_id,
            metadata: fields.metadata,
            created_at: now,
            expires_at,
            reviewed_by: None,
            reviewed_at: None,
            decision: None,
        };

        let mut details = json!({
            "type": request.request_type,
            "title": request.title,
            "expiresAt": request.expires_at,
        });
        if let Some(governance) = governance {
            details["governance"] = governance;
        }

        let event = ApprovalEvent {
            request_id: request.id,
            event_type: ApprovalEventType::Created,
            user_id: Some(request.requested_by.user_id.clone()),
            timestamp: now,
            details: Some(details),
        };
        let request = self.commit(request, event).await?;

        tracing::info!(
            request_id = %request.id,
            tenant_id = %request.tenant_id,
            request_type = %request.request_type,
            expires_at = %request.expires_at,
            "approval request created"
        );
        Ok(request)
    }

    // ── Decisions ────────────────────────────────────────────

    pub async fn approve(&self, request_id: Uuid, decision: ReviewDecision) -> Result<ApprovalRequest> {
        self.decide(request_id, decision, true).await
    }

    pub async fn reject(&self, request_id: Uuid, decision: ReviewDecision) -> Result<ApprovalRequest> {
        self.decide(request_id, decision, false).await
    }

    /// Record a reviewer's verdict. Whether the reviewer is among the rule's
    /// approvers is the caller's check.
    async fn decide(
        &self,
        request_id: Uuid,
        decision: ReviewDecision,
        approved: bool,
    ) -> Result<ApprovalRequest> {
        if decision.reviewer.user_id.trim().is_empty() {
            return Err(ApprovalError::InvalidInput(
                "reviewer userId is required".into(),
            ));
        }

        let _guard = self.transitions.lock().await;
        let now = self.clock.now();
        let mut request = self.load_pending(request_id, now).await?;

        let (status, event_type) = if approved {
            (ApprovalStatus::Approved, ApprovalEventType::Approved)
        } else {
            (ApprovalStatus::Rejected, ApprovalEventType::Rejected)
        };

        request.status = status;
        request.reviewed_at = Some(now);
        request.decision = Some(ApprovalDecision {
            approved,
            reason: decision.reason.clone(),
            comments: decision.comments.clone(),
        });
        let reviewer_id = decision.reviewer.user_id.clone();
        request.reviewed_by = Some(decision.reviewer);

        let event = ApprovalEvent {
            request_id,
            event_type,
            user_id: Some(reviewer_id.clone()),
            timestamp: now,
            details: Some(json!({
                "reason": decision.reason,
                "comments": decision.comments,
            })),
        };
        let request = self.commit(request, event).await?;

        tracing::info!(
            request_id = %request_id,
            tenant_id = %request.tenant_id,
            reviewer = %reviewer_id,
            status = %status,
            "approval request decided"
        );
        Ok(request)
    }

    /// Withdraw a pending request. Only its original requester may do this.
    pub async fn cancel(&self, request_id: Uuid, user_id: &str) -> Result<ApprovalRequest> {
        if user_id.trim().is_empty() {
            return Err(ApprovalError::InvalidInput("userId is required".into()));
        }

        let _guard = self.transitions.lock().await;
        let now = self.clock.now();
        let mut request = self.load_pending(request_id, now).await?;

        if request.requested_by.user_id != user_id {
            tracing::warn!(
                request_id = %request_id,
                user_id,
                "cancel refused: not the requester"
            );
            return Err(ApprovalError::Forbidden {
                id: request_id,
                user_id: user_id.to_string(),
            });
        }

        request.status = ApprovalStatus::Cancelled;
        let event = ApprovalEvent {
            request_id,
            event_type: ApprovalEventType::Cancelled,
            user_id: Some(user_id.to_string()),
            timestamp: now,
            details: None,
        };
        let request = self.commit(request, event).await?;

        tracing::info!(
            request_id = %request_id,
            tenant_id = %request.tenant_id,
            "approval request cancelled"
        );
        Ok(request)
    }

    // ── Queue ────────────────────────────────────────────────

    /// Pending requests for `tenant_id`, most urgent first: by priority, then
    /// longest wait. Overdue requests are expired on the way and left out.
    pub async fn get_queue(&self, tenant_id: &str) -> Result<Vec<ApprovalQueueItem>> {
        let _guard = self.transitions.lock().await;
        let now = self.clock.now();
        let medium_after = self.config.medium_priority_after();
        let high_after = self.config.high_priority_after();

        let mut items = Vec::new();
        for request in self.store.scan_tenant(tenant_id).await? {
            let request = self.expire_if_overdue(request, now).await?;
            if !request.is_pending() {
                continue;
            }
            let waiting_time_ms = request.waiting_time_ms(now);
            let priority = Priority::from_waiting(
                Duration::milliseconds(waiting_time_ms),
                medium_after,
                high_after,
            );
            items.push(ApprovalQueueItem {
                request,
                waiting_time_ms,
                priority,
            });
        }

        items.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.waiting_time_ms.cmp(&a.waiting_time_ms))
        });

        tracing::debug!(tenant_id, pending = items.len(), "approval queue built");
        Ok(items)
    }

    /// Expire every overdue pending request of the tenant now. Returns the
    /// requests that were flipped.
    pub async fn expire_overdue(&self, tenant_id: &str) -> Result<Vec<ApprovalRequest>> {
        let _guard = self.transitions.lock().await;
        let now = self.clock.now();

        let mut expired = Vec::new();
        for request in self.store.scan_tenant(tenant_id).await? {
            if request.is_pending() && request.is_overdue(now) {
                expired.push(self.expire_if_overdue(request, now).await?);
            }
        }
        Ok(expired)
    }

    // ── Reads ────────────────────────────────────────────────

    /// Stored state as-is. Does not apply lazy expiry.
    pub async fn get_request(&self, request_id: Uuid) -> Result<Option<ApprovalRequest>> {
        self.store.get(request_id).await
    }

    /// Tenant history in creation order, optionally filtered by stored status.
    pub async fn list_requests(
        &self,
        tenant_id: &str,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<ApprovalRequest>> {
        let mut requests = self.store.scan_tenant(tenant_id).await?;
        if let Some(status) = status {
            requests.retain(|r| r.status == status);
        }
        Ok(requests)
    }

    pub async fn get_audit_log(&self, request_id: Uuid) -> Result<Vec<ApprovalEvent>> {
        self.store.events_for(request_id).await
    }

    pub async fn verify_audit_chain(&self) -> Result<()> {
        self.store.verify_audit_chain().await
    }

    // ── Internals ────────────────────────────────────────────

    /// Fetch a request for a transition. Must be called under `transitions`.
    async fn load_pending(&self, request_id: Uuid, now: DateTime<Utc>) -> Result<ApprovalRequest> {
        let request = self
            .store
            .get(request_id)
            .await?
            .ok_or(ApprovalError::NotFound { id: request_id })?;
        let request = self.expire_if_overdue(request, now).await?;

        if !request.is_pending() {
            tracing::warn!(
                request_id = %request_id,
                status = %request.status,
                "transition refused: request is no longer pending"
            );
            return Err(ApprovalError::InvalidStateTransition {
                id: request_id,
                current: request.status,
            });
        }
        Ok(request)
    }

    /// Flip a pending, overdue request to `expired`. Anything else is
    /// returned unchanged. Must be called under `transitions`.
    async fn expire_if_overdue(
        &self,
        mut request: ApprovalRequest,
        now: DateTime<Utc>,
    ) -> Result<ApprovalRequest> {
        if !request.is_pending() || !request.is_overdue(now) {
            return Ok(request);
        }

        request.status = ApprovalStatus::Expired;
        let event = ApprovalEvent {
            request_id: request.id,
            event_type: ApprovalEventType::Expired,
            user_id: None,
            timestamp: now,
            details: Some(json!({ "expiresAt": request.expires_at })),
        };
        let request = self.commit(request, event).await?;

        tracing::info!(
            request_id = %request.id,
            tenant_id = %request.tenant_id,
            expires_at = %request.expires_at,
            "approval request expired"
        );
        Ok(request)
    }

    async fn commit(&self, request: ApprovalRequest, event: ApprovalEvent) -> Result<ApprovalRequest> {
        self.store
            .record_transition(request.clone(), event.clone())
            .await?;
        // no subscribers is fine
        let _ = self.events.send(event);
        Ok(request)
    }
}

fn deadline(now: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    now.checked_add_signed(window).ok_or_else(|| {
        ApprovalError::InvalidInput(format!(
            "expiry window of {} hours is out of range",
            window.num_hours()
        ))
    })
}

fn validate_new_request(fields: &NewApprovalRequest) -> Result<()> {
    if fields.tenant_id.trim().is_empty() {
        return Err(ApprovalError::InvalidInput("tenantId is required".into()));
    }
    if fields.title.trim().is_empty() {
        return Err(ApprovalError::InvalidInput("title is required".into()));
    }
    if fields.requested_by.user_id.trim().is_empty() {
        return Err(ApprovalError::InvalidInput(
            "requestedBy.userId is required".into(),
        ));
    }
    Ok(())
}
