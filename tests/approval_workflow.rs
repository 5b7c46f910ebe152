//! Integration tests for the approval life cycle.
//!
//! Tests cover:
//! - State machine: pending → approved/rejected/cancelled/expired, and nothing after
//! - Cancel authorization (requester only)
//! - Lazy expiry through the review queue
//! - Queue priority and ordering
//! - Audit trail: one event per transition, append order, tamper-evident chain
//!
//! Every test runs on a `MockClock`, so expiry and priority are deterministic.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use governance::clock::MockClock;
use governance::models::approval::{
    ApprovalStatus, NewApprovalRequest, Priority, RequestType, ReviewDecision, UserIdentity,
};
use governance::models::audit::ApprovalEventType;
use governance::{ApprovalError, ApprovalManager, MemoryStore};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()
}

fn setup() -> (ApprovalManager, MockClock) {
    let clock = MockClock::new(t0());
    let manager = ApprovalManager::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
    (manager, clock)
}

fn requester() -> UserIdentity {
    UserIdentity::new("u-mkt", "Mia", "mia@example.com", "marketer")
}

fn reviewer() -> ReviewDecision {
    ReviewDecision::by(UserIdentity::new("u-legal", "Leo", "leo@example.com", "legal"))
}

fn activation(tenant: &str, title: &str) -> NewApprovalRequest {
    NewApprovalRequest::new(RequestType::Activation, tenant, title, requester())
        .with_description("push segment to ad platform")
}

// ═══════════════════════════════════════════════════════════════════════════
// Creation
// ═══════════════════════════════════════════════════════════════════════════

mod creation_tests {
    use super::*;

    #[tokio::test]
    async fn test_default_expiry_is_exactly_24h() {
        let (manager, _) = setup();
        let req = assert_ok!(manager.create_request(activation("acme", "Q3 launch")).await);
        assert_eq!(req.expires_at, req.created_at + Duration::hours(24));
        assert_eq!(req.created_at, t0());
        assert_eq!(req.status, ApprovalStatus::Pending);
    }

    #[tokio::test]
    async fn test_explicit_expiry_is_kept() {
        let (manager, _) = setup();
        let deadline = t0() + Duration::hours(3);
        let req = assert_ok!(
            manager
                .create_request(activation("acme", "Flash sale").with_expires_at(deadline))
                .await
        );
        assert_eq!(req.expires_at, deadline);
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_audited() {
        let (manager, _) = setup();
        let a = manager.create_request(activation("acme", "a")).await.unwrap();
        let b = manager.create_request(activation("acme", "b")).await.unwrap();
        assert_ne!(a.id, b.id);

        let log = manager.get_audit_log(a.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].event_type, ApprovalEventType::Created);
        assert_eq!(log[0].user_id.as_deref(), Some("u-mkt"));
        assert_eq!(log[0].timestamp, t0());
    }

    #[tokio::test]
    async fn test_missing_title_is_invalid_input() {
        let (manager, _) = setup();
        let err = manager.create_request(activation("acme", " ")).await.unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Decisions
// ═══════════════════════════════════════════════════════════════════════════

mod decision_tests {
    use super::*;

    #[tokio::test]
    async fn test_approve_records_reviewer_and_decision() {
        let (manager, clock) = setup();
        let req = manager.create_request(activation("acme", "a")).await.unwrap();
        clock.advance(Duration::minutes(30));

        let approved = assert_ok!(
            manager
                .approve(
                    req.id,
                    reviewer().with_reason("consent verified").with_comments("ship it"),
                )
                .await
        );
        assert_eq!(approved.status, ApprovalStatus::Approved);
        assert_eq!(approved.reviewed_by.as_ref().unwrap().user_id, "u-legal");
        assert_eq!(approved.reviewed_at, Some(t0() + Duration::minutes(30)));
        let decision = approved.decision.unwrap();
        assert!(decision.approved);
        assert_eq!(decision.reason.as_deref(), Some("consent verified"));
        assert_eq!(decision.comments.as_deref(), Some("ship it"));
    }

    #[tokio::test]
    async fn test_reject_sets_approved_false() {
        let (manager, _) = setup();
        let req = manager.create_request(activation("acme", "a")).await.unwrap();
        let rejected = assert_ok!(manager.reject(req.id, reviewer().with_reason("PII")).await);
        assert_eq!(rejected.status, ApprovalStatus::Rejected);
        assert!(!rejected.decision.unwrap().approved);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (manager, _) = setup();
        let id = Uuid::new_v4();
        let err = manager.approve(id, reviewer()).await.unwrap_err();
        assert!(matches!(err, ApprovalError::NotFound { id: missing } if missing == id));
        let err = manager.cancel(id, "u-mkt").await.unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert!(manager.get_request(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminal_states_refuse_every_transition() {
        let (manager, clock) = setup();

        let approved = manager.create_request(activation("acme", "a")).await.unwrap();
        manager.approve(approved.id, reviewer()).await.unwrap();

        let rejected = manager.create_request(activation("acme", "r")).await.unwrap();
        manager.reject(rejected.id, reviewer()).await.unwrap();

        let cancelled = manager.create_request(activation("acme", "c")).await.unwrap();
        manager.cancel(cancelled.id, "u-mkt").await.unwrap();

        let expired = manager
            .create_request(activation("acme", "e").with_expires_at(t0() + Duration::hours(1)))
            .await
            .unwrap();
        clock.advance(Duration::hours(2));
        manager.get_queue("acme").await.unwrap();

        for (id, status) in [
            (approved.id, ApprovalStatus::Approved),
            (rejected.id, ApprovalStatus::Rejected),
            (cancelled.id, ApprovalStatus::Cancelled),
            (expired.id, ApprovalStatus::Expired),
        ] {
            let before = manager.get_request(id).await.unwrap().unwrap();
            let events_before = manager.get_audit_log(id).await.unwrap().len();

            let e1 = manager.approve(id, reviewer()).await.unwrap_err();
            let e2 = manager.reject(id, reviewer()).await.unwrap_err();
            let e3 = manager.cancel(id, "u-mkt").await.unwrap_err();
            for err in [e1, e2, e3] {
                assert_eq!(err.current_status(), Some(status), "{}", err);
            }

            // no partial mutation, no extra audit events
            let after = manager.get_request(id).await.unwrap().unwrap();
            assert_eq!(before, after);
            assert_eq!(manager.get_audit_log(id).await.unwrap().len(), events_before);
        }
    }

    #[tokio::test]
    async fn test_decision_fields_only_on_approved_or_rejected() {
        let (manager, clock) = setup();
        let cancelled = manager.create_request(activation("acme", "c")).await.unwrap();
        let cancelled = manager.cancel(cancelled.id, "u-mkt").await.unwrap();
        assert!(cancelled.decision.is_none());
        assert!(cancelled.reviewed_by.is_none());
        assert!(cancelled.reviewed_at.is_none());

        let expired = manager.create_request(activation("acme", "e")).await.unwrap();
        clock.advance(Duration::hours(25));
        assert_err!(manager.reject(expired.id, reviewer()).await);
        let expired = manager.get_request(expired.id).await.unwrap().unwrap();
        assert_eq!(expired.status, ApprovalStatus::Expired);
        assert!(expired.decision.is_none());
        assert!(expired.reviewed_by.is_none());
        assert!(expired.reviewed_at.is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Cancellation
// ═══════════════════════════════════════════════════════════════════════════

mod cancel_tests {
    use super::*;

    #[tokio::test]
    async fn test_only_requester_may_cancel() {
        let (manager, _) = setup();
        let req = manager.create_request(activation("acme", "a")).await.unwrap();

        let err = manager.cancel(req.id, "u-legal").await.unwrap_err();
        assert!(matches!(err, ApprovalError::Forbidden { .. }));

        let stored = manager.get_request(req.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Pending);
        assert_eq!(manager.get_audit_log(req.id).await.unwrap().len(), 1);

        let cancelled = assert_ok!(manager.cancel(req.id, "u-mkt").await);
        assert_eq!(cancelled.status, ApprovalStatus::Cancelled);

        let log = manager.get_audit_log(req.id).await.unwrap();
        assert_eq!(log.last().unwrap().event_type, ApprovalEventType::Cancelled);
        assert_eq!(log.last().unwrap().user_id.as_deref(), Some("u-mkt"));
    }

    #[tokio::test]
    async fn test_non_requester_on_finished_request_sees_state_not_forbidden() {
        let (manager, clock) = setup();
        let approved = manager.create_request(activation("acme", "a")).await.unwrap();
        manager.approve(approved.id, reviewer()).await.unwrap();
        let overdue = manager.create_request(activation("acme", "b")).await.unwrap();
        clock.advance(Duration::hours(30));

        let err = manager.cancel(approved.id, "u-legal").await.unwrap_err();
        assert!(
            matches!(err, ApprovalError::InvalidStateTransition { current: ApprovalStatus::Approved, .. }),
            "{:?}",
            err
        );

        // expiry is applied before the requester check
        let err = manager.cancel(overdue.id, "u-legal").await.unwrap_err();
        assert_eq!(err.current_status(), Some(ApprovalStatus::Expired));
        let stored = manager.get_request(overdue.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Expired);
    }

    #[tokio::test]
    async fn test_cancel_of_overdue_request_reports_expired() {
        let (manager, clock) = setup();
        let req = manager.create_request(activation("acme", "a")).await.unwrap();
        clock.advance(Duration::hours(24) + Duration::seconds(1));

        let err = manager.cancel(req.id, "u-mkt").await.unwrap_err();
        assert_eq!(err.current_status(), Some(ApprovalStatus::Expired));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Queue
// ═══════════════════════════════════════════════════════════════════════════

mod queue_tests {
    use super::*;

    #[tokio::test]
    async fn test_priority_order_high_medium_low() {
        let (manager, clock) = setup();
        // waits of 5h, 13h and 1h at read time, inserted out of order
        let mid = manager
            .create_request(activation("acme", "5h").with_expires_at(t0() + Duration::days(2)))
            .await
            .unwrap();
        clock.set(t0() - Duration::hours(8));
        let old = manager
            .create_request(activation("acme", "13h").with_expires_at(t0() + Duration::days(2)))
            .await
            .unwrap();
        clock.set(t0() + Duration::hours(4));
        let new = manager.create_request(activation("acme", "1h")).await.unwrap();
        clock.set(t0() + Duration::hours(5));

        let queue = manager.get_queue("acme").await.unwrap();
        let order: Vec<_> = queue.iter().map(|i| (i.request.id, i.priority)).collect();
        assert_eq!(
            order,
            vec![
                (old.id, Priority::High),
                (mid.id, Priority::Medium),
                (new.id, Priority::Low),
            ]
        );
        assert_eq!(queue[0].waiting_time_ms, Duration::hours(13).num_milliseconds());
        assert_eq!(queue[2].waiting_time_ms, Duration::hours(1).num_milliseconds());
    }

    #[tokio::test]
    async fn test_equal_priority_older_first() {
        let (manager, clock) = setup();
        let younger = {
            clock.set(t0() + Duration::minutes(10));
            manager.create_request(activation("acme", "younger")).await.unwrap()
        };
        let older = {
            clock.set(t0());
            manager.create_request(activation("acme", "older")).await.unwrap()
        };
        clock.set(t0() + Duration::hours(6) + Duration::minutes(10));

        let queue = manager.get_queue("acme").await.unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|i| i.priority == Priority::Medium));
        assert_eq!(queue[0].request.id, older.id);
        assert_eq!(queue[1].request.id, younger.id);
    }

    #[tokio::test]
    async fn test_queue_expires_overdue_exactly_once() {
        let (manager, clock) = setup();
        let stale = manager
            .create_request(activation("acme", "stale").with_expires_at(t0() - Duration::hours(1)))
            .await
            .unwrap();
        let fresh = manager.create_request(activation("acme", "fresh")).await.unwrap();
        clock.advance(Duration::minutes(5));

        let queue = manager.get_queue("acme").await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].request.id, fresh.id);

        // reading again must not add a second expired event
        manager.get_queue("acme").await.unwrap();

        let stored = manager.get_request(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Expired);
        let expired_events = manager
            .get_audit_log(stale.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == ApprovalEventType::Expired)
            .count();
        assert_eq!(expired_events, 1);
    }

    #[tokio::test]
    async fn test_queue_is_tenant_scoped_and_pending_only() {
        let (manager, _) = setup();
        let mine = manager.create_request(activation("acme", "mine")).await.unwrap();
        let decided = manager.create_request(activation("acme", "decided")).await.unwrap();
        manager.approve(decided.id, reviewer()).await.unwrap();
        manager.create_request(activation("globex", "theirs")).await.unwrap();

        let queue = manager.get_queue("acme").await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].request.id, mine.id);
        assert!(manager.get_queue("initech").await.unwrap().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Audit Trail
// ═══════════════════════════════════════════════════════════════════════════

mod audit_tests {
    use super::*;

    #[tokio::test]
    async fn test_one_event_per_transition_in_order() {
        let (manager, clock) = setup();
        let req = manager.create_request(activation("acme", "a")).await.unwrap();
        clock.advance(Duration::minutes(1));
        manager.cancel(req.id, "u-legal").await.unwrap_err();
        manager.approve(req.id, reviewer()).await.unwrap();
        clock.advance(Duration::minutes(1));
        manager.reject(req.id, reviewer()).await.unwrap_err();

        let log = manager.get_audit_log(req.id).await.unwrap();
        let types: Vec<_> = log.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![ApprovalEventType::Created, ApprovalEventType::Approved]);
        assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(log[1].details.as_ref().unwrap()["reason"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_history_is_stable_across_later_transitions() {
        let (manager, _) = setup();
        let a = manager.create_request(activation("acme", "a")).await.unwrap();
        let snapshot = manager.get_audit_log(a.id).await.unwrap();

        let b = manager.create_request(activation("acme", "b")).await.unwrap();
        manager.reject(b.id, reviewer()).await.unwrap();
        manager.approve(a.id, reviewer()).await.unwrap();

        let later = manager.get_audit_log(a.id).await.unwrap();
        assert_eq!(&later[..snapshot.len()], &snapshot[..]);
        assert_ok!(manager.verify_audit_chain().await);
    }
}
