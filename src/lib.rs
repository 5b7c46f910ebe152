//! Human-in-the-loop governance: decide whether an action needs sign-off,
//! track approval requests through their life cycle, and keep a
//! tamper-evident audit trail of every decision.
//!
//! [`engine`] answers "does this need approval?" from a tenant's rules;
//! [`manager::ApprovalManager`] owns the requests, the review queue and the
//! audit log.

pub mod audit;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod manager;
pub mod models;
pub mod rules;
pub mod store;

pub use clock::{Clock, MockClock, SystemClock};
pub use engine::{evaluate_rules, is_approval_required, RuleEvaluation};
pub use errors::ApprovalError;
pub use manager::ApprovalManager;
pub use store::{ApprovalStore, MemoryStore};
