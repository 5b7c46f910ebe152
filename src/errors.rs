use thiserror::Error;
use uuid::Uuid;

use crate::audit::AuditChainError;
use crate::models::approval::ApprovalStatus;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval request {id} not found")]
    NotFound { id: Uuid },

    #[error("approval request {id} is already {current}")]
    InvalidStateTransition { id: Uuid, current: ApprovalStatus },

    #[error("user '{user_id}' may not cancel approval request {id}")]
    Forbidden { id: Uuid, user_id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("audit chain verification failed: {0}")]
    AuditChain(#[from] AuditChainError),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ApprovalError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            ApprovalError::NotFound { .. } => "not_found",
            ApprovalError::InvalidStateTransition { .. } => "invalid_state_transition",
            ApprovalError::Forbidden { .. } => "forbidden",
            ApprovalError::InvalidInput(_) => "invalid_input",
            ApprovalError::AuditChain(_) => "audit_chain_broken",
            ApprovalError::Store(_) => "store_error",
        }
    }

    /// Status the request was found in, for `InvalidStateTransition`.
    pub fn current_status(&self) -> Option<ApprovalStatus> {
        match self {
            ApprovalError::InvalidStateTransition { current, .. } => Some(*current),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApprovalError>;
