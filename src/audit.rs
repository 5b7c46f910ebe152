//! Append-only audit trail for approval requests.
//!
//! Records are chained: each carries the SHA-256 of its predecessor, so any
//! after-the-fact edit is detectable with [`AuditLog::verify_chain`]. The type
//! exposes no way to edit or remove a record once appended.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::models::audit::{ApprovalEvent, AuditRecord};

pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum AuditChainError {
    #[error("audit record {sequence} does not link to its predecessor")]
    BrokenLink { sequence: u64 },

    #[error("audit record {sequence} content does not match its hash")]
    HashMismatch { sequence: u64 },

    #[error("audit event serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// `sha256(previous_hash || sequence || event_json)`.
pub fn compute_record_hash(
    previous_hash: &str,
    sequence: u64,
    event: &ApprovalEvent,
) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(event)?;
    let mut input = Vec::with_capacity(previous_hash.len() + 20 + payload.len());
    input.extend_from_slice(previous_hash.as_bytes());
    input.extend_from_slice(sequence.to_string().as_bytes());
    input.extend_from_slice(payload.as_bytes());
    Ok(sha256_hex(&input))
}

#[derive(Debug, Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
    by_request: HashMap<Uuid, Vec<usize>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: ApprovalEvent) -> Result<&AuditRecord, AuditChainError> {
        let sequence = self.records.len() as u64;
        let previous_hash = self
            .records
            .last()
            .map(|r| r.hash.clone())
            .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string());
        let hash = compute_record_hash(&previous_hash, sequence, &event)?;

        let idx = self.records.len();
        self.by_request.entry(event.request_id).or_default().push(idx);
        self.records.push(AuditRecord {
            sequence,
            previous_hash,
            hash,
            event,
        });
        Ok(&self.records[idx])
    }

    /// Events for one request, in append order.
    pub fn events_for(&self, request_id: Uuid) -> Vec<ApprovalEvent> {
        self.by_request
            .get(&request_id)
            .map(|idxs| idxs.iter().map(|&i| self.records[i].event.clone()).collect())
            .unwrap_or_default()
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn head_hash(&self) -> &str {
        self.records
            .last()
            .map(|r| r.hash.as_str())
            .unwrap_or(GENESIS_PREVIOUS_HASH)
    }

    /// Recompute every link. Reports the first record that fails.
    pub fn verify_chain(&self) -> Result<(), AuditChainError> {
        verify_records(&self.records)
    }
}

/// Chain check over any ordered slice of records, e.g. one exported from a
/// persistent backend.
pub fn verify_records(records: &[AuditRecord]) -> Result<(), AuditChainError> {
    let mut expected_prev = GENESIS_PREVIOUS_HASH;
    for record in records {
        if record.previous_hash != expected_prev {
            return Err(AuditChainError::BrokenLink {
                sequence: record.sequence,
            });
        }
        let expected = compute_record_hash(&record.previous_hash, record.sequence, &record.event)?;
        if record.hash != expected {
            return Err(AuditChainError::HashMismatch {
                sequence: record.sequence,
            });
        }
        expected_prev = record.hash.as_str();
    }
    Ok(())
}
