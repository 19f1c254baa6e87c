//! Append-only status history.
//!
//! The log exposes append and read. There is no update or delete path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClaimsResult;
use crate::models::{BatchStatus, ClaimStatus};

/// One batch status change. `previous_status` is `None` for creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimBatchStatusHistory {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub previous_status: Option<BatchStatus>,
    pub new_status: BatchStatus,
    pub actor: String,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ClaimBatchStatusHistory {
    pub fn new(
        batch_id: Uuid,
        previous_status: Option<BatchStatus>,
        new_status: BatchStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            batch_id,
            previous_status,
            new_status,
            actor: actor.to_string(),
            notes,
            recorded_at: Utc::now(),
        }
    }
}

/// One claim status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimStatusHistory {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub previous_status: Option<ClaimStatus>,
    pub new_status: ClaimStatus,
    pub actor: String,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ClaimStatusHistory {
    pub fn new(
        claim_id: Uuid,
        previous_status: Option<ClaimStatus>,
        new_status: ClaimStatus,
        actor: &str,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            claim_id,
            previous_status,
            new_status,
            actor: actor.to_string(),
            notes,
            recorded_at: Utc::now(),
        }
    }
}

/// Audit trail of claim and batch transitions.
///
/// A transition is only committed after its row has been appended; an
/// append error aborts the transition.
#[async_trait]
pub trait StatusHistoryLog: Send + Sync {
    async fn append_batch(&self, entry: ClaimBatchStatusHistory) -> ClaimsResult<()>;

    /// Rows for one batch, oldest first
    async fn batch_history(&self, batch_id: Uuid) -> ClaimsResult<Vec<ClaimBatchStatusHistory>>;

    async fn append_claim(&self, entry: ClaimStatusHistory) -> ClaimsResult<()>;

    /// Append a batch row together with the claim rows it caused. Either
    /// every row is stored or none is.
    async fn append_transition(
        &self,
        batch: Option<ClaimBatchStatusHistory>,
        claims: Vec<ClaimStatusHistory>,
    ) -> ClaimsResult<()>;

    /// Rows for one claim, oldest first
    async fn claim_history(&self, claim_id: Uuid) -> ClaimsResult<Vec<ClaimStatusHistory>>;
}

/// In-memory history log for testing and development
pub struct InMemoryStatusHistoryLog {
    batches: RwLock<Vec<ClaimBatchStatusHistory>>,
    claims: RwLock<Vec<ClaimStatusHistory>>,
}

impl InMemoryStatusHistoryLog {
    pub fn new() -> Self {
        Self {
            batches: RwLock::new(Vec::new()),
            claims: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.batches.read().len() + self.claims.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStatusHistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusHistoryLog for InMemoryStatusHistoryLog {
    async fn append_batch(&self, entry: ClaimBatchStatusHistory) -> ClaimsResult<()> {
        self.batches.write().push(entry);
        Ok(())
    }

    async fn batch_history(&self, batch_id: Uuid) -> ClaimsResult<Vec<ClaimBatchStatusHistory>> {
        Ok(self.batches
            .read()
            .iter()
            .filter(|entry| entry.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn append_claim(&self, entry: ClaimStatusHistory) -> ClaimsResult<()> {
        self.claims.write().push(entry);
        Ok(())
    }

    async fn append_transition(
        &self,
        batch: Option<ClaimBatchStatusHistory>,
        claims: Vec<ClaimStatusHistory>,
    ) -> ClaimsResult<()> {
        // both logs stay locked so readers never see half a transition
        let mut batches = self.batches.write();
        let mut claim_rows = self.claims.write();
        batches.extend(batch);
        claim_rows.extend(claims);
        Ok(())
    }

    async fn claim_history(&self, claim_id: Uuid) -> ClaimsResult<Vec<ClaimStatusHistory>> {
        Ok(self.claims
            .read()
            .iter()
            .filter(|entry| entry.claim_id == claim_id)
            .cloned()
            .collect())
    }
}
