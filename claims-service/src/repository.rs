use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ClaimsError, ClaimsResult};
use crate::models::{Claim, ClaimBatch, ClaimStatus, SourceRef};

/// Repository interface for claims and the source records they hold
#[async_trait]
pub trait ClaimRepository: Send + Sync {
    /// Store a new claim
    async fn insert(&self, claim: Claim) -> ClaimsResult<()>;

    /// Overwrite an existing claim
    async fn save(&self, claim: &Claim) -> ClaimsResult<()>;

    async fn get(&self, claim_id: Uuid) -> ClaimsResult<Claim>;

    async fn list_by_status(&self, status: ClaimStatus) -> ClaimsResult<Vec<Claim>>;

    /// Atomically attach a source record to a claim. Fails with
    /// `ItemAlreadyClaimed` when another claim holds it; re-reserving for
    /// the same claim is a no-op.
    async fn reserve_source(&self, source: SourceRef, claim_id: Uuid) -> ClaimsResult<()>;

    /// Release a source record held by `claim_id`
    async fn release_source(&self, source: SourceRef, claim_id: Uuid) -> ClaimsResult<()>;

    async fn source_holder(&self, source: SourceRef) -> ClaimsResult<Option<Uuid>>;
}

/// Repository interface for batches and claim membership
#[async_trait]
pub trait BatchRepository: Send + Sync {
    async fn insert(&self, batch: ClaimBatch) -> ClaimsResult<()>;

    async fn save(&self, batch: &ClaimBatch) -> ClaimsResult<()>;

    async fn get(&self, batch_id: Uuid) -> ClaimsResult<ClaimBatch>;

    async fn list(&self) -> ClaimsResult<Vec<ClaimBatch>>;

    /// Atomically record that `claim_id` belongs to `batch_id`. Fails with
    /// `AlreadyBatched` when the claim is in another active batch.
    async fn bind_claim(&self, claim_id: Uuid, batch_id: Uuid) -> ClaimsResult<()>;

    async fn unbind_claim(&self, claim_id: Uuid, batch_id: Uuid) -> ClaimsResult<()>;

    async fn batch_of(&self, claim_id: Uuid) -> ClaimsResult<Option<Uuid>>;
}

/// In-memory claim repository for testing and development
pub struct InMemoryClaimRepository {
    claims: Arc<DashMap<Uuid, Claim>>,
    sources: Arc<DashMap<SourceRef, Uuid>>,
}

impl InMemoryClaimRepository {
    pub fn new() -> Self {
        Self {
            claims: Arc::new(DashMap::new()),
            sources: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryClaimRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimRepository for InMemoryClaimRepository {
    async fn insert(&self, claim: Claim) -> ClaimsResult<()> {
        match self.claims.entry(claim.id) {
            Entry::Occupied(_) => Err(ClaimsError::Storage(format!("claim {} already exists", claim.id))),
            Entry::Vacant(slot) => {
                slot.insert(claim);
                Ok(())
            }
        }
    }

    async fn save(&self, claim: &Claim) -> ClaimsResult<()> {
        let mut stored = self.claims.get_mut(&claim.id).ok_or(ClaimsError::ClaimNotFound(claim.id))?;
        *stored = claim.clone();
        Ok(())
    }

    async fn get(&self, claim_id: Uuid) -> ClaimsResult<Claim> {
        self.claims
            .get(&claim_id)
            .map(|claim| claim.value().clone())
            .ok_or(ClaimsError::ClaimNotFound(claim_id))
    }

    async fn list_by_status(&self, status: ClaimStatus) -> ClaimsResult<Vec<Claim>> {
        let mut claims: Vec<Claim> = self.claims
            .iter()
            .filter(|claim| claim.status == status)
            .map(|claim| claim.value().clone())
            .collect();
        claims.sort_by(|a, b| a.claim_number.cmp(&b.claim_number));
        Ok(claims)
    }

    async fn reserve_source(&self, source: SourceRef, claim_id: Uuid) -> ClaimsResult<()> {
        match self.sources.entry(source) {
            Entry::Occupied(held) if *held.get() != claim_id => Err(ClaimsError::ItemAlreadyClaimed {
                record: source,
                claim_id: *held.get(),
            }),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(claim_id);
                Ok(())
            }
        }
    }

    async fn release_source(&self, source: SourceRef, claim_id: Uuid) -> ClaimsResult<()> {
        self.sources.remove_if(&source, |_, holder| *holder == claim_id);
        Ok(())
    }

    async fn source_holder(&self, source: SourceRef) -> ClaimsResult<Option<Uuid>> {
        Ok(self.sources.get(&source).map(|holder| *holder.value()))
    }
}

/// In-memory batch repository for testing and development
pub struct InMemoryBatchRepository {
    batches: Arc<DashMap<Uuid, ClaimBatch>>,
    membership: Arc<DashMap<Uuid, Uuid>>,
}

impl InMemoryBatchRepository {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(DashMap::new()),
            membership: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryBatchRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn insert(&self, batch: ClaimBatch) -> ClaimsResult<()> {
        match self.batches.entry(batch.id) {
            Entry::Occupied(_) => Err(ClaimsError::Storage(format!("batch {} already exists", batch.id))),
            Entry::Vacant(slot) => {
                slot.insert(batch);
                Ok(())
            }
        }
    }

    async fn save(&self, batch: &ClaimBatch) -> ClaimsResult<()> {
        let mut stored = self.batches.get_mut(&batch.id).ok_or(ClaimsError::BatchNotFound(batch.id))?;
        *stored = batch.clone();
        Ok(())
    }

    async fn get(&self, batch_id: Uuid) -> ClaimsResult<ClaimBatch> {
        self.batches
            .get(&batch_id)
            .map(|batch| batch.value().clone())
            .ok_or(ClaimsError::BatchNotFound(batch_id))
    }

    async fn list(&self) -> ClaimsResult<Vec<ClaimBatch>> {
        let mut batches: Vec<ClaimBatch> = self.batches.iter().map(|batch| batch.value().clone()).collect();
        batches.sort_by(|a, b| a.batch_number.cmp(&b.batch_number));
        Ok(batches)
    }

    async fn bind_claim(&self, claim_id: Uuid, batch_id: Uuid) -> ClaimsResult<()> {
        match self.membership.entry(claim_id) {
            Entry::Occupied(bound) if *bound.get() != batch_id => Err(ClaimsError::AlreadyBatched {
                claim_id,
                batch_id: *bound.get(),
            }),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(batch_id);
                Ok(())
            }
        }
    }

    async fn unbind_claim(&self, claim_id: Uuid, batch_id: Uuid) -> ClaimsResult<()> {
        self.membership.remove_if(&claim_id, |_, bound| *bound == batch_id);
        Ok(())
    }

    async fn batch_of(&self, claim_id: Uuid) -> ClaimsResult<Option<Uuid>> {
        Ok(self.membership.get(&claim_id).map(|bound| *bound.value()))
    }
}
