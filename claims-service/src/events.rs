use events_bus::{Event, EventBus};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::models::{BatchStatus, Claim, ClaimBatch, ClaimStatus};

pub const CLAIM_STATUS_CHANGED: &str = "claim.status_changed";
pub const BATCH_STATUS_CHANGED: &str = "batch.status_changed";

/// Publishes one event per committed status transition
#[derive(Clone)]
pub struct TransitionPublisher {
    bus: Arc<EventBus>,
}

impl TransitionPublisher {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn claim_status_changed(&self, claim: &Claim, previous: Option<ClaimStatus>, actor: &str) {
        let event = Event::new(
            CLAIM_STATUS_CHANGED,
            claim.id,
            json!({
                "claim_number": claim.claim_number,
                "from": previous,
                "to": claim.status,
                "actor": actor,
                "total_claim_amount": claim.totals.grand_total,
                "batch_id": claim.batch_id,
            }),
        );
        let delivered = self.bus.publish(event);
        debug!(claim_id = %claim.id, status = %claim.status, delivered, "Published claim transition");
    }

    pub fn batch_status_changed(&self, batch: &ClaimBatch, previous: Option<BatchStatus>, actor: &str) {
        let event = Event::new(
            BATCH_STATUS_CHANGED,
            batch.id,
            json!({
                "batch_number": batch.batch_number,
                "from": previous,
                "to": batch.status,
                "actor": actor,
                "total_claims": batch.total_claims,
                "total_amount": batch.total_amount,
            }),
        );
        let delivered = self.bus.publish(event);
        debug!(batch_id = %batch.id, status = %batch.status, delivered, "Published batch transition");
    }
}
