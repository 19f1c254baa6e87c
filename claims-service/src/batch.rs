//! Batch lifecycle: `draft → finalized → submitted → processing → completed`.
//!
//! Member claims are adjudicated individually through `ClaimBatchItem`; the
//! batch status itself never goes backwards.

use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{ClaimsError, ClaimsResult, ValidationError};
use crate::models::{BatchItemStatus, BatchStatus, ClaimBatch};

impl BatchStatus {
    /// The only status this one may move to
    pub fn next(self) -> Option<BatchStatus> {
        match self {
            BatchStatus::Draft => Some(BatchStatus::Finalized),
            BatchStatus::Finalized => Some(BatchStatus::Submitted),
            BatchStatus::Submitted => Some(BatchStatus::Processing),
            BatchStatus::Processing => Some(BatchStatus::Completed),
            BatchStatus::Completed => None,
        }
    }

    pub fn can_transition_to(self, to: BatchStatus) -> bool {
        self.next() == Some(to)
    }
}

/// Move a batch to `to`, stamping the matching timestamp. Returns the
/// previous status; the batch is untouched on failure.
pub fn transition(batch: &mut ClaimBatch, to: BatchStatus) -> ClaimsResult<BatchStatus> {
    let from = batch.status;
    if !from.can_transition_to(to) {
        return Err(ClaimsError::InvalidBatchTransition { batch_id: batch.id, from, to });
    }
    match to {
        BatchStatus::Finalized if batch.items.is_empty() => return Err(ValidationError::EmptyBatch.into()),
        BatchStatus::Completed => {
            let pending = batch.items.iter().filter(|item| item.status == BatchItemStatus::Pending).count();
            if pending > 0 {
                return Err(ValidationError::PendingAdjudication(pending).into());
            }
        }
        _ => {}
    }

    let now = Utc::now();
    match to {
        BatchStatus::Finalized => batch.finalized_at = Some(now),
        BatchStatus::Submitted => batch.submitted_at = Some(now),
        BatchStatus::Completed => batch.completed_at = Some(now),
        BatchStatus::Draft | BatchStatus::Processing => {}
    }
    batch.status = to;
    Ok(from)
}

/// Composition may only change while the batch is a draft
pub fn ensure_composable(batch: &ClaimBatch) -> ClaimsResult<()> {
    if batch.status != BatchStatus::Draft {
        return Err(ClaimsError::ImmutableBatch { batch_id: batch.id, status: batch.status });
    }
    Ok(())
}

pub fn ensure_status(batch: &ClaimBatch, expected: BatchStatus) -> Result<(), ValidationError> {
    if batch.status != expected {
        return Err(ValidationError::WrongBatchStatus { expected, actual: batch.status });
    }
    Ok(())
}

/// Derive batch rollups from the member snapshots
pub fn recompute(batch: &mut ClaimBatch) {
    batch.total_claims = batch.items.len();
    batch.total_amount = batch.items.iter().map(|item| item.claim_amount).sum();
    batch.approved_amount = batch
        .items
        .iter()
        .filter(|item| matches!(item.status, BatchItemStatus::Approved | BatchItemStatus::Paid))
        .map(|item| item.approved_amount)
        .sum();
    batch.paid_amount = batch
        .items
        .iter()
        .filter(|item| item.status == BatchItemStatus::Paid)
        .map(|item| item.paid_amount)
        .sum::<Decimal>();
}

/// Every member the scheme did not reject has been paid
pub fn is_fully_reconciled(batch: &ClaimBatch) -> bool {
    let mut payable = batch
        .items
        .iter()
        .filter(|item| item.status != BatchItemStatus::Rejected)
        .peekable();
    payable.peek().is_some() && payable.all(|item| item.status == BatchItemStatus::Paid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClaimBatchItem;
    use std::str::FromStr;
    use uuid::Uuid;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn batch() -> ClaimBatch {
        ClaimBatch {
            id: Uuid::new_v4(),
            batch_number: "BATCH-202610-0001".to_string(),
            provider_id: Uuid::new_v4(),
            status: BatchStatus::Draft,
            items: Vec::new(),
            total_claims: 0,
            total_amount: Decimal::ZERO,
            approved_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            notes: None,
            created_at: Utc::now(),
            finalized_at: None,
            submitted_at: None,
            exported_at: None,
            paid_at: None,
            completed_at: None,
        }
    }

    fn member(amount: &str, status: BatchItemStatus) -> ClaimBatchItem {
        ClaimBatchItem {
            claim_id: Uuid::new_v4(),
            claim_number: "CLM-202610-00001".to_string(),
            claim_amount: d(amount),
            approved_amount: if status == BatchItemStatus::Pending { Decimal::ZERO } else { d(amount) },
            paid_amount: if status == BatchItemStatus::Paid { d(amount) } else { Decimal::ZERO },
            status,
            rejection_reason: None,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_never_skips_or_reverses() {
        assert!(BatchStatus::Draft.can_transition_to(BatchStatus::Finalized));
        assert!(!BatchStatus::Draft.can_transition_to(BatchStatus::Submitted));
        assert!(!BatchStatus::Submitted.can_transition_to(BatchStatus::Finalized));
        assert_eq!(BatchStatus::Completed.next(), None);
    }

    #[test]
    fn test_empty_batch_cannot_be_finalized() {
        let mut empty = batch();
        assert!(matches!(
            transition(&mut empty, BatchStatus::Finalized),
            Err(ClaimsError::Validation(ValidationError::EmptyBatch))
        ));
        assert_eq!(empty.status, BatchStatus::Draft);
        assert!(empty.finalized_at.is_none());
    }

    #[test]
    fn test_rollups_follow_member_status() {
        let mut batch = batch();
        batch.items = vec![
            member("120.00", BatchItemStatus::Paid),
            member("340.50", BatchItemStatus::Approved),
            member("99.99", BatchItemStatus::Rejected),
        ];
        recompute(&mut batch);
        assert_eq!(batch.total_claims, 3);
        assert_eq!(batch.total_amount, d("560.49"));
        assert_eq!(batch.approved_amount, d("460.50"));
        assert_eq!(batch.paid_amount, d("120.00"));
        assert!(!is_fully_reconciled(&batch));

        batch.items[1].status = BatchItemStatus::Paid;
        assert!(is_fully_reconciled(&batch));
    }

    #[test]
    fn test_completion_waits_for_adjudication() {
        let mut batch = batch();
        batch.status = BatchStatus::Processing;
        batch.items = vec![member("10.00", BatchItemStatus::Pending), member("5.00", BatchItemStatus::Approved)];
        assert!(matches!(
            transition(&mut batch, BatchStatus::Completed),
            Err(ClaimsError::Validation(ValidationError::PendingAdjudication(1)))
        ));
    }
}
