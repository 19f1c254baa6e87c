use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use config_engine::BatchRejectionPolicy;
use logger_redacted::redacted_warn;
use insurance_service::money::round_money;

use crate::batch;
use crate::error::{ClaimsError, ClaimsResult, ValidationError};
use crate::history::{ClaimBatchStatusHistory, ClaimStatusHistory};
use crate::lifecycle::{self, ClaimAction};
use crate::models::*;
use crate::reporting::{package_batch, BatchSubmissionPackage};
use crate::service::ClaimsEngine;

/// A claim moved by a batch operation, with its stored state before the move
struct ClaimChange {
    claim: Claim,
    before: Claim,
    notes: Option<String>,
}

impl ClaimChange {
    fn previous(&self) -> ClaimStatus {
        self.before.status
    }

    fn history_row(&self, actor: &str) -> ClaimStatusHistory {
        ClaimStatusHistory::new(self.claim.id, Some(self.previous()), self.claim.status, actor, self.notes.clone())
    }
}

impl ClaimsEngine {
    /// Open an empty draft batch for claims billed to `provider_id`
    pub async fn create_batch(&self, provider_id: Uuid, actor: &str, notes: Option<String>) -> ClaimsResult<ClaimBatch> {
        let now = Utc::now();
        let batch = ClaimBatch {
            id: Uuid::new_v4(),
            batch_number: self.numbers.next(&self.settings.batch_number_prefix, now, 4),
            provider_id,
            status: BatchStatus::Draft,
            items: Vec::new(),
            total_claims: 0,
            total_amount: Decimal::ZERO,
            approved_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            notes: notes.clone(),
            created_at: now,
            finalized_at: None,
            submitted_at: None,
            exported_at: None,
            paid_at: None,
            completed_at: None,
        };

        self.history
            .append_batch(ClaimBatchStatusHistory::new(batch.id, None, BatchStatus::Draft, actor, notes))
            .await?;
        self.batches.insert(batch.clone()).await?;

        info!(batch_id = %batch.id, batch_number = %batch.batch_number, "Created claim batch");
        self.publisher.batch_status_changed(&batch, None, actor);
        Ok(batch)
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> ClaimsResult<ClaimBatch> {
        self.batches.get(batch_id).await
    }

    pub async fn list_batches(&self) -> ClaimsResult<Vec<ClaimBatch>> {
        self.batches.list().await
    }

    pub async fn batch_history(&self, batch_id: Uuid) -> ClaimsResult<Vec<ClaimBatchStatusHistory>> {
        self.history.batch_history(batch_id).await
    }

    /// Read model for packaging a batch for the scheme
    pub async fn submission_package(&self, batch_id: Uuid) -> ClaimsResult<BatchSubmissionPackage> {
        let batch = self.batches.get(batch_id).await?;
        let mut claims = Vec::with_capacity(batch.items.len());
        for member in &batch.items {
            claims.push(self.claims.get(member.claim_id).await?);
        }
        Ok(package_batch(&batch, &claims, &self.settings.currency))
    }

    /// Add a vetted claim to a draft batch, snapshotting its total
    pub async fn add_claim_to_batch(&self, batch_id: Uuid, claim_id: Uuid) -> ClaimsResult<ClaimBatch> {
        let _batch_guard = self.locks.lock(batch_id).await;
        let _claim_guard = self.locks.lock(claim_id).await;

        let mut batch = self.batches.get(batch_id).await?;
        batch::ensure_composable(&batch)?;
        let mut claim = self.claims.get(claim_id).await?;
        if let Some(current) = claim.batch_id {
            return Err(ClaimsError::AlreadyBatched { claim_id, batch_id: current });
        }
        if claim.status != ClaimStatus::Vetted {
            return Err(ValidationError::ClaimNotVetted(claim.status).into());
        }
        let plan = self.plan_for(&claim)?;
        if plan.provider.id != batch.provider_id {
            return Err(ValidationError::ProviderMismatch.into());
        }

        self.batches.bind_claim(claim_id, batch_id).await?;
        claim.batch_id = Some(batch_id);
        claim.touch();
        if let Err(err) = self.claims.save(&claim).await {
            self.batches.unbind_claim(claim_id, batch_id).await?;
            return Err(err);
        }

        batch.items.push(ClaimBatchItem {
            claim_id,
            claim_number: claim.claim_number.clone(),
            claim_amount: claim.total_claim_amount(),
            approved_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            status: BatchItemStatus::Pending,
            rejection_reason: None,
            added_at: Utc::now(),
        });
        batch::recompute(&mut batch);
        self.batches.save(&batch).await?;

        info!(
            batch_id = %batch_id,
            claim_id = %claim_id,
            claim_amount = %claim.total_claim_amount(),
            total_amount = %batch.total_amount,
            "Added claim to batch"
        );
        Ok(batch)
    }

    pub async fn remove_claim_from_batch(&self, batch_id: Uuid, claim_id: Uuid) -> ClaimsResult<ClaimBatch> {
        let _batch_guard = self.locks.lock(batch_id).await;
        let _claim_guard = self.locks.lock(claim_id).await;

        let mut batch = self.batches.get(batch_id).await?;
        batch::ensure_composable(&batch)?;
        let index = batch
            .items
            .iter()
            .position(|member| member.claim_id == claim_id)
            .ok_or(ClaimsError::ClaimNotInBatch { batch_id, claim_id })?;

        let mut claim = self.claims.get(claim_id).await?;
        claim.batch_id = None;
        claim.touch();
        self.claims.save(&claim).await?;
        self.batches.unbind_claim(claim_id, batch_id).await?;

        batch.items.remove(index);
        batch::recompute(&mut batch);
        self.batches.save(&batch).await?;
        info!(batch_id = %batch_id, claim_id = %claim_id, "Removed claim from batch");
        Ok(batch)
    }

    /// Freeze the batch composition
    pub async fn finalize_batch(&self, batch_id: Uuid, actor: &str, notes: Option<String>) -> ClaimsResult<ClaimBatch> {
        let _guard = self.locks.lock(batch_id).await;
        let mut batch = self.batches.get(batch_id).await?;
        let previous = batch::transition(&mut batch, BatchStatus::Finalized)?;
        self.commit_batch(&batch, previous, actor, notes, Vec::new()).await?;
        Ok(batch)
    }

    /// Hand the batch to the scheme; every member claim becomes `submitted`
    pub async fn submit_batch(&self, batch_id: Uuid, actor: &str, notes: Option<String>) -> ClaimsResult<ClaimBatch> {
        self.advance_with_members(batch_id, BatchStatus::Submitted, ClaimAction::SubmitToBatch, actor, notes)
            .await
    }

    /// The scheme has started adjudicating; member claims become `processing`
    pub async fn start_batch_processing(&self, batch_id: Uuid, actor: &str, notes: Option<String>) -> ClaimsResult<ClaimBatch> {
        self.advance_with_members(batch_id, BatchStatus::Processing, ClaimAction::BeginProcessing, actor, notes)
            .await
    }

    /// Close the batch once every member is adjudicated; approved claims
    /// become `completed`
    pub async fn complete_batch(&self, batch_id: Uuid, actor: &str, notes: Option<String>) -> ClaimsResult<ClaimBatch> {
        self.advance_with_members(batch_id, BatchStatus::Completed, ClaimAction::BatchCompleted, actor, notes)
            .await
    }

    /// Stamp the time the batch was exported for the scheme
    pub async fn mark_batch_exported(&self, batch_id: Uuid) -> ClaimsResult<ClaimBatch> {
        let _guard = self.locks.lock(batch_id).await;
        let mut batch = self.batches.get(batch_id).await?;
        if batch.status == BatchStatus::Draft {
            return Err(ValidationError::WrongBatchStatus {
                expected: BatchStatus::Finalized,
                actual: batch.status,
            }
            .into());
        }
        batch.exported_at = Some(Utc::now());
        self.batches.save(&batch).await?;
        info!(batch_id = %batch_id, "Marked batch exported");
        Ok(batch)
    }

    /// Record the scheme's decision on one member claim.
    ///
    /// A rejection moves the claim according to the configured
    /// [`BatchRejectionPolicy`].
    pub async fn record_adjudication(
        &self,
        batch_id: Uuid,
        claim_id: Uuid,
        adjudication: Adjudication,
        actor: &str,
    ) -> ClaimsResult<ClaimBatch> {
        let _batch_guard = self.locks.lock(batch_id).await;
        let _claim_guard = self.locks.lock(claim_id).await;

        let mut batch = self.batches.get(batch_id).await?;
        batch::ensure_status(&batch, BatchStatus::Processing)?;
        let member = batch.member_mut(claim_id).ok_or(ClaimsError::ClaimNotInBatch { batch_id, claim_id })?;
        if member.status != BatchItemStatus::Pending {
            return Err(ValidationError::AlreadyAdjudicated(claim_id).into());
        }

        let policy = self.settings.batch_rejection_policy;
        let change = match adjudication {
            Adjudication::Approved { amount } => {
                let amount = round_money(amount);
                if amount.is_sign_negative() {
                    return Err(ValidationError::NegativeAmount { field: "approved_amount", value: amount }.into());
                }
                if amount > member.claim_amount {
                    return Err(ValidationError::ApprovedExceedsClaimed {
                        approved: amount,
                        claimed: member.claim_amount,
                    }
                    .into());
                }
                member.status = BatchItemStatus::Approved;
                member.approved_amount = amount;
                None
            }
            Adjudication::Rejected { reason } => {
                let reason = lifecycle::require_reason(&reason)?;
                let before = self.claims.get(claim_id).await?;
                let mut claim = before.clone();
                lifecycle::transition(&mut claim, ClaimAction::BatchRejected, policy)?;
                match policy {
                    BatchRejectionPolicy::Terminal => claim.rejection_reason = Some(reason.clone()),
                    BatchRejectionPolicy::ReopenForCorrection => claim.batch_id = None,
                }
                member.status = BatchItemStatus::Rejected;
                member.rejection_reason = Some(reason.clone());
                Some(ClaimChange { claim, before, notes: Some(reason) })
            }
        };
        batch::recompute(&mut batch);

        let changes: Vec<ClaimChange> = change.into_iter().collect();
        if let Some(change) = changes.first() {
            self.history.append_transition(None, vec![change.history_row(actor)]).await?;
        }
        self.store(&batch, &changes).await?;

        if let Some(change) = changes.first() {
            match policy {
                BatchRejectionPolicy::Terminal => self.release_all(&change.claim).await,
                BatchRejectionPolicy::ReopenForCorrection => self.batches.unbind_claim(claim_id, batch_id).await?,
            }
            info!(batch_id = %batch_id, claim_id = %claim_id, to = %change.claim.status, "Scheme rejected batch claim");
            redacted_warn!(
                self.redactor,
                "Scheme rejected claim {} in batch {}: {}",
                change.claim.claim_number,
                batch.batch_number,
                change.notes.as_deref().unwrap_or_default()
            );
            self.publisher.claim_status_changed(&change.claim, Some(change.previous()), actor);
        } else {
            info!(batch_id = %batch_id, claim_id = %claim_id, "Scheme approved batch claim");
        }
        Ok(batch)
    }

    /// Record the scheme's payment for an approved member claim. The batch
    /// is stamped paid once every non-rejected member is paid.
    pub async fn record_payment(&self, batch_id: Uuid, claim_id: Uuid, amount: Decimal) -> ClaimsResult<ClaimBatch> {
        let _guard = self.locks.lock(batch_id).await;
        let mut batch = self.batches.get(batch_id).await?;
        if !matches!(batch.status, BatchStatus::Processing | BatchStatus::Completed) {
            return Err(ValidationError::WrongBatchStatus {
                expected: BatchStatus::Processing,
                actual: batch.status,
            }
            .into());
        }

        let amount = round_money(amount);
        let member = batch.member_mut(claim_id).ok_or(ClaimsError::ClaimNotInBatch { batch_id, claim_id })?;
        if member.status != BatchItemStatus::Approved {
            return Err(ValidationError::NotApprovedForPayment.into());
        }
        if amount.is_sign_negative() {
            return Err(ValidationError::NegativeAmount { field: "paid_amount", value: amount }.into());
        }
        if amount > member.approved_amount {
            return Err(ValidationError::PaymentExceedsApproved { paid: amount, approved: member.approved_amount }.into());
        }
        member.status = BatchItemStatus::Paid;
        member.paid_amount = amount;

        batch::recompute(&mut batch);
        if batch.paid_at.is_none() && batch::is_fully_reconciled(&batch) {
            batch.paid_at = Some(Utc::now());
        }
        self.batches.save(&batch).await?;
        info!(batch_id = %batch_id, claim_id = %claim_id, amount = %amount, paid_amount = %batch.paid_amount, "Recorded batch payment");
        Ok(batch)
    }

    /// Advance the batch and move the affected member claims with it
    async fn advance_with_members(
        &self,
        batch_id: Uuid,
        to: BatchStatus,
        action: ClaimAction,
        actor: &str,
        notes: Option<String>,
    ) -> ClaimsResult<ClaimBatch> {
        let _batch_guard = self.locks.lock(batch_id).await;
        let mut batch = self.batches.get(batch_id).await?;

        // members the scheme rejected have already left the normal path
        let affected: Vec<Uuid> = batch
            .items
            .iter()
            .filter(|member| member.status != BatchItemStatus::Rejected)
            .map(|member| member.claim_id)
            .collect();
        let _claim_guards = self.locks.lock_all(affected.iter().copied()).await;

        let previous = batch::transition(&mut batch, to)?;
        let policy = self.settings.batch_rejection_policy;
        let mut changes = Vec::with_capacity(affected.len());
        for claim_id in affected {
            let before = self.claims.get(claim_id).await?;
            let mut claim = before.clone();
            lifecycle::transition(&mut claim, action, policy)?;
            changes.push(ClaimChange { claim, before, notes: Some(batch.batch_number.clone()) });
        }

        self.commit_batch(&batch, previous, actor, notes, changes).await?;
        Ok(batch)
    }

    /// Append the batch row and every claim row in one write, then store.
    /// Nothing is stored when the append fails.
    async fn commit_batch(
        &self,
        batch: &ClaimBatch,
        previous: BatchStatus,
        actor: &str,
        notes: Option<String>,
        changes: Vec<ClaimChange>,
    ) -> ClaimsResult<()> {
        let batch_row = ClaimBatchStatusHistory::new(batch.id, Some(previous), batch.status, actor, notes);
        let claim_rows = changes.iter().map(|change| change.history_row(actor)).collect();
        self.history.append_transition(Some(batch_row), claim_rows).await?;
        self.store(batch, &changes).await?;

        info!(
            batch_id = %batch.id,
            from = %previous,
            to = %batch.status,
            claims = changes.len(),
            actor = actor,
            "Batch status changed"
        );
        self.publisher.batch_status_changed(batch, Some(previous), actor);
        for change in &changes {
            self.publisher.claim_status_changed(&change.claim, Some(change.previous()), actor);
        }
        Ok(())
    }

    /// Save the moved claims, then the batch. A failed save puts back the
    /// claims already written.
    async fn store(&self, batch: &ClaimBatch, changes: &[ClaimChange]) -> ClaimsResult<()> {
        let mut saved = 0;
        let mut result = Ok(());
        for change in changes {
            result = self.claims.save(&change.claim).await;
            if result.is_err() {
                break;
            }
            saved += 1;
        }
        if result.is_ok() {
            result = self.batches.save(batch).await;
        }

        if let Err(err) = result {
            for change in &changes[..saved] {
                if let Err(restore) = self.claims.save(&change.before).await {
                    warn!(claim_id = %change.claim.id, error = %restore, "Failed to restore claim after batch save error");
                }
            }
            return Err(err);
        }
        Ok(())
    }
}
