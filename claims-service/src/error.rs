use chrono::NaiveDate;
use error_common::{codes, Categorized, ErrorCategory};
use insurance_service::InsuranceError;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{BatchStatus, ClaimStatus, SourceRef};

/// Unmet guard. The claim or batch is left exactly as it was.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("claim has no diagnosis")]
    MissingDiagnosis,

    #[error("claim has no primary diagnosis")]
    NoPrimaryDiagnosis,

    #[error("claim has {0} primary diagnoses, expected exactly one")]
    MultiplePrimaryDiagnoses(usize),

    #[error("national-scheme claims need a G-DRG tariff before approval")]
    MissingGdrg,

    #[error("a rejection reason is required")]
    MissingRejectionReason,

    #[error("diagnosis code must not be empty")]
    BlankDiagnosisCode,

    #[error("diagnosis {0} is already on the claim")]
    DuplicateDiagnosis(String),

    #[error("quantity must be greater than zero, got {0}")]
    InvalidQuantity(Decimal),

    #[error("{field} must not be negative, got {value}")]
    NegativeAmount { field: &'static str, value: Decimal },

    #[error("plan {plan_id} is not in effect on {date}")]
    PlanNotEffective { plan_id: Uuid, date: NaiveDate },

    #[error("billable record {0} belongs to a different patient or encounter")]
    ForeignRecord(SourceRef),

    #[error("claim is billed to a different payer than the batch")]
    ProviderMismatch,

    #[error("batch has no claims")]
    EmptyBatch,

    #[error("{0} claims in the batch are still awaiting adjudication")]
    PendingAdjudication(usize),

    #[error("approved amount {approved} exceeds the claimed {claimed}")]
    ApprovedExceedsClaimed { approved: Decimal, claimed: Decimal },

    #[error("payment {paid} exceeds the approved {approved}")]
    PaymentExceedsApproved { paid: Decimal, approved: Decimal },

    #[error("only approved batch claims can be paid")]
    NotApprovedForPayment,

    #[error("only rejected claims can be cloned")]
    CloneRequiresRejected,

    #[error("only vetted claims can join a batch, claim is {0}")]
    ClaimNotVetted(ClaimStatus),

    #[error("batch must be {expected}, it is {actual}")]
    WrongBatchStatus { expected: BatchStatus, actual: BatchStatus },

    #[error("claim {0} has already been adjudicated in this batch")]
    AlreadyAdjudicated(Uuid),
}

#[derive(Error, Debug)]
pub enum ClaimsError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Claim {claim_id} cannot go from {from} to {to}")]
    InvalidClaimTransition { claim_id: Uuid, from: ClaimStatus, to: ClaimStatus },

    #[error("Batch {batch_id} cannot go from {from} to {to}")]
    InvalidBatchTransition { batch_id: Uuid, from: BatchStatus, to: BatchStatus },

    #[error("Billable record {record} is already on claim {claim_id}")]
    ItemAlreadyClaimed { record: SourceRef, claim_id: Uuid },

    #[error("Claim {claim_id} already belongs to batch {batch_id}")]
    AlreadyBatched { claim_id: Uuid, batch_id: Uuid },

    #[error("Claim {claim_id} is {status} and can no longer be edited")]
    ImmutableClaim { claim_id: Uuid, status: ClaimStatus },

    #[error("Batch {batch_id} is {status}; its composition is frozen")]
    ImmutableBatch { batch_id: Uuid, status: BatchStatus },

    #[error("Claim not found: {0}")]
    ClaimNotFound(Uuid),

    #[error("Claim item {item_id} not found on claim {claim_id}")]
    ItemNotFound { claim_id: Uuid, item_id: Uuid },

    #[error("Diagnosis {diagnosis_id} not found on claim {claim_id}")]
    DiagnosisNotFound { claim_id: Uuid, diagnosis_id: Uuid },

    #[error("Batch not found: {0}")]
    BatchNotFound(Uuid),

    #[error("Claim {claim_id} is not in batch {batch_id}")]
    ClaimNotInBatch { batch_id: Uuid, claim_id: Uuid },

    #[error(transparent)]
    Insurance(#[from] InsuranceError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Status history write failed: {0}")]
    AuditLog(String),
}

impl Categorized for ClaimsError {
    fn category(&self) -> ErrorCategory {
        match self {
            ClaimsError::Validation(_)
            | ClaimsError::InvalidClaimTransition { .. }
            | ClaimsError::InvalidBatchTransition { .. } => ErrorCategory::Validation,
            ClaimsError::ItemAlreadyClaimed { .. } | ClaimsError::AlreadyBatched { .. } => ErrorCategory::Conflict,
            ClaimsError::ImmutableClaim { .. } | ClaimsError::ImmutableBatch { .. } => ErrorCategory::ImmutableState,
            ClaimsError::ClaimNotFound(_)
            | ClaimsError::ItemNotFound { .. }
            | ClaimsError::DiagnosisNotFound { .. }
            | ClaimsError::BatchNotFound(_)
            | ClaimsError::ClaimNotInBatch { .. } => ErrorCategory::NotFound,
            ClaimsError::Insurance(err) => err.category(),
            ClaimsError::Storage(_) | ClaimsError::AuditLog(_) => ErrorCategory::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ClaimsError::Validation(ValidationError::MissingRejectionReason)
            | ClaimsError::Validation(ValidationError::BlankDiagnosisCode) => codes::validation::MISSING_REQUIRED_FIELD,
            ClaimsError::Validation(_) => codes::validation::GUARD_NOT_MET,
            ClaimsError::InvalidClaimTransition { .. } | ClaimsError::InvalidBatchTransition { .. } => {
                codes::validation::INVALID_TRANSITION
            }
            ClaimsError::ItemAlreadyClaimed { .. } => codes::conflict::ITEM_ALREADY_CLAIMED,
            ClaimsError::AlreadyBatched { .. } => codes::conflict::ALREADY_BATCHED,
            ClaimsError::ImmutableClaim { .. } => codes::state::IMMUTABLE_CLAIM,
            ClaimsError::ImmutableBatch { .. } => codes::state::IMMUTABLE_BATCH,
            ClaimsError::ClaimNotFound(_)
            | ClaimsError::ItemNotFound { .. }
            | ClaimsError::DiagnosisNotFound { .. }
            | ClaimsError::BatchNotFound(_)
            | ClaimsError::ClaimNotInBatch { .. } => codes::lookup::NOT_FOUND,
            ClaimsError::Insurance(err) => err.code(),
            ClaimsError::Storage(_) => codes::internal::STORAGE_FAILURE,
            ClaimsError::AuditLog(_) => codes::internal::AUDIT_LOG_FAILURE,
        }
    }
}

pub type ClaimsResult<T> = Result<T, ClaimsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_are_retryable_and_guards_are_not() {
        let conflict = ClaimsError::ItemAlreadyClaimed {
            record: SourceRef { kind: insurance_service::ItemKind::Drug, record_id: Uuid::new_v4() },
            claim_id: Uuid::new_v4(),
        };
        assert_eq!(conflict.category(), ErrorCategory::Conflict);
        assert!(conflict.is_retryable());
        assert_eq!(conflict.code(), codes::conflict::ITEM_ALREADY_CLAIMED);

        let guard = ClaimsError::from(ValidationError::MissingGdrg);
        assert_eq!(guard.category(), ErrorCategory::Validation);
        assert!(!guard.is_retryable());
        assert_eq!(guard.code(), codes::validation::GUARD_NOT_MET);
    }

    #[test]
    fn test_insurance_errors_keep_their_category() {
        let err = ClaimsError::from(InsuranceError::TariffLocked(Uuid::new_v4()));
        assert_eq!(err.category(), ErrorCategory::ImmutableState);
    }
}
