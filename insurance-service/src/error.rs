use error_common::{codes, Categorized, ErrorCategory};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::TariffScheme;

#[derive(Error, Debug)]
pub enum InsuranceError {
    #[error("Insurance plan not found: {0}")]
    PlanNotFound(Uuid),

    #[error("Invalid insurance plan: {0}")]
    InvalidPlan(String),

    #[error("Tariff not found: {0}")]
    TariffNotFound(Uuid),

    #[error("No active {scheme} tariff with code '{code}'")]
    TariffCodeNotFound { scheme: TariffScheme, code: String },

    #[error("{scheme} tariff code '{code}' is already active")]
    DuplicateTariffCode { scheme: TariffScheme, code: String },

    #[error("Invalid tariff: {0}")]
    InvalidTariff(String),

    #[error("Tariff {0} is referenced by a finalized claim line; supersede it instead of repricing")]
    TariffLocked(Uuid),

    #[error("Coverage rule not found: {0}")]
    RuleNotFound(Uuid),

    #[error("Invalid coverage rule: {0}")]
    InvalidRule(String),

    #[error("Conflicting coverage rule: {0}")]
    ConflictingRule(String),

    #[error("Line amount out of range: {quantity} x {unit_price}")]
    AmountOverflow { quantity: Decimal, unit_price: Decimal },
}

impl Categorized for InsuranceError {
    fn category(&self) -> ErrorCategory {
        match self {
            InsuranceError::PlanNotFound(_)
            | InsuranceError::TariffNotFound(_)
            | InsuranceError::TariffCodeNotFound { .. }
            | InsuranceError::RuleNotFound(_) => ErrorCategory::NotFound,
            InsuranceError::InvalidPlan(_)
            | InsuranceError::InvalidTariff(_)
            | InsuranceError::InvalidRule(_)
            | InsuranceError::AmountOverflow { .. } => ErrorCategory::Validation,
            InsuranceError::DuplicateTariffCode { .. }
            | InsuranceError::ConflictingRule(_) => ErrorCategory::Conflict,
            InsuranceError::TariffLocked(_) => ErrorCategory::ImmutableState,
        }
    }

    fn code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::NotFound => codes::lookup::NOT_FOUND,
            ErrorCategory::Validation => codes::validation::INVALID_INPUT,
            ErrorCategory::Conflict => codes::conflict::DUPLICATE_ENTRY,
            ErrorCategory::ImmutableState => codes::state::LOCKED_TARIFF,
            ErrorCategory::Internal => codes::internal::STORAGE_FAILURE,
        }
    }
}

pub type InsuranceResult<T> = Result<T, InsuranceError>;
