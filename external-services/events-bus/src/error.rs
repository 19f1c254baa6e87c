use error_common::{codes, Categorized, ErrorCategory};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Invalid subject pattern: '{0}'")]
    InvalidPattern(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(uuid::Uuid),
}

impl Categorized for EventBusError {
    fn category(&self) -> ErrorCategory {
        match self {
            EventBusError::InvalidPattern(_) => ErrorCategory::Validation,
            EventBusError::SubscriptionNotFound(_) => ErrorCategory::NotFound,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            EventBusError::InvalidPattern(_) => codes::validation::INVALID_INPUT,
            EventBusError::SubscriptionNotFound(_) => codes::lookup::NOT_FOUND,
        }
    }
}

pub type Result<T> = std::result::Result<T, EventBusError>;
