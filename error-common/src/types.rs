use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification shared by every engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Conflict,
    ImmutableState,
    NotFound,
    Internal,
}

impl ErrorCategory {
    /// Conflicts are the only failures a caller should retry after re-fetching
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Conflict)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::ImmutableState => "immutable_state",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every crate-level error enum in the workspace
pub trait Categorized: std::error::Error {
    fn category(&self) -> ErrorCategory;

    /// Stable code from [`crate::codes`]
    fn code(&self) -> &'static str;

    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Top-level error for binaries that drive several engine crates
#[derive(Error, Debug)]
pub enum RustCareError {
    #[error("{category} error [{code}]: {message}")]
    Engine {
        category: ErrorCategory,
        code: &'static str,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RustCareError {
    /// Flatten a categorized crate error, keeping its classification
    pub fn from_categorized<E: Categorized + ?Sized>(err: &E) -> Self {
        RustCareError::Engine {
            category: err.category(),
            code: err.code(),
            message: err.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RustCareError::Engine { category, .. } => *category,
            RustCareError::ConfigError(_) | RustCareError::Other(_) => ErrorCategory::Internal,
        }
    }
}

/// Result type alias for top-level operations
pub type Result<T> = std::result::Result<T, RustCareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Error, Debug)]
    #[error("source record already claimed")]
    struct Claimed;

    impl Categorized for Claimed {
        fn category(&self) -> ErrorCategory {
            ErrorCategory::Conflict
        }

        fn code(&self) -> &'static str {
            crate::codes::conflict::ITEM_ALREADY_CLAIMED
        }
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(ErrorCategory::Conflict.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
        assert!(!ErrorCategory::ImmutableState.is_retryable());
        assert!(Claimed.is_retryable());
    }

    #[test]
    fn flattening_keeps_category_and_code() {
        let err = RustCareError::from_categorized(&Claimed);
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(
            err.to_string(),
            "conflict error [CONFLICT_2001]: source record already claimed"
        );
    }
}
