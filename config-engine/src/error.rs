use error_common::{codes, Categorized, ErrorCategory};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
    
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl Categorized for ConfigError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Internal
    }

    fn code(&self) -> &'static str {
        codes::internal::CONFIGURATION
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
