//! Logging for the claims engine with automatic identifier redaction
//! 
//! Claim and batch logs routinely mention who a claim belongs to. Membership
//! numbers, phone numbers and email addresses are masked (or hashed, so two
//! log lines about the same member can still be correlated) before they reach
//! a log sink.
//! 
//! # Example
//! 
//! ```rust
//! use logger_redacted::{PiiRedactor, RedactionConfig};
//! 
//! let redactor = PiiRedactor::new(RedactionConfig::default());
//! let line = redactor.redact("NHIS 12345678 claim opened, call 0244123456");
//! assert!(!line.contains("12345678"));
//! ```

pub mod redactor;
pub mod macros;
pub mod config;

pub use redactor::*;
pub use config::*;

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Invalid log filter directive: {0}")]
    InvalidFilter(String),

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Install the global tracing subscriber described by `config`. Output goes
/// to stderr.
///
/// `RUST_LOG` wins over `config.level` when it is set.
pub fn init_logging(config: &LoggerConfig) -> Result<(), LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoggerError::InvalidFilter(e.to_string()))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false).with_ansi(false).json())
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_ansi(config.ansi))
            .try_init()
    };

    result.map_err(|_| LoggerError::AlreadyInitialized)
}
