// Logger configuration
use serde::{Deserialize, Serialize};

use crate::redactor::RedactionConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Structured JSON lines instead of human-readable output
    pub json: bool,
    pub ansi: bool,
    pub redaction_enabled: bool,
    pub hash_for_correlation: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            ansi: true,
            redaction_enabled: true,
            hash_for_correlation: true,
        }
    }
}

impl LoggerConfig {
    pub fn redaction(&self) -> RedactionConfig {
        RedactionConfig {
            enabled: self.redaction_enabled,
            hash_for_correlation: self.hash_for_correlation,
            ..RedactionConfig::default()
        }
    }
}
