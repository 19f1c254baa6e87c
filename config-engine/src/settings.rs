use logger_redacted::LoggerConfig;
use serde::{Deserialize, Serialize};

/// What happens to a claim when the scheme rejects it inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchRejectionPolicy {
    /// The claim becomes `rejected` and can only be cloned into a new draft
    Terminal,
    /// The claim goes back to `pending_vetting` so the facility can correct
    /// and re-submit it in a later batch
    ReopenForCorrection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// ISO 4217 code all amounts are expressed in
    pub currency: String,
    pub claim_number_prefix: String,
    pub batch_number_prefix: String,
    /// Require a G-DRG tariff before approving claims on national-scheme plans
    pub national_scheme_requires_gdrg: bool,
    pub batch_rejection_policy: BatchRejectionPolicy,
    pub logging: LoggerConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currency: "GHS".to_string(),
            claim_number_prefix: "CLM".to_string(),
            batch_number_prefix: "BATCH".to_string(),
            national_scheme_requires_gdrg: true,
            batch_rejection_policy: BatchRejectionPolicy::Terminal,
            logging: LoggerConfig::default(),
        }
    }
}
