// Settings validation, run after all sources are merged
use crate::error::{ConfigError, Result};
use crate::settings::EngineSettings;

pub fn validate(settings: &EngineSettings) -> Result<()> {
    let currency = &settings.currency;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::ValidationError(format!(
            "currency must be a three-letter ISO 4217 code, got '{}'",
            currency
        )));
    }

    for (name, prefix) in [
        ("claim_number_prefix", &settings.claim_number_prefix),
        ("batch_number_prefix", &settings.batch_number_prefix),
    ] {
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be non-empty and alphanumeric, got '{}'",
                name, prefix
            )));
        }
    }

    if settings.logging.level.trim().is_empty() {
        return Err(ConfigError::ValidationError("logging.level must not be empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&EngineSettings::default()).is_ok());
    }

    #[test]
    fn rejects_lowercase_currency() {
        let settings = EngineSettings {
            currency: "ghs".to_string(),
            ..EngineSettings::default()
        };
        assert!(matches!(validate(&settings), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_prefix_with_separator() {
        let settings = EngineSettings {
            batch_number_prefix: "NHIS-B".to_string(),
            ..EngineSettings::default()
        };
        let err = validate(&settings).unwrap_err();
        assert!(err.to_string().contains("batch_number_prefix"));
    }
}
