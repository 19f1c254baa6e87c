use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use tracing::debug;

use crate::error::Result;
use crate::settings::EngineSettings;
use crate::validation;

enum Source {
    Path(PathBuf),
    Inline(String, FileFormat),
}

/// Builder that merges defaults, files and environment into [`EngineSettings`]
pub struct ConfigEngine {
    sources: Vec<Source>,
    env_prefix: Option<String>,
}

impl ConfigEngine {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            env_prefix: Some("RUSTCARE".to_string()),
        }
    }

    /// Add a settings file; the format is taken from its extension
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(Source::Path(path.into()));
        self
    }

    pub fn with_yaml(mut self, contents: &str) -> Self {
        self.sources.push(Source::Inline(contents.to_string(), FileFormat::Yaml));
        self
    }

    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Merge all sources and validate the result
    pub fn load(self) -> Result<EngineSettings> {
        let mut builder = Config::builder().add_source(Config::try_from(&EngineSettings::default())?);

        for source in self.sources {
            builder = match source {
                Source::Path(path) => {
                    debug!(path = %path.display(), "Adding settings file");
                    builder.add_source(File::from(path).required(true))
                }
                Source::Inline(contents, format) => {
                    builder.add_source(File::from_str(&contents, format))
                }
            };
        }

        if let Some(prefix) = self.env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(&prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let settings: EngineSettings = builder.build()?.try_deserialize()?;
        validation::validate(&settings)?;
        Ok(settings)
    }
}

impl Default for ConfigEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::settings::BatchRejectionPolicy;

    #[test]
    fn loads_defaults_without_sources() {
        let settings = ConfigEngine::new().without_env().load().unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn yaml_overrides_defaults() {
        let settings = ConfigEngine::new()
            .with_yaml(
                r#"
currency: NGN
batch_rejection_policy: reopen_for_correction
logging:
  level: debug
  json: true
"#,
            )
            .without_env()
            .load()
            .unwrap();

        assert_eq!(settings.currency, "NGN");
        assert_eq!(settings.batch_rejection_policy, BatchRejectionPolicy::ReopenForCorrection);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
        // untouched keys keep their defaults
        assert_eq!(settings.claim_number_prefix, "CLM");
        assert!(settings.logging.redaction_enabled);
    }

    #[test]
    fn invalid_merged_settings_are_rejected() {
        let err = ConfigEngine::new()
            .with_yaml("currency: cedi")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ConfigEngine::new()
            .with_file("/nonexistent/rustcare-claims.yaml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Source(_)));
    }
}
