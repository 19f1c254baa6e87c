use regex::Regex;
use lazy_static::lazy_static;
use sha2::{Sha256, Digest};
use base64::{Engine as _, engine::general_purpose};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref PHONE_REGEX: Regex = Regex::new(r"(?:\+233[\s-]?|\b0)[235]\d[\s-]?\d{3}[\s-]?\d{4}\b").unwrap();
    static ref MEMBER_REGEX: Regex = Regex::new(r"(?i)\b(NHIS|member(?:ship)?)(\s*(?:no\.?|number|#|:)?\s*)([A-Z0-9]{6,12})\b").unwrap();
}

/// Identifier redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_member_numbers: bool,
    /// Replace values with a short hash instead of a fixed mask
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_emails: true,
            redact_phones: true,
            redact_member_numbers: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// Redactor applied to log messages that mention patients or members
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    /// A redactor that returns its input untouched
    pub fn disabled() -> Self {
        Self::new(RedactionConfig {
            enabled: false,
            ..RedactionConfig::default()
        })
    }
    
    pub fn redact(&self, text: &str) -> String {
        if !self.config.enabled {
            return text.to_string();
        }

        let mut result = text.to_string();
        
        if self.config.redact_emails {
            result = EMAIL_REGEX.replace_all(&result, |caps: &regex::Captures| {
                self.mask("EMAIL", &caps[0], "***@***")
            }).to_string();
        }
        
        if self.config.redact_member_numbers {
            result = MEMBER_REGEX.replace_all(&result, |caps: &regex::Captures| {
                format!("{}{}{}", &caps[1], &caps[2], self.mask_identifier(&caps[3]))
            }).to_string();
        }

        if self.config.redact_phones {
            result = PHONE_REGEX.replace_all(&result, |caps: &regex::Captures| {
                self.mask("PHONE", &caps[0], "***-***-****")
            }).to_string();
        }
        
        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }
        
        result
    }

    /// Mask a bare identifier such as a membership number, keeping the last
    /// two characters visible when hashing is off
    pub fn mask_identifier(&self, value: &str) -> String {
        if !self.config.enabled {
            return value.to_string();
        }
        if self.config.hash_for_correlation {
            return format!("ID[{}]", self.hash_value(value));
        }
        let visible: String = value.chars().rev().take(2).collect::<Vec<_>>().into_iter().rev().collect();
        let hidden = value.chars().count().saturating_sub(visible.chars().count());
        format!("{}{}", "*".repeat(hidden), visible)
    }

    fn mask(&self, label: &str, value: &str, fixed: &str) -> String {
        if self.config.hash_for_correlation {
            format!("{}[{}]", label, self.hash_value(value))
        } else {
            fixed.to_string()
        }
    }
    
    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD.encode(&result[..8])
    }
}
