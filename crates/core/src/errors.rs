use thiserror::Error;

use crate::config::ConfigError;

/// Failures at the engine boundary. Product data defects are not errors:
/// they surface as `ValidationIssue`s on the product's assessment.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("invalid observation payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl EngineError {
    /// Stable machine-readable class used by operator tooling.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "config_validation",
            Self::InvalidPayload(_) => "invalid_payload",
        }
    }
}
