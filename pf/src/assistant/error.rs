//! Assistant gateway error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the generative assistant
///
/// Every variant is treated as transient by the generation pipeline.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Run ended with status {0}")]
    RunFailed(String),

    #[error("Run did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Assistant returned no reply")]
    EmptyResponse,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AssistantError {
    /// Check if the failure came from the transport layer rather than the run itself
    pub fn is_transport(&self) -> bool {
        matches!(self, AssistantError::Network(_) | AssistantError::ApiError { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transport() {
        assert!(
            AssistantError::ApiError {
                status: 502,
                message: "Bad gateway".to_string()
            }
            .is_transport()
        );
        assert!(!AssistantError::RunFailed("failed".to_string()).is_transport());
        assert!(!AssistantError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!AssistantError::EmptyResponse.is_transport());
    }

    #[test]
    fn test_display() {
        let err = AssistantError::RunFailed("expired".to_string());
        assert_eq!(err.to_string(), "Run ended with status expired");
    }
}
