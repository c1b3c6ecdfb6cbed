//! Generation error types

use thiserror::Error;

use crate::assistant::AssistantError;
use crate::render::RenderError;
use crate::retry::Exhausted;
use crate::validation::RejectReason;

use super::Stage;

/// Why a single attempt did not produce a diagram; always retried
#[derive(Debug, Error)]
pub enum AttemptFailure {
    #[error("assistant call failed: {0}")]
    Assistant(#[from] AssistantError),

    #[error("reply rejected: {0}")]
    Rejected(#[from] RejectReason),

    #[error("rendering failed: {0}")]
    Render(#[from] RenderError),
}

impl AttemptFailure {
    /// Pipeline stage the attempt failed in
    pub fn stage(&self) -> Stage {
        match self {
            AttemptFailure::Assistant(_) => Stage::Ask,
            AttemptFailure::Rejected(_) => Stage::Validate,
            AttemptFailure::Render(_) => Stage::Render,
        }
    }

    /// The service could not be reached or answered with an error status
    pub fn is_transport(&self) -> bool {
        match self {
            AttemptFailure::Assistant(e) => e.is_transport(),
            AttemptFailure::Render(e) => matches!(e, RenderError::Network(_) | RenderError::Status(_)),
            AttemptFailure::Rejected(_) => false,
        }
    }

    /// The rendering server answered 200 with something other than SVG
    pub fn is_malformed(&self) -> bool {
        matches!(self, AttemptFailure::Render(e) if e.is_malformed())
    }
}

/// Errors surfaced to callers of a conversation turn
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Every attempt failed; try again later
    #[error("Generation failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: AttemptFailure },

    /// Unknown or ended session; start a new one
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

impl From<Exhausted<AttemptFailure>> for GenerationError {
    fn from(exhausted: Exhausted<AttemptFailure>) -> Self {
        GenerationError::ExhaustedRetries {
            attempts: exhausted.attempts,
            last: exhausted.last,
        }
    }
}
