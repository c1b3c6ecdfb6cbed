//! Generation pipeline
//!
//! One request runs ASK -> VALIDATE -> ENCODE -> RENDER. Any failure along
//! the way ends the attempt; the [`RetryPolicy`] decides whether another
//! attempt starts. Attempts for one request never overlap.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

mod error;

pub use error::{AttemptFailure, GenerationError};

use crate::assistant::{AssistantGateway, ConversationHandle};
use crate::encoding;
use crate::render::Renderer;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::validation::Validator;

/// Steps of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ask,
    Validate,
    Encode,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ask => "ask",
            Stage::Validate => "validate",
            Stage::Encode => "encode",
            Stage::Render => "render",
        };
        f.write_str(name)
    }
}

/// Result of a successful request
#[derive(Debug, Clone)]
pub struct GeneratedDiagram {
    pub conversation: ConversationHandle,
    /// Cleaned diagram source that was rendered
    pub source: String,
    pub png: Vec<u8>,
    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// Drives the assistant, validator and renderer with bounded retry
pub struct GenerationPipeline {
    gateway: Arc<AssistantGateway>,
    validator: Validator,
    renderer: Renderer,
    retry: RetryPolicy,
}

impl GenerationPipeline {
    pub fn new(gateway: Arc<AssistantGateway>, validator: Validator, renderer: Renderer, retry: RetryPolicy) -> Self {
        debug!(?retry, "GenerationPipeline::new: called");
        Self {
            gateway,
            validator,
            renderer,
            retry,
        }
    }

    /// Turn `prompt` into a rendered diagram within the session's conversation
    ///
    /// The caller must hold the session's turn lock.
    pub async fn run(&self, session: &Session, prompt: &str) -> Result<GeneratedDiagram, GenerationError> {
        debug!(session_id = %session.id(), prompt_len = prompt.len(), "GenerationPipeline::run: called");
        let outcome = self
            .retry
            .run(|attempt| async move {
                let result = self.attempt(session, prompt, attempt).await;
                if let Err(failure) = &result {
                    warn!(
                        session_id = %session.id(),
                        attempt,
                        stage = %failure.stage(),
                        transport = failure.is_transport(),
                        malformed = failure.is_malformed(),
                        error = %failure,
                        "Generation attempt failed"
                    );
                }
                result
            })
            .await;
        match outcome {
            Ok(diagram) => {
                info!(session_id = %session.id(), attempts = diagram.attempts, "Diagram generated");
                Ok(diagram)
            }
            Err(exhausted) => {
                warn!(
                    session_id = %session.id(),
                    attempts = exhausted.attempts,
                    stage = %exhausted.last.stage(),
                    "Generation gave up"
                );
                Err(exhausted.into())
            }
        }
    }

    async fn attempt(&self, session: &Session, prompt: &str, attempt: u32) -> Result<GeneratedDiagram, AttemptFailure> {
        debug!(session_id = %session.id(), attempt, stage = %Stage::Ask, "GenerationPipeline::attempt: called");
        let conversation = session.conversation_or_open(&self.gateway).await?;
        let raw = self.gateway.ask(&conversation, prompt).await?;

        debug!(attempt, stage = %Stage::Validate, raw_len = raw.len(), "GenerationPipeline::attempt: reply received");
        let source = self.validator.validate(&raw)?;

        debug!(attempt, stage = %Stage::Encode, "GenerationPipeline::attempt: source accepted");
        let token = encoding::encode(&source);

        debug!(attempt, stage = %Stage::Render, token_len = token.len(), "GenerationPipeline::attempt: rendering");
        let png = self.renderer.render(&token).await?;

        Ok(GeneratedDiagram {
            conversation,
            source,
            png,
            attempts: attempt + 1,
        })
    }
}
