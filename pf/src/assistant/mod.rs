//! Generative assistant access for Procflow
//!
//! The service keeps conversation state on its side; we only hold a
//! [`ConversationHandle`]. [`AssistantGateway`] turns the thread/run/poll
//! primitives into a single awaitable `ask`.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod gateway;
mod openai;
mod types;

pub use client::AssistantClient;
pub use error::AssistantError;
pub use gateway::AssistantGateway;
pub use openai::OpenAIAssistantClient;
pub use types::{ConversationHandle, ConversationMessage, Role, RunId, RunStatus};

use crate::config::AssistantConfig;

/// Create the assistant client described by the config
pub fn create_client(config: &AssistantConfig) -> Result<Arc<dyn AssistantClient>, AssistantError> {
    debug!(base_url = %config.base_url, "create_client: called");
    Ok(Arc::new(OpenAIAssistantClient::from_config(config)?))
}
