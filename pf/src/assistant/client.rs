//! AssistantClient trait definition

use async_trait::async_trait;

use super::{AssistantError, ConversationHandle, ConversationMessage, RunId, RunStatus};

/// Low-level primitives of a stateful generative assistant
///
/// Unlike a completion API, the assistant keeps the conversation on its
/// side: messages are appended to a thread and a run is started against it.
/// Implementations are not required to be safe for concurrent runs on the
/// same thread; callers serialize turns per conversation.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    /// Create a new, empty conversation
    async fn create_conversation(&self) -> Result<ConversationHandle, AssistantError>;

    /// Append a user message to the conversation
    async fn append_message(&self, conversation: &ConversationHandle, content: &str) -> Result<(), AssistantError>;

    /// Start processing the conversation
    async fn start_run(&self, conversation: &ConversationHandle) -> Result<RunId, AssistantError>;

    /// Current status of a run
    async fn run_status(&self, conversation: &ConversationHandle, run: &RunId) -> Result<RunStatus, AssistantError>;

    /// Stop a run that is still active; the thread accepts messages again afterwards
    async fn cancel_run(&self, conversation: &ConversationHandle, run: &RunId) -> Result<(), AssistantError>;

    /// Messages of the conversation, most recent first
    async fn list_messages(&self, conversation: &ConversationHandle)
    -> Result<Vec<ConversationMessage>, AssistantError>;

    /// Delete the conversation on the service side
    async fn delete_conversation(&self, conversation: &ConversationHandle) -> Result<(), AssistantError>;
}
