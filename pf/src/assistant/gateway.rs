//! Synchronous-style "ask" on top of the assistant's run primitives

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{AssistantClient, AssistantError, ConversationHandle, Role, RunId, RunStatus};
use crate::config::AssistantConfig;
use crate::prompts::{DiagramPromptContext, PromptLoader};

/// Wraps an [`AssistantClient`] behind a single `ask` call
///
/// `ask` appends the wrapped prompt, starts a run, polls until the run is
/// terminal and returns the reply that run produced. The wait is a timer on
/// the runtime, not a blocked thread, and is bounded by `run_timeout`. A run
/// that is abandoned while still open is cancelled, since the service refuses
/// new messages on a thread with an active run.
pub struct AssistantGateway {
    client: Arc<dyn AssistantClient>,
    prompts: PromptLoader,
    poll_interval: Duration,
    run_timeout: Duration,
}

impl AssistantGateway {
    pub fn new(
        client: Arc<dyn AssistantClient>,
        prompts: PromptLoader,
        poll_interval: Duration,
        run_timeout: Duration,
    ) -> Self {
        debug!(?poll_interval, ?run_timeout, "AssistantGateway::new: called");
        Self {
            client,
            prompts,
            poll_interval,
            run_timeout,
        }
    }

    pub fn from_config(client: Arc<dyn AssistantClient>, config: &AssistantConfig) -> Self {
        Self::new(
            client,
            PromptLoader::new(config.prompt_dir.clone()),
            config.poll_interval(),
            config.run_timeout(),
        )
    }

    /// Create a fresh conversation on the assistant service
    pub async fn open_conversation(&self) -> Result<ConversationHandle, AssistantError> {
        debug!("AssistantGateway::open_conversation: called");
        let handle = self.client.create_conversation().await?;
        info!(%handle, "Opened assistant conversation");
        Ok(handle)
    }

    /// Delete a conversation on the assistant service
    pub async fn close_conversation(&self, conversation: &ConversationHandle) -> Result<(), AssistantError> {
        debug!(%conversation, "AssistantGateway::close_conversation: called");
        self.client.delete_conversation(conversation).await
    }

    /// Send one user turn and wait for the assistant's raw reply
    pub async fn ask(&self, conversation: &ConversationHandle, prompt: &str) -> Result<String, AssistantError> {
        debug!(%conversation, prompt_len = prompt.len(), "AssistantGateway::ask: called");
        let message = self
            .prompts
            .diagram_prompt(&DiagramPromptContext::new(prompt))
            .map_err(|e| AssistantError::Prompt(e.to_string()))?;

        self.client.append_message(conversation, &message).await?;
        let run = self.client.start_run(conversation).await?;
        debug!(%conversation, %run, "AssistantGateway::ask: run started");

        match tokio::time::timeout(self.run_timeout, self.wait_for_run(conversation, &run)).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(%conversation, %run, "AssistantGateway::ask: run timed out");
                self.cancel_run(conversation, &run).await;
                return Err(AssistantError::Timeout(self.run_timeout));
            }
        }

        // Only the newest message can belong to this run; older assistant
        // messages answer earlier turns
        let messages = self.client.list_messages(conversation).await?;
        debug!(message_count = messages.len(), "AssistantGateway::ask: messages listed");
        messages
            .into_iter()
            .next()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.text)
            .ok_or(AssistantError::EmptyResponse)
    }

    /// Best-effort cancel of a run the caller no longer waits for
    async fn cancel_run(&self, conversation: &ConversationHandle, run: &RunId) {
        debug!(%conversation, %run, "AssistantGateway::cancel_run: called");
        if let Err(e) = self.client.cancel_run(conversation, run).await {
            warn!(%conversation, %run, error = %e, "Failed to cancel abandoned run");
        }
    }

    async fn wait_for_run(&self, conversation: &ConversationHandle, run: &RunId) -> Result<(), AssistantError> {
        debug!(%conversation, %run, "AssistantGateway::wait_for_run: called");
        loop {
            let status = self.client.run_status(conversation, run).await?;
            if status.is_completed() {
                debug!(%run, "AssistantGateway::wait_for_run: completed");
                return Ok(());
            }
            if status == RunStatus::RequiresAction {
                debug!(%run, "AssistantGateway::wait_for_run: run wants tool output");
                self.cancel_run(conversation, run).await;
                return Err(AssistantError::RunFailed(status.to_string()));
            }
            if status.is_terminal() {
                debug!(%run, %status, "AssistantGateway::wait_for_run: terminal failure");
                return Err(AssistantError::RunFailed(status.to_string()));
            }
            debug!(%run, %status, "AssistantGateway::wait_for_run: waiting");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
