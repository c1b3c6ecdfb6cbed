//! OpenAI Assistants API client implementation
//!
//! Implements the AssistantClient trait on top of the threads/runs endpoints
//! of the Assistants API (v2).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{AssistantClient, AssistantError, ConversationHandle, ConversationMessage, Role, RunId, RunStatus};
use crate::config::AssistantConfig;

/// Beta header required by the threads/runs endpoints
const ASSISTANTS_BETA: &str = "assistants=v2";

/// OpenAI Assistants API client
pub struct OpenAIAssistantClient {
    api_key: String,
    assistant_id: String,
    base_url: String,
    http: Client,
}

impl OpenAIAssistantClient {
    pub fn new(
        api_key: impl Into<String>,
        assistant_id: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AssistantError> {
        let http = Client::builder().timeout(timeout).build().map_err(AssistantError::Network)?;
        Ok(Self {
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Create a new client from configuration, reading secrets from the environment
    pub fn from_config(config: &AssistantConfig) -> Result<Self, AssistantError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config
            .api_key()
            .map_err(|e| AssistantError::Config(e.to_string()))?;
        let assistant_id = config
            .assistant_id()
            .map_err(|e| AssistantError::Config(e.to_string()))?;

        Self::new(
            api_key,
            assistant_id,
            config.base_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    /// Turn a non-success status into an ApiError carrying the body
    async fn check(response: Response) -> Result<Response, AssistantError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        debug!(%status, "check: API error");
        Err(AssistantError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, AssistantError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| AssistantError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AssistantClient for OpenAIAssistantClient {
    async fn create_conversation(&self) -> Result<ConversationHandle, AssistantError> {
        debug!("create_conversation: called");
        let response = self
            .authorized(self.http.post(self.url("threads")))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let thread: ObjectId = Self::json(Self::check(response).await?).await?;
        Ok(ConversationHandle::new(thread.id))
    }

    async fn append_message(&self, conversation: &ConversationHandle, content: &str) -> Result<(), AssistantError> {
        debug!(%conversation, content_len = content.len(), "append_message: called");
        let response = self
            .authorized(self.http.post(self.url(&format!("threads/{}/messages", conversation))))
            .json(&serde_json::json!({
                "role": "user",
                "content": content,
            }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn start_run(&self, conversation: &ConversationHandle) -> Result<RunId, AssistantError> {
        debug!(%conversation, "start_run: called");
        let response = self
            .authorized(self.http.post(self.url(&format!("threads/{}/runs", conversation))))
            .json(&serde_json::json!({
                "assistant_id": self.assistant_id,
            }))
            .send()
            .await?;
        let run: RunObject = Self::json(Self::check(response).await?).await?;
        debug!(run_id = %run.id, status = %run.status, "start_run: run created");
        Ok(RunId::new(run.id))
    }

    async fn run_status(&self, conversation: &ConversationHandle, run: &RunId) -> Result<RunStatus, AssistantError> {
        debug!(%conversation, %run, "run_status: called");
        let response = self
            .authorized(self.http.get(self.url(&format!("threads/{}/runs/{}", conversation, run))))
            .send()
            .await?;
        let run: RunObject = Self::json(Self::check(response).await?).await?;
        Ok(run.status)
    }

    async fn cancel_run(&self, conversation: &ConversationHandle, run: &RunId) -> Result<(), AssistantError> {
        debug!(%conversation, %run, "cancel_run: called");
        let response = self
            .authorized(
                self.http
                    .post(self.url(&format!("threads/{}/runs/{}/cancel", conversation, run))),
            )
            .send()
            .await?;
        let run: RunObject = Self::json(Self::check(response).await?).await?;
        debug!(run_id = %run.id, status = %run.status, "cancel_run: cancel accepted");
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation: &ConversationHandle,
    ) -> Result<Vec<ConversationMessage>, AssistantError> {
        debug!(%conversation, "list_messages: called");
        let response = self
            .authorized(self.http.get(self.url(&format!("threads/{}/messages", conversation))))
            .query(&[("order", "desc")])
            .send()
            .await?;
        let list: MessageList = Self::json(Self::check(response).await?).await?;

        Ok(list
            .data
            .into_iter()
            .map(|m| {
                let text = m
                    .content
                    .into_iter()
                    .filter_map(|c| c.text.map(|t| t.value))
                    .collect::<Vec<_>>()
                    .join("\n");
                ConversationMessage { role: m.role, text }
            })
            .collect())
    }

    async fn delete_conversation(&self, conversation: &ConversationHandle) -> Result<(), AssistantError> {
        debug!(%conversation, "delete_conversation: called");
        let response = self
            .authorized(self.http.delete(self.url(&format!("threads/{}", conversation))))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

// Assistants API response types

#[derive(Debug, Deserialize)]
struct ObjectId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: RunStatus,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    role: Role,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}
