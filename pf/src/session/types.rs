//! Session state types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::assistant::{AssistantError, AssistantGateway, ConversationHandle};

/// One accepted request/response pair
#[derive(Debug, Clone)]
pub struct Turn {
    pub prompt: String,
    pub source: String,
    pub png: Vec<u8>,
    pub recorded_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(prompt: impl Into<String>, source: impl Into<String>, png: Vec<u8>) -> Self {
        Self {
            prompt: prompt.into(),
            source: source.into(),
            png,
            recorded_at: Utc::now(),
        }
    }
}

/// Who a session's report goes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
}

/// Snapshot of a session for listings
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub turns: usize,
    pub conversation: Option<ConversationHandle>,
    pub contact: Option<Contact>,
}

/// Mutable part of a session
struct SessionState {
    last_seen: Instant,
    last_activity: DateTime<Utc>,
    history: Vec<Turn>,
    contact: Option<Contact>,
    timer: Option<JoinHandle<()>>,
    closed: bool,
}

/// One user's conversation with the generator
///
/// The conversation handle is created at most once. `turn_lock` serializes
/// generation requests so turns reach the assistant one at a time.
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    conversation: OnceCell<ConversationHandle>,
    turn_lock: Mutex<()>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        debug!(%id, "Session::new: called");
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            conversation: OnceCell::new(),
            turn_lock: Mutex::new(()),
            state: Mutex::new(SessionState {
                last_seen: Instant::now(),
                last_activity: now,
                history: Vec::new(),
                contact: None,
                timer: None,
                closed: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The conversation handle, if one was created already
    pub fn conversation(&self) -> Option<ConversationHandle> {
        self.conversation.get().cloned()
    }

    /// Return the conversation handle, opening one on first use
    ///
    /// Concurrent callers wait for the first opener; a failed open leaves the
    /// slot empty so the next caller tries again.
    pub async fn conversation_or_open(&self, gateway: &AssistantGateway) -> Result<ConversationHandle, AssistantError> {
        let handle = self
            .conversation
            .get_or_try_init(|| async {
                debug!(session_id = %self.id, "Session::conversation_or_open: opening conversation");
                gateway.open_conversation().await
            })
            .await?;
        Ok(handle.clone())
    }

    /// Wait for exclusive use of the conversation
    pub async fn lock_turn(&self) -> MutexGuard<'_, ()> {
        self.turn_lock.lock().await
    }

    pub async fn touch(&self) {
        let mut state = self.state.lock().await;
        state.last_seen = Instant::now();
        state.last_activity = Utc::now();
    }

    pub async fn last_seen(&self) -> Instant {
        self.state.lock().await.last_seen
    }

    pub async fn record_turn(&self, turn: Turn) {
        let mut state = self.state.lock().await;
        state.history.push(turn);
        debug!(session_id = %self.id, turns = state.history.len(), "Session::record_turn: recorded");
    }

    /// Turns in the order they were recorded
    pub async fn history(&self) -> Vec<Turn> {
        self.state.lock().await.history.clone()
    }

    pub async fn set_contact(&self, contact: Contact) {
        self.state.lock().await.contact = Some(contact);
    }

    pub async fn contact(&self) -> Option<Contact> {
        self.state.lock().await.contact.clone()
    }

    /// Install a new inactivity timer, aborting the previous one
    pub async fn replace_timer(&self, timer: JoinHandle<()>) {
        let mut state = self.state.lock().await;
        if let Some(previous) = state.timer.replace(timer) {
            previous.abort();
        }
    }

    pub async fn cancel_timer(&self) {
        if let Some(timer) = self.state.lock().await.timer.take() {
            debug!(session_id = %self.id, "Session::cancel_timer: aborting timer");
            timer.abort();
        }
    }

    /// Mark the session torn down and stop its timer
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn info(&self) -> SessionInfo {
        let state = self.state.lock().await;
        SessionInfo {
            id: self.id.clone(),
            created_at: self.created_at,
            last_activity: state.last_activity,
            turns: state.history.len(),
            conversation: self.conversation(),
            contact: state.contact.clone(),
        }
    }
}
