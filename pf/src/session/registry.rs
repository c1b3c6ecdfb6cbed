//! Session registry implementation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Session, SessionInfo};
use crate::assistant::{AssistantError, AssistantGateway, ConversationHandle};

/// Internal state protected by mutex
struct RegistryInner {
    sessions: HashMap<String, Arc<Session>>,
}

/// Owns every live session
///
/// All changes to the session map happen under one lock. Conversation
/// handles are created through the session's own once-cell, so concurrent
/// first requests for an id share one handle.
pub struct SessionRegistry {
    gateway: Arc<AssistantGateway>,
    ttl: Duration,
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(gateway: Arc<AssistantGateway>, ttl: Duration) -> Self {
        debug!(?ttl, "SessionRegistry::new: called");
        Self {
            gateway,
            ttl,
            inner: Mutex::new(RegistryInner {
                sessions: HashMap::new(),
            }),
        }
    }

    /// Mint a random session id
    pub fn mint_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Look up a session, creating the entry if absent
    pub async fn entry(&self, session_id: &str) -> Arc<Session> {
        let mut inner = self.inner.lock().await;
        if let Some(session) = inner.sessions.get(session_id) {
            return session.clone();
        }
        debug!(%session_id, "SessionRegistry::entry: creating session");
        let session = Arc::new(Session::new(session_id));
        inner.sessions.insert(session_id.to_string(), session.clone());
        info!(%session_id, "Session created");
        session
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner.lock().await.sessions.get(session_id).cloned()
    }

    /// Return the session's conversation handle, creating session and handle as needed
    pub async fn get_or_create(&self, session_id: &str) -> Result<ConversationHandle, AssistantError> {
        debug!(%session_id, "SessionRegistry::get_or_create: called");
        let session = self.entry(session_id).await;
        session.touch().await;
        session.conversation_or_open(&self.gateway).await
    }

    /// Refresh a session's activity timestamp; false if unknown
    pub async fn touch(&self, session_id: &str) -> bool {
        match self.get(session_id).await {
            Some(session) => {
                session.touch().await;
                true
            }
            None => false,
        }
    }

    /// Remove a session and tear it down
    pub async fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        debug!(%session_id, "SessionRegistry::remove: called");
        let session = self.inner.lock().await.sessions.remove(session_id)?;
        self.teardown(&session).await;
        Some(session)
    }

    /// Remove a session only if it saw no activity after `seen`
    pub async fn remove_if_idle(&self, session_id: &str, seen: Instant) -> bool {
        debug!(%session_id, "SessionRegistry::remove_if_idle: called");
        let session = {
            let mut inner = self.inner.lock().await;
            let Some(session) = inner.sessions.get(session_id) else {
                return false;
            };
            if session.last_seen().await > seen {
                debug!(%session_id, "SessionRegistry::remove_if_idle: active again, keeping");
                return false;
            }
            match inner.sessions.remove(session_id) {
                Some(session) => session,
                None => return false,
            }
        };
        self.teardown(&session).await;
        true
    }

    /// Remove every session idle for longer than the TTL
    pub async fn sweep_expired(&self) -> Vec<String> {
        debug!("SessionRegistry::sweep_expired: called");
        let now = Instant::now();
        let expired = {
            let mut inner = self.inner.lock().await;
            let mut ids = Vec::new();
            for (id, session) in &inner.sessions {
                if now.duration_since(session.last_seen().await) >= self.ttl {
                    ids.push(id.clone());
                }
            }
            ids.into_iter()
                .filter_map(|id| inner.sessions.remove(&id))
                .collect::<Vec<_>>()
        };

        for session in &expired {
            info!(session_id = %session.id(), "Session expired");
            self.teardown(session).await;
        }
        expired.iter().map(|s| s.id().to_string()).collect()
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<_> = self.inner.lock().await.sessions.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        infos
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Wait out any in-flight turn, stop the timer and drop the remote conversation
    async fn teardown(&self, session: &Session) {
        debug!(session_id = %session.id(), "SessionRegistry::teardown: called");
        let _turn = session.lock_turn().await;
        session.close().await;

        if let Some(handle) = session.conversation() {
            if let Err(e) = self.gateway.close_conversation(&handle).await {
                warn!(session_id = %session.id(), conversation = %handle, error = %e, "Failed to delete remote conversation");
            }
        }
        info!(session_id = %session.id(), "Session removed");
    }
}
