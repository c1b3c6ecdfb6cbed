//! Per-session inactivity timer

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Session;
use crate::report::{Report, Reporter};

/// Sent once a session's inactivity report went out
#[derive(Debug, Clone)]
pub struct InactivityExpired {
    pub session_id: String,
    /// Activity timestamp the timer was armed for
    pub last_seen: Instant,
}

/// Arms one timer per session; on expiry the session's turns are reported
///
/// A fired timer is not re-armed. Teardown is left to whoever listens on the
/// expiry channel.
pub struct InactivityMonitor {
    period: Duration,
    reporter: Arc<Reporter>,
    expired_tx: mpsc::UnboundedSender<InactivityExpired>,
}

impl InactivityMonitor {
    pub fn new(period: Duration, reporter: Arc<Reporter>, expired_tx: mpsc::UnboundedSender<InactivityExpired>) -> Self {
        debug!(?period, "InactivityMonitor::new: called");
        Self {
            period,
            reporter,
            expired_tx,
        }
    }

    /// Restart the session's timer from now
    pub async fn reset(&self, session: &Arc<Session>) {
        debug!(session_id = %session.id(), "InactivityMonitor::reset: called");
        let last_seen = session.last_seen().await;
        let timer = tokio::spawn(fire(
            self.period,
            session.clone(),
            self.reporter.clone(),
            self.expired_tx.clone(),
            last_seen,
        ));
        session.replace_timer(timer).await;
    }

    pub async fn cancel(&self, session: &Session) {
        session.cancel_timer().await;
    }
}

async fn fire(
    period: Duration,
    session: Arc<Session>,
    reporter: Arc<Reporter>,
    expired_tx: mpsc::UnboundedSender<InactivityExpired>,
    last_seen: Instant,
) {
    tokio::time::sleep(period).await;
    let session_id = session.id().to_string();
    info!(%session_id, "Session inactive, sending report");

    let report = Report::from_session(&session).await;
    if !reporter.enabled() {
        debug!(%session_id, "fire: reports disabled");
    } else if report.is_empty() {
        debug!(%session_id, "fire: nothing to report");
    } else if let Err(e) = reporter.send(&report).await {
        warn!(%session_id, error = %e, "Inactivity report not sent");
    }

    if expired_tx.send(InactivityExpired { session_id, last_seen }).is_err() {
        debug!("fire: expiry channel closed");
    }
}
