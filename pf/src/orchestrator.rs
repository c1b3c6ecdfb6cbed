//! Session-scoped generation orchestrator
//!
//! The surface an HTTP layer or the CLI talks to. It owns the session
//! registry, runs the generation pipeline under each session's turn lock and
//! keeps the inactivity monitor and the housekeeper in step.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, eyre};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::assistant::{self, AssistantGateway};
use crate::config::Config;
use crate::pipeline::{GeneratedDiagram, GenerationError, GenerationPipeline};
use crate::render::Renderer;
use crate::report::{Report, ReportError, Reporter};
use crate::retry::RetryPolicy;
use crate::session::{Contact, InactivityExpired, InactivityMonitor, SessionInfo, SessionRegistry, Turn};
use crate::validation::Validator;

pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    pipeline: GenerationPipeline,
    monitor: InactivityMonitor,
    reporter: Arc<Reporter>,
    sweep_interval: Duration,
    expired_rx: Mutex<Option<mpsc::UnboundedReceiver<InactivityExpired>>>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<AssistantGateway>, renderer: Renderer, reporter: Arc<Reporter>, config: &Config) -> Self {
        debug!("Orchestrator::new: called");
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(SessionRegistry::new(gateway.clone(), config.sessions.ttl()));
        let pipeline = GenerationPipeline::new(
            gateway,
            Validator::from_config(&config.generation),
            renderer,
            RetryPolicy::from_config(&config.generation),
        );
        let monitor = InactivityMonitor::new(config.sessions.inactivity(), reporter.clone(), expired_tx);

        Self {
            registry,
            pipeline,
            monitor,
            reporter,
            sweep_interval: config.sessions.sweep_interval(),
            expired_rx: Mutex::new(Some(expired_rx)),
        }
    }

    /// Build the orchestrator with the real assistant, renderer and mailer
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("Orchestrator::from_config: called");
        let client = assistant::create_client(&config.assistant)?;
        let gateway = Arc::new(AssistantGateway::from_config(client, &config.assistant));
        let renderer = Renderer::from_config(&config.renderer)?;
        let reporter = Arc::new(Reporter::from_config(&config.report));
        Ok(Self::new(gateway, renderer, reporter, config))
    }

    /// Start a new session and return its id
    pub async fn init_session(&self) -> String {
        let session_id = SessionRegistry::mint_id();
        self.registry.entry(&session_id).await;
        debug!(%session_id, "Orchestrator::init_session: created");
        session_id
    }

    /// Run one conversation turn
    ///
    /// Unknown ids start a new session. Turns on the same session are
    /// serialized; dropping the returned future abandons the turn.
    pub async fn converse(&self, session_id: &str, prompt: &str) -> Result<GeneratedDiagram, GenerationError> {
        debug!(%session_id, prompt_len = prompt.len(), "Orchestrator::converse: called");
        if session_id.trim().is_empty() {
            return Err(GenerationError::SessionNotFound(session_id.to_string()));
        }

        let session = self.registry.entry(session_id).await;
        let _turn = session.lock_turn().await;
        if session.is_closed().await {
            debug!(%session_id, "Orchestrator::converse: session closed while waiting");
            return Err(GenerationError::SessionNotFound(session_id.to_string()));
        }
        session.touch().await;

        let diagram = self.pipeline.run(&session, prompt).await?;
        session
            .record_turn(Turn::new(prompt, diagram.source.clone(), diagram.png.clone()))
            .await;
        self.monitor.reset(&session).await;
        Ok(diagram)
    }

    /// End a session and delete its remote conversation
    pub async fn end_session(&self, session_id: &str) -> Result<(), GenerationError> {
        debug!(%session_id, "Orchestrator::end_session: called");
        self.registry
            .remove(session_id)
            .await
            .map(|_| ())
            .ok_or_else(|| GenerationError::SessionNotFound(session_id.to_string()))
    }

    /// Record who the session's reports go to
    pub async fn set_contact(&self, session_id: &str, name: &str, email: &str) -> Result<(), GenerationError> {
        debug!(%session_id, "Orchestrator::set_contact: called");
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| GenerationError::SessionNotFound(session_id.to_string()))?;
        session
            .set_contact(Contact {
                name: name.to_string(),
                email: email.to_string(),
            })
            .await;
        Ok(())
    }

    /// Send the session's report now
    pub async fn email_report(&self, session_id: &str) -> Result<(), ReportError> {
        debug!(%session_id, "Orchestrator::email_report: called");
        let session = self
            .registry
            .get(session_id)
            .await
            .ok_or_else(|| ReportError::SessionNotFound(session_id.to_string()))?;

        let report = Report::from_session(&session).await;
        if report.is_empty() {
            return Err(ReportError::NothingToReport(session_id.to_string()));
        }
        self.reporter.send(&report).await?;
        info!(%session_id, pages = report.pages.len(), "Report sent on request");
        Ok(())
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.list().await
    }

    /// Remove sessions idle past the TTL
    pub async fn sweep_expired(&self) -> Vec<String> {
        let removed = self.registry.sweep_expired().await;
        if !removed.is_empty() {
            info!(count = removed.len(), "Swept expired sessions");
        }
        removed
    }

    /// Housekeeping loop: periodic sweeps and teardown after inactivity reports
    ///
    /// Runs until a shutdown signal arrives, then ends every session.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        debug!("Orchestrator::run: called");
        if self.sweep_interval.is_zero() {
            return Err(eyre!("sweep interval must be greater than zero"));
        }
        let mut expired_rx = self
            .expired_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| eyre!("housekeeper is already running"))?;
        info!(sweep_interval = ?self.sweep_interval, "Housekeeper starting");

        let mut interval = tokio::time::interval(self.sweep_interval);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                Some(expired) = expired_rx.recv() => {
                    debug!(session_id = %expired.session_id, "run: inactivity report emitted");
                    if self.registry.remove_if_idle(&expired.session_id, expired.last_seen).await {
                        info!(session_id = %expired.session_id, "Inactive session torn down");
                    }
                }

                _ = interval.tick() => {
                    self.sweep_expired().await;
                }

                _ = shutdown_rx.recv() => {
                    debug!("run: shutdown signal received");
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
        debug!("run: complete");
        Ok(())
    }

    /// End every live session
    pub async fn shutdown(&self) {
        let sessions = self.registry.list().await;
        debug!(count = sessions.len(), "Orchestrator::shutdown: called");
        for info in sessions {
            if self.registry.remove(&info.id).await.is_none() {
                warn!(session_id = %info.id, "Session vanished during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::client::mock::{MockAssistantClient, MockReply};
    use crate::pipeline::AttemptFailure;
    use crate::prompts::PromptLoader;
    use crate::render::Rasterizer;
    use crate::render::service::mock::MockDiagramService;
    use crate::report::mock::RecordingDispatcher;

    const VALID: &str = "@startuml\nstart\n:Approve order;\nstop\n@enduml";
    const NO_END: &str = "@startuml\nstart\n:Approve order;\nstop";

    struct Fixture {
        orchestrator: Arc<Orchestrator>,
        client: Arc<MockAssistantClient>,
        dispatcher: Arc<RecordingDispatcher>,
    }

    fn fixture(client: MockAssistantClient) -> Fixture {
        let mut config = Config::default();
        config.report.default_recipient = Some("ops@example.com".to_string());
        fixture_with(client, &config)
    }

    fn fixture_with(client: MockAssistantClient, config: &Config) -> Fixture {
        let client = Arc::new(client);
        let gateway = Arc::new(AssistantGateway::new(
            client.clone(),
            PromptLoader::embedded_only(),
            config.assistant.poll_interval(),
            config.assistant.run_timeout(),
        ));
        let renderer = Renderer::new(Arc::new(MockDiagramService::new(vec![])), Rasterizer::new(300.0, 2.0));
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let reporter = Arc::new(Reporter::new(dispatcher.clone(), config.report.clone()));

        Fixture {
            orchestrator: Arc::new(Orchestrator::new(gateway, renderer, reporter, config)),
            client,
            dispatcher,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_converse_end_to_end() {
        let fx = fixture(MockAssistantClient::new(vec![MockReply::Text(VALID.into())]));
        let id = fx.orchestrator.init_session().await;

        let diagram = fx.orchestrator.converse(&id, "order approval process").await.unwrap();

        assert!(!diagram.png.is_empty());
        let sessions = fx.orchestrator.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].turns, 1);
        assert_eq!(sessions[0].conversation.as_ref(), Some(&diagram.conversation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_keep_session() {
        let fx = fixture(MockAssistantClient::always(MockReply::Text(NO_END.into())));
        let id = fx.orchestrator.init_session().await;

        let err = fx.orchestrator.converse(&id, "order approval process").await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::ExhaustedRetries {
                attempts: 3,
                last: AttemptFailure::Rejected(_)
            }
        ));
        assert_eq!(fx.client.runs_started(), 3);

        let handle = fx.orchestrator.sessions().await[0].conversation.clone();
        assert!(handle.is_some());
        assert_eq!(fx.orchestrator.sessions().await[0].turns, 0);

        // Same handle on the next turn
        let _ = fx.orchestrator.converse(&id, "again").await;
        assert_eq!(fx.orchestrator.sessions().await[0].conversation, handle);
        assert_eq!(fx.client.conversations_created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_turns_on_one_session_are_serialized() {
        let fx = fixture(MockAssistantClient::always(MockReply::Text(VALID.into())).with_pending_polls(2));
        let id = fx.orchestrator.init_session().await;
        let started = tokio::time::Instant::now();

        let (a, b) = tokio::join!(
            fx.orchestrator.converse(&id, "first"),
            fx.orchestrator.converse(&id, "second"),
        );
        a.unwrap();
        b.unwrap();

        // Each turn waits two 2s polls; overlapping turns would finish in 4s
        assert_eq!(started.elapsed(), Duration::from_secs(8));
        assert_eq!(fx.orchestrator.sessions().await[0].turns, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_session_errors() {
        let fx = fixture(MockAssistantClient::new(vec![]));

        assert!(matches!(
            fx.orchestrator.end_session("missing").await,
            Err(GenerationError::SessionNotFound(_))
        ));
        assert!(matches!(
            fx.orchestrator.set_contact("missing", "Ana", "ana@example.com").await,
            Err(GenerationError::SessionNotFound(_))
        ));
        assert!(matches!(
            fx.orchestrator.email_report("missing").await,
            Err(ReportError::SessionNotFound(_))
        ));
        assert!(matches!(
            fx.orchestrator.converse(" ", "x").await,
            Err(GenerationError::SessionNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_session_deletes_conversation() {
        let fx = fixture(MockAssistantClient::always(MockReply::Text(VALID.into())));
        let id = fx.orchestrator.init_session().await;
        let diagram = fx.orchestrator.converse(&id, "x").await.unwrap();

        fx.orchestrator.end_session(&id).await.unwrap();

        assert!(fx.orchestrator.sessions().await.is_empty());
        assert_eq!(fx.client.deleted(), vec![diagram.conversation]);

        // Timer was cancelled with the session
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(fx.dispatcher.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_email_report_on_demand() {
        let fx = fixture(MockAssistantClient::always(MockReply::Text(VALID.into())));
        let id = fx.orchestrator.init_session().await;

        assert!(matches!(
            fx.orchestrator.email_report(&id).await,
            Err(ReportError::NothingToReport(_))
        ));

        fx.orchestrator.converse(&id, "order approval").await.unwrap();
        fx.orchestrator.set_contact(&id, "Ana", "ana@example.com").await.unwrap();
        fx.orchestrator.email_report(&id).await.unwrap();

        let sent = fx.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "ana@example.com");
        assert_eq!(sent[0].attachments.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_reports_then_tears_down() {
        let fx = fixture(MockAssistantClient::always(MockReply::Text(VALID.into())));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let housekeeper = {
            let orchestrator = fx.orchestrator.clone();
            tokio::spawn(async move { orchestrator.run(shutdown_rx).await })
        };

        let id = fx.orchestrator.init_session().await;
        fx.orchestrator.converse(&id, "first").await.unwrap();
        fx.orchestrator.converse(&id, "second").await.unwrap();

        tokio::time::sleep(Duration::from_secs(599)).await;
        assert!(fx.dispatcher.sent().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let sent = fx.dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].attachments.len(), 2);
        assert!(fx.orchestrator.sessions().await.is_empty());
        assert_eq!(fx.client.deleted().len(), 1);

        shutdown_tx.send(()).await.unwrap();
        housekeeper.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_housekeeper_sweeps_and_shuts_down() {
        let fx = fixture(MockAssistantClient::new(vec![]));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let housekeeper = {
            let orchestrator = fx.orchestrator.clone();
            tokio::spawn(async move { orchestrator.run(shutdown_rx).await })
        };

        fx.orchestrator.init_session().await;
        // Default TTL is a day, swept on the hourly tick after it passes
        tokio::time::sleep(Duration::from_secs(25 * 60 * 60 + 1)).await;
        assert!(fx.orchestrator.sessions().await.is_empty());

        fx.orchestrator.init_session().await;
        shutdown_tx.send(()).await.unwrap();
        housekeeper.await.unwrap().unwrap();
        assert!(fx.orchestrator.sessions().await.is_empty());
        assert!(fx.orchestrator.run(mpsc::channel(1).1).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_housekeeper_rejects_zero_sweep_interval() {
        let mut config = Config::default();
        config.sessions.sweep_interval_secs = 0;
        let fx = fixture_with(MockAssistantClient::new(vec![]), &config);

        let err = fx.orchestrator.run(mpsc::channel(1).1).await.unwrap_err();
        assert!(err.to_string().contains("sweep interval"));
    }
}
