//! Session reports
//!
//! A report is one page per recorded turn: the prompt and the image it
//! produced. Reports are composed into mail and handed to a
//! [`ReportDispatcher`].

use std::fmt::Write as _;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

mod dispatch;

pub use dispatch::{Attachment, DispatchError, OutgoingMail, ReportDispatcher, SmtpDispatcher, build_message};

#[cfg(test)]
pub use dispatch::mock;

use crate::config::ReportConfig;
use crate::session::{Contact, Session, Turn};

/// Errors surfaced by on-demand reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session {0} has no diagrams to report")]
    NothingToReport(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// One turn of a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPage {
    pub prompt: String,
    pub png: Vec<u8>,
}

/// Everything a session produced, ready to be mailed
#[derive(Debug, Clone)]
pub struct Report {
    pub session_id: String,
    pub contact: Option<Contact>,
    pub pages: Vec<ReportPage>,
}

impl Report {
    /// Compile turns into pages, keeping their order
    pub fn compile(session_id: impl Into<String>, contact: Option<Contact>, turns: &[Turn]) -> Self {
        let pages = turns
            .iter()
            .map(|t| ReportPage {
                prompt: t.prompt.clone(),
                png: t.png.clone(),
            })
            .collect();
        Self {
            session_id: session_id.into(),
            contact,
            pages,
        }
    }

    pub async fn from_session(session: &Session) -> Self {
        Self::compile(session.id(), session.contact().await, &session.history().await)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Composes reports into mail and dispatches them
pub struct Reporter {
    dispatcher: Arc<dyn ReportDispatcher>,
    config: ReportConfig,
}

impl Reporter {
    pub fn new(dispatcher: Arc<dyn ReportDispatcher>, config: ReportConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(Arc::new(SmtpDispatcher::new(config.smtp.clone())), config.clone())
    }

    /// Whether reports fire on inactivity
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Session contact first, then the operator address
    pub fn recipient(&self, report: &Report) -> Option<String> {
        report
            .contact
            .as_ref()
            .map(|c| c.email.clone())
            .or_else(|| self.config.default_recipient.clone())
    }

    pub fn compose(&self, report: &Report) -> Result<OutgoingMail, DispatchError> {
        debug!(session_id = %report.session_id, pages = report.pages.len(), "Reporter::compose: called");
        let recipient = self.recipient(report).ok_or(DispatchError::NoRecipient)?;

        let greeting = report.contact.as_ref().map(|c| c.name.as_str()).unwrap_or("there");
        let mut body = format!("Hello {},\n\nHere are the process diagrams from your session:\n\n", greeting);
        for (i, page) in report.pages.iter().enumerate() {
            let _ = writeln!(body, "{}. {}", i + 1, page.prompt);
        }

        let attachments = report
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| Attachment {
                filename: format!("procflow-turn-{}.png", i + 1),
                content_type: "image/png".to_string(),
                data: page.png.clone(),
            })
            .collect();

        Ok(OutgoingMail {
            sender: self.config.sender.clone(),
            recipient,
            subject: self.config.subject.clone(),
            body,
            attachments,
        })
    }

    pub async fn send(&self, report: &Report) -> Result<(), DispatchError> {
        debug!(session_id = %report.session_id, "Reporter::send: called");
        let mail = self.compose(report)?;
        self.dispatcher.dispatch(mail).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::RecordingDispatcher;

    fn turns() -> Vec<Turn> {
        vec![
            Turn::new("order approval", "@startuml\n@enduml", vec![1, 2, 3]),
            Turn::new("add a rejection path", "@startuml\n@enduml", vec![4, 5]),
        ]
    }

    fn reporter(dispatcher: Arc<RecordingDispatcher>, default_recipient: Option<&str>) -> Reporter {
        let config = ReportConfig {
            default_recipient: default_recipient.map(String::from),
            ..ReportConfig::default()
        };
        Reporter::new(dispatcher, config)
    }

    #[test]
    fn test_compile_one_page_per_turn_in_order() {
        let report = Report::compile("s1", None, &turns());
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages[0].prompt, "order approval");
        assert_eq!(report.pages[1].png, vec![4, 5]);
    }

    #[test]
    fn test_compose_prefers_contact() {
        let contact = Contact {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
        };
        let report = Report::compile("s1", Some(contact), &turns());
        let mail = reporter(Arc::new(RecordingDispatcher::new()), Some("ops@example.com"))
            .compose(&report)
            .unwrap();

        assert_eq!(mail.recipient, "ana@example.com");
        assert!(mail.body.starts_with("Hello Ana,"));
        assert!(mail.body.contains("2. add a rejection path"));
        let names: Vec<_> = mail.attachments.iter().map(|a| a.filename.as_str()).collect();
        assert_eq!(names, vec!["procflow-turn-1.png", "procflow-turn-2.png"]);
    }

    #[test]
    fn test_compose_without_recipient() {
        let report = Report::compile("s1", None, &turns());
        let err = reporter(Arc::new(RecordingDispatcher::new()), None)
            .compose(&report)
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoRecipient));
    }

    #[tokio::test]
    async fn test_send_dispatches_once() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let report = Report::compile("s1", None, &turns());
        reporter(dispatcher.clone(), Some("ops@example.com"))
            .send(&report)
            .await
            .unwrap();

        let sent = dispatcher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "ops@example.com");
        assert!(sent[0].body.starts_with("Hello there,"));
    }
}
