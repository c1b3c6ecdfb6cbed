//! Report delivery

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::SmtpConfig;

/// Errors from handing a report to its transport
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No recipient for report")]
    NoRecipient,

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Failed to build mail: {0}")]
    Build(String),

    #[error("Transport failed: {0}")]
    Transport(String),
}

/// Binary file carried by a mail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A fully composed message, independent of the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Something that delivers composed mail; succeeds or fails synchronously
#[async_trait]
pub trait ReportDispatcher: Send + Sync {
    async fn dispatch(&self, mail: OutgoingMail) -> Result<(), DispatchError>;
}

/// Delivers mail through an SMTP relay
pub struct SmtpDispatcher {
    config: SmtpConfig,
}

impl SmtpDispatcher {
    pub fn new(config: SmtpConfig) -> Self {
        debug!(host = %config.host, port = config.port, "SmtpDispatcher::new: called");
        Self { config }
    }

    fn transport(config: &SmtpConfig) -> Result<SmtpTransport, DispatchError> {
        let builder = if config.starttls {
            SmtpTransport::starttls_relay(&config.host).map_err(|e| DispatchError::Transport(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&config.host)
        };
        let builder = builder.port(config.port);

        let username = std::env::var(&config.username_env).ok();
        let password = std::env::var(&config.password_env).ok();
        let builder = match (username, password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user, pass)),
            _ => {
                debug!("SmtpDispatcher::transport: no credentials in environment, sending unauthenticated");
                builder
            }
        };
        Ok(builder.build())
    }
}

/// Build the MIME message for a composed mail
pub fn build_message(mail: &OutgoingMail) -> Result<Message, DispatchError> {
    let from: Mailbox = mail
        .sender
        .parse()
        .map_err(|_| DispatchError::InvalidAddress(mail.sender.clone()))?;
    let to: Mailbox = mail
        .recipient
        .parse()
        .map_err(|_| DispatchError::InvalidAddress(mail.recipient.clone()))?;

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
    for attachment in &mail.attachments {
        let content_type =
            ContentType::parse(&attachment.content_type).map_err(|e| DispatchError::Build(e.to_string()))?;
        parts = parts.singlepart(MailAttachment::new(attachment.filename.clone()).body(attachment.data.clone(), content_type));
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(mail.subject.clone())
        .multipart(parts)
        .map_err(|e| DispatchError::Build(e.to_string()))
}

#[async_trait]
impl ReportDispatcher for SmtpDispatcher {
    async fn dispatch(&self, mail: OutgoingMail) -> Result<(), DispatchError> {
        debug!(recipient = %mail.recipient, attachments = mail.attachments.len(), "SmtpDispatcher::dispatch: called");
        let message = build_message(&mail)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let transport = Self::transport(&config)?;
            transport
                .send(&message)
                .map(|_| ())
                .map_err(|e| DispatchError::Transport(e.to_string()))
        })
        .await
        .map_err(|e| DispatchError::Transport(format!("send task failed: {}", e)))??;

        info!("Report sent to {}", mail.recipient);
        Ok(())
    }
}
