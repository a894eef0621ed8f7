//! Outbound mail: message type, transport trait and the SMTP implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, SmtpSecurity};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("template error: {0}")]
    Template(String),

    /// The relay rejected the message or could not be reached.
    #[error("send failed: {0}")]
    Send(String),
}

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq)]
pub struct MailAttachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl MailAttachment {
    pub fn pdf(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
            content_type: "application/pdf".to_string(),
        }
    }
}

/// An HTML email ready to hand to a [`MailTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<MailAttachment>,
}

/// Something that can deliver an [`OutgoingMail`].
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// SMTP transport backed by a pooled lettre connection.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    pub fn from_config(config: &Config) -> Result<Self, MailError> {
        let mut builder = match config.smtp_security {
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| MailError::Send(e.to_string()))?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .map_err(|e| MailError::Send(e.to_string()))?
            }
        };

        builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.smtp_timeout_secs)));

        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: Arc::new(builder.build()),
        })
    }
}

/// Convert an [`OutgoingMail`] into a lettre message.
///
/// Without attachments the message is a single HTML part. With attachments
/// it is multipart/mixed: the HTML body first, then one part per file.
pub fn build_message(mail: &OutgoingMail) -> Result<Message, MailError> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|_| MailError::InvalidAddress(mail.from.clone()))?;
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|_| MailError::InvalidAddress(mail.to.clone()))?;

    let builder = Message::builder().from(from).to(to).subject(&mail.subject);
    let body = SinglePart::html(mail.html.clone());

    if mail.attachments.is_empty() {
        return builder
            .singlepart(body)
            .map_err(|e| MailError::Build(e.to_string()));
    }

    let mut parts = MultiPart::mixed().singlepart(body);
    for attachment in &mail.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|e| MailError::Build(format!("{}: {}", attachment.content_type, e)))?;
        parts = parts.singlepart(
            Attachment::new(attachment.filename.clone()).body(attachment.content.clone(), content_type),
        );
    }

    builder
        .multipart(parts)
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = build_message(mail)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| MailError::Send(e.to_string()))?;

        debug!(to = %mail.to, code = %response.code(), "smtp_message_accepted");
        Ok(())
    }
}
