//! Email composition and delivery.

pub mod templates;
pub mod transport;

pub use templates::EmailTemplates;
pub use transport::{build_message, MailAttachment, MailError, MailTransport, OutgoingMail, SmtpMailer};
