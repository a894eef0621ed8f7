//! Campusmail - notification worker for academic reports.
//!
//! The worker consumes notification jobs from RabbitMQ. Plain email jobs are
//! templated and sent. Report jobs are composed, rendered to PDF in a
//! headless browser and sent as an attachment.
//!
//! ## Architecture
//!
//! ```text
//! Queue → JobWorkerPool → NotificationDispatcher → ReportRenderer → RenderEngine
//!                                   ↓
//!                             MailTransport
//! ```

pub mod config;
pub mod dispatch;
pub mod mail;
pub mod queue;
pub mod render;
pub mod report;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DispatchError, DispatchResult, NotificationDispatcher};
pub use mail::{MailTransport, OutgoingMail, SmtpMailer};
pub use queue::{AmqpQueue, JobQueue, NotificationJob, Publisher, NOTIFICATION_QUEUE};
pub use render::{ChromiumEngine, RenderEngine, RenderError};
pub use report::ReportRenderer;
pub use worker::{JobWorkerPool, PoolSummary};
