//! Job dispatch - routes a notification job to the right delivery path.
//!
//! ```text
//! EMAIL             → templated email
//! RESULT_REPORT     → ReportRenderer → email + PDF attachment
//! ATTENDANCE_REPORT → ReportRenderer → email + PDF attachment
//! ```
//!
//! A job either sends exactly one message or fails as a whole. If rendering
//! fails, nothing is sent.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::mail::{EmailTemplates, MailAttachment, MailError, MailTransport, OutgoingMail};
use crate::queue::{EmailJob, NotificationJob, ReportJob, StudentInfo};
use crate::render::RenderError;
use crate::report::{RenderedDocument, ReportKind, ReportRenderer};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Outcome of a successfully dispatched job.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub to: String,
    pub attachment: Option<String>,
}

pub struct NotificationDispatcher {
    mailer: Arc<dyn MailTransport>,
    renderer: ReportRenderer,
    templates: EmailTemplates,
    from: String,
}

impl NotificationDispatcher {
    pub fn new(
        mailer: Arc<dyn MailTransport>,
        renderer: ReportRenderer,
        from: impl Into<String>,
    ) -> Result<Self, MailError> {
        Ok(Self {
            mailer,
            renderer,
            templates: EmailTemplates::new()?,
            from: from.into(),
        })
    }

    /// Process one job. Errors are logged here with the job id and returned
    /// unchanged so the caller can fail the delivery.
    pub async fn dispatch(
        &self,
        job_id: &str,
        job: &NotificationJob,
    ) -> Result<DispatchResult, DispatchError> {
        info!(
            job_id = %job_id,
            kind = job.kind(),
            to = %job.recipient(),
            "dispatch_start"
        );

        let result = self.deliver(job).await;

        match &result {
            Ok(outcome) => info!(
                job_id = %job_id,
                kind = job.kind(),
                to = %outcome.to,
                attachment = ?outcome.attachment,
                "dispatch_complete"
            ),
            Err(e) => error!(
                job_id = %job_id,
                kind = job.kind(),
                to = %job.recipient(),
                error = %e,
                "dispatch_failed"
            ),
        }

        result
    }

    async fn send_email(&self, job: &EmailJob) -> Result<DispatchResult, DispatchError> {
        let html = match &job.html {
            Some(html) => html.clone(),
            None => self
                .templates
                .default_email(job.body.as_deref().unwrap_or_default())?,
        };

        let mail = OutgoingMail {
            from: self.from.clone(),
            to: job.to.clone(),
            subject: job.subject.clone(),
            html,
            attachments: Vec::new(),
        };
        self.mailer.send(&mail).await?;

        Ok(DispatchResult {
            to: job.to.clone(),
            attachment: None,
        })
    }

    async fn deliver(&self, job: &NotificationJob) -> Result<DispatchResult, DispatchError> {
        match job {
            NotificationJob::Email(email) => self.send_email(email).await,
            NotificationJob::ResultReport(report) => {
                let document = self.renderer.render_result(&report.payload).await?;
                self.send_report(report, &report.payload.student, ReportKind::Result, document)
                    .await
            }
            NotificationJob::AttendanceReport(report) => {
                let document = self.renderer.render_attendance(&report.payload).await?;
                self.send_report(report, &report.payload.student, ReportKind::Attendance, document)
                    .await
            }
        }
    }

    async fn send_report<P: Sync>(
        &self,
        job: &ReportJob<P>,
        student: &StudentInfo,
        kind: ReportKind,
        document: RenderedDocument,
    ) -> Result<DispatchResult, DispatchError> {
        let html = self.templates.report_notification(student, kind)?;

        let mail = OutgoingMail {
            from: self.from.clone(),
            to: job.to.clone(),
            subject: job.subject.clone(),
            html,
            attachments: vec![MailAttachment::pdf(document.filename.clone(), document.bytes)],
        };
        self.mailer.send(&mail).await?;

        Ok(DispatchResult {
            to: job.to.clone(),
            attachment: Some(document.filename),
        })
    }
}
