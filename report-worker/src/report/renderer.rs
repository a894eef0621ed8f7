//! Report rendering: compose, template, print.

use std::sync::Arc;

use tracing::info;

use crate::queue::{AttendancePayload, ResultPayload, StudentInfo};
use crate::render::{render_pdf, LaunchPolicy, PdfOptions, RenderEngine, RenderError};
use crate::report::composer::{compose_attendance, compose_result};
use crate::report::template::ReportTemplates;

/// Which report a document holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Result,
    Attendance,
}

impl ReportKind {
    /// Human name used in filenames and email copy.
    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::Result => "result",
            ReportKind::Attendance => "attendance",
        }
    }
}

/// A rendered PDF and the name it should be attached under.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Attachment filename for a student's report, e.g. `r200123_E2-Sem-1_result.pdf`.
pub fn report_filename(student: &StudentInfo, kind: ReportKind) -> String {
    format!(
        "{}_{}_{}.pdf",
        sanitize(&student.username),
        sanitize(&student.semester_id),
        kind.label()
    )
}

fn sanitize(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Produces report PDFs. One browser is launched per document.
pub struct ReportRenderer {
    engine: Arc<dyn RenderEngine>,
    templates: ReportTemplates,
    policy: LaunchPolicy,
    options: PdfOptions,
}

impl ReportRenderer {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Result<Self, RenderError> {
        Ok(Self {
            engine,
            templates: ReportTemplates::new()?,
            policy: LaunchPolicy::default(),
            options: PdfOptions::a4(),
        })
    }

    /// Override the launch retry policy.
    pub fn with_policy(mut self, policy: LaunchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub async fn render_result(&self, payload: &ResultPayload) -> Result<RenderedDocument, RenderError> {
        let doc = compose_result(payload);
        info!(
            username = %payload.student.username,
            subjects = doc.rows.len(),
            sgpa = %doc.metrics.sgpa,
            "report_composed"
        );

        let html = self.templates.render_result(&doc)?;
        self.print(&payload.student, ReportKind::Result, &html).await
    }

    pub async fn render_attendance(
        &self,
        payload: &AttendancePayload,
    ) -> Result<RenderedDocument, RenderError> {
        let doc = compose_attendance(payload);
        info!(
            username = %payload.student.username,
            subjects = doc.rows.len(),
            overall_percent = %doc.metrics.overall_percent,
            "report_composed"
        );

        let html = self.templates.render_attendance(&doc)?;
        self.print(&payload.student, ReportKind::Attendance, &html).await
    }

    async fn print(
        &self,
        student: &StudentInfo,
        kind: ReportKind,
        html: &str,
    ) -> Result<RenderedDocument, RenderError> {
        let bytes = render_pdf(self.engine.as_ref(), &self.policy, html, &self.options).await?;
        let filename = report_filename(student, kind);

        info!(filename = %filename, bytes = bytes.len(), "report_rendered");

        Ok(RenderedDocument { filename, bytes })
    }
}
