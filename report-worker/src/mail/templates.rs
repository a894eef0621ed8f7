//! Email body templates.

use handlebars::Handlebars;
use serde_json::json;

use super::MailError;
use crate::queue::StudentInfo;
use crate::report::ReportKind;

const LAYOUT: &str = "email_layout";
const REPORT_NOTIFICATION: &str = "report_notification";

pub struct EmailTemplates {
    handlebars: Handlebars<'static>,
}

impl EmailTemplates {
    pub fn new() -> Result<Self, MailError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        handlebars
            .register_template_string(LAYOUT, include_str!("../../templates/email_layout.hbs"))
            .map_err(|e| MailError::Template(e.to_string()))?;
        handlebars
            .register_template_string(
                REPORT_NOTIFICATION,
                include_str!("../../templates/report_notification.hbs"),
            )
            .map_err(|e| MailError::Template(e.to_string()))?;

        Ok(Self { handlebars })
    }

    /// Wrap already-rendered HTML in the standard email layout.
    pub fn layout(&self, content_html: &str) -> Result<String, MailError> {
        self.handlebars
            .render(LAYOUT, &json!({ "content": content_html }))
            .map_err(|e| MailError::Template(e.to_string()))
    }

    /// Default body for a plain `EMAIL` job without its own HTML.
    ///
    /// The text is inserted verbatim as one paragraph.
    pub fn default_email(&self, body: &str) -> Result<String, MailError> {
        self.layout(&format!("<p>{}</p>", body))
    }

    /// Body of the email that carries a report attachment.
    pub fn report_notification(
        &self,
        student: &StudentInfo,
        kind: ReportKind,
    ) -> Result<String, MailError> {
        let report = match kind {
            ReportKind::Result => "semester result report",
            ReportKind::Attendance => "attendance report",
        };

        let content = self
            .handlebars
            .render(
                REPORT_NOTIFICATION,
                &json!({
                    "name": student.name,
                    "report": report,
                    "semester_id": student.semester_id,
                }),
            )
            .map_err(|e| MailError::Template(e.to_string()))?;

        self.layout(&content)
    }
}
