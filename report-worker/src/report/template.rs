//! Report markup.
//!
//! Composed documents are rendered through handlebars templates compiled into
//! the binary. The output is a complete, self-contained HTML page: all styles
//! are inline and nothing needs to be fetched or executed before printing.

use handlebars::Handlebars;

use crate::render::RenderError;
use crate::report::composer::{AttendanceDocument, ResultDocument};

const BASE: &str = "report_base";
const RESULT: &str = "result_report";
const ATTENDANCE: &str = "attendance_report";

/// Compiled report templates.
pub struct ReportTemplates {
    handlebars: Handlebars<'static>,
}

impl ReportTemplates {
    /// Compile the bundled report templates.
    pub fn new() -> Result<Self, RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);

        handlebars
            .register_partial(BASE, include_str!("../../templates/report_base.hbs"))
            .map_err(|e| RenderError::Template(e.to_string()))?;
        handlebars
            .register_template_string(RESULT, include_str!("../../templates/result_report.hbs"))
            .map_err(|e| RenderError::Template(e.to_string()))?;
        handlebars
            .register_template_string(
                ATTENDANCE,
                include_str!("../../templates/attendance_report.hbs"),
            )
            .map_err(|e| RenderError::Template(e.to_string()))?;

        Ok(Self { handlebars })
    }

    pub fn render_result(&self, doc: &ResultDocument) -> Result<String, RenderError> {
        self.handlebars
            .render(RESULT, doc)
            .map_err(|e| RenderError::Template(e.to_string()))
    }

    pub fn render_attendance(&self, doc: &AttendanceDocument) -> Result<String, RenderError> {
        self.handlebars
            .render(ATTENDANCE, doc)
            .map_err(|e| RenderError::Template(e.to_string()))
    }
}
