//! Report generation.
//!
//! ```text
//! ReportPayload → composer → template → RenderEngine → RenderedDocument
//! ```

pub mod composer;
pub mod renderer;
pub mod template;
pub mod title;

pub use composer::{compose_attendance, compose_result, letter_grade, AttendanceDocument, ResultDocument};
pub use renderer::{report_filename, RenderedDocument, ReportKind, ReportRenderer};
pub use template::ReportTemplates;
pub use title::derive_result_title;
