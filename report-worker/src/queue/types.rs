//! Queue message types for the notification queue.
//!
//! Every message on the queue is one [`NotificationJob`] encoded as JSON. The
//! `kind` field selects the variant, and each variant carries exactly the
//! payload shape it needs:
//!
//! ```json
//! { "kind": "EMAIL", "to": "a@b.c", "subject": "Hi", "body": "Hello" }
//! { "kind": "RESULT_REPORT", "to": "a@b.c", "subject": "Results",
//!   "payload": { "name": "..", "username": "..", "branch": "..",
//!                "semesterId": "..", "campus": "..", "grades": [..] } }
//! ```

use serde::{Deserialize, Serialize};

/// Default queue name for notification jobs.
pub const NOTIFICATION_QUEUE: &str = "notifications";

/// One unit of work pulled from the notification queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationJob {
    /// Plain templated email, no rendering involved.
    Email(EmailJob),
    /// Grade report rendered to PDF and attached.
    ResultReport(ReportJob<ResultPayload>),
    /// Attendance report rendered to PDF and attached.
    AttendanceReport(ReportJob<AttendancePayload>),
}

impl NotificationJob {
    /// Wire name of the job kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationJob::Email(_) => "EMAIL",
            NotificationJob::ResultReport(_) => "RESULT_REPORT",
            NotificationJob::AttendanceReport(_) => "ATTENDANCE_REPORT",
        }
    }

    /// Recipient address.
    pub fn recipient(&self) -> &str {
        match self {
            NotificationJob::Email(job) => &job.to,
            NotificationJob::ResultReport(job) => &job.to,
            NotificationJob::AttendanceReport(job) => &job.to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    /// Plain body, wrapped in the default template when `html` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Complete HTML body, sent as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportJob<P> {
    pub to: String,
    pub subject: String,
    pub payload: P,
}

/// Identity block shared by both report payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub name: String,
    pub username: String,
    pub branch: String,
    pub semester_id: String,
    pub campus: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(flatten)]
    pub student: StudentInfo,
    #[serde(default)]
    pub grades: Vec<GradeEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendancePayload {
    #[serde(flatten)]
    pub student: StudentInfo,
    #[serde(default)]
    pub records: Vec<AttendanceEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub subject_name: String,
    pub subject_code: String,
    pub credits: f64,
    pub grade_point: f64,
}

/// Callers guarantee `attended_classes <= total_classes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub subject_name: String,
    pub subject_code: String,
    pub attended_classes: u32,
    pub total_classes: u32,
}
