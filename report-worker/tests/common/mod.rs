//! In-memory stand-ins for the broker, the SMTP relay and the browser.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use campusmail::mail::{MailError, MailTransport, OutgoingMail};
use campusmail::queue::{
    AttendanceEntry, AttendancePayload, Delivery, DeliveryAcker, EmailJob, GradeEntry, JobQueue,
    NotificationJob, QueueError, ReportJob, ResultPayload, StudentInfo,
};
use campusmail::render::{
    BrowserHandle, BrowserSession, LaunchError, PdfOptions, RenderEngine, RenderError,
};

// =============================================================================
// Queue
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Completed,
    Failed { requeue: bool },
}

pub type AckLog = Arc<Mutex<Vec<(String, Ack)>>>;

struct RecordingAcker {
    id: String,
    log: AckLog,
}

#[async_trait]
impl DeliveryAcker for RecordingAcker {
    async fn complete(&self) -> Result<(), QueueError> {
        self.log.lock().unwrap().push((self.id.clone(), Ack::Completed));
        Ok(())
    }

    async fn fail(&self, requeue: bool) -> Result<(), QueueError> {
        self.log
            .lock()
            .unwrap()
            .push((self.id.clone(), Ack::Failed { requeue }));
        Ok(())
    }
}

/// Queue that hands out a fixed list of deliveries, then closes.
pub struct MemoryQueue {
    pending: VecDeque<Delivery>,
    pub acks: AckLog,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            acks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&mut self, id: &str, job: NotificationJob) {
        self.push_result(id, Ok(job));
    }

    pub fn push_raw(&mut self, id: &str, body: &str) {
        let job = serde_json::from_str::<NotificationJob>(body).map_err(QueueError::from);
        self.push_result(id, job);
    }

    fn push_result(&mut self, id: &str, job: Result<NotificationJob, QueueError>) {
        self.pending.push_back(Delivery {
            id: id.to_string(),
            redelivered: false,
            job,
            acker: Box::new(RecordingAcker {
                id: id.to_string(),
                log: Arc::clone(&self.acks),
            }),
        });
    }

    pub fn acks(&self) -> Vec<(String, Ack)> {
        self.acks.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, QueueError>> {
        self.pending.pop_front().map(Ok)
    }
}

/// Queue that never delivers anything.
pub struct IdleQueue;

#[async_trait]
impl JobQueue for IdleQueue {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, QueueError>> {
        futures::future::pending().await
    }
}

/// Queue whose broker connection is broken: every pull is an error.
#[derive(Default)]
pub struct BrokenQueue {
    pub pulls: usize,
}

#[async_trait]
impl JobQueue for BrokenQueue {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, QueueError>> {
        self.pulls += 1;
        Some(Err(QueueError::Broker("channel closed".to_string())))
    }
}

// =============================================================================
// Mail
// =============================================================================

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub delay: Option<Duration>,
    pub fail_with: Option<String>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(reason) = &self.fail_with {
            return Err(MailError::Send(reason.clone()));
        }

        self.sent.lock().unwrap().push(mail.clone());
        Ok(())
    }
}

// =============================================================================
// Browser
// =============================================================================

#[derive(Default)]
pub struct EngineLog {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub rendered_html: Mutex<Vec<String>>,
}

/// Render engine that replays scripted launch failures, then launches fakes.
#[derive(Default)]
pub struct ScriptedEngine {
    pub log: Arc<EngineLog>,
    pub launch_failures: Mutex<VecDeque<LaunchError>>,
    pub fail_render: bool,
}

impl ScriptedEngine {
    pub fn failing_launches(failures: Vec<LaunchError>) -> Self {
        Self {
            launch_failures: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    pub fn launches(&self) -> usize {
        self.log.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.log.closes.load(Ordering::SeqCst)
    }

    pub fn rendered_html(&self) -> Vec<String> {
        self.log.rendered_html.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderEngine for ScriptedEngine {
    async fn launch(&self) -> Result<BrowserHandle, LaunchError> {
        self.log.launches.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.launch_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        Ok(BrowserHandle::new(FakeBrowser {
            log: Arc::clone(&self.log),
            fail_render: self.fail_render,
        }))
    }
}

struct FakeBrowser {
    log: Arc<EngineLog>,
    fail_render: bool,
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn print_pdf(&mut self, html: &str, _options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        if self.fail_render {
            return Err(RenderError::Render("Page.printToPDF failed".to_string()));
        }
        self.log.rendered_html.lock().unwrap().push(html.to_string());
        Ok(b"%PDF-1.4 fake".to_vec())
    }

    async fn close(&mut self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn text_file_busy() -> LaunchError {
    LaunchError::from_error(&std::io::Error::new(
        std::io::ErrorKind::Other,
        "spawn ETXTBSY: Text file busy",
    ))
}

// =============================================================================
// Jobs
// =============================================================================

pub fn student(semester_id: &str) -> StudentInfo {
    StudentInfo {
        name: "Asha Rao".to_string(),
        username: "r200123".to_string(),
        branch: "CSE".to_string(),
        semester_id: semester_id.to_string(),
        campus: "RK Valley".to_string(),
    }
}

pub fn email_job(body: &str) -> NotificationJob {
    NotificationJob::Email(EmailJob {
        to: "student@example.edu".to_string(),
        subject: "Welcome".to_string(),
        body: Some(body.to_string()),
        html: None,
    })
}

pub fn result_job(grades: &[(f64, f64)]) -> NotificationJob {
    NotificationJob::ResultReport(ReportJob {
        to: "student@example.edu".to_string(),
        subject: "Semester results".to_string(),
        payload: ResultPayload {
            student: student("E2 Sem 1"),
            grades: grades
                .iter()
                .enumerate()
                .map(|(i, (credits, grade_point))| GradeEntry {
                    subject_name: format!("Subject {}", i + 1),
                    subject_code: format!("CS210{}", i + 1),
                    credits: *credits,
                    grade_point: *grade_point,
                })
                .collect(),
        },
    })
}

pub fn attendance_job(records: &[(u32, u32)]) -> NotificationJob {
    NotificationJob::AttendanceReport(ReportJob {
        to: "student@example.edu".to_string(),
        subject: "Attendance report".to_string(),
        payload: AttendancePayload {
            student: student("E2S1"),
            records: records
                .iter()
                .map(|(attended, total)| AttendanceEntry {
                    subject_name: "Operating Systems".to_string(),
                    subject_code: "CS2102".to_string(),
                    attended_classes: *attended,
                    total_classes: *total,
                })
                .collect(),
        },
    })
}
