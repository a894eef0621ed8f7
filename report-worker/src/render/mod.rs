//! Headless browser rendering.
//!
//! A [`RenderEngine`] launches one browser process per call and hands back a
//! [`BrowserHandle`] that owns it. Handles are never shared between jobs.
//!
//! ## Lifecycle
//!
//! ```text
//! launch_with_retry() → BrowserHandle → render() → release()
//! ```
//!
//! `release()` is the normal exit. If a handle is dropped without being
//! released (a panic, a cancelled future) its drop glue schedules the close
//! on the current runtime, so the process is never leaked.

pub mod chromium;

use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

pub use chromium::{resolve_executable, BrowserSettings, ChromiumEngine};

/// `ETXTBSY`: the executable is still open for writing. Same value on Linux
/// and macOS.
#[cfg(unix)]
const ETXTBSY: Option<i32> = Some(26);
#[cfg(not(unix))]
const ETXTBSY: Option<i32> = None;

/// Errors surfaced by the rendering pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no browser executable found (checked: {checked:?})")]
    NoBrowserFound { checked: Vec<PathBuf> },

    #[error("browser launch failed after {attempts} attempt(s): {message}")]
    BrowserLaunchFailed { attempts: u32, message: String },

    #[error("report template failed: {0}")]
    Template(String),

    #[error("pdf render failed: {0}")]
    Render(String),
}

/// Failure of a single launch attempt.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no browser executable found (checked: {checked:?})")]
    NoBrowserFound { checked: Vec<PathBuf> },

    #[error("{message}")]
    Process { message: String, transient: bool },
}

impl LaunchError {
    /// Classify an underlying process launch error.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        LaunchError::Process {
            message: err.to_string(),
            transient: is_transient_launch_error(err),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, LaunchError::Process { transient: true, .. })
    }
}

/// Whether a launch failure is expected to clear up on its own.
///
/// Only "text file busy" qualifies: the browser binary is still being
/// written (typically right after it was unpacked). The whole source chain
/// is checked, by OS error code first and by message second, because browser
/// crates tend to wrap the spawn error in their own types.
pub fn is_transient_launch_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);

    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.raw_os_error().is_some() && io.raw_os_error() == ETXTBSY {
                return true;
            }
        }

        let message = e.to_string();
        if message.contains("ETXTBSY") || message.contains("Text file busy") {
            return true;
        }

        current = e.source();
    }

    false
}

/// Page setup for PDF export.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    /// Paper width in inches
    pub paper_width: f64,
    /// Paper height in inches
    pub paper_height: f64,
    /// Margin on every side, in CSS pixels
    pub margin_px: f64,
    pub print_background: bool,
}

impl PdfOptions {
    /// A4 with 20px margins and backgrounds printed.
    pub fn a4() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.69,
            margin_px: 20.0,
            print_background: true,
        }
    }

    /// Margin converted to inches (96 CSS pixels per inch).
    pub fn margin_inches(&self) -> f64 {
        self.margin_px / 96.0
    }
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self::a4()
    }
}

/// Launch retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// Starts browser processes.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Make exactly one attempt to start a browser.
    async fn launch(&self) -> Result<BrowserHandle, LaunchError>;
}

/// A running browser process, as seen through its [`BrowserHandle`].
#[async_trait]
pub trait BrowserSession: Send {
    /// Load `html` into a fresh page and export it as PDF.
    async fn print_pdf(&mut self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, RenderError>;

    /// Terminate the process. Must not fail; problems are logged.
    async fn close(&mut self);
}

/// Exclusive owner of one launched browser process.
pub struct BrowserHandle {
    session: Option<Box<dyn BrowserSession>>,
}

impl BrowserHandle {
    pub fn new(session: impl BrowserSession + 'static) -> Self {
        Self {
            session: Some(Box::new(session)),
        }
    }

    /// Render a complete HTML document to PDF bytes.
    pub async fn render(&mut self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        match self.session.as_mut() {
            Some(session) => session.print_pdf(html, options).await,
            None => Err(RenderError::Render("browser already released".to_string())),
        }
    }

    /// Close the browser process.
    pub async fn release(mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }
}

impl Drop for BrowserHandle {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        warn!("browser_handle_dropped_unreleased");

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    session.close().await;
                });
            }
            Err(_) => error!("browser_close_no_runtime"),
        }
    }
}

/// Launch a browser, retrying transient failures.
///
/// A missing executable and non-transient failures end the loop at once.
/// Transient failures are retried after a fixed delay until
/// `policy.max_attempts` attempts have been made.
pub async fn launch_with_retry(
    engine: &dyn RenderEngine,
    policy: &LaunchPolicy,
) -> Result<BrowserHandle, RenderError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match engine.launch().await {
            Ok(handle) => {
                if attempt > 1 {
                    info!(attempt = attempt, "browser_launch_recovered");
                }
                return Ok(handle);
            }
            Err(LaunchError::NoBrowserFound { checked }) => {
                error!(checked = ?checked, "browser_not_found");
                return Err(RenderError::NoBrowserFound { checked });
            }
            Err(LaunchError::Process {
                message,
                transient: true,
            }) if attempt < max_attempts => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    error = %message,
                    "browser_launch_retry"
                );
                sleep(policy.retry_delay).await;
            }
            Err(LaunchError::Process { message, transient }) => {
                error!(
                    attempt = attempt,
                    transient = transient,
                    error = %message,
                    "browser_launch_failed"
                );
                return Err(RenderError::BrowserLaunchFailed {
                    attempts: attempt,
                    message,
                });
            }
        }
    }
}

/// Launch, render and release in one scope.
///
/// The handle is released on every path, whether or not rendering succeeded.
pub async fn render_pdf(
    engine: &dyn RenderEngine,
    policy: &LaunchPolicy,
    html: &str,
    options: &PdfOptions,
) -> Result<Vec<u8>, RenderError> {
    let mut handle = launch_with_retry(engine, policy).await?;
    let result = handle.render(html, options).await;
    handle.release().await;
    result
}
