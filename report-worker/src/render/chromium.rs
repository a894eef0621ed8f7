//! Chromium-backed render engine using the DevTools protocol.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserHandle, BrowserSession, LaunchError, PdfOptions, RenderEngine, RenderError};

/// Well-known local install locations, probed in order outside production.
const LOCAL_BROWSER_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

/// Extra flags for the container image: no sandbox, no GPU, no /dev/shm.
const PRODUCTION_ARGS: &[&str] = &[
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--single-process",
    "--no-zygote",
    "--hide-scrollbars",
    "--font-render-hinting=none",
];

/// How to find and start the browser.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Use the managed binary and container-friendly flags
    pub production: bool,
    /// Explicit executable, checked before the well-known paths
    pub executable_override: Option<PathBuf>,
    /// Managed binary shipped with the production image
    pub bundled_path: PathBuf,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            production: false,
            executable_override: None,
            bundled_path: PathBuf::from("/opt/chromium/chromium"),
            window_width: 1280,
            window_height: 800,
        }
    }
}

/// Candidate executables in probe order.
fn candidates(settings: &BrowserSettings) -> Vec<PathBuf> {
    if settings.production {
        return vec![settings.bundled_path.clone()];
    }

    settings
        .executable_override
        .iter()
        .cloned()
        .chain(LOCAL_BROWSER_PATHS.iter().map(PathBuf::from))
        .collect()
}

/// Find the browser executable to launch.
pub fn resolve_executable(settings: &BrowserSettings) -> Result<PathBuf, LaunchError> {
    let checked = candidates(settings);

    match checked.iter().find(|path| path.is_file()) {
        Some(path) => {
            debug!(path = %path.display(), "browser_executable_resolved");
            Ok(path.clone())
        }
        None => Err(LaunchError::NoBrowserFound { checked }),
    }
}

/// Launches one headless Chromium per call.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    settings: BrowserSettings,
}

impl ChromiumEngine {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self, executable: &Path) -> Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .window_size(self.settings.window_width, self.settings.window_height)
            .viewport(Viewport {
                width: self.settings.window_width,
                height: self.settings.window_height,
                ..Viewport::default()
            });

        if self.settings.production {
            builder = builder.no_sandbox();
            for arg in PRODUCTION_ARGS {
                builder = builder.arg(*arg);
            }
        }

        builder.build()
    }
}

#[async_trait]
impl RenderEngine for ChromiumEngine {
    async fn launch(&self) -> Result<BrowserHandle, LaunchError> {
        let executable = resolve_executable(&self.settings)?;

        let config = self
            .browser_config(&executable)
            .map_err(|message| LaunchError::Process {
                message,
                transient: false,
            })?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| LaunchError::from_error(&e))?;

        // The CDP connection only makes progress while its handler is polled.
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser_event_error");
                }
            }
        });

        info!(
            executable = %executable.display(),
            production = self.settings.production,
            "browser_launched"
        );

        Ok(BrowserHandle::new(ChromiumSession { browser, events }))
    }
}

struct ChromiumSession {
    browser: Browser,
    events: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn print_pdf(&mut self, html: &str, options: &PdfOptions) -> Result<Vec<u8>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Render(e.to_string()))?;

        let margin = options.margin_inches();
        let params = PrintToPdfParams {
            print_background: Some(options.print_background),
            paper_width: Some(options.paper_width),
            paper_height: Some(options.paper_height),
            margin_top: Some(margin),
            margin_bottom: Some(margin),
            margin_left: Some(margin),
            margin_right: Some(margin),
            ..PrintToPdfParams::default()
        };

        let result = match page.set_content(html).await {
            Ok(_) => page.pdf(params).await,
            Err(e) => Err(e),
        };

        if let Err(e) = page.close().await {
            debug!(error = %e, "browser_page_close_failed");
        }

        let pdf = result.map_err(|e| RenderError::Render(e.to_string()))?;
        debug!(bytes = pdf.len(), "browser_pdf_rendered");
        Ok(pdf)
    }

    async fn close(&mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser_close_failed");
            if let Some(Err(e)) = self.browser.kill().await {
                warn!(error = %e, "browser_kill_failed");
            }
        }

        match self.browser.wait().await {
            Ok(status) => debug!(status = ?status, "browser_exited"),
            Err(e) => warn!(error = %e, "browser_wait_failed"),
        }

        self.events.abort();
    }
}
