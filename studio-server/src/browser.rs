//! Browser seam, readiness polling and the capture sequence.
//!
//! The capture sequence is independent of the browser backend: open the
//! render page, poll until the canvas node, the readiness sentinel and the
//! document root all exist (or attempts run out), then capture the canvas
//! node, falling back to the viewport.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use studio_core::protocol::{CaptureReadiness, CaptureTarget, Viewport};
use studio_core::render::{READY_SENTINEL_ID, ROOT_ID};

/// Browser failures.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No browser executable was found.
    #[error("Chrome browser not found")]
    BrowserNotFound,

    /// The browser could not be started.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// The render page could not be loaded.
    #[error("Frontend not accessible at {url}: {reason}")]
    Navigation {
        /// Page that failed to load.
        url: String,
        /// Browser message.
        reason: String,
    },

    /// A readiness probe could not be evaluated.
    #[error("Readiness probe failed: {0}")]
    Probe(String),

    /// Both capture strategies failed.
    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    /// A blocking browser task panicked or was cancelled.
    #[error("Browser task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for CaptureError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// What one readiness probe saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Probe {
    /// The canvas node exists.
    pub canvas: bool,
    /// The readiness sentinel exists.
    pub ready: bool,
    /// The document root exists.
    pub root: bool,
}

impl Probe {
    /// Whether every marker is present.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.canvas && self.ready && self.root
    }
}

/// Script evaluated for each probe; returns the [`Probe`] as a JSON string.
#[must_use]
pub fn probe_script(canvas_id: &str) -> String {
    let id = serde_json::to_string(canvas_id).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "JSON.stringify({{ canvas: !!document.getElementById({id}), ready: !!document.getElementById('{READY_SENTINEL_ID}'), root: !!document.getElementById('{ROOT_ID}') }})"
    )
}

/// Readiness polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Probes before giving up.
    pub max_attempts: u32,
    /// Pause after each failed probe.
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(1000),
        }
    }
}

/// Result of the readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// All markers appeared.
    Ready {
        /// Probes used.
        attempts: u32,
    },
    /// Attempts ran out.
    TimedOut {
        /// Probes used.
        attempts: u32,
    },
}

impl Readiness {
    /// Wire form.
    #[must_use]
    pub fn as_protocol(self) -> CaptureReadiness {
        match self {
            Self::Ready { .. } => CaptureReadiness::Ready,
            Self::TimedOut { .. } => CaptureReadiness::TimedOut,
        }
    }
}

/// A loaded page.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Look for the readiness markers.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be inspected.
    async fn probe(&self, canvas_id: &str) -> Result<Probe, CaptureError>;

    /// PNG of the node with `element_id`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the node exists but cannot be captured.
    async fn capture_element(&self, element_id: &str) -> Result<Option<Vec<u8>>, CaptureError>;

    /// PNG of the visible viewport.
    ///
    /// # Errors
    ///
    /// Returns an error if the screenshot fails.
    async fn capture_viewport(&self) -> Result<Vec<u8>, CaptureError>;

    /// Release the page and its browser.
    async fn close(self: Box<Self>);
}

/// Starts browsers and opens pages.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Whether a browser can be started at all.
    fn is_available(&self) -> bool;

    /// Open `url` in a fresh browser with a transparent background.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot start or the page cannot load.
    async fn open(&self, url: &Url, viewport: Viewport) -> Result<Box<dyn BrowserPage>, CaptureError>;
}

/// Driver used when no browser backend is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableBrowser;

#[async_trait]
impl BrowserDriver for UnavailableBrowser {
    fn is_available(&self) -> bool {
        false
    }

    async fn open(&self, _url: &Url, _viewport: Viewport) -> Result<Box<dyn BrowserPage>, CaptureError> {
        Err(CaptureError::BrowserNotFound)
    }
}

/// Poll `page` until ready or out of attempts.
///
/// A probe that errors counts as a failed attempt.
pub async fn wait_until_ready(
    page: &dyn BrowserPage,
    canvas_id: &str,
    policy: ReadinessPolicy,
) -> Readiness {
    let max = policy.max_attempts.max(1);
    for attempt in 1..=max {
        match page.probe(canvas_id).await {
            Ok(probe) if probe.is_ready() => {
                debug!(attempt, "Render page ready");
                return Readiness::Ready { attempts: attempt };
            }
            Ok(probe) => debug!(
                attempt,
                canvas = probe.canvas,
                ready = probe.ready,
                root = probe.root,
                "Render page not ready"
            ),
            Err(err) => warn!(attempt, error = %err, "Readiness probe failed"),
        }
        if attempt < max {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Readiness::TimedOut { attempts: max }
}

/// A finished capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// PNG bytes.
    pub png: Vec<u8>,
    /// Readiness wait result.
    pub readiness: Readiness,
    /// What was captured.
    pub target: CaptureTarget,
}

/// Open the render page, wait for readiness and capture it.
///
/// A readiness timeout does not fail the capture; it is reported in the
/// outcome. The element capture falls back to the viewport when the node is
/// missing or cannot be captured.
///
/// # Errors
///
/// Returns an error if the browser cannot open the page or both capture
/// strategies fail.
pub async fn capture_page(
    driver: &dyn BrowserDriver,
    url: &Url,
    canvas_id: &str,
    viewport: Viewport,
    policy: ReadinessPolicy,
) -> Result<CaptureOutcome, CaptureError> {
    let page = driver.open(url, viewport).await?;
    let result = capture_open_page(page.as_ref(), canvas_id, policy).await;
    page.close().await;
    result
}

async fn capture_open_page(
    page: &dyn BrowserPage,
    canvas_id: &str,
    policy: ReadinessPolicy,
) -> Result<CaptureOutcome, CaptureError> {
    let readiness = wait_until_ready(page, canvas_id, policy).await;
    if let Readiness::TimedOut { attempts } = readiness {
        warn!(attempts, "Render page never became ready, capturing anyway");
    }

    let element = match page.capture_element(canvas_id).await {
        Ok(Some(png)) => Some(png),
        Ok(None) => {
            warn!(canvas_id, "Canvas node not found, capturing viewport");
            None
        }
        Err(err) => {
            warn!(canvas_id, error = %err, "Element capture failed, capturing viewport");
            None
        }
    };

    let (png, target) = match element {
        Some(png) => (png, CaptureTarget::Element),
        None => (page.capture_viewport().await?, CaptureTarget::Viewport),
    };
    info!(bytes = png.len(), captured = target.as_str(), "Captured render page");

    Ok(CaptureOutcome {
        png,
        readiness,
        target,
    })
}

/// Places a browser executable is usually installed on this platform.
#[must_use]
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    if cfg!(target_os = "windows") {
        paths.extend(
            [
                r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
            ]
            .map(PathBuf::from),
        );
        if let Ok(user) = std::env::var("USERNAME") {
            for base in ["Local", "Roaming"] {
                paths.push(PathBuf::from(format!(
                    r"C:\Users\{user}\AppData\{base}\Google\Chrome\Application\chrome.exe"
                )));
            }
        }
    } else if cfg!(target_os = "macos") {
        paths.extend(
            [
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                "/Applications/Chromium.app/Contents/MacOS/Chromium",
                "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
            ]
            .map(PathBuf::from),
        );
    } else {
        paths.extend(
            [
                "/usr/bin/google-chrome",
                "/usr/bin/google-chrome-stable",
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/snap/bin/chromium",
            ]
            .map(PathBuf::from),
        );
    }
    paths
}

/// First existing executable: `explicit` if given and present, then the
/// candidates in order.
#[must_use]
pub fn locate_chrome_in(explicit: Option<&Path>, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "Configured browser path does not exist");
    }
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// Find a browser executable on this machine.
#[must_use]
pub fn locate_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    let found = locate_chrome_in(explicit, &candidate_paths());
    match &found {
        Some(path) => info!(path = %path.display(), "Found browser"),
        None => warn!("No Chrome/Edge browser found in common locations"),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G'];

    #[derive(Default)]
    struct ScriptedPage {
        ready_after: Option<u32>,
        probes: AtomicU32,
        probe_errors: bool,
        has_element: bool,
        element_fails: bool,
        viewport_fails: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl BrowserPage for ScriptedPage {
        async fn probe(&self, _canvas_id: &str) -> Result<Probe, CaptureError> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
            if self.probe_errors {
                return Err(CaptureError::Probe("context destroyed".to_string()));
            }
            let ready = self.ready_after.is_some_and(|after| n >= after);
            Ok(Probe {
                canvas: true,
                ready,
                root: true,
            })
        }

        async fn capture_element(&self, _id: &str) -> Result<Option<Vec<u8>>, CaptureError> {
            self.calls.lock().expect("lock").push("element");
            if self.element_fails {
                return Err(CaptureError::Screenshot("zero size".to_string()));
            }
            Ok(self.has_element.then(|| PNG.to_vec()))
        }

        async fn capture_viewport(&self) -> Result<Vec<u8>, CaptureError> {
            self.calls.lock().expect("lock").push("viewport");
            if self.viewport_fails {
                return Err(CaptureError::Screenshot("target closed".to_string()));
            }
            Ok(vec![1, 2, 3])
        }

        async fn close(self: Box<Self>) {}
    }

    fn quick(max_attempts: u32) -> ReadinessPolicy {
        ReadinessPolicy {
            max_attempts,
            interval: Duration::from_millis(1),
        }
    }

    // -----------------------------------------------------------------------
    // Readiness
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn ready_on_third_probe() {
        let page = ScriptedPage {
            ready_after: Some(3),
            ..ScriptedPage::default()
        };
        let readiness = wait_until_ready(&page, "render-canvas", quick(10)).await;
        assert_eq!(readiness, Readiness::Ready { attempts: 3 });
    }

    #[tokio::test]
    async fn times_out_after_max_attempts() {
        let page = ScriptedPage::default();
        let readiness = wait_until_ready(&page, "render-canvas", quick(4)).await;
        assert_eq!(readiness, Readiness::TimedOut { attempts: 4 });
        assert_eq!(page.probes.load(Ordering::SeqCst), 4);
        assert_eq!(readiness.as_protocol(), CaptureReadiness::TimedOut);
    }

    #[tokio::test]
    async fn probe_errors_count_as_attempts() {
        let page = ScriptedPage {
            probe_errors: true,
            ..ScriptedPage::default()
        };
        let readiness = wait_until_ready(&page, "render-canvas", quick(3)).await;
        assert_eq!(readiness, Readiness::TimedOut { attempts: 3 });
    }

    #[test]
    fn probe_requires_every_marker() {
        assert!(Probe { canvas: true, ready: true, root: true }.is_ready());
        assert!(!Probe { canvas: true, ready: false, root: true }.is_ready());
        let script = probe_script("render-canvas");
        assert!(script.contains("getElementById(\"render-canvas\")"));
        assert!(script.contains("'render-ready'"));
        assert!(script.contains("'root'"));
    }

    // -----------------------------------------------------------------------
    // Capture fallback
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn element_capture_preferred() {
        let page = ScriptedPage {
            ready_after: Some(1),
            has_element: true,
            ..ScriptedPage::default()
        };
        let outcome = capture_open_page(&page, "render-canvas", quick(2)).await.expect("capture");
        assert_eq!(outcome.png, PNG);
        assert_eq!(outcome.target, CaptureTarget::Element);
        assert_eq!(*page.calls.lock().expect("lock"), vec!["element"]);
    }

    #[tokio::test]
    async fn missing_node_falls_back_to_viewport() {
        let page = ScriptedPage::default();
        let outcome = capture_open_page(&page, "render-canvas", quick(2)).await.expect("capture");
        assert_eq!(outcome.target, CaptureTarget::Viewport);
        assert_eq!(outcome.readiness, Readiness::TimedOut { attempts: 2 });
        assert_eq!(*page.calls.lock().expect("lock"), vec!["element", "viewport"]);
    }

    #[tokio::test]
    async fn failing_element_capture_falls_back() {
        let page = ScriptedPage {
            ready_after: Some(1),
            has_element: true,
            element_fails: true,
            ..ScriptedPage::default()
        };
        let outcome = capture_open_page(&page, "render-canvas", quick(1)).await.expect("capture");
        assert_eq!(outcome.target, CaptureTarget::Viewport);
    }

    #[tokio::test]
    async fn both_strategies_failing_is_an_error() {
        let page = ScriptedPage {
            element_fails: true,
            viewport_fails: true,
            ..ScriptedPage::default()
        };
        let err = capture_open_page(&page, "render-canvas", quick(1))
            .await
            .expect_err("should fail");
        assert!(matches!(err, CaptureError::Screenshot(_)));
    }

    #[tokio::test]
    async fn unavailable_browser_refuses_to_open() {
        let url = Url::parse("http://127.0.0.1:3001/render").expect("url");
        let err = capture_page(&UnavailableBrowser, &url, "render-canvas", Viewport::default(), quick(1))
            .await
            .expect_err("should fail");
        assert!(matches!(err, CaptureError::BrowserNotFound));
        assert!(!UnavailableBrowser.is_available());
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    #[test]
    fn explicit_path_wins_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let explicit = dir.path().join("chrome");
        let fallback = dir.path().join("chromium");
        std::fs::write(&explicit, b"").expect("write");
        std::fs::write(&fallback, b"").expect("write");

        let found = locate_chrome_in(Some(&explicit), &[fallback.clone()]);
        assert_eq!(found, Some(explicit));

        let missing = dir.path().join("missing");
        let found = locate_chrome_in(Some(&missing), &[missing.clone(), fallback.clone()]);
        assert_eq!(found, Some(fallback));
    }

    #[test]
    fn nothing_found_without_candidates() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(locate_chrome_in(None, &[dir.path().join("nope")]).is_none());
        assert!(!candidate_paths().is_empty());
    }
}
