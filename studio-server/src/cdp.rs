//! Headless Chrome backend over the DevTools protocol.
//!
//! `headless_chrome` is synchronous, so every browser call runs on the
//! blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page, DOM};
use headless_chrome::{Browser, LaunchOptions};
use tracing::debug;
use url::Url;

use studio_core::protocol::Viewport;

use crate::browser::{probe_script, BrowserDriver, BrowserPage, CaptureError, Probe};

/// How long element lookups wait once the page is loaded.
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Launches a fresh headless Chrome per capture.
#[derive(Debug, Clone)]
pub struct ChromeDriver {
    executable: Option<PathBuf>,
}

impl ChromeDriver {
    /// Driver for the browser at `executable`; unavailable when `None`.
    #[must_use]
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    /// Browser executable in use.
    #[must_use]
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    fn is_available(&self) -> bool {
        self.executable.is_some()
    }

    async fn open(&self, url: &Url, viewport: Viewport) -> Result<Box<dyn BrowserPage>, CaptureError> {
        let executable = self.executable.clone().ok_or(CaptureError::BrowserNotFound)?;
        let url = url.to_string();
        let page = tokio::task::spawn_blocking(move || launch(executable, &url, viewport)).await??;
        Ok(Box::new(page))
    }
}

fn launch(executable: PathBuf, url: &str, viewport: Viewport) -> Result<ChromePage, CaptureError> {
    let options = LaunchOptions::default_builder()
        .path(Some(executable))
        .headless(true)
        .sandbox(false)
        .window_size(Some((viewport.width, viewport.height)))
        .build()
        .map_err(launch_error)?;
    let browser = Browser::new(options).map_err(launch_error)?;
    let tab = browser.new_tab().map_err(launch_error)?;

    tab.call_method(Emulation::SetDefaultBackgroundColorOverride {
        color: Some(DOM::RGBA {
            r: 0,
            g: 0,
            b: 0,
            a: Some(0.0),
        }),
    })
    .map_err(launch_error)?;

    debug!(url, "Loading render page");
    tab.navigate_to(url)
        .and_then(|tab| tab.wait_until_navigated())
        .map_err(|e| CaptureError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    tab.set_default_timeout(ELEMENT_TIMEOUT);

    Ok(ChromePage { browser, tab })
}

fn launch_error(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Launch(err.to_string())
}

struct ChromePage {
    browser: Browser,
    tab: Arc<Tab>,
}

fn id_selector(id: &str) -> String {
    let quoted = serde_json::to_string(id).unwrap_or_else(|_| "\"\"".to_string());
    format!("[id={quoted}]")
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn probe(&self, canvas_id: &str) -> Result<Probe, CaptureError> {
        let tab = Arc::clone(&self.tab);
        let script = probe_script(canvas_id);
        let value = tokio::task::spawn_blocking(move || tab.evaluate(&script, false))
            .await?
            .map_err(|e| CaptureError::Probe(e.to_string()))?
            .value;
        let text = value
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CaptureError::Probe("probe returned no value".to_string()))?;
        serde_json::from_str(text).map_err(|e| CaptureError::Probe(e.to_string()))
    }

    async fn capture_element(&self, element_id: &str) -> Result<Option<Vec<u8>>, CaptureError> {
        let tab = Arc::clone(&self.tab);
        let selector = id_selector(element_id);
        tokio::task::spawn_blocking(move || match tab.find_element(&selector) {
            Ok(element) => element
                .capture_screenshot(Page::CaptureScreenshotFormatOption::Png)
                .map(Some)
                .map_err(|e| CaptureError::Screenshot(e.to_string())),
            Err(_) => Ok(None),
        })
        .await?
    }

    async fn capture_viewport(&self) -> Result<Vec<u8>, CaptureError> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || {
            tab.capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await?
        .map_err(|e| CaptureError::Screenshot(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        let Self { browser, tab } = *self;
        // Dropping the browser kills the process, which blocks.
        let closed = tokio::task::spawn_blocking(move || {
            drop(tab);
            drop(browser);
        })
        .await;
        if let Err(err) = closed {
            tracing::warn!(error = %err, "Browser shutdown task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_quotes_the_id() {
        assert_eq!(id_selector("render-canvas"), "[id=\"render-canvas\"]");
        assert_eq!(id_selector("a\"b"), "[id=\"a\\\"b\"]");
    }

    #[tokio::test]
    async fn missing_executable_is_unavailable() {
        let driver = ChromeDriver::new(None);
        assert!(!driver.is_available());
        let url = Url::parse("http://127.0.0.1:3001/render").expect("url");
        let err = driver
            .open(&url, Viewport::default())
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, CaptureError::BrowserNotFound));
    }
}
