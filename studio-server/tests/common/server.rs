//! Test server harness for integration tests.
//!
//! Spins up the real router on a random port with a scripted browser that
//! fetches the render page over HTTP and "mounts" it after a number of
//! probes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use studio_core::protocol::Viewport;
use studio_server::browser::Probe;
use studio_server::{
    build_router, AppState, BrowserDriver, BrowserPage, CaptureError, ReadinessPolicy,
    ServerSettings,
};

/// Bytes every fake capture returns.
pub const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 13];

/// Browser stand-in that loads pages with reqwest.
pub struct FakeBrowser {
    http: reqwest::Client,
    available: bool,
    mount_after: Option<u32>,
    opened: Mutex<Vec<(String, Viewport)>>,
}

impl FakeBrowser {
    /// Browser whose pages signal readiness on the `mount_after`-th probe;
    /// `None` never signals.
    pub fn new(mount_after: Option<u32>) -> Self {
        Self {
            http: reqwest::Client::new(),
            available: true,
            mount_after,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Pages opened so far with their viewports.
    #[allow(dead_code)]
    pub fn opened(&self) -> Vec<(String, Viewport)> {
        self.opened.lock().expect("lock").clone()
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn open(&self, url: &Url, viewport: Viewport) -> Result<Box<dyn BrowserPage>, CaptureError> {
        self.opened
            .lock()
            .expect("lock")
            .push((url.to_string(), viewport));
        let navigation = |reason: String| CaptureError::Navigation {
            url: url.to_string(),
            reason,
        };
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| navigation(e.to_string()))?;
        if !response.status().is_success() {
            return Err(navigation(format!("status {}", response.status())));
        }
        let html = response.text().await.map_err(|e| navigation(e.to_string()))?;
        Ok(Box::new(FakePage {
            html,
            mount_after: self.mount_after,
            probes: AtomicU32::new(0),
        }))
    }
}

struct FakePage {
    html: String,
    mount_after: Option<u32>,
    probes: AtomicU32,
}

impl FakePage {
    fn has_id(&self, id: &str) -> bool {
        self.html.contains(&format!("id=\"{id}\""))
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn probe(&self, canvas_id: &str) -> Result<Probe, CaptureError> {
        let n = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
        let mounts = self.html.contains("sentinel.id = 'render-ready'");
        Ok(Probe {
            canvas: self.has_id(canvas_id),
            ready: mounts && self.mount_after.is_some_and(|after| n >= after),
            root: self.has_id("root"),
        })
    }

    async fn capture_element(&self, element_id: &str) -> Result<Option<Vec<u8>>, CaptureError> {
        Ok(self.has_id(element_id).then(|| FAKE_PNG.to_vec()))
    }

    async fn capture_viewport(&self) -> Result<Vec<u8>, CaptureError> {
        Ok(FAKE_PNG.to_vec())
    }

    async fn close(self: Box<Self>) {}
}

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    render_dir: tempfile::TempDir,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server capturing through `driver`, polling quickly.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or the server fails to bind.
    pub async fn start(driver: Arc<dyn BrowserDriver>) -> Self {
        Self::start_with(driver, |_| {}).await
    }

    /// Start a server after adjusting its settings.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or the server fails to bind.
    pub async fn start_with(
        driver: Arc<dyn BrowserDriver>,
        configure: impl FnOnce(&mut ServerSettings),
    ) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let render_dir = tempfile::tempdir().expect("tempdir");

        let mut settings = ServerSettings::local(port, render_dir.path()).expect("settings");
        settings.readiness = ReadinessPolicy {
            max_attempts: 3,
            interval: Duration::from_millis(5),
        };
        configure(&mut settings);

        let app = build_router(AppState::new(settings, driver));
        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        // Give the server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        Self {
            addr: actual_addr,
            render_dir,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Base URL of the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Full URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// Directory render documents are written to.
    #[allow(dead_code)]
    pub fn render_dir(&self) -> &std::path::Path {
        self.render_dir.path()
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}
