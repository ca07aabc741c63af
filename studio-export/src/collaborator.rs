//! Render server client.
//!
//! The pipeline only needs two calls from the server: write a render
//! document and capture it. [`RenderCollaborator`] is that seam;
//! [`HttpCollaborator`] implements it over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use studio_core::protocol::{
    ApiErrorBody, CaptureReadiness, CaptureRequest, CaptureTarget, GenerateRequest,
    GenerateResponse, TestResponse, CAPTURE_PATH, GENERATE_PATH, READINESS_HEADER, TARGET_HEADER,
    TEST_PATH,
};

use crate::error::CollaboratorError;

/// Default time allowed for one request. Captures include the server's own
/// readiness wait, so this has to exceed it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A captured image plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// PNG bytes.
    pub png: Vec<u8>,
    /// Outcome of the readiness wait.
    pub readiness: CaptureReadiness,
    /// Whether the canvas node or the whole viewport was captured.
    pub target: CaptureTarget,
}

impl Capture {
    /// Whether the image is a best-effort fallback.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.readiness == CaptureReadiness::TimedOut || self.target == CaptureTarget::Viewport
    }
}

/// The external service that renders documents and captures them.
#[async_trait]
pub trait RenderCollaborator: Send + Sync {
    /// Write `code` as the current render document.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or rejects the document.
    async fn generate(
        &self,
        code: &str,
        filename: Option<&str>,
    ) -> Result<GenerateResponse, CollaboratorError>;

    /// Load the render route and capture it.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or the capture fails.
    async fn capture(&self, request: &CaptureRequest) -> Result<Capture, CollaboratorError>;
}

struct InnerClient {
    http: Client,
    base_url: Url,
}

/// HTTP client for the render server.
#[derive(Clone)]
pub struct HttpCollaborator {
    inner: Arc<InnerClient>,
}

impl std::fmt::Debug for HttpCollaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCollaborator")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpCollaborator {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::InvalidUrl`] if the URL is malformed.
    /// Returns [`CollaboratorError::Http`] if the HTTP client fails to build.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, CollaboratorError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::InvalidUrl`] if the URL is malformed or
    /// not http(s).
    /// Returns [`CollaboratorError::Http`] if the HTTP client fails to build.
    pub fn with_timeout(
        base_url: impl AsRef<str>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| CollaboratorError::InvalidUrl(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(CollaboratorError::InvalidUrl(format!(
                "unsupported scheme: {}",
                base_url.scheme()
            )));
        }

        let http = Client::builder()
            .user_agent(concat!("studio-export/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(CollaboratorError::Http)?;

        Ok(Self {
            inner: Arc::new(InnerClient { http, base_url }),
        })
    }

    /// Server base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, CollaboratorError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| CollaboratorError::InvalidUrl(e.to_string()))
    }

    /// Liveness check; also reports whether the server found a browser.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or answers with an error.
    pub async fn ping(&self) -> Result<TestResponse, CollaboratorError> {
        let response = self.inner.http.get(self.endpoint(TEST_PATH)?).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl RenderCollaborator for HttpCollaborator {
    async fn generate(
        &self,
        code: &str,
        filename: Option<&str>,
    ) -> Result<GenerateResponse, CollaboratorError> {
        let body = GenerateRequest {
            code: Some(code.to_string()),
            filename: filename.map(str::to_string),
        };
        debug!(bytes = code.len(), ?filename, "Sending render document");
        let response = self
            .inner
            .http
            .post(self.endpoint(GENERATE_PATH)?)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn capture(&self, request: &CaptureRequest) -> Result<Capture, CollaboratorError> {
        debug!(
            canvas_id = %request.canvas_id,
            width = request.viewport.width,
            height = request.viewport.height,
            "Requesting capture"
        );
        let response = self
            .inner
            .http
            .post(self.endpoint(CAPTURE_PATH)?)
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let headers = response.headers().clone();
        let content_type = header_str(&headers, CONTENT_TYPE.as_str()).unwrap_or_default();
        if !content_type.starts_with("image/png") {
            return Err(CollaboratorError::InvalidResponse(format!(
                "expected image/png, got {}",
                if content_type.is_empty() { "no content type" } else { content_type }
            )));
        }

        let png = response.bytes().await?.to_vec();
        if png.is_empty() {
            return Err(CollaboratorError::InvalidResponse("empty image".to_string()));
        }

        Ok(Capture {
            png,
            readiness: header_str(&headers, READINESS_HEADER)
                .and_then(CaptureReadiness::parse)
                .unwrap_or(CaptureReadiness::Ready),
            target: header_str(&headers, TARGET_HEADER)
                .and_then(CaptureTarget::parse)
                .unwrap_or(CaptureTarget::Element),
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn ensure_success(response: Response) -> Result<Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let (error, details) = match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => (body.error, body.details),
        Err(_) if text.is_empty() => (status.to_string(), None),
        Err(_) => (text, None),
    };
    Err(CollaboratorError::Api {
        status: status.as_u16(),
        error,
        details,
    })
}
