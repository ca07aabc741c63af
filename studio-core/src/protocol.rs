//! Wire contract between the export pipeline and the render server.

use serde::{Deserialize, Serialize};

/// Writes the render document.
pub const GENERATE_PATH: &str = "/api/generate-component";

/// Loads the render route and captures it.
pub const CAPTURE_PATH: &str = "/api/capture-screenshot";

/// Liveness and browser availability.
pub const TEST_PATH: &str = "/api/test";

/// Header reporting whether the readiness wait succeeded.
pub const READINESS_HEADER: &str = "x-capture-readiness";

/// Header reporting what was captured.
pub const TARGET_HEADER: &str = "x-capture-target";

/// Canvas id captured when the request names none.
pub const DEFAULT_CAPTURE_CANVAS_ID: &str = "render-canvas";

/// Smallest viewport the server renders with.
pub const MIN_VIEWPORT: Viewport = Viewport {
    width: 800,
    height: 600,
};

/// `POST /api/generate-component` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Render document source.
    #[serde(default)]
    pub code: Option<String>,
    /// Target file name inside the render directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// `POST /api/generate-component` success body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Always `true` on success.
    pub success: bool,
    /// Human-readable status.
    pub message: String,
    /// Where the document was written.
    pub path: String,
}

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        MIN_VIEWPORT
    }
}

impl Viewport {
    /// Grow to at least the minimum viewport.
    #[must_use]
    pub fn at_least_minimum(self) -> Self {
        Self {
            width: self.width.max(MIN_VIEWPORT.width),
            height: self.height.max(MIN_VIEWPORT.height),
        }
    }
}

fn default_canvas_id() -> String {
    DEFAULT_CAPTURE_CANVAS_ID.to_string()
}

/// `POST /api/capture-screenshot` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Id of the node to capture.
    #[serde(default = "default_canvas_id")]
    pub canvas_id: String,
    /// Requested viewport.
    #[serde(default)]
    pub viewport: Viewport,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            canvas_id: default_canvas_id(),
            viewport: Viewport::default(),
        }
    }
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Short error summary.
    pub error: String,
    /// Underlying cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Error chain, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// `GET /api/test` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResponse {
    /// Status message.
    pub message: String,
    /// ISO-8601 server time.
    pub timestamp: String,
    /// Whether a browser executable was found.
    pub chrome: bool,
}

/// Outcome of the readiness wait before a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureReadiness {
    /// Every readiness probe passed.
    Ready,
    /// Attempts ran out; the capture is best-effort.
    TimedOut,
}

impl CaptureReadiness {
    /// Header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::TimedOut => "timed-out",
        }
    }

    /// Parse a header value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "ready" => Some(Self::Ready),
            "timed-out" => Some(Self::TimedOut),
            _ => None,
        }
    }
}

/// What a capture contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureTarget {
    /// Only the canvas node.
    Element,
    /// The whole viewport (fallback).
    Viewport,
}

impl CaptureTarget {
    /// Header value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Viewport => "viewport",
        }
    }

    /// Parse a header value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "element" => Some(Self::Element),
            "viewport" => Some(Self::Viewport),
            _ => None,
        }
    }
}
