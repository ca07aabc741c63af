//! Error types for the export pipeline.

use thiserror::Error;

/// Why an export did not produce a download.
///
/// Every variant leaves the editing surface as it was before the export
/// started; [`ExportError::user_message`] is what the user gets to see.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The canvas root is missing.
    #[error("Canvas not found: {0}")]
    CanvasNotFound(String),

    /// The snapshot could not be built.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// The render document could not be handed to the render server.
    #[error("Render server unreachable: {0}")]
    GenerationTransportFailed(String),

    /// The render server did not finish in time.
    #[error("Capture timed out: {0}")]
    CaptureTimeout(String),

    /// The render server reported a failed capture.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// The image could not be saved.
    #[error("Download failed: {0}")]
    DownloadFailed(String),
}

impl ExportError {
    /// Single human-readable message for the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::CanvasNotFound(_) => "Export failed: the canvas is not available.".to_string(),
            Self::ExtractionFailed(detail) => {
                format!("Export failed: the canvas could not be read ({detail}).")
            }
            Self::GenerationTransportFailed(_) => {
                "Export failed: the render server is not running. Start it and try again."
                    .to_string()
            }
            Self::CaptureTimeout(_) => {
                "Export failed: the render server took too long to capture the canvas.".to_string()
            }
            Self::CaptureFailed(detail) => format!("Export failed: {detail}"),
            Self::DownloadFailed(detail) => {
                format!("Export failed: the image could not be saved ({detail}).")
            }
        }
    }
}

/// Errors from talking to the render server.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The configured base URL is malformed.
    #[error("Invalid render server URL: {0}")]
    InvalidUrl(String),

    /// Connection or protocol failure.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server answered with an error body.
    #[error("Render server error ({status}): {error}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error summary from the body.
        error: String,
        /// Underlying cause from the body.
        details: Option<String>,
    },

    /// The server answered successfully with something unusable.
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}

impl CollaboratorError {
    /// Whether the failure happened before the server could answer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout(_))
    }

    /// Most specific description available.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Api {
                error,
                details: Some(details),
                ..
            } => format!("{error}: {details}"),
            Self::Api { error, .. } => error.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors from delivering the finished image.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The file name would escape the sink.
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_point_at_the_server() {
        let err = ExportError::GenerationTransportFailed("connection refused".to_string());
        assert!(err.user_message().contains("render server is not running"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn capture_failures_carry_the_server_detail() {
        let err = ExportError::CaptureFailed("Screenshot capture failed: no tab".to_string());
        assert_eq!(
            err.user_message(),
            "Export failed: Screenshot capture failed: no tab"
        );
    }

    #[test]
    fn api_detail_joins_error_and_details() {
        let err = CollaboratorError::Api {
            status: 500,
            error: "Screenshot capture failed".to_string(),
            details: Some("browser crashed".to_string()),
        };
        assert_eq!(err.detail(), "Screenshot capture failed: browser crashed");
        assert!(!err.is_transport());

        let err = CollaboratorError::Api {
            status: 400,
            error: "Code content is required".to_string(),
            details: None,
        };
        assert_eq!(err.detail(), "Code content is required");
    }

    #[test]
    fn timeouts_are_transport_failures() {
        assert!(CollaboratorError::Timeout("slow".to_string()).is_transport());
        assert!(!CollaboratorError::InvalidResponse("html".to_string()).is_transport());
    }
}
