//! The export sequence.
//!
//! 1. Remember and clear the selection, then let the surface settle.
//! 2. Snapshot the canvas and generate the render document.
//! 3. Hand the document to the render server and request a capture.
//! 4. Save the PNG under a timestamped name.
//! 5. Restore the selection, whatever happened.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use studio_core::protocol::{CaptureReadiness, CaptureRequest, CaptureTarget, Viewport};
use studio_core::render::{DEFAULT_DOCUMENT_NAME, RENDER_CANVAS_ID};
use studio_core::{current_timestamp_ms, EditingSurface, RenderDocument, StudioError};

use crate::collaborator::RenderCollaborator;
use crate::error::{CollaboratorError, ExportError};
use crate::sink::DownloadSink;

/// Export tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Pause after clearing the selection, before extraction.
    pub settle_delay: Duration,
    /// Pause before the selection is restored.
    pub restore_delay: Duration,
    /// Id of the canvas node inside the render document.
    pub render_canvas_id: String,
    /// Smallest capture viewport.
    pub min_viewport: Viewport,
    /// Download file name prefix.
    pub file_prefix: String,
    /// Name the render document is written under.
    pub document_name: String,
    /// Treat a timed-out readiness wait as a failure instead of accepting the
    /// best-effort image.
    pub fail_on_readiness_timeout: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            restore_delay: Duration::from_millis(200),
            render_canvas_id: RENDER_CANVAS_ID.to_string(),
            min_viewport: studio_core::protocol::MIN_VIEWPORT,
            file_prefix: "canvas-export".to_string(),
            document_name: DEFAULT_DOCUMENT_NAME.to_string(),
            fail_on_readiness_timeout: false,
        }
    }
}

/// Outcome of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Download file name.
    pub file_name: String,
    /// Where the sink put the image.
    pub location: String,
    /// Image size in bytes.
    pub bytes: usize,
    /// Viewport the capture was requested with.
    pub viewport: Viewport,
    /// Readiness outcome reported by the server.
    pub readiness: CaptureReadiness,
    /// What the server captured.
    pub target: CaptureTarget,
    /// Components re-instantiated in the render document.
    pub components: usize,
}

impl ExportReport {
    /// Whether the image is a best-effort fallback.
    #[must_use]
    pub fn degraded(&self) -> bool {
        self.readiness == CaptureReadiness::TimedOut || self.target == CaptureTarget::Viewport
    }
}

/// Drives exports against a render server and a download sink.
#[derive(Clone)]
pub struct ExportPipeline {
    collaborator: Arc<dyn RenderCollaborator>,
    sink: Arc<dyn DownloadSink>,
    config: ExportConfig,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ExportPipeline {
    /// Pipeline with the default configuration.
    #[must_use]
    pub fn new(collaborator: Arc<dyn RenderCollaborator>, sink: Arc<dyn DownloadSink>) -> Self {
        Self::with_config(collaborator, sink, ExportConfig::default())
    }

    /// Pipeline with a custom configuration.
    #[must_use]
    pub fn with_config(
        collaborator: Arc<dyn RenderCollaborator>,
        sink: Arc<dyn DownloadSink>,
        config: ExportConfig,
    ) -> Self {
        Self {
            collaborator,
            sink,
            config,
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export the surface's canvas as a PNG.
    ///
    /// The selection is cleared for the capture and restored afterwards,
    /// also on failure. Nothing else on the surface changes apart from the
    /// last-export record.
    ///
    /// # Errors
    ///
    /// Returns the first [`ExportError`] hit along the way; its
    /// [`ExportError::user_message`] is meant for display.
    pub async fn run(&self, surface: &mut EditingSurface) -> Result<ExportReport, ExportError> {
        let selection = surface.selection().clone();
        let result = self.export(surface).await;

        if !self.config.restore_delay.is_zero() {
            tokio::time::sleep(self.config.restore_delay).await;
        }
        surface.restore_selection(&selection);

        match &result {
            Ok(report) => info!(
                file = %report.file_name,
                bytes = report.bytes,
                degraded = report.degraded(),
                "Export completed"
            ),
            Err(err) => error!(error = %err, "Export failed"),
        }
        result
    }

    async fn export(&self, surface: &mut EditingSurface) -> Result<ExportReport, ExportError> {
        if surface.canvas().is_none() {
            return Err(ExportError::CanvasNotFound(surface.config().canvas_id.clone()));
        }

        surface.deselect_all();
        if self.config.settle_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let snapshot = surface.create_snapshot().map_err(|err| match err {
            StudioError::CanvasNotFound(id) => ExportError::CanvasNotFound(id),
            other => ExportError::ExtractionFailed(other.to_string()),
        })?;
        debug!(
            html_bytes = snapshot.html_content.len(),
            components = snapshot.components.len(),
            style_bytes = snapshot.styles.len(),
            "Canvas extracted"
        );

        let document = RenderDocument::generate(&snapshot, surface.catalog(), current_timestamp_ms());
        let generated = self
            .collaborator
            .generate(&document.html, Some(&self.config.document_name))
            .await
            .map_err(|err| ExportError::GenerationTransportFailed(err.detail()))?;
        if !generated.success {
            return Err(ExportError::GenerationTransportFailed(format!(
                "render server did not acknowledge the document: {}",
                generated.message
            )));
        }
        debug!(path = %generated.path, "Render document written");

        let viewport = self.viewport_for(snapshot.canvas_size.width, snapshot.canvas_size.height);
        let request = CaptureRequest {
            canvas_id: self.config.render_canvas_id.clone(),
            viewport,
        };
        let capture = self
            .collaborator
            .capture(&request)
            .await
            .map_err(capture_error)?;

        if capture.readiness == CaptureReadiness::TimedOut {
            if self.config.fail_on_readiness_timeout {
                return Err(ExportError::CaptureTimeout(
                    "render document never signalled readiness".to_string(),
                ));
            }
            warn!("Render document never signalled readiness, using best-effort capture");
        }
        if capture.target == CaptureTarget::Viewport {
            warn!(canvas_id = %request.canvas_id, "Canvas node not captured, using viewport image");
        }

        let file_name = format!("{}-{}.png", self.config.file_prefix, current_timestamp_ms());
        let bytes = capture.png.len();
        let location = self
            .sink
            .deliver(&file_name, capture.png)
            .await
            .map_err(|err| ExportError::DownloadFailed(err.to_string()))?;

        let report = ExportReport {
            file_name,
            location,
            bytes,
            viewport,
            readiness: capture.readiness,
            target: capture.target,
            components: snapshot.components.len(),
        };
        if let Err(err) = surface.record_last_export(&report.file_name, report.degraded()) {
            warn!(error = %err, "Could not record last export");
        }
        Ok(report)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn viewport_for(&self, width: f64, height: f64) -> Viewport {
        let clamp = |v: f64| if v.is_finite() && v > 0.0 { v.ceil() as u32 } else { 0 };
        Viewport {
            width: clamp(width).max(self.config.min_viewport.width),
            height: clamp(height).max(self.config.min_viewport.height),
        }
    }
}

fn capture_error(err: CollaboratorError) -> ExportError {
    match err {
        CollaboratorError::Timeout(detail) => ExportError::CaptureTimeout(detail),
        other => ExportError::CaptureFailed(other.detail()),
    }
}
