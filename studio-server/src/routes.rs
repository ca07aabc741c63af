//! API route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use tracing::info;
use uuid::Uuid;

use studio_core::protocol::{
    CaptureRequest, GenerateRequest, GenerateResponse, TestResponse, READINESS_HEADER,
    TARGET_HEADER,
};
use studio_core::render::DEFAULT_DOCUMENT_NAME;

use crate::browser::capture_page;
use crate::error::ApiError;
use crate::AppState;

/// Longest accepted render document file name.
pub const MAX_FILENAME_LEN: usize = 128;

/// Resolve the requested render document name.
///
/// Absent or blank names fall back to the default. Accepted names are a
/// single plain file name of ASCII letters, digits, `.`, `_` and `-`, not
/// starting with a dot.
///
/// # Errors
///
/// Returns a 400 [`ApiError`] for anything else.
pub fn sanitize_filename(raw: Option<&str>) -> Result<String, ApiError> {
    let name = raw.map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Ok(DEFAULT_DOCUMENT_NAME.to_string());
    }
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !allowed || name.starts_with('.') || name.len() > MAX_FILENAME_LEN {
        return Err(ApiError::bad_request("Invalid filename").with_details(name.to_string()));
    }
    Ok(name.to_string())
}

fn body_error(rejection: &JsonRejection) -> ApiError {
    ApiError::bad_request("Invalid request body").with_details(rejection.body_text())
}

/// `GET /api/test`
#[tracing::instrument(name = "api_test", skip(state))]
pub async fn test_handler(State(state): State<AppState>) -> Json<TestResponse> {
    Json(TestResponse {
        message: "Render server is running!".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        chrome: state.driver().is_available(),
    })
}

/// `POST /api/generate-component`
#[tracing::instrument(name = "generate_component", skip(state, payload))]
pub async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| body_error(&e))?;
    let code = request
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request("Code content is required"))?;
    let filename = sanitize_filename(request.filename.as_deref())?;

    let settings = state.settings();
    let path = settings.render_dir.join(&filename);
    let written = async {
        tokio::fs::create_dir_all(&settings.render_dir).await?;
        tokio::fs::write(&path, code.as_bytes()).await
    }
    .await;
    if let Err(err) = written {
        return Err(ApiError::internal(
            "Failed to generate component",
            &err,
            settings.expose_error_stack,
        ));
    }

    info!(path = %path.display(), bytes = code.len(), "Render document written");
    state.set_last_document(path.clone());

    Ok(Json(GenerateResponse {
        success: true,
        message: format!("{filename} generated successfully"),
        path: path.display().to_string(),
    }))
}

/// `POST /api/capture-screenshot`
#[tracing::instrument(name = "capture_screenshot", skip(state, payload), fields(capture_id = %Uuid::new_v4()))]
pub async fn capture_handler(
    State(state): State<AppState>,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| body_error(&e))?;
    let viewport = request.viewport.at_least_minimum();
    let settings = state.settings();
    info!(
        canvas_id = %request.canvas_id,
        width = viewport.width,
        height = viewport.height,
        url = %settings.render_url,
        "Starting capture"
    );

    let outcome = capture_page(
        state.driver().as_ref(),
        &settings.render_url,
        &request.canvas_id,
        viewport,
        settings.readiness,
    )
    .await
    .map_err(|e| ApiError::internal("Screenshot capture failed", &e, settings.expose_error_stack))?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "image/png"),
            (CACHE_CONTROL, "no-cache"),
            (
                HeaderName::from_static(READINESS_HEADER),
                outcome.readiness.as_protocol().as_str(),
            ),
            (HeaderName::from_static(TARGET_HEADER), outcome.target.as_str()),
        ],
        outcome.png,
    )
        .into_response())
}

/// `GET /render`: the most recently written render document.
#[tracing::instrument(name = "render_document", skip(state))]
pub async fn render_handler(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let settings = state.settings();
    let path = state
        .last_document()
        .unwrap_or_else(|| settings.render_dir.join(DEFAULT_DOCUMENT_NAME));
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("No render document generated")
                .with_details(path.display().to_string()))
        }
        Err(err) => Err(ApiError::internal(
            "Failed to read render document",
            &err,
            settings.expose_error_stack,
        )),
    }
}

/// Liveness probe.
#[tracing::instrument(name = "liveness_probe")]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
