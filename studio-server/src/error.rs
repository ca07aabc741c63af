//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use studio_core::protocol::ApiErrorBody;

/// An error answered as `{error, details, stack?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub body: ApiErrorBody,
}

impl ApiError {
    /// Error with a summary only.
    #[must_use]
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiErrorBody {
                error: error.into(),
                details: None,
                stack: None,
            },
        }
    }

    /// 400 with a summary.
    #[must_use]
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// 404 with a summary.
    #[must_use]
    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error)
    }

    /// 500 for `cause`; the error chain goes into `stack` when `expose_stack`.
    #[must_use]
    pub fn internal(
        error: impl Into<String>,
        cause: &(dyn std::error::Error + 'static),
        expose_stack: bool,
    ) -> Self {
        let mut err = Self::new(StatusCode::INTERNAL_SERVER_ERROR, error);
        err.body.details = Some(cause.to_string());
        if expose_stack {
            err.body.stack = Some(error_chain(cause));
        }
        err
    }

    /// Attach details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("  caused by: {cause}"));
        source = cause.source();
    }
    lines.join("\n")
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.body.details {
            Some(details) => write!(f, "{} ({}): {details}", self.body.error, self.status),
            None => write!(f, "{} ({})", self.body.error, self.status),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.body.error, details = ?self.body.details, "Request failed");
        } else {
            tracing::debug!(status = %self.status, error = %self.body.error, "Request rejected");
        }
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn internal_hides_stack_unless_exposed() {
        let cause = Outer(std::io::Error::other("disk full"));
        let err = ApiError::internal("Failed to generate component", &cause, false);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body.details.as_deref(), Some("outer"));
        assert!(err.body.stack.is_none());

        let err = ApiError::internal("Failed to generate component", &cause, true);
        assert_eq!(
            err.body.stack.as_deref(),
            Some("outer\n  caused by: disk full")
        );
    }

    #[test]
    fn body_omits_empty_fields() {
        let err = ApiError::bad_request("Code content is required");
        let json = serde_json::to_value(&err.body).expect("serialize");
        assert_eq!(json, serde_json::json!({"error": "Code content is required"}));
    }

    #[test]
    fn display_includes_details() {
        let err = ApiError::not_found("No render document").with_details("render/render.html");
        assert_eq!(
            err.to_string(),
            "No render document (404 Not Found): render/render.html"
        );
    }
}
