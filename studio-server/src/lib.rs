//! # Studio Render Server
//!
//! Local HTTP service the export pipeline hands render documents to. It
//! stores the document, serves it on the render route, and captures it with
//! a headless browser once the page signals readiness.
//!
//! This library is used by both the binary and integration tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::DefaultBodyLimit;
use axum::http::{header, request, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use url::Url;

use studio_core::protocol::{CAPTURE_PATH, GENERATE_PATH, READINESS_HEADER, TARGET_HEADER, TEST_PATH};
use studio_core::render::RENDER_ROUTE;

pub mod browser;
#[cfg(feature = "chrome")]
pub mod cdp;
pub mod config;
pub mod error;
pub mod routes;

pub use browser::{
    locate_chrome, wait_until_ready, BrowserDriver, BrowserPage, CaptureError, Readiness,
    ReadinessPolicy, UnavailableBrowser,
};
pub use config::{Args, ServerSettings};
pub use error::ApiError;

/// Liveness probe route.
pub const LIVENESS_PATH: &str = "/health/live";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<ServerSettings>,
    driver: Arc<dyn BrowserDriver>,
    last_document: Arc<RwLock<Option<PathBuf>>>,
}

impl AppState {
    /// State for `settings` capturing through `driver`.
    #[must_use]
    pub fn new(settings: ServerSettings, driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            settings: Arc::new(settings),
            driver,
            last_document: Arc::new(RwLock::new(None)),
        }
    }

    /// Server settings.
    #[must_use]
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Browser backend.
    #[must_use]
    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    /// Path of the most recently written render document.
    #[must_use]
    pub fn last_document(&self) -> Option<PathBuf> {
        self.last_document
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remember the most recently written render document.
    pub fn set_last_document(&self, path: PathBuf) {
        *self
            .last_document
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(path);
    }
}

/// Whether `origin` is a loopback origin.
#[must_use]
pub fn is_local_origin(origin: &HeaderValue) -> bool {
    origin
        .to_str()
        .ok()
        .and_then(|o| Url::parse(o).ok())
        .is_some_and(|url| matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]")))
}

/// CORS restricted to loopback origins. The capture headers are exposed so
/// browser clients can tell a fallback capture apart.
fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &HeaderValue, _parts: &request::Parts| is_local_origin(origin),
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            HeaderName::from_static(READINESS_HEADER),
            HeaderName::from_static(TARGET_HEADER),
        ])
}

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings().body_limit;
    Router::new()
        .route(TEST_PATH, get(routes::test_handler))
        .route(GENERATE_PATH, post(routes::generate_handler))
        .route(CAPTURE_PATH, post(routes::capture_handler))
        .route(RENDER_ROUTE, get(routes::render_handler))
        .route(LIVENESS_PATH, get(routes::liveness))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                // Request ID for log correlation
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(build_cors_layer()),
        )
        .with_state(state)
}

/// The browser backend this build supports, for the browser at `executable`.
#[cfg(feature = "chrome")]
#[must_use]
pub fn default_driver(executable: Option<PathBuf>) -> Arc<dyn BrowserDriver> {
    Arc::new(cdp::ChromeDriver::new(executable))
}

/// The browser backend this build supports, for the browser at `executable`.
#[cfg(not(feature = "chrome"))]
#[must_use]
pub fn default_driver(executable: Option<PathBuf>) -> Arc<dyn BrowserDriver> {
    if let Some(path) = executable {
        tracing::warn!(path = %path.display(), "Built without the chrome feature, captures are disabled");
    }
    Arc::new(UnavailableBrowser)
}
