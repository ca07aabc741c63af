//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;
use url::Url;

use studio_core::render::RENDER_ROUTE;

use crate::browser::ReadinessPolicy;

/// Default port of the render server.
pub const DEFAULT_PORT: u16 = 3001;

/// Default request body limit in megabytes. Render documents inline every
/// image on the canvas as a data URL, so this is generous.
pub const DEFAULT_BODY_LIMIT_MB: usize = 1000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The render URL could not be parsed.
    #[error("Invalid render URL {url}: {reason}")]
    InvalidRenderUrl {
        /// Offending value.
        url: String,
        /// Parser message.
        reason: String,
    },
}

/// Render server arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "studio-render", version, about = "Studio render server")]
pub struct Args {
    /// Port to listen on (localhost only).
    #[arg(long, env = "STUDIO_RENDER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory render documents are written to.
    #[arg(long, env = "STUDIO_RENDER_DIR", default_value = "render")]
    pub render_dir: PathBuf,

    /// URL the browser loads before capturing. Defaults to this server's
    /// own render route.
    #[arg(long, env = "STUDIO_RENDER_URL")]
    pub render_url: Option<String>,

    /// Browser executable; searched for in common locations when absent.
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Readiness probes before capturing anyway.
    #[arg(long, default_value_t = 10)]
    pub poll_attempts: u32,

    /// Pause between readiness probes, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Include the error chain in error responses.
    #[arg(long, env = "STUDIO_EXPOSE_ERROR_STACK")]
    pub expose_error_stack: bool,

    /// Request body limit in megabytes.
    #[arg(long, default_value_t = DEFAULT_BODY_LIMIT_MB)]
    pub body_limit_mb: usize,
}

impl Args {
    /// Resolve the arguments into server settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRenderUrl`] if `--render-url` is not a
    /// valid URL.
    pub fn settings(&self) -> Result<ServerSettings, ConfigError> {
        let raw = self
            .render_url
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}{RENDER_ROUTE}", self.port));
        let render_url = Url::parse(&raw).map_err(|e| ConfigError::InvalidRenderUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(ServerSettings {
            render_dir: self.render_dir.clone(),
            render_url,
            readiness: ReadinessPolicy {
                max_attempts: self.poll_attempts.max(1),
                interval: Duration::from_millis(self.poll_interval_ms),
            },
            expose_error_stack: self.expose_error_stack,
            body_limit: self.body_limit_mb.saturating_mul(1024 * 1024),
        })
    }
}

/// Resolved server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Where render documents are written.
    pub render_dir: PathBuf,
    /// Page the browser captures.
    pub render_url: Url,
    /// Readiness polling.
    pub readiness: ReadinessPolicy,
    /// Whether error responses carry the error chain.
    pub expose_error_stack: bool,
    /// Request body limit in bytes.
    pub body_limit: usize,
}

impl ServerSettings {
    /// Settings for a server on `port` writing into `render_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRenderUrl`] if the derived URL is invalid.
    pub fn local(port: u16, render_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        Args {
            port,
            render_dir: render_dir.into(),
            render_url: None,
            chrome_path: None,
            poll_attempts: ReadinessPolicy::default().max_attempts,
            poll_interval_ms: 1000,
            expose_error_stack: false,
            body_limit_mb: DEFAULT_BODY_LIMIT_MB,
        }
        .settings()
    }
}
