//! # Studio Export
//!
//! Turns the live canvas into a PNG by way of an external render server.
//!
//! ```text
//! EditingSurface ──snapshot──▶ RenderDocument ──generate──▶ render server
//!                                                                │
//!        DownloadSink ◀──png── capture (readiness wait, fallback)┘
//! ```
//!
//! The [`ExportPipeline`] drives the sequence. The server side is abstracted
//! behind [`RenderCollaborator`]; [`HttpCollaborator`] speaks the JSON/PNG
//! contract from `studio_core::protocol`. Finished images go to a
//! [`DownloadSink`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collaborator;
pub mod error;
pub mod pipeline;
pub mod sink;

pub use collaborator::{Capture, HttpCollaborator, RenderCollaborator};
pub use error::{CollaboratorError, ExportError, SinkError};
pub use pipeline::{ExportConfig, ExportPipeline, ExportReport};
pub use sink::{DirectorySink, DownloadSink, MemorySink};
