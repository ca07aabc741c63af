//! Error types for studio operations.

use thiserror::Error;

use crate::persist::StorageError;

/// Result type for studio operations.
pub type StudioResult<T> = Result<T, StudioError>;

/// Errors that can occur in studio operations.
///
/// Editing operations on the surface never return these to their callers;
/// they are logged and the operation becomes a no-op. Extraction and explicit
/// user actions (clear, export) surface them.
#[derive(Debug, Error)]
pub enum StudioError {
    /// The canvas root node does not exist.
    #[error("Canvas root not found: {0}")]
    CanvasNotFound(String),

    /// Element not found in the scene.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A component name did not resolve against the catalog.
    #[error("Unknown component: {0}")]
    UnknownComponent(String),

    /// A component kind was registered twice.
    #[error("Component already registered: {0}")]
    DuplicateComponent(String),

    /// Invalid element operation.
    #[error("Invalid operation on element: {0}")]
    InvalidOperation(String),

    /// The scene and the document disagree about which nodes are elements.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persistence error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
