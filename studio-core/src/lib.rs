//! # Studio Core
//!
//! Core logic for a visual design studio: a virtual canvas of
//! absolutely-positioned elements that can be transformed, styled, persisted
//! and exported as a render-ready snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                  EditingSurface                   │
//! ├───────────────────────────────────────────────────┤
//! │  Scene              │  ElementRegistry            │
//! │  - PlacedElements   │  - component descriptors    │
//! │  - Selection        │  ComponentCatalog           │
//! │  - Stack orders     │  - kinds, handlers          │
//! ├───────────────────────────────────────────────────┤
//! │  Document (DOM)     │  Persistence                │
//! │  - nodes, styles    │  - registry format          │
//! │  - layout, matrices │  - legacy snapshot          │
//! ├───────────────────────────────────────────────────┤
//! │  CanvasExtractor  →  CanvasSnapshot  →  Render    │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! The crate is synchronous and owns no global state; everything hangs off the
//! [`EditingSurface`] composition root. The async export pipeline lives in
//! `studio-export`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod dom;
pub mod element;
pub mod error;
pub mod extract;
pub mod geometry;
pub mod persist;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod scene;
pub mod surface;

pub use catalog::{
    ComponentCatalog, ComponentCategory, ComponentKind, ComponentSpec, Handler, HandlerTable,
    Prop, PropMap, Resolution,
};
pub use dom::{Document, NodeId};
pub use element::{ElementId, ElementKind, PlacedElement};
pub use error::{StudioError, StudioResult};
pub use extract::{CanvasExtractor, CanvasSnapshot, ComponentDescriptor};
pub use geometry::{CanvasSize, ElementGeometry, Matrix2D, Point, Position, Rect, Size};
pub use persist::{
    clear_all_saved_data, DebouncedSync, FileStorage, LastExport, LegacySnapshot, MemoryStorage,
    SavedElement, SavedProject, SharedStorage, Storage, StorageError,
};
pub use registry::ElementRegistry;
pub use render::{RenderDocument, RenderMetadata};
pub use scene::{Scene, Selection, StackPolicy};
pub use surface::{EditingSurface, Gesture, LoadReport, Modifiers, SurfaceConfig};

/// Studio core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current time in milliseconds since the Unix epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
