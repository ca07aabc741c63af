//! In-memory registry of component elements on the canvas.
//!
//! Tracks which nodes host catalog components so the extractor can describe
//! them to the renderer by name, props and position.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::catalog::ComponentCatalog;
use crate::dom::{Document, NodeId};
use crate::element::ElementId;
use crate::extract::ComponentDescriptor;
use crate::geometry::{canvas_geometry, px};
use crate::render::RENDER_ROUTE;

/// Attribute naming the component a node hosts.
pub const COMPONENT_ATTR: &str = "data-component";

/// Attribute carrying the registered element id.
pub const COMPONENT_ID_ATTR: &str = "data-component-id";

/// Descriptor type tag for components.
pub const COMPONENT_TYPE: &str = "dynamic-component";

/// Position of a registered component, canvas-local and zoom-normalized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryPosition {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Inline transform, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Inline z-index, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
}

/// A registered component element.
#[derive(Debug, Clone)]
pub struct RegisteredComponent {
    /// Element id.
    pub id: ElementId,
    /// Component name.
    pub name: String,
    /// Import path from the catalog.
    pub import_path: String,
    /// Hosting node.
    pub node: NodeId,
    /// JSON-safe props.
    pub props: Map<String, Value>,
    /// Last recorded position.
    pub position: RegistryPosition,
}

/// Registration request.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Element id.
    pub id: ElementId,
    /// Component name.
    pub name: String,
    /// Hosting node.
    pub node: NodeId,
    /// JSON-safe props.
    pub props: Map<String, Value>,
}

/// The element registry. Owned by the editing surface.
#[derive(Debug, Clone)]
pub struct ElementRegistry {
    catalog: Arc<ComponentCatalog>,
    entries: Vec<RegisteredComponent>,
}

impl ElementRegistry {
    /// Empty registry backed by a catalog.
    #[must_use]
    pub fn new(catalog: Arc<ComponentCatalog>) -> Self {
        Self {
            catalog,
            entries: Vec::new(),
        }
    }

    /// Record a component and tag its node with identity attributes.
    ///
    /// Without a canvas root nothing is recorded. Re-registering an id
    /// replaces the previous entry.
    pub fn register(
        &mut self,
        doc: &mut Document,
        canvas: Option<NodeId>,
        zoom: f64,
        registration: Registration,
    ) -> bool {
        let Some(canvas) = canvas else {
            tracing::warn!(id = %registration.id, "Canvas root missing, component not registered");
            return false;
        };
        let position = measure(doc, registration.node, canvas, zoom);
        doc.set_attr(registration.node, COMPONENT_ATTR, &registration.name);
        doc.set_attr(registration.node, COMPONENT_ID_ATTR, registration.id.as_str());

        self.entries.retain(|e| e.id != registration.id);
        tracing::debug!(id = %registration.id, name = %registration.name, "Component registered");
        self.entries.push(RegisteredComponent {
            import_path: self.catalog.import_path(&registration.name),
            id: registration.id,
            name: registration.name,
            node: registration.node,
            props: registration.props,
            position,
        });
        true
    }

    /// Re-read an entry's position from the document. Unknown ids are ignored.
    pub fn update_position(
        &mut self,
        doc: &Document,
        canvas: Option<NodeId>,
        zoom: f64,
        id: &ElementId,
    ) {
        let Some(canvas) = canvas else {
            return;
        };
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.id == id) {
            entry.position = measure(doc, entry.node, canvas, zoom);
        }
    }

    /// Entry by id.
    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&RegisteredComponent> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Entries in registration order.
    #[must_use]
    pub fn list(&self) -> &[RegisteredComponent] {
        &self.entries
    }

    /// Whether no components are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop an entry.
    pub fn remove(&mut self, id: &ElementId) -> Option<RegisteredComponent> {
        let index = self.entries.iter().position(|e| &e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Drop every entry and strip identity attributes from their nodes.
    pub fn clear(&mut self, doc: &mut Document) {
        for entry in self.entries.drain(..) {
            doc.remove_attr(entry.node, COMPONENT_ATTR);
            doc.remove_attr(entry.node, COMPONENT_ID_ATTR);
        }
    }

    /// Whether a component name can be saved and restored.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.catalog.is_registered(name)
    }

    /// Descriptors of every visible entry, for the render snapshot.
    ///
    /// Entries whose node is hidden with `display: none` are left out so the
    /// renderer does not mount them again.
    #[must_use]
    pub fn snapshot_descriptors(&self, doc: &Document) -> Vec<ComponentDescriptor> {
        self.entries
            .iter()
            .filter(|entry| !is_hidden(doc, entry.node))
            .map(|entry| {
                let mut props = entry.props.clone();
                props.insert("style".to_string(), position_style(&entry.position));
                ComponentDescriptor {
                    id: entry.id.to_string(),
                    name: entry.name.clone(),
                    kind: COMPONENT_TYPE.to_string(),
                    props: Value::Object(props),
                    route: RENDER_ROUTE.to_string(),
                }
            })
            .collect()
    }
}

fn is_hidden(doc: &Document, node: NodeId) -> bool {
    doc.style(node)
        .and_then(|s| s.get("display"))
        .is_some_and(|d| d.trim() == "none")
}

fn measure(doc: &Document, node: NodeId, canvas: NodeId, zoom: f64) -> RegistryPosition {
    let position = canvas_geometry(doc, node, canvas, zoom)
        .map(|g| g.to_position())
        .unwrap_or_default();
    let style = doc.style(node);
    RegistryPosition {
        x: position.x,
        y: position.y,
        width: position.width,
        height: position.height,
        transform: position.transform_css(),
        z_index: style
            .and_then(|s| s.get("z-index"))
            .and_then(|z| z.trim().parse().ok()),
    }
}

/// Absolute-position style object for a descriptor.
///
/// Translation is folded into `left`/`top`; only rotation and scale remain
/// in `transform`.
#[must_use]
pub fn position_style(position: &RegistryPosition) -> Value {
    let mut style = json!({
        "position": "absolute",
        "left": px(position.x),
        "top": px(position.y),
        "width": px(position.width),
        "height": px(position.height),
    });
    if let Some(transform) = &position.transform {
        style["transform"] = json!(transform);
    }
    if let Some(z) = position.z_index {
        style["zIndex"] = json!(z);
    }
    style
}
