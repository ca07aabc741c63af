//! Canvas extraction: turning the live canvas into a render-ready snapshot.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::ComponentCatalog;
use crate::dom::{Document, NodeId};
use crate::error::{StudioError, StudioResult};
use crate::geometry::{canvas_geometry, parse_transform, CanvasSize};
use crate::registry::{position_style, ElementRegistry, RegistryPosition, COMPONENT_ATTR, COMPONENT_ID_ATTR, COMPONENT_TYPE};
use crate::render::RENDER_ROUTE;

/// Classes of nodes inserted by the gesture layer and canvas chrome.
pub const GESTURE_CLASSES: &[&str] = &[
    "moveable-control-box",
    "moveable-line",
    "moveable-control",
    "moveable-direction",
    "moveable-rotation",
    "canvas-boundary",
    "canvas-ruler",
    "canvas-grid",
];

/// Attributes added to elements by the gesture layer.
pub const GESTURE_ATTRS: &[&str] = &["data-moveable", "data-target"];

/// Properties emitted by [`CanvasExtractor::extract_styles`].
pub const STYLE_ALLOW_LIST: &[&str] = &[
    "position",
    "top",
    "left",
    "width",
    "height",
    "transform",
    "background-color",
    "color",
    "font-family",
    "font-size",
    "font-weight",
    "text-align",
    "border",
    "border-radius",
    "box-shadow",
    "opacity",
    "z-index",
    "display",
    "flex-direction",
    "align-items",
    "justify-content",
];

/// Alternative attribute naming a hosted component.
const COMPONENT_NAME_ATTR: &str = "component-name";

/// Prefix of attributes carrying component props.
const PROP_ATTR_PREFIX: &str = "data-prop-";

/// A component to re-instantiate in the render document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Element id.
    pub id: String,
    /// Component name.
    pub name: String,
    /// Descriptor type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Props, including a positional `style` object.
    pub props: Value,
    /// Route the renderer mounts it on.
    pub route: String,
}

/// Render-ready description of the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSnapshot {
    /// Cleaned canvas markup.
    pub html_content: String,
    /// Component descriptors.
    #[serde(rename = "reactComponents")]
    pub components: Vec<ComponentDescriptor>,
    /// Aggregated style rules.
    pub styles: String,
    /// Logical canvas size.
    pub canvas_size: CanvasSize,
    /// Zoom inferred from the canvas root.
    pub zoom: f64,
}

/// Remove gesture-layer nodes, attributes and classes under `root`.
pub fn strip_gesture_artifacts(doc: &mut Document, root: NodeId) {
    let decorations = doc.find_all(root, |d, n| {
        d.attr(n, "data-moveable") == Some("true")
            || d.classes(n).iter().any(|c| GESTURE_CLASSES.contains(c))
    });
    for node in decorations {
        doc.remove(node);
    }
    for node in doc.descendants(root) {
        for attr in GESTURE_ATTRS {
            doc.remove_attr(node, attr);
        }
        doc.retain_classes(node, |c| !c.starts_with("moveable-") && c != "target");
    }
}

/// Reads a snapshot out of a canvas. Never mutates the live document.
#[derive(Debug, Clone, Copy)]
pub struct CanvasExtractor<'a> {
    doc: &'a Document,
    canvas_id: &'a str,
    registry: &'a ElementRegistry,
    catalog: &'a ComponentCatalog,
}

impl<'a> CanvasExtractor<'a> {
    /// Extractor over the canvas with the given id.
    #[must_use]
    pub fn new(
        doc: &'a Document,
        canvas_id: &'a str,
        registry: &'a ElementRegistry,
        catalog: &'a ComponentCatalog,
    ) -> Self {
        Self {
            doc,
            canvas_id,
            registry,
            catalog,
        }
    }

    fn canvas(&self) -> StudioResult<NodeId> {
        self.doc
            .query_by_id(self.canvas_id)
            .ok_or_else(|| StudioError::CanvasNotFound(self.canvas_id.to_string()))
    }

    fn cleaned(&self) -> StudioResult<(Document, NodeId)> {
        let canvas = self.canvas()?;
        let mut scratch = self.doc.clone();
        strip_gesture_artifacts(&mut scratch, canvas);
        Ok((scratch, canvas))
    }

    /// Canvas markup without gesture-layer artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] if the canvas root is missing.
    pub fn extract_html(&self) -> StudioResult<String> {
        let (scratch, canvas) = self.cleaned()?;
        Ok(scratch.inner_html(canvas))
    }

    /// Zoom from the canvas root's transform; 1 when absent or unparseable.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] if the canvas root is missing.
    pub fn zoom(&self) -> StudioResult<f64> {
        let canvas = self.canvas()?;
        Ok(self.zoom_of(canvas))
    }

    fn zoom_of(&self, canvas: NodeId) -> f64 {
        self.doc
            .style(canvas)
            .and_then(|s| s.get("transform"))
            .and_then(parse_transform)
            .map(|m| m.linear_scale())
            .filter(|z| *z > 0.0)
            .unwrap_or(1.0)
    }

    /// Component descriptors: from the registry when it has entries,
    /// otherwise from identity attributes and class-name heuristics.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] if the canvas root is missing.
    pub fn extract_components(&self) -> StudioResult<Vec<ComponentDescriptor>> {
        let canvas = self.canvas()?;
        if !self.registry.is_empty() {
            return Ok(self.registry.snapshot_descriptors(self.doc));
        }

        let zoom = self.zoom_of(canvas);
        let mut found: Vec<(NodeId, String)> = Vec::new();
        let doc = self.doc;
        let mut consider = |node: NodeId, name: String| {
            if !found.iter().any(|(host, _)| doc.contains(*host, node)) {
                found.push((node, name));
            }
        };

        for node in doc.find_all(canvas, |d, n| {
            d.attr(n, COMPONENT_ATTR).is_some() || d.attr(n, COMPONENT_NAME_ATTR).is_some()
        }) {
            let name = doc
                .attr(node, COMPONENT_ATTR)
                .or_else(|| doc.attr(node, COMPONENT_NAME_ATTR))
                .unwrap_or_default()
                .to_string();
            consider(node, name);
        }

        for spec in self.catalog.specs() {
            let stem = spec.kind.class_stem();
            let candidates = [stem.clone(), format!("{stem}-background"), format!("{stem}-component")];
            for class in &candidates {
                for node in doc.find_all(canvas, |d, n| d.has_class(n, class)) {
                    consider(node, spec.kind.name().to_string());
                }
            }
        }

        Ok(found
            .into_iter()
            .enumerate()
            .map(|(index, (node, name))| self.describe(node, &name, canvas, zoom, index))
            .collect())
    }

    fn describe(
        &self,
        node: NodeId,
        name: &str,
        canvas: NodeId,
        zoom: f64,
        index: usize,
    ) -> ComponentDescriptor {
        let doc = self.doc;
        let mut props = Map::new();
        for (attr, value) in doc.attrs(node) {
            if let Some(key) = attr.strip_prefix(PROP_ATTR_PREFIX) {
                let parsed = serde_json::from_str(value)
                    .unwrap_or_else(|_| Value::String(value.to_string()));
                props.insert(camel_case(key), parsed);
            }
        }
        let text = doc.text_content(node);
        if !text.trim().is_empty() {
            props.insert("children".to_string(), Value::String(text.trim().to_string()));
        }
        let rect = canvas_geometry(doc, node, canvas, zoom)
            .map(|g| g.rect)
            .unwrap_or_default();
        let position = RegistryPosition {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            transform: None,
            z_index: doc
                .style(node)
                .and_then(|s| s.get("z-index"))
                .and_then(|z| z.trim().parse().ok()),
        };
        props.insert("style".to_string(), position_style(&position));

        let id = doc
            .attr(node, COMPONENT_ID_ATTR)
            .or_else(|| doc.id_attr(node))
            .map_or_else(|| format!("component_{index}"), String::from);
        ComponentDescriptor {
            id,
            name: name.to_string(),
            kind: COMPONENT_TYPE.to_string(),
            props: Value::Object(props),
            route: RENDER_ROUTE.to_string(),
        }
    }

    /// One rule per descendant with an id or class, listing the allowed
    /// resolved properties.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] if the canvas root is missing.
    pub fn extract_styles(&self) -> StudioResult<String> {
        let (scratch, canvas) = self.cleaned()?;
        let mut rules = Vec::new();
        for node in scratch.descendants(canvas) {
            if !scratch.is_element(node) {
                continue;
            }
            let selector = match scratch.id_attr(node) {
                Some(id) if !id.is_empty() => format!("#{id}"),
                _ => {
                    let classes = scratch.classes(node);
                    if classes.is_empty() {
                        continue;
                    }
                    format!(".{}", classes.join("."))
                }
            };
            let computed = scratch.computed_style(node);
            let declarations: String = STYLE_ALLOW_LIST
                .iter()
                .filter_map(|prop| {
                    computed
                        .get(prop)
                        .filter(|v| !v.is_empty() && *v != "initial" && *v != "normal")
                        .map(|v| format!("  {prop}: {v};\n"))
                })
                .collect();
            if !declarations.is_empty() {
                rules.push(format!("{selector} {{\n{declarations}}}\n"));
            }
        }
        Ok(rules.join("\n"))
    }

    /// Full snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] if the canvas root is missing.
    pub fn create_snapshot(&self) -> StudioResult<CanvasSnapshot> {
        let canvas = self.canvas()?;
        let zoom = self.zoom_of(canvas);
        let rect = self.doc.bounding_rect(canvas);
        let snapshot = CanvasSnapshot {
            html_content: self.extract_html()?,
            components: self.extract_components()?,
            styles: self.extract_styles()?,
            canvas_size: CanvasSize::new((rect.width / zoom).floor(), (rect.height / zoom).floor()),
            zoom,
        };
        tracing::debug!(
            components = snapshot.components.len(),
            width = snapshot.canvas_size.width,
            height = snapshot.canvas_size.height,
            zoom = snapshot.zoom,
            "Canvas snapshot created"
        );
        Ok(snapshot)
    }
}

pub(crate) fn camel_case(kebab: &str) -> String {
    let mut out = String::with_capacity(kebab.len());
    let mut upper = false;
    for ch in kebab.chars() {
        if ch == '-' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    struct Fixture {
        doc: Document,
        canvas: NodeId,
        registry: ElementRegistry,
        catalog: ComponentCatalog,
    }

    fn fixture(zoom: f64) -> Fixture {
        let mut doc = Document::new();
        let canvas = doc.create_element("div");
        doc.set_attr(canvas, "id", "canvas");
        doc.set_attr(
            canvas,
            "style",
            &format!("position: relative; width: 800px; height: 600px; transform: scale({zoom}); transform-origin: top left"),
        );
        doc.append_child(doc.body(), canvas);
        let catalog = ComponentCatalog::standard();
        Fixture {
            doc,
            canvas,
            registry: ElementRegistry::new(Arc::new(catalog.clone())),
            catalog,
        }
    }

    fn add(doc: &mut Document, canvas: NodeId, id: &str, css: &str) -> NodeId {
        let node = doc.create_element("div");
        doc.set_attr(node, "id", id);
        doc.set_attr(node, "class", "moveable-element target absolute");
        doc.set_attr(node, "data-target", "true");
        doc.set_attr(node, "style", css);
        doc.append_child(canvas, node);
        node
    }

    #[test]
    fn html_strips_gesture_artifacts() {
        let mut f = fixture(1.0);
        add(&mut f.doc, f.canvas, "element_1", "left: 10px; top: 10px; width: 50px; height: 50px");
        let control = f.doc.create_element("div");
        f.doc.set_attr(control, "class", "moveable-control-box");
        let line = f.doc.create_element("div");
        f.doc.set_attr(line, "class", "moveable-line");
        f.doc.append_child(control, line);
        f.doc.append_child(f.canvas, control);
        let grid = f.doc.create_element("div");
        f.doc.set_attr(grid, "data-moveable", "true");
        f.doc.append_child(f.canvas, grid);

        let extractor = CanvasExtractor::new(&f.doc, "canvas", &f.registry, &f.catalog);
        let html = extractor.extract_html().expect("html");
        assert!(!html.contains("moveable"));
        assert!(!html.contains("data-target"));
        assert!(!html.contains("target"));
        assert!(html.contains("id=\"element_1\""));
        assert!(html.contains("class=\"absolute\""));

        // the live document is untouched
        assert!(f.doc.is_connected(control));
    }

    #[test]
    fn missing_canvas_is_an_error() {
        let f = fixture(1.0);
        let extractor = CanvasExtractor::new(&f.doc, "nope", &f.registry, &f.catalog);
        assert!(matches!(extractor.create_snapshot(), Err(StudioError::CanvasNotFound(_))));
    }

    #[test]
    fn snapshot_infers_zoom_and_size() {
        let f = fixture(1.5);
        let extractor = CanvasExtractor::new(&f.doc, "canvas", &f.registry, &f.catalog);
        let snapshot = extractor.create_snapshot().expect("snapshot");
        assert!((snapshot.zoom - 1.5).abs() < 1e-9);
        assert_eq!(snapshot.canvas_size, CanvasSize::new(800.0, 600.0));

        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert!(json.get("htmlContent").is_some());
        assert!(json.get("reactComponents").is_some());
        assert!(json.get("canvasSize").is_some());
    }

    #[test]
    fn styles_use_allow_list_and_selectors() {
        let mut f = fixture(1.0);
        add(
            &mut f.doc,
            f.canvas,
            "element_1",
            "position: absolute; left: 10px; top: 20px; width: 50px; height: 40px; background: #ff0000; cursor: move",
        );
        let extractor = CanvasExtractor::new(&f.doc, "canvas", &f.registry, &f.catalog);
        let styles = extractor.extract_styles().expect("styles");
        assert!(styles.starts_with("#element_1 {\n"));
        assert!(styles.contains("  background-color: #ff0000;\n"));
        assert!(styles.contains("  width: 50px;\n"));
        assert!(!styles.contains("cursor"));
        assert!(!styles.contains("normal"));
    }

    #[test]
    fn heuristic_components_when_registry_empty() {
        let mut f = fixture(2.0);
        let host = add(&mut f.doc, f.canvas, "component_1", "left: 10px; top: 20px; width: 300px; height: 200px; z-index: 2");
        f.doc.set_attr(host, COMPONENT_ATTR, "Prism");
        f.doc.set_attr(host, "data-prop-hue-shift", "0.5");
        f.doc.set_attr(host, "data-prop-label", "hello");
        f.catalog.mount(&mut f.doc, host, "Prism", &Map::new());

        let loose = add(&mut f.doc, f.canvas, "loose", "left: 0px; top: 0px; width: 100px; height: 100px");
        f.doc.set_attr(loose, "class", "waves-component");

        let extractor = CanvasExtractor::new(&f.doc, "canvas", &f.registry, &f.catalog);
        let components = extractor.extract_components().expect("components");
        assert_eq!(components.len(), 2);

        let prism = &components[0];
        assert_eq!(prism.name, "Prism");
        assert_eq!(prism.id, "component_1");
        assert_eq!(prism.props["hueShift"], 0.5);
        assert_eq!(prism.props["label"], "hello");
        assert_eq!(prism.props["style"]["left"], "10px");
        assert_eq!(prism.props["style"]["width"], "300px");
        assert_eq!(prism.props["style"]["zIndex"], 2);

        assert_eq!(components[1].name, "Waves");
        assert_eq!(components[1].id, "loose");
    }

    #[test]
    fn camel_case_conversion() {
        assert_eq!(camel_case("hue-shift"), "hueShift");
        assert_eq!(camel_case("label"), "label");
    }
}
