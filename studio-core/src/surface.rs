//! The editing surface: composition root for one canvas.
//!
//! Owns the document, the scene, the element registry and the stores, and
//! keeps them in step. Referential errors (missing canvas, unknown ids,
//! locked targets) are logged and turn the operation into a no-op; only
//! explicit actions such as saving, loading and clearing return errors.
//!
//! Gestures follow a two-step protocol: [`EditingSurface::apply_gesture`]
//! writes the gesture layer's inline styles while the pointer moves, and
//! [`EditingSurface::commit_transform`] reads the result back into the
//! element's geometry record when it ends.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};

use crate::catalog::{
    deserialize_props, serialize_props, ComponentCatalog, ComponentKind, PropMap, Resolution,
};
use crate::current_timestamp_ms;
use crate::dom::{Document, InlineStyle, NodeId};
use crate::element::{ElementId, ElementKind, ImageSource, PlacedElement, BASE_STYLE, IMAGE_BOX};
use crate::error::{StudioError, StudioResult};
use crate::extract::{camel_case, CanvasExtractor, CanvasSnapshot};
use crate::geometry::{
    canvas_geometry, parse_length, px, CanvasSize, ElementGeometry, Point, Position, Size,
};
use crate::persist::{
    self, clear_all_saved_data, DebouncedSync, ElementStore, FontSize, LastExport, LegacyElement,
    LegacySnapshot, LegacyStore, LoadSource, ProjectStore, RestoredElement, SavedElement,
    SavedProject, SharedStorage, BASIC_FLAG, DEFAULT_DEBOUNCE, DISPLAY_NAME_PROP, IMAGE_DATA_PROP,
    IMAGE_FLAG, LOCKED_PROP, PROJECT_VERSION, VISIBLE_PROP,
};
use crate::registry::{ElementRegistry, Registration, COMPONENT_ATTR, COMPONENT_ID_ATTR};
use crate::scene::{LayerEntry, Scene, Selection, StackPolicy};

/// Class carried by every placed-element node.
pub const ELEMENT_CLASS: &str = "moveable-element";

/// Attribute carrying a placed element's id.
pub const ELEMENT_ID_ATTR: &str = "data-element-id";

/// Attribute marking image elements.
pub const IMAGE_ATTR: &str = "data-image-element";

/// Offset applied to duplicates, in un-zoomed canvas pixels.
pub const DUPLICATE_OFFSET: f64 = 20.0;

/// Properties reported by [`EditingSurface::current_styles`].
pub const PANEL_PROPERTIES: [&str; 15] = [
    "width",
    "height",
    "transform",
    "background-color",
    "color",
    "border-radius",
    "font-size",
    "font-family",
    "font-weight",
    "font-style",
    "text-align",
    "line-height",
    "letter-spacing",
    "text-decoration",
    "opacity",
];

const ELEMENT_CLASSES: &str = "moveable-element target absolute";
const CONTROL_BOX_CLASS: &str = "moveable-control-box";
const CONTROL_LINE_CLASS: &str = "moveable-line";
const COMPONENT_LAYER_STYLE: &str = "width: 100%; height: 100%; pointer-events: none;";
const IMAGE_STYLE: &str =
    "width: 100%; height: 100%; object-fit: contain; pointer-events: none; user-select: none;";
const EMPTY_BACKGROUND: &str = "rgba(0, 0, 0, 0)";

/// Inline properties owned by layout and bookkeeping rather than the user.
const LAYOUT_PROPERTIES: &[&str] = &[
    "position",
    "cursor",
    "user-select",
    "left",
    "top",
    "width",
    "height",
    "transform",
    "z-index",
];

/// Surface configuration.
#[derive(Debug, Clone)]
pub struct SurfaceConfig {
    /// Id of the canvas root node.
    pub canvas_id: String,
    /// Initial logical canvas size.
    pub canvas_size: CanvasSize,
    /// Screen offset of the canvas root.
    pub canvas_offset: Point,
    /// Where the first spawned element lands.
    pub spawn_origin: Point,
    /// Diagonal step between successive spawn positions.
    pub spawn_step: f64,
    /// Spawn positions before the cascade wraps.
    pub spawn_slots: usize,
    /// Delay before the legacy snapshot is rewritten.
    pub debounce: Duration,
    /// Whether ctrl-click extends the selection.
    pub multi_select: bool,
    /// Stack-order policy.
    pub stack_policy: StackPolicy,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            canvas_id: "studio-canvas".to_string(),
            canvas_size: CanvasSize::new(800.0, 600.0),
            canvas_offset: Point::new(40.0, 40.0),
            spawn_origin: Point::new(50.0, 50.0),
            spawn_step: 20.0,
            spawn_slots: 10,
            debounce: DEFAULT_DEBOUNCE,
            multi_select: false,
            stack_policy: StackPolicy::default(),
        }
    }
}

/// Inline style changes written by the gesture layer while a gesture runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Move; the transform carries the translation.
    Drag {
        /// New transform.
        transform: String,
    },
    /// Resize; dragging a left or top handle also translates.
    Resize {
        /// New width in pixels.
        width: f64,
        /// New height in pixels.
        height: f64,
        /// New transform, if the handle moved the origin.
        transform: Option<String>,
    },
    /// Rotate.
    Rotate {
        /// New transform.
        transform: String,
    },
    /// Uniform scale.
    Scale {
        /// New transform.
        transform: String,
    },
}

/// Keyboard state during a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Ctrl held.
    pub ctrl: bool,
}

/// Outcome of [`EditingSurface::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Format the canvas was restored from.
    pub source: LoadSource,
    /// Elements placed on the canvas.
    pub restored: usize,
    /// Names of records that could not be restored.
    pub skipped: Vec<String>,
}

/// The editing surface.
#[derive(Debug)]
pub struct EditingSurface {
    config: SurfaceConfig,
    catalog: Arc<ComponentCatalog>,
    document: Document,
    canvas: Option<NodeId>,
    scene: Scene,
    registry: ElementRegistry,
    storage: SharedStorage,
    elements: ElementStore,
    projects: ProjectStore,
    legacy: LegacyStore,
    zoom: f64,
    canvas_size: CanvasSize,
    multi_select: bool,
    sync: DebouncedSync,
    spawned: usize,
    control_box: Option<NodeId>,
    project_id: Option<String>,
}

impl EditingSurface {
    /// Surface without a canvas root. Editing is a no-op until
    /// [`create_canvas`](Self::create_canvas) is called.
    #[must_use]
    pub fn new(config: SurfaceConfig, catalog: Arc<ComponentCatalog>, storage: SharedStorage) -> Self {
        Self {
            scene: Scene::new(config.stack_policy),
            registry: ElementRegistry::new(Arc::clone(&catalog)),
            elements: ElementStore::new(Arc::clone(&storage)),
            projects: ProjectStore::new(Arc::clone(&storage)),
            legacy: LegacyStore::new(Arc::clone(&storage)),
            sync: DebouncedSync::new(config.debounce),
            canvas_size: config.canvas_size,
            multi_select: config.multi_select,
            document: Document::new(),
            canvas: None,
            zoom: 1.0,
            spawned: 0,
            control_box: None,
            project_id: None,
            catalog,
            storage,
            config,
        }
    }

    /// Surface with its canvas root already created.
    #[must_use]
    pub fn with_canvas(
        config: SurfaceConfig,
        catalog: Arc<ComponentCatalog>,
        storage: SharedStorage,
    ) -> Self {
        let mut surface = Self::new(config, catalog, storage);
        surface.create_canvas();
        surface
    }

    /// Create the canvas root, or return the existing one.
    pub fn create_canvas(&mut self) -> NodeId {
        if let Some(canvas) = self.canvas {
            return canvas;
        }
        let canvas = self.document.create_element("div");
        self.document.set_attr(canvas, "id", &self.config.canvas_id);
        self.document.set_attr(canvas, "class", "studio-canvas");
        self.document.set_attr(
            canvas,
            "style",
            "position: relative; transform-origin: top left; background: #ffffff; overflow: hidden;",
        );
        self.document.set_style(canvas, "left", &px(self.config.canvas_offset.x));
        self.document.set_style(canvas, "top", &px(self.config.canvas_offset.y));
        let body = self.document.body();
        self.document.append_child(body, canvas);
        self.canvas = Some(canvas);
        self.apply_canvas_style(canvas);
        tracing::debug!(id = %self.config.canvas_id, "Canvas root created");
        canvas
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    /// Component catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ComponentCatalog> {
        &self.catalog
    }

    /// The live document.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Canvas root, if created.
    #[must_use]
    pub fn canvas(&self) -> Option<NodeId> {
        self.canvas
    }

    /// Canvas state.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Component registry.
    #[must_use]
    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    /// Backing storage.
    #[must_use]
    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Current zoom.
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Logical canvas size.
    #[must_use]
    pub fn canvas_size(&self) -> CanvasSize {
        self.canvas_size
    }

    /// Element by id.
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&PlacedElement> {
        self.scene.get(id)
    }

    /// Last committed geometry of an element.
    #[must_use]
    pub fn geometry(&self, id: &ElementId) -> Option<ElementGeometry> {
        self.scene.get(id).map(|e| e.geometry)
    }

    /// Current selection.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        self.scene.selection()
    }

    /// Layers list, highest stack order first.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerEntry> {
        self.scene.layers()
    }

    /// Whether ctrl-click extends the selection.
    #[must_use]
    pub fn multi_select(&self) -> bool {
        self.multi_select
    }

    /// Enable or disable ctrl-click multi-selection.
    pub fn set_multi_select(&mut self, enabled: bool) {
        self.multi_select = enabled;
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Place a basic element. `at` defaults to the next spawn position.
    ///
    /// The new element is selected.
    pub fn add_element(&mut self, kind: ElementKind, at: Option<Point>) -> Option<ElementId> {
        if !kind.is_basic() {
            tracing::warn!(kind = %kind, "Not a basic element kind");
            return None;
        }
        let canvas = self.require_canvas()?;
        let id = self.mint_id(kind.id_prefix());
        let at = at.unwrap_or_else(|| self.next_spawn_point());
        let node = self.build_basic_node(canvas, &id, kind)?;
        let order = self.scene.allocate_stack_order();
        self.place_node(node, at, None, order);

        let display_name = kind
            .defaults()
            .map_or_else(String::new, |d| d.display_name.to_string());
        Some(self.finish_insert(PlacedElement {
            id,
            kind,
            component: None,
            image: None,
            node,
            locked: false,
            visible: true,
            stack_order: order,
            display_name,
            geometry: ElementGeometry::default(),
        }))
    }

    /// Place a catalog component by name.
    ///
    /// Unknown and unavailable components are refused. Props are merged over
    /// the catalog defaults after serialization, so handlers are stored by
    /// name and values that cannot be serialized are dropped.
    pub fn add_component(
        &mut self,
        name: &str,
        props: &PropMap,
        at: Option<Point>,
    ) -> Option<ElementId> {
        let catalog = Arc::clone(&self.catalog);
        let spec = match catalog.resolve(name) {
            Resolution::Resolved(spec) if spec.is_available() => spec,
            Resolution::Resolved(spec) => {
                tracing::warn!(name = %spec.kind, "Component has no implementation");
                return None;
            }
            Resolution::Unresolved(name) => {
                tracing::warn!(name = %name, "Unknown component");
                return None;
            }
        };
        let canvas = self.require_canvas()?;

        let mut json_props = catalog.default_props(spec.kind.name());
        json_props.extend(serialize_props(props, catalog.handlers()));

        let id = self.mint_id(ElementKind::DynamicComponent.id_prefix());
        let at = at.unwrap_or_else(|| self.next_spawn_point());
        let node = self.build_component_node(canvas, &id, spec.kind, &json_props);
        let order = self.scene.allocate_stack_order();
        self.place_node(node, at, Some(spec.size), order);
        self.registry.register(
            &mut self.document,
            Some(canvas),
            self.zoom,
            Registration {
                id: id.clone(),
                name: spec.kind.name().to_string(),
                node,
                props: json_props,
            },
        );

        let id = self.finish_insert(PlacedElement {
            id,
            kind: ElementKind::DynamicComponent,
            component: Some(spec.kind),
            image: None,
            node,
            locked: false,
            visible: true,
            stack_order: order,
            display_name: spec.display_name.to_string(),
            geometry: ElementGeometry::default(),
        });
        self.persist_record(&id);
        Some(id)
    }

    /// Place an image from a data URL or address.
    pub fn add_image(&mut self, src: &str, file_name: &str, at: Option<Point>) -> Option<ElementId> {
        let canvas = self.require_canvas()?;
        let id = self.mint_id(ElementKind::Image.id_prefix());
        let at = at.unwrap_or_else(|| self.next_spawn_point());
        let image = ImageSource {
            src: src.to_string(),
            file_name: file_name.to_string(),
        };
        let node = self.build_image_node(canvas, &id, &image);
        let order = self.scene.allocate_stack_order();
        self.place_node(node, at, Some(IMAGE_BOX), order);

        let id = self.finish_insert(PlacedElement {
            id,
            kind: ElementKind::Image,
            component: None,
            display_name: format!("Image: {file_name}"),
            image: Some(image),
            node,
            locked: false,
            visible: true,
            stack_order: order,
            geometry: ElementGeometry::default(),
        });
        self.persist_record(&id);
        Some(id)
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Resolve a click on `target`.
    ///
    /// Clicking outside any element clears the selection. Clicking a locked
    /// element does nothing. Ctrl-click toggles membership when
    /// multi-selection is enabled.
    pub fn click(&mut self, target: Option<NodeId>, modifiers: Modifiers) {
        let Some(id) = target.and_then(|t| self.element_at(t)) else {
            self.deselect_all();
            return;
        };
        if self.scene.get(&id).is_some_and(|e| e.locked) {
            tracing::debug!(id = %id, "Click on locked element ignored");
            return;
        }
        if modifiers.ctrl && self.multi_select {
            self.scene.toggle_in_selection(&id);
        } else {
            self.scene.select(&id);
        }
        self.sync_control_box();
    }

    /// Element owning `node`, found by walking up to the canvas root.
    #[must_use]
    pub fn element_at(&self, node: NodeId) -> Option<ElementId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if Some(n) == self.canvas {
                return None;
            }
            if self.document.has_class(n, ELEMENT_CLASS) {
                let id = ElementId::from(self.document.attr(n, ELEMENT_ID_ATTR)?);
                return self.scene.get(&id).map(|e| e.id.clone());
            }
            current = self.document.parent(n);
        }
        None
    }

    /// Select exactly one element. Locked and unknown ids are refused.
    pub fn select(&mut self, id: &ElementId) -> bool {
        let selected = self.scene.select(id);
        if !selected {
            tracing::warn!(id = %id, "Element not selectable");
        }
        self.sync_control_box();
        selected
    }

    /// Clear the selection.
    pub fn deselect_all(&mut self) {
        self.scene.deselect_all();
        self.sync_control_box();
    }

    /// Reinstate a previously captured selection, skipping ids that have
    /// since been removed or locked.
    pub fn restore_selection(&mut self, selection: &Selection) {
        self.scene.set_selection(selection);
        self.sync_control_box();
    }

    fn sync_control_box(&mut self) {
        if let Some(node) = self.control_box.take() {
            self.document.remove(node);
        }
        let Some(canvas) = self.canvas else {
            return;
        };
        if self.scene.selection().is_empty() {
            return;
        }
        let control = self.document.create_element("div");
        self.document.set_attr(control, "class", CONTROL_BOX_CLASS);
        let line = self.document.create_element("div");
        self.document.set_attr(line, "class", CONTROL_LINE_CLASS);
        self.document.append_child(control, line);
        self.document.append_child(canvas, control);
        self.control_box = Some(control);
    }

    // ---------------------------------------------------------------------
    // Gestures and editing
    // ---------------------------------------------------------------------

    /// Write a gesture's inline styles. Locked and unknown elements are
    /// refused. The geometry record is not touched until
    /// [`commit_transform`](Self::commit_transform).
    pub fn apply_gesture(&mut self, id: &ElementId, gesture: &Gesture) -> bool {
        let Some(element) = self.scene.get(id) else {
            tracing::warn!(id = %id, "Gesture on unknown element");
            return false;
        };
        if element.locked {
            tracing::debug!(id = %id, "Gesture on locked element ignored");
            return false;
        }
        let node = element.node;
        match gesture {
            Gesture::Drag { transform }
            | Gesture::Rotate { transform }
            | Gesture::Scale { transform } => {
                self.document.set_style(node, "transform", transform);
            }
            Gesture::Resize {
                width,
                height,
                transform,
            } => {
                self.document.set_style(node, "width", &px(*width));
                self.document.set_style(node, "height", &px(*height));
                if let Some(transform) = transform {
                    self.document.set_style(node, "transform", transform);
                }
            }
        }
        true
    }

    /// End a gesture: fold any translation into `left`/`top`, keep only
    /// rotation and scale in the transform, and record the new geometry.
    pub fn commit_transform(&mut self, id: &ElementId) -> Option<ElementGeometry> {
        let canvas = self.require_canvas()?;
        let Some(node) = self.scene.get(id).map(|e| e.node) else {
            tracing::warn!(id = %id, "Commit on unknown element");
            return None;
        };
        let position = canvas_geometry(&self.document, node, canvas, self.zoom)?.to_position();
        self.document.set_style(node, "left", &px(position.x));
        self.document.set_style(node, "top", &px(position.y));
        self.document.set_style(node, "width", &px(position.width));
        self.document.set_style(node, "height", &px(position.height));
        self.document.set_style(
            node,
            "transform",
            &position.transform_css().unwrap_or_default(),
        );
        self.refresh(id)
    }

    /// Set an inline style property verbatim. Values are not validated.
    pub fn set_style(&mut self, id: &ElementId, property: &str, value: &str) -> bool {
        let Some(node) = self.scene.get(id).map(|e| e.node) else {
            tracing::warn!(id = %id, property = %property, "Style edit on unknown element");
            return false;
        };
        self.document.set_style(node, property, value);
        self.refresh(id);
        true
    }

    /// Replace the text of a text-bearing element.
    pub fn set_text(&mut self, id: &ElementId, content: &str) -> bool {
        let Some((node, kind)) = self.scene.get(id).map(|e| (e.node, e.kind)) else {
            tracing::warn!(id = %id, "Text edit on unknown element");
            return false;
        };
        if !kind.is_text_bearing() {
            tracing::warn!(id = %id, kind = %kind, "Element holds no text");
            return false;
        }
        self.document.set_text_content(node, content);
        self.mark_dirty();
        true
    }

    /// Resolved values of the properties-panel set.
    #[must_use]
    pub fn current_styles(&self, id: &ElementId) -> Option<Vec<(String, String)>> {
        let node = self.scene.get(id)?.node;
        let computed = self.document.computed_style(node);
        Some(
            PANEL_PROPERTIES
                .iter()
                .map(|prop| {
                    (
                        (*prop).to_string(),
                        computed.get(prop).unwrap_or_default().to_string(),
                    )
                })
                .collect(),
        )
    }

    /// Props of a component element with handler references resolved
    /// against the catalog's handler table.
    ///
    /// Returns `None` for ids that are not registered components.
    #[must_use]
    pub fn component_props(&self, id: &ElementId) -> Option<PropMap> {
        let entry = self.registry.get(id)?;
        Some(deserialize_props(&entry.props, self.catalog.handlers()))
    }

    fn refresh(&mut self, id: &ElementId) -> Option<ElementGeometry> {
        let canvas = self.canvas?;
        let (node, kind) = self.scene.get(id).map(|e| (e.node, e.kind))?;
        let geometry = canvas_geometry(&self.document, node, canvas, self.zoom).unwrap_or_default();
        if let Some(element) = self.scene.get_mut(id) {
            element.geometry = geometry;
        }
        self.registry
            .update_position(&self.document, Some(canvas), self.zoom, id);
        if !kind.is_basic() {
            self.persist_record(id);
        }
        self.mark_dirty();
        Some(geometry)
    }

    // ---------------------------------------------------------------------
    // Stacking, lock and visibility
    // ---------------------------------------------------------------------

    /// Raise an element by one. Returns the new order.
    pub fn move_layer_up(&mut self, id: &ElementId) -> Option<i64> {
        let order = self.scene.move_up(id);
        self.after_stack_change(id, order)
    }

    /// Lower an element by one. Returns the new order.
    pub fn move_layer_down(&mut self, id: &ElementId) -> Option<i64> {
        let order = self.scene.move_down(id);
        self.after_stack_change(id, order)
    }

    /// Set an explicit stack order, subject to the stack policy.
    pub fn set_stack_order(&mut self, id: &ElementId, order: i64) -> Option<i64> {
        let order = self.scene.set_stack_order(id, order);
        self.after_stack_change(id, order)
    }

    fn after_stack_change(&mut self, id: &ElementId, order: Option<i64>) -> Option<i64> {
        let Some(order) = order else {
            tracing::warn!(id = %id, "Stack change on unknown element");
            return None;
        };
        let (node, kind) = self.scene.get(id).map(|e| (e.node, e.kind))?;
        self.document.set_style(node, "z-index", &order.to_string());
        if !kind.is_basic() {
            self.persist_record(id);
        }
        self.mark_dirty();
        Some(order)
    }

    /// Flip the lock flag. Locking drops the element from the selection.
    /// Returns the new flag.
    pub fn toggle_lock(&mut self, id: &ElementId) -> Option<bool> {
        let Some(element) = self.scene.get_mut(id) else {
            tracing::warn!(id = %id, "Lock toggle on unknown element");
            return None;
        };
        element.locked = !element.locked;
        let (node, locked, kind) = (element.node, element.locked, element.kind);
        self.document
            .set_style(node, "cursor", if locked { "not-allowed" } else { "move" });
        if locked {
            let selection = self.scene.selection().clone();
            self.scene.set_selection(&selection);
            self.sync_control_box();
        }
        if !kind.is_basic() {
            self.persist_record(id);
        }
        self.mark_dirty();
        Some(locked)
    }

    /// Flip the visibility flag. Returns the new flag.
    pub fn toggle_visibility(&mut self, id: &ElementId) -> Option<bool> {
        let Some(element) = self.scene.get_mut(id) else {
            tracing::warn!(id = %id, "Visibility toggle on unknown element");
            return None;
        };
        element.visible = !element.visible;
        let (node, visible, kind) = (element.node, element.visible, element.kind);
        self.apply_visibility(node, kind, visible);
        if !kind.is_basic() {
            self.persist_record(id);
        }
        self.mark_dirty();
        Some(visible)
    }

    fn apply_visibility(&mut self, node: NodeId, kind: ElementKind, visible: bool) {
        if !visible {
            self.document.set_style(node, "display", "none");
            return;
        }
        let display = kind
            .defaults()
            .and_then(|d| InlineStyle::parse(d.style).get("display").map(String::from))
            .unwrap_or_default();
        self.document.set_style(node, "display", &display);
    }

    // ---------------------------------------------------------------------
    // Removal and duplication
    // ---------------------------------------------------------------------

    /// Remove an element and its saved record.
    pub fn remove_element(&mut self, id: &ElementId) -> bool {
        let Some(element) = self.scene.remove(id) else {
            tracing::warn!(id = %id, "Remove of unknown element");
            return false;
        };
        self.document.remove(element.node);
        self.registry.remove(id);
        if let Err(e) = self.elements.remove(id) {
            tracing::warn!(id = %id, error = %e, "Saved record not removed");
        }
        self.sync_control_box();
        self.mark_dirty();
        tracing::info!(id = %id, kind = %element.kind, "Element removed");
        true
    }

    /// Remove every selected element. Returns how many were removed.
    pub fn delete_selected(&mut self) -> usize {
        self.scene
            .selection()
            .ids()
            .iter()
            .filter(|id| self.remove_element(id))
            .count()
    }

    /// Copy an element: new id, offset by [`DUPLICATE_OFFSET`], next stack
    /// order, unlocked. The copy is selected.
    pub fn duplicate_element(&mut self, id: &ElementId) -> Option<ElementId> {
        let canvas = self.require_canvas()?;
        let Some(source) = self.scene.get(id).cloned() else {
            tracing::warn!(id = %id, "Duplicate of unknown element");
            return None;
        };
        let copy_id = ElementId::mint_unique(source.kind.id_prefix(), current_timestamp_ms());
        let node = self.document.deep_clone(source.node)?;
        self.tag_element_node(node, &copy_id);
        self.document.remove_attr(node, COMPONENT_ATTR);
        self.document.remove_attr(node, COMPONENT_ID_ATTR);
        self.document.set_style(node, "cursor", "move");

        let inline = |prop: &str, fallback: f64| {
            self.document
                .style(node)
                .and_then(|s| s.get(prop))
                .and_then(parse_length)
                .unwrap_or(fallback)
        };
        let at = Point::new(
            inline("left", source.geometry.rect.x) + DUPLICATE_OFFSET,
            inline("top", source.geometry.rect.y) + DUPLICATE_OFFSET,
        );
        self.document.append_child(canvas, node);
        let order = self.scene.allocate_stack_order();
        self.place_node(node, at, None, order);

        if source.kind == ElementKind::DynamicComponent {
            let props = self
                .registry
                .get(id)
                .map(|entry| entry.props.clone())
                .unwrap_or_default();
            self.registry.register(
                &mut self.document,
                Some(canvas),
                self.zoom,
                Registration {
                    id: copy_id.clone(),
                    name: source.record_name().to_string(),
                    node,
                    props,
                },
            );
        }

        let copy_id = self.finish_insert(PlacedElement {
            id: copy_id,
            node,
            locked: false,
            stack_order: order,
            display_name: format!("{} Copy", source.display_name),
            geometry: ElementGeometry::default(),
            ..source
        });
        if !source.kind.is_basic() {
            self.persist_record(&copy_id);
        }
        Some(copy_id)
    }

    /// Duplicate every selected element; the copies become the selection.
    pub fn duplicate_selected(&mut self) -> Vec<ElementId> {
        let copies: Vec<ElementId> = self
            .scene
            .selection()
            .ids()
            .iter()
            .filter_map(|id| self.duplicate_element(id))
            .collect();
        self.scene.set_selection(&Selection::from_ids(copies.clone()));
        self.sync_control_box();
        copies
    }

    // ---------------------------------------------------------------------
    // Canvas
    // ---------------------------------------------------------------------

    /// Set the zoom. Non-positive values are ignored.
    ///
    /// Geometry records are zoom-normalized and do not change.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if zoom <= 0.0 || !zoom.is_finite() {
            tracing::warn!(zoom, "Ignoring invalid zoom");
            return false;
        }
        self.zoom = zoom;
        if let Some(canvas) = self.canvas {
            self.apply_canvas_style(canvas);
        }
        self.mark_dirty();
        true
    }

    /// Resize the logical canvas.
    pub fn set_canvas_size(&mut self, size: CanvasSize) {
        self.canvas_size = size;
        if let Some(canvas) = self.canvas {
            self.apply_canvas_style(canvas);
        }
        self.mark_dirty();
    }

    fn apply_canvas_style(&mut self, canvas: NodeId) {
        self.document
            .set_style(canvas, "width", &px(self.canvas_size.width));
        self.document
            .set_style(canvas, "height", &px(self.canvas_size.height));
        self.document
            .set_style(canvas, "transform", &format!("scale({})", self.zoom));
    }

    // ---------------------------------------------------------------------
    // Legacy mirror
    // ---------------------------------------------------------------------

    /// Whether a legacy write is waiting for its debounce.
    #[must_use]
    pub fn has_pending_sync(&self) -> bool {
        self.sync.is_pending()
    }

    /// Drive the debounced legacy mirror. Returns `true` if a write ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.sync.take_due(now) {
            return false;
        }
        if let Err(e) = self.flush_legacy() {
            tracing::warn!(error = %e, "Legacy snapshot not written");
        }
        true
    }

    /// Overwrite the legacy snapshot with the current canvas.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn flush_legacy(&mut self) -> StudioResult<()> {
        self.sync.reset();
        let elements = self
            .scene
            .elements()
            .iter()
            .map(|e| self.legacy_bag(e))
            .collect::<Vec<_>>();
        let count = elements.len();
        self.legacy.write(&mut LegacySnapshot {
            elements,
            canvas_size: self.canvas_size,
            zoom: self.zoom,
            timestamp: 0,
        })?;
        tracing::debug!(elements = count, "Legacy snapshot written");
        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.sync.mark(Instant::now());
    }

    fn legacy_bag(&self, element: &PlacedElement) -> LegacyElement {
        let computed = self.document.computed_style(element.node);
        let rect = self
            .canvas
            .and_then(|c| canvas_geometry(&self.document, element.node, c, self.zoom))
            .map_or(element.geometry.rect, |g| g.rect);
        let text = element.kind.is_text_bearing();
        let resolved = |prop: &str| computed.get(prop).map(String::from);

        LegacyElement {
            id: element.id.to_string(),
            element_type: element.kind.type_tag().to_string(),
            name: element.display_name.clone(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            transform: self
                .document
                .style(element.node)
                .and_then(|s| s.get("transform"))
                .filter(|t| !t.is_empty() && *t != "none")
                .map(String::from),
            z_index: element.stack_order,
            is_visible: element.visible,
            is_locked: element.locked,
            content: text.then(|| self.document.text_content(element.node)),
            font_family: resolved("font-family").filter(|_| text),
            font_size: resolved("font-size").filter(|_| text).map(FontSize::Css),
            font_weight: resolved("font-weight").filter(|_| text),
            color: resolved("color").filter(|_| text),
            text_align: resolved("text-align").filter(|_| text),
            background_color: resolved("background-color").filter(|v| v != EMPTY_BACKGROUND),
            border_radius: resolved("border-radius").filter(|v| v != "0px"),
            border: self
                .document
                .style(element.node)
                .and_then(|s| s.get("border"))
                .map(String::from),
            box_shadow: resolved("box-shadow").filter(|v| v != "none"),
            opacity: resolved("opacity")
                .and_then(|o| o.parse::<f64>().ok())
                .filter(|o| (o - 1.0).abs() > f64::EPSILON),
        }
    }

    // ---------------------------------------------------------------------
    // Registry-format persistence
    // ---------------------------------------------------------------------

    /// Save every element to the element slot and the canvas as a project.
    /// Basic elements are also mirrored into the legacy slot. Later saves
    /// from the same surface update the same project record.
    ///
    /// # Errors
    ///
    /// Returns an error if any slot cannot be read, parsed or written.
    pub fn save_project(&mut self, name: &str) -> StudioResult<SavedProject> {
        let mut saved = Vec::with_capacity(self.scene.len());
        for element in self.scene.elements() {
            if let Some(record) = self.saved_record(&element.id) {
                saved.push(self.elements.save(record)?);
            }
            if element.kind.is_basic() {
                self.legacy
                    .upsert_element(self.legacy_bag(element), self.canvas_size, self.zoom)?;
            }
        }
        let id = self
            .project_id
            .clone()
            .unwrap_or_else(|| format!("project_{}", current_timestamp_ms()));
        let project = self.projects.save(SavedProject {
            id,
            name: name.to_string(),
            elements: saved,
            canvas: self.canvas_size,
            version: PROJECT_VERSION,
            timestamp: 0,
        })?;
        tracing::info!(
            project = %project.id,
            name = %project.name,
            elements = project.elements.len(),
            "Project saved"
        );
        self.project_id = Some(project.id.clone());
        Ok(project)
    }

    /// Replace the canvas with what storage holds: registry format first,
    /// legacy snapshot otherwise. Returns `None` when nothing is saved.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] without a canvas root, or a
    /// storage error if the slots cannot be read.
    pub fn load(&mut self) -> StudioResult<Option<LoadReport>> {
        let canvas = self
            .canvas
            .ok_or_else(|| StudioError::CanvasNotFound(self.config.canvas_id.clone()))?;
        let Some(loaded) = persist::load(self.storage.as_ref(), &self.catalog)? else {
            tracing::debug!("Nothing saved, canvas left as is");
            return Ok(None);
        };

        self.clear_canvas();
        if let Some(size) = loaded.canvas_size {
            self.canvas_size = size;
        }
        if let Some(zoom) = loaded.zoom.filter(|z| *z > 0.0) {
            self.zoom = zoom;
        }
        self.apply_canvas_style(canvas);

        let mut skipped = loaded.skipped;
        let mut restored = 0;
        for element in &loaded.elements {
            if self.restore_element(canvas, element) {
                restored += 1;
            } else {
                skipped.push(element.display_name.clone());
            }
        }
        let next = loaded
            .elements
            .iter()
            .map(|e| e.stack_order)
            .max()
            .map_or(1, |max| (max + 1).max(1));
        self.scene.set_next_stack_order(next);
        self.sync.reset();

        tracing::info!(
            source = ?loaded.source,
            restored,
            skipped = skipped.len(),
            "Canvas loaded"
        );
        Ok(Some(LoadReport {
            source: loaded.source,
            restored,
            skipped,
        }))
    }

    fn restore_element(&mut self, canvas: NodeId, restored: &RestoredElement) -> bool {
        if self.scene.get(&restored.id).is_some() {
            tracing::warn!(id = %restored.id, "Duplicate id in saved data, skipping");
            return false;
        }
        let node = match (restored.kind, &restored.image, restored.component) {
            (ElementKind::Image, Some(image), _) => self.build_image_node(canvas, &restored.id, image),
            (ElementKind::DynamicComponent, _, Some(kind)) => {
                self.build_component_node(canvas, &restored.id, kind, &restored.props)
            }
            (kind, _, _) if kind.is_basic() => {
                match self.build_basic_node(canvas, &restored.id, kind) {
                    Some(node) => node,
                    None => return false,
                }
            }
            (kind, _, _) => {
                tracing::warn!(id = %restored.id, kind = %kind, "Incomplete saved element");
                return false;
            }
        };

        for (property, value) in &restored.styles {
            self.document.set_style(node, property, value);
        }
        if let Some(content) = restored.content.as_deref() {
            if restored.kind.is_text_bearing() {
                self.document.set_text_content(node, content);
            }
        }
        let position = &restored.position;
        self.place_node(
            node,
            Point::new(position.x, position.y),
            Some(Size::new(position.width, position.height)),
            restored.stack_order,
        );
        let transform = restored
            .transform
            .clone()
            .or_else(|| position.transform_css())
            .unwrap_or_default();
        self.document.set_style(node, "transform", &transform);
        if restored.locked {
            self.document.set_style(node, "cursor", "not-allowed");
        }
        if !restored.visible {
            self.apply_visibility(node, restored.kind, false);
        }
        if restored.kind == ElementKind::DynamicComponent {
            self.registry.register(
                &mut self.document,
                Some(canvas),
                self.zoom,
                Registration {
                    id: restored.id.clone(),
                    name: restored
                        .component
                        .map_or_else(String::new, |k| k.name().to_string()),
                    node,
                    props: restored.props.clone(),
                },
            );
        }

        let geometry = canvas_geometry(&self.document, node, canvas, self.zoom).unwrap_or_default();
        self.scene.insert(PlacedElement {
            id: restored.id.clone(),
            kind: restored.kind,
            component: restored.component,
            image: restored.image.clone(),
            node,
            locked: restored.locked,
            visible: restored.visible,
            stack_order: restored.stack_order,
            display_name: restored.display_name.clone(),
            geometry,
        });
        true
    }

    fn clear_canvas(&mut self) {
        self.registry.clear(&mut self.document);
        for element in self.scene.elements() {
            self.document.remove(element.node);
        }
        self.scene.clear();
        self.sync_control_box();
    }

    /// Erase every studio slot. The canvas itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a slot cannot be removed; slots already
    /// removed are restored first.
    pub fn clear_saved_data(&mut self) -> StudioResult<()> {
        clear_all_saved_data(self.storage.as_ref())?;
        self.project_id = None;
        self.sync.reset();
        Ok(())
    }

    fn persist_record(&self, id: &ElementId) {
        let Some(record) = self.saved_record(id) else {
            return;
        };
        if let Err(e) = self.elements.save(record) {
            tracing::warn!(id = %id, error = %e, "Element record not saved");
        }
    }

    fn saved_record(&self, id: &ElementId) -> Option<SavedElement> {
        let element = self.scene.get(id)?;
        let position = self
            .canvas
            .and_then(|c| canvas_geometry(&self.document, element.node, c, self.zoom))
            .unwrap_or(element.geometry)
            .to_position();

        let mut props = match element.kind {
            ElementKind::DynamicComponent => self
                .registry
                .get(id)
                .map(|entry| entry.props.clone())
                .unwrap_or_default(),
            ElementKind::Image => {
                let mut props = Map::new();
                props.insert(IMAGE_FLAG.to_string(), json!(true));
                if let Some(image) = &element.image {
                    props.insert(IMAGE_DATA_PROP.to_string(), json!(image.src));
                    props.insert("fileName".to_string(), json!(image.file_name));
                }
                props
            }
            kind => self.basic_props(element.node, kind),
        };
        props.insert(DISPLAY_NAME_PROP.to_string(), json!(element.display_name));
        props.insert(LOCKED_PROP.to_string(), json!(element.locked));
        props.insert(VISIBLE_PROP.to_string(), json!(element.visible));

        let mut styles = Map::new();
        styles.insert("cursor".to_string(), json!("move"));
        styles.insert("zIndex".to_string(), json!(element.stack_order));

        Some(SavedElement {
            id: id.clone(),
            name: element.record_name().to_string(),
            props,
            position,
            styles: Some(styles),
            version: Some(PROJECT_VERSION),
            timestamp: 0,
        })
    }

    fn basic_props(&self, node: NodeId, kind: ElementKind) -> Map<String, Value> {
        let styles: Map<String, Value> = self
            .document
            .style(node)
            .map(|style| {
                style
                    .iter()
                    .filter(|(prop, value)| {
                        !LAYOUT_PROPERTIES.contains(prop) && !(*prop == "display" && *value == "none")
                    })
                    .map(|(prop, value)| (camel_case(prop), json!(value)))
                    .collect()
            })
            .unwrap_or_default();

        let mut props = Map::new();
        props.insert(BASIC_FLAG.to_string(), json!(true));
        props.insert("elementType".to_string(), json!(kind.type_tag()));
        if kind.is_text_bearing() {
            props.insert(
                "content".to_string(),
                json!(self.document.text_content(node)),
            );
        }
        props.insert("styles".to_string(), Value::Object(styles));
        props
    }

    // ---------------------------------------------------------------------
    // Export support
    // ---------------------------------------------------------------------

    /// Render-ready snapshot of the canvas.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] if the canvas root is missing.
    pub fn create_snapshot(&self) -> StudioResult<CanvasSnapshot> {
        CanvasExtractor::new(
            &self.document,
            &self.config.canvas_id,
            &self.registry,
            &self.catalog,
        )
        .create_snapshot()
    }

    /// Remember the most recent export.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn record_last_export(&self, file_name: &str, degraded: bool) -> StudioResult<()> {
        LastExport {
            file_name: file_name.to_string(),
            timestamp: current_timestamp_ms(),
            degraded,
        }
        .store(&self.storage)?;
        Ok(())
    }

    /// The most recent export, if recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or parsed.
    pub fn last_export(&self) -> StudioResult<Option<LastExport>> {
        Ok(LastExport::load(&self.storage)?)
    }

    /// Verify that element nodes in the canvas and scene entries pair up
    /// one-to-one.
    ///
    /// # Errors
    ///
    /// Returns [`StudioError::CanvasNotFound`] without a canvas root and
    /// [`StudioError::Integrity`] on the first mismatch.
    pub fn check_integrity(&self) -> StudioResult<()> {
        let canvas = self
            .canvas
            .ok_or_else(|| StudioError::CanvasNotFound(self.config.canvas_id.clone()))?;
        let nodes = self
            .document
            .find_all(canvas, |d, n| d.has_class(n, ELEMENT_CLASS));
        for node in &nodes {
            let id = self.document.attr(*node, ELEMENT_ID_ATTR).unwrap_or_default();
            match self.scene.get(&ElementId::from(id)) {
                Some(element) if element.node == *node => {}
                _ => {
                    return Err(StudioError::Integrity(format!(
                        "node for '{id}' has no matching element"
                    )))
                }
            }
        }
        if let Some(orphan) = self.scene.elements().iter().find(|e| !nodes.contains(&e.node)) {
            return Err(StudioError::Integrity(format!(
                "element '{}' has no node on the canvas",
                orphan.id
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Node construction
    // ---------------------------------------------------------------------

    fn require_canvas(&self) -> Option<NodeId> {
        if self.canvas.is_none() {
            tracing::warn!(id = %self.config.canvas_id, "Canvas root missing");
        }
        self.canvas
    }

    fn mint_id(&self, prefix: &str) -> ElementId {
        let now = current_timestamp_ms();
        let id = ElementId::mint(prefix, now);
        if self.scene.get(&id).is_some() {
            ElementId::mint_unique(prefix, now)
        } else {
            id
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn next_spawn_point(&mut self) -> Point {
        let slot = self.spawned % self.config.spawn_slots.max(1);
        self.spawned += 1;
        let offset = self.config.spawn_step * slot as f64;
        Point::new(
            self.config.spawn_origin.x + offset,
            self.config.spawn_origin.y + offset,
        )
    }

    fn tag_element_node(&mut self, node: NodeId, id: &ElementId) {
        self.document.set_attr(node, "id", id.as_str());
        self.document.set_attr(node, ELEMENT_ID_ATTR, id.as_str());
        self.document.set_attr(node, "class", ELEMENT_CLASSES);
    }

    fn build_basic_node(&mut self, canvas: NodeId, id: &ElementId, kind: ElementKind) -> Option<NodeId> {
        let defaults = kind.defaults()?;
        let node = self.document.create_element(kind.tag_name());
        self.tag_element_node(node, id);
        self.document
            .set_attr(node, "style", &format!("{BASE_STYLE} {}", defaults.style));
        if let Some(text) = defaults.text {
            self.document.set_text_content(node, text);
        }
        if defaults.editable {
            self.document.set_attr(node, "contenteditable", "true");
        }
        self.document.append_child(canvas, node);
        Some(node)
    }

    fn build_component_node(
        &mut self,
        canvas: NodeId,
        id: &ElementId,
        kind: ComponentKind,
        props: &Map<String, Value>,
    ) -> NodeId {
        let node = self.document.create_element("div");
        self.tag_element_node(node, id);
        self.document.set_attr(node, "style", BASE_STYLE);
        let layer = self.document.create_element("div");
        self.document.set_attr(layer, "style", COMPONENT_LAYER_STYLE);
        self.document.append_child(node, layer);
        if !self.catalog.mount(&mut self.document, layer, kind.name(), props) {
            tracing::warn!(id = %id, name = %kind, "Component mounted without markup");
        }
        self.document.append_child(canvas, node);
        node
    }

    fn build_image_node(&mut self, canvas: NodeId, id: &ElementId, image: &ImageSource) -> NodeId {
        let node = self.document.create_element("div");
        self.tag_element_node(node, id);
        self.document.set_attr(node, IMAGE_ATTR, "true");
        self.document.set_attr(node, "style", BASE_STYLE);
        let img = self.document.create_element("img");
        self.document.set_attr(img, "src", &image.src);
        self.document.set_attr(img, "alt", &image.file_name);
        self.document.set_attr(img, "draggable", "false");
        self.document.set_attr(img, "style", IMAGE_STYLE);
        self.document.append_child(node, img);
        self.document.append_child(canvas, node);
        node
    }

    fn place_node(&mut self, node: NodeId, at: Point, size: Option<Size>, order: i64) {
        self.document.set_style(node, "left", &px(at.x));
        self.document.set_style(node, "top", &px(at.y));
        if let Some(size) = size {
            self.document.set_style(node, "width", &px(size.width));
            self.document.set_style(node, "height", &px(size.height));
        }
        self.document.set_style(node, "z-index", &order.to_string());
    }

    fn finish_insert(&mut self, mut element: PlacedElement) -> ElementId {
        if let Some(canvas) = self.canvas {
            element.geometry =
                canvas_geometry(&self.document, element.node, canvas, self.zoom).unwrap_or_default();
        }
        let id = element.id.clone();
        tracing::info!(id = %id, kind = %element.kind, order = element.stack_order, "Element added");
        self.scene.insert(element);
        self.scene.select(&id);
        self.sync_control_box();
        self.mark_dirty();
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{MemoryStorage, Storage, ELEMENTS_SLOT, LEGACY_SLOT};

    fn surface() -> EditingSurface {
        EditingSurface::with_canvas(
            SurfaceConfig::default(),
            Arc::new(ComponentCatalog::standard()),
            Arc::new(MemoryStorage::new()),
        )
    }

    #[test]
    fn editing_without_canvas_is_a_noop() {
        let mut surface = EditingSurface::new(
            SurfaceConfig::default(),
            Arc::new(ComponentCatalog::standard()),
            Arc::new(MemoryStorage::new()),
        );
        assert!(surface.add_element(ElementKind::Rectangle, None).is_none());
        assert!(surface.add_component("Prism", &PropMap::new(), None).is_none());
        assert!(surface.scene().is_empty());
        assert!(surface.check_integrity().is_err());
    }

    #[test]
    fn add_element_applies_defaults_and_selects() {
        let mut surface = surface();
        let id = surface
            .add_element(ElementKind::Rectangle, None)
            .expect("added");
        let element = surface.element(&id).expect("element");
        assert_eq!(element.display_name, "Rectangle");
        assert_eq!(element.stack_order, 1);
        assert_eq!(surface.selection(), &Selection::Single(id.clone()));

        let geometry = surface.geometry(&id).expect("geometry");
        assert_eq!(geometry.rect.x, 50.0);
        assert_eq!(geometry.rect.width, 100.0);
        assert_eq!(geometry.rect.height, 60.0);
        assert!(id.as_str().starts_with("element_"));
        surface.check_integrity().expect("integrity");
    }

    #[test]
    fn spawn_positions_cascade() {
        let mut surface = surface();
        let first = surface.add_element(ElementKind::Circle, None).expect("added");
        let second = surface.add_element(ElementKind::Circle, None).expect("added");
        let a = surface.geometry(&first).expect("geometry").rect;
        let b = surface.geometry(&second).expect("geometry").rect;
        assert_eq!(b.x - a.x, 20.0);
        assert_eq!(b.y - a.y, 20.0);
    }

    #[test]
    fn unknown_and_unavailable_components_are_refused() {
        let mut surface = surface();
        assert!(surface.add_component("Nope", &PropMap::new(), None).is_none());
        assert!(surface.add_component("ShimmerButton", &PropMap::new(), None).is_none());
        assert!(surface.registry().is_empty());
    }

    #[test]
    fn component_is_registered_and_saved() {
        let mut surface = surface();
        let id = surface
            .add_component("Waves", &PropMap::new(), Some(Point::new(10.0, 10.0)))
            .expect("added");
        assert!(surface.registry().get(&id).is_some());
        let saved = surface
            .storage()
            .get(ELEMENTS_SLOT)
            .expect("read")
            .expect("slot");
        assert!(saved.contains(id.as_str()));
        assert!(saved.contains("\"name\":\"Waves\""));
    }

    #[test]
    fn click_resolution_walks_to_the_element() {
        let mut surface = surface();
        let id = surface
            .add_component("Prism", &PropMap::new(), None)
            .expect("added");
        surface.deselect_all();
        let node = surface.element(&id).expect("element").node;
        let inner = surface.document().children(node)[0];

        surface.click(Some(inner), Modifiers::default());
        assert_eq!(surface.selection(), &Selection::Single(id));

        surface.click(surface.canvas(), Modifiers::default());
        assert!(surface.selection().is_empty());
    }

    #[test]
    fn ctrl_click_needs_multi_select_mode() {
        let mut surface = surface();
        let a = surface.add_element(ElementKind::Rectangle, None).expect("a");
        let b = surface.add_element(ElementKind::Circle, None).expect("b");
        let node_a = surface.element(&a).expect("a").node;
        let ctrl = Modifiers { ctrl: true };

        surface.click(Some(node_a), ctrl);
        assert_eq!(surface.selection(), &Selection::Single(a.clone()));

        surface.set_multi_select(true);
        surface.select(&b);
        surface.click(Some(node_a), ctrl);
        assert_eq!(surface.selection(), &Selection::Multi(vec![b, a]));
    }

    #[test]
    fn control_box_follows_selection() {
        let mut surface = surface();
        surface.add_element(ElementKind::Rectangle, None);
        assert_eq!(surface.document().query_by_class(CONTROL_BOX_CLASS).len(), 1);
        surface.deselect_all();
        assert!(surface.document().query_by_class(CONTROL_BOX_CLASS).is_empty());
    }

    #[test]
    fn gestures_commit_into_geometry() {
        let mut surface = surface();
        let id = surface
            .add_element(ElementKind::Rectangle, Some(Point::new(100.0, 100.0)))
            .expect("added");

        assert!(surface.apply_gesture(
            &id,
            &Gesture::Drag {
                transform: "translate(30px, 15px)".to_string()
            }
        ));
        assert_eq!(surface.geometry(&id).expect("geometry").rect.x, 100.0);

        let geometry = surface.commit_transform(&id).expect("commit");
        assert!((geometry.rect.x - 130.0).abs() < 1e-9);
        assert!((geometry.rect.y - 115.0).abs() < 1e-9);
        let node = surface.element(&id).expect("element").node;
        assert_eq!(
            surface.document().style(node).and_then(|s| s.get("left")),
            Some("130px")
        );
        assert!(surface
            .document()
            .style(node)
            .and_then(|s| s.get("transform"))
            .is_none());
    }

    #[test]
    fn rotation_survives_commit() {
        let mut surface = surface();
        let id = surface
            .add_element(ElementKind::Rectangle, Some(Point::new(100.0, 100.0)))
            .expect("added");
        surface.apply_gesture(
            &id,
            &Gesture::Rotate {
                transform: "rotate(45deg)".to_string(),
            },
        );
        let position = surface.commit_transform(&id).expect("commit").to_position();
        assert_eq!(position.rotation, Some(45.0));
        assert!(position.scale.is_none());
        assert!((position.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn locked_elements_refuse_gestures_and_selection() {
        let mut surface = surface();
        let id = surface.add_element(ElementKind::Rectangle, None).expect("added");
        assert_eq!(surface.toggle_lock(&id), Some(true));
        assert!(surface.selection().is_empty());

        let node = surface.element(&id).expect("element").node;
        surface.click(Some(node), Modifiers::default());
        assert!(surface.selection().is_empty());
        assert!(!surface.apply_gesture(
            &id,
            &Gesture::Scale {
                transform: "scale(2)".to_string()
            }
        ));
    }

    #[test]
    fn stacking_updates_the_document() {
        let mut surface = surface();
        let a = surface.add_element(ElementKind::Rectangle, None).expect("a");
        let b = surface.add_element(ElementKind::Rectangle, None).expect("b");
        assert_eq!(surface.move_layer_up(&a), Some(2));
        let node = surface.element(&a).expect("a").node;
        assert_eq!(
            surface.document().style(node).and_then(|s| s.get("z-index")),
            Some("2")
        );
        assert_eq!(surface.set_stack_order(&b, 10), Some(10));
        assert_eq!(surface.scene().next_stack_order(), 11);
        assert_eq!(surface.move_layer_down(&ElementId::new("ghost")), None);
    }

    #[test]
    fn visibility_restores_kind_display() {
        let mut surface = surface();
        let id = surface.add_element(ElementKind::Text, None).expect("added");
        let node = surface.element(&id).expect("element").node;
        assert_eq!(surface.toggle_visibility(&id), Some(false));
        assert_eq!(
            surface.document().style(node).and_then(|s| s.get("display")),
            Some("none")
        );
        assert_eq!(surface.toggle_visibility(&id), Some(true));
        assert_eq!(
            surface.document().style(node).and_then(|s| s.get("display")),
            Some("flex")
        );
    }

    #[test]
    fn text_edits_only_apply_to_text_kinds() {
        let mut surface = surface();
        let text = surface.add_element(ElementKind::Heading, None).expect("h1");
        let rect = surface.add_element(ElementKind::Rectangle, None).expect("rect");
        assert!(surface.set_text(&text, "Title"));
        assert!(!surface.set_text(&rect, "nope"));
        let node = surface.element(&text).expect("h1").node;
        assert_eq!(surface.document().text_content(node), "Title");
    }

    #[test]
    fn current_styles_reports_panel_properties() {
        let mut surface = surface();
        let id = surface.add_element(ElementKind::Rectangle, None).expect("added");
        surface.set_style(&id, "opacity", "0.5");
        let styles = surface.current_styles(&id).expect("styles");
        assert_eq!(styles.len(), PANEL_PROPERTIES.len());
        assert!(styles.contains(&("width".to_string(), "100px".to_string())));
        assert!(styles.contains(&("opacity".to_string(), "0.5".to_string())));
        assert!(styles.contains(&("background-color".to_string(), "#3b82f6".to_string())));
    }

    #[test]
    fn debounced_sync_writes_legacy_snapshot() {
        let mut surface = surface();
        surface.add_element(ElementKind::Text, None);
        assert!(surface.has_pending_sync());
        assert!(!surface.tick(Instant::now()));
        assert!(surface.tick(Instant::now() + Duration::from_secs(1)));
        assert!(!surface.has_pending_sync());

        let raw = surface
            .storage()
            .get(LEGACY_SLOT)
            .expect("read")
            .expect("slot");
        let snapshot: LegacySnapshot = serde_json::from_str(&raw).expect("parse");
        assert_eq!(snapshot.elements.len(), 1);
        let bag = &snapshot.elements[0];
        assert_eq!(bag.element_type, "text");
        assert_eq!(bag.content.as_deref(), Some("Click to edit text"));
        assert_eq!(bag.font_size, Some(FontSize::Css("16px".to_string())));
    }

    #[test]
    fn zoom_rejects_non_positive_values() {
        let mut surface = surface();
        assert!(!surface.set_zoom(0.0));
        assert!(surface.set_zoom(1.5));
        let canvas = surface.canvas().expect("canvas");
        assert_eq!(
            surface.document().style(canvas).and_then(|s| s.get("transform")),
            Some("scale(1.5)")
        );
    }

    #[test]
    fn snapshot_excludes_selection_chrome() {
        let mut surface = surface();
        surface.add_element(ElementKind::Rectangle, None);
        let snapshot = surface.create_snapshot().expect("snapshot");
        assert!(!snapshot.html_content.contains("moveable"));
        assert_eq!(snapshot.canvas_size, CanvasSize::new(800.0, 600.0));
    }
}
