//! Reconstructing a canvas from storage.
//!
//! Each format is a pure function from raw slot text to restored element
//! descriptions; [`load`] tries the registry format first and falls back to
//! the legacy snapshot when it holds no records.

use serde_json::{Map, Value};

use super::legacy::LegacySnapshot;
use super::records::SavedElement;
use super::storage::{Storage, StorageError};
use super::{ELEMENTS_SLOT, LEGACY_SLOT};
use crate::catalog::{ComponentCatalog, ComponentKind, Resolution};
use crate::dom::css_property_name;
use crate::element::{ElementId, ElementKind, ImageSource};
use crate::geometry::{CanvasSize, Position};

/// Prop flag marking image records.
pub const IMAGE_FLAG: &str = "isImageElement";

/// Prop flag marking basic shape/text records.
pub const BASIC_FLAG: &str = "isBasicElement";

/// Prop holding an image element's data URL or address.
pub const IMAGE_DATA_PROP: &str = "imageData";

/// Prop overriding the layers-list name.
pub const DISPLAY_NAME_PROP: &str = "displayName";

/// Prop flag for locked elements.
pub const LOCKED_PROP: &str = "isLocked";

/// Prop flag for visibility, `true` when absent.
pub const VISIBLE_PROP: &str = "isVisible";

/// Surface bookkeeping props that are never passed to a component.
const RESERVED_PROPS: [&str; 3] = [DISPLAY_NAME_PROP, LOCKED_PROP, VISIBLE_PROP];

/// Which format a canvas was restored from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Saved-elements slot.
    Registry,
    /// Legacy snapshot slot.
    Legacy,
}

/// Everything needed to rebuild one element.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredElement {
    /// Element id.
    pub id: ElementId,
    /// Kind.
    pub kind: ElementKind,
    /// Catalog kind for components.
    pub component: Option<ComponentKind>,
    /// Image source for images.
    pub image: Option<ImageSource>,
    /// Layers-list name.
    pub display_name: String,
    /// Canvas-local position.
    pub position: Position,
    /// Explicit transform (legacy bags carry the raw inline value).
    pub transform: Option<String>,
    /// Stacking order.
    pub stack_order: i64,
    /// Lock flag.
    pub locked: bool,
    /// Visibility flag.
    pub visible: bool,
    /// Text content.
    pub content: Option<String>,
    /// Style declarations applied over the kind defaults.
    pub styles: Vec<(String, String)>,
    /// Component props.
    pub props: Map<String, Value>,
}

impl RestoredElement {
    fn new(id: ElementId, kind: ElementKind, position: Position) -> Self {
        Self {
            id,
            kind,
            component: None,
            image: None,
            display_name: String::new(),
            position,
            transform: None,
            stack_order: 1,
            locked: false,
            visible: true,
            content: None,
            styles: Vec::new(),
            props: Map::new(),
        }
    }
}

/// A reconstructed canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCanvas {
    /// Format used.
    pub source: LoadSource,
    /// Raw records found in the slot.
    pub record_count: usize,
    /// Restorable elements, in saved order.
    pub elements: Vec<RestoredElement>,
    /// Names of records that could not be restored.
    pub skipped: Vec<String>,
    /// Canvas size, when the format records it.
    pub canvas_size: Option<CanvasSize>,
    /// Zoom, when the format records it.
    pub zoom: Option<f64>,
}

impl LoadedCanvas {
    fn empty(source: LoadSource) -> Self {
        Self {
            source,
            record_count: 0,
            elements: Vec::new(),
            skipped: Vec::new(),
            canvas_size: None,
            zoom: None,
        }
    }
}

fn value_to_css(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the saved-elements slot.
///
/// Images and basic elements are recognised by their prop flags; everything
/// else is a component and must resolve against the catalog to be restored.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the slot is not valid JSON.
pub fn try_registry_format(
    raw: Option<&str>,
    catalog: &ComponentCatalog,
) -> Result<LoadedCanvas, StorageError> {
    let mut loaded = LoadedCanvas::empty(LoadSource::Registry);
    let Some(raw) = raw else {
        return Ok(loaded);
    };
    let records: Vec<SavedElement> = serde_json::from_str(raw)?;
    loaded.record_count = records.len();

    for record in records {
        match restore_record(&record, catalog) {
            Some(element) => loaded.elements.push(element),
            None => {
                tracing::warn!(id = %record.id, name = %record.name, "Skipping unrestorable element");
                loaded.skipped.push(record.name.clone());
            }
        }
    }
    Ok(loaded)
}

fn restore_record(record: &SavedElement, catalog: &ComponentCatalog) -> Option<RestoredElement> {
    let mut element = if record.flag(IMAGE_FLAG) {
        let src = record.prop_str(IMAGE_DATA_PROP)?;
        let file_name = record.prop_str("fileName").unwrap_or("image");
        let mut element =
            RestoredElement::new(record.id.clone(), ElementKind::Image, record.position.clone());
        element.image = Some(ImageSource {
            src: src.to_string(),
            file_name: file_name.to_string(),
        });
        element.display_name = format!("Image: {file_name}");
        element
    } else if record.flag(BASIC_FLAG) {
        let kind = record
            .prop_str("elementType")
            .and_then(ElementKind::from_type_tag)
            .filter(|k| k.is_basic())?;
        let mut element = RestoredElement::new(record.id.clone(), kind, record.position.clone());
        element.content = record.prop_str("content").map(String::from);
        if let Some(Value::Object(styles)) = record.props.get("styles") {
            element.styles = styles
                .iter()
                .filter_map(|(k, v)| value_to_css(v).map(|v| (css_property_name(k), v)))
                .collect();
        }
        element
    } else {
        let spec = match catalog.resolve(&record.name) {
            Resolution::Resolved(spec) if spec.is_available() => spec,
            Resolution::Resolved(_) | Resolution::Unresolved(_) => return None,
        };
        let mut element = RestoredElement::new(
            record.id.clone(),
            ElementKind::DynamicComponent,
            record.position.clone(),
        );
        element.component = Some(spec.kind);
        element.props = record
            .props
            .iter()
            .filter(|(key, _)| !RESERVED_PROPS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        element.display_name = spec.display_name.to_string();
        element
    };

    if let Some(name) = record.prop_str(DISPLAY_NAME_PROP) {
        element.display_name = name.to_string();
    }
    if element.display_name.is_empty() {
        element.display_name = element
            .kind
            .defaults()
            .map_or_else(|| record.name.clone(), |d| d.display_name.to_string());
    }
    element.locked = record.flag(LOCKED_PROP);
    element.visible = record
        .props
        .get(VISIBLE_PROP)
        .and_then(Value::as_bool)
        .unwrap_or(true);
    element.stack_order = record.stack_order();
    Some(element)
}

/// Parse the legacy snapshot slot.
///
/// Component and image bags carry no restorable content in this format and
/// are skipped.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if the slot is not valid JSON.
pub fn try_legacy_format(raw: Option<&str>) -> Result<LoadedCanvas, StorageError> {
    let mut loaded = LoadedCanvas::empty(LoadSource::Legacy);
    let Some(raw) = raw else {
        return Ok(loaded);
    };
    let snapshot: LegacySnapshot = serde_json::from_str(raw)?;
    loaded.record_count = snapshot.elements.len();
    loaded.canvas_size = Some(snapshot.canvas_size);
    loaded.zoom = Some(snapshot.zoom);

    for bag in snapshot.elements {
        let Some(kind) = ElementKind::from_type_tag(&bag.element_type).filter(|k| k.is_basic())
        else {
            tracing::warn!(id = %bag.id, kind = %bag.element_type, "Skipping legacy element");
            loaded.skipped.push(bag.element_type.clone());
            continue;
        };
        let position = Position {
            x: bag.x,
            y: bag.y,
            width: bag.width,
            height: bag.height,
            rotation: None,
            scale: None,
        };
        let mut element = RestoredElement::new(ElementId::new(bag.id.clone()), kind, position);
        element.styles = bag.style_pairs();
        element.display_name = if bag.name.is_empty() {
            kind.defaults()
                .map_or_else(String::new, |d| d.display_name.to_string())
        } else {
            bag.name
        };
        element.transform = bag.transform.filter(|t| !t.is_empty() && t != "none");
        element.stack_order = bag.z_index;
        element.locked = bag.is_locked;
        element.visible = bag.is_visible;
        element.content = bag.content;
        loaded.elements.push(element);
    }
    Ok(loaded)
}

/// Load the canvas: registry format first, legacy snapshot if the registry
/// slot holds no records. A corrupt registry slot also falls back.
///
/// Returns `None` when neither slot has anything to restore.
///
/// # Errors
///
/// Returns an error if the storage cannot be read or the legacy slot is
/// corrupt.
pub fn load(
    storage: &dyn Storage,
    catalog: &ComponentCatalog,
) -> Result<Option<LoadedCanvas>, StorageError> {
    match try_registry_format(storage.get(ELEMENTS_SLOT)?.as_deref(), catalog) {
        Ok(loaded) if loaded.record_count > 0 => return Ok(Some(loaded)),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "Saved elements unreadable, trying legacy snapshot"),
    }
    match storage.get(LEGACY_SLOT)? {
        Some(raw) => Ok(Some(try_legacy_format(Some(&raw))?)),
        None => Ok(None),
    }
}
