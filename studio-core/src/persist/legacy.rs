//! Legacy flat snapshot: one slot holding every element as a denormalized
//! bag of resolved CSS values.

use serde::{Deserialize, Serialize};

use super::storage::{SharedStorage, StorageError};
use super::LEGACY_SLOT;
use crate::current_timestamp_ms;
use crate::geometry::{css_number, CanvasSize};

/// Font size as found in legacy bags: either a bare number of pixels or a
/// CSS length string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FontSize {
    /// Pixels.
    Px(f64),
    /// CSS length.
    Css(String),
}

impl FontSize {
    /// CSS form.
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Px(n) => format!("{}px", css_number(*n)),
            Self::Css(s) => s.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_stack_order() -> i64 {
    1
}

/// One element in the legacy snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyElement {
    /// Element id.
    pub id: String,
    /// Type tag.
    #[serde(rename = "type")]
    pub element_type: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Canvas-local left edge.
    pub x: f64,
    /// Canvas-local top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Inline transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
    /// Stacking order.
    #[serde(default = "default_stack_order")]
    pub z_index: i64,
    /// Visibility flag.
    #[serde(default = "default_true")]
    pub is_visible: bool,
    /// Lock flag.
    #[serde(default)]
    pub is_locked: bool,
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Font family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Font size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    /// Font weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    /// Text color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Text alignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    /// Background color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    /// Border radius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<String>,
    /// Border shorthand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
    /// Box shadow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_shadow: Option<String>,
    /// Opacity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

impl LegacyElement {
    /// Non-geometric style declarations carried by the bag, as CSS pairs.
    #[must_use]
    pub fn style_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |prop: &str, value: Option<String>| {
            if let Some(v) = value {
                pairs.push((prop.to_string(), v));
            }
        };
        push("font-family", self.font_family.clone());
        push("font-size", self.font_size.as_ref().map(FontSize::to_css));
        push("font-weight", self.font_weight.clone());
        push("color", self.color.clone());
        push("text-align", self.text_align.clone());
        push("background-color", self.background_color.clone());
        push("border-radius", self.border_radius.clone());
        push("border", self.border.clone());
        push("box-shadow", self.box_shadow.clone());
        push("opacity", self.opacity.map(css_number));
        pairs
    }
}

/// The whole legacy slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySnapshot {
    /// Elements in canvas order.
    pub elements: Vec<LegacyElement>,
    /// Logical canvas size.
    pub canvas_size: CanvasSize,
    /// Zoom at save time.
    #[serde(default = "default_zoom")]
    pub zoom: f64,
    /// Save time in milliseconds.
    #[serde(default)]
    pub timestamp: u64,
}

fn default_zoom() -> f64 {
    1.0
}

/// Reads and writes the legacy slot.
#[derive(Debug, Clone)]
pub struct LegacyStore {
    storage: SharedStorage,
}

impl LegacyStore {
    /// Store over shared storage.
    #[must_use]
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Overwrite the slot, stamping the timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn write(&self, snapshot: &mut LegacySnapshot) -> Result<(), StorageError> {
        snapshot.timestamp = current_timestamp_ms();
        self.storage
            .set(LEGACY_SLOT, &serde_json::to_string(snapshot)?)
    }

    /// Read the slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or parsed.
    pub fn read(&self) -> Result<Option<LegacySnapshot>, StorageError> {
        match self.storage.get(LEGACY_SLOT)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Upsert one element into the slot, keeping the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read, parsed or written.
    pub fn upsert_element(
        &self,
        element: LegacyElement,
        canvas_size: CanvasSize,
        zoom: f64,
    ) -> Result<(), StorageError> {
        let mut snapshot = self.read()?.unwrap_or(LegacySnapshot {
            elements: Vec::new(),
            canvas_size,
            zoom,
            timestamp: 0,
        });
        snapshot.canvas_size = canvas_size;
        snapshot.zoom = zoom;
        match snapshot.elements.iter_mut().find(|e| e.id == element.id) {
            Some(existing) => *existing = element,
            None => snapshot.elements.push(element),
        }
        self.write(&mut snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::persist::MemoryStorage;

    fn bag(id: &str) -> LegacyElement {
        LegacyElement {
            id: id.to_string(),
            element_type: "rectangle".to_string(),
            name: "Rectangle".to_string(),
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 60.0,
            transform: None,
            z_index: 1,
            is_visible: true,
            is_locked: false,
            content: None,
            font_family: None,
            font_size: None,
            font_weight: None,
            color: None,
            text_align: None,
            background_color: Some("#3b82f6".to_string()),
            border_radius: None,
            border: None,
            box_shadow: None,
            opacity: None,
        }
    }

    #[test]
    fn font_size_accepts_numbers_and_strings() {
        let e: LegacyElement = serde_json::from_str(
            r#"{"id":"a","type":"text","x":0,"y":0,"width":1,"height":1,"fontSize":18}"#,
        )
        .expect("parse");
        assert_eq!(e.font_size.as_ref().map(FontSize::to_css).as_deref(), Some("18px"));
        assert!(e.is_visible);
        assert_eq!(e.z_index, 1);

        let e: LegacyElement = serde_json::from_str(
            r#"{"id":"a","type":"text","x":0,"y":0,"width":1,"height":1,"fontSize":"1.5rem"}"#,
        )
        .expect("parse");
        assert_eq!(e.font_size.map(|f| f.to_css()).as_deref(), Some("1.5rem"));
    }

    #[test]
    fn style_pairs_skip_absent_values() {
        let pairs = bag("a").style_pairs();
        assert_eq!(pairs, vec![("background-color".to_string(), "#3b82f6".to_string())]);
    }

    #[test]
    fn upsert_keeps_other_elements() {
        let store = LegacyStore::new(Arc::new(MemoryStorage::new()));
        let size = CanvasSize::new(800.0, 600.0);
        store.upsert_element(bag("a"), size, 1.0).expect("upsert");
        store.upsert_element(bag("b"), size, 1.0).expect("upsert");
        let mut changed = bag("a");
        changed.x = 99.0;
        store.upsert_element(changed, size, 1.5).expect("upsert");

        let snapshot = store.read().expect("read").expect("snapshot");
        assert_eq!(snapshot.elements.len(), 2);
        assert_eq!(snapshot.elements[0].x, 99.0);
        assert!((snapshot.zoom - 1.5).abs() < f64::EPSILON);
        assert!(snapshot.timestamp > 0);
    }
}
