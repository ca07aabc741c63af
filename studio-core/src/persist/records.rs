//! Registry-format records: saved elements, saved projects, last export.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::storage::{SharedStorage, StorageError};
use super::{ELEMENTS_SLOT, LAST_EXPORT_SLOT, PROJECTS_SLOT};
use crate::current_timestamp_ms;
use crate::element::ElementId;
use crate::geometry::{CanvasSize, Position};

/// Schema version stamped on saved projects.
pub const PROJECT_VERSION: u32 = 1;

/// A persisted element in the registry format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedElement {
    /// Element id.
    pub id: ElementId,
    /// Component name, `image`, or the basic type tag.
    pub name: String,
    /// JSON-safe props.
    #[serde(default)]
    pub props: Map<String, Value>,
    /// Sparse canvas-local position.
    pub position: Position,
    /// Extra wrapper styles (cursor, z-index).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<Map<String, Value>>,
    /// Record version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Last save time in milliseconds.
    #[serde(default)]
    pub timestamp: u64,
}

impl SavedElement {
    /// Stack order recorded in `styles.zIndex`, default 1.
    #[must_use]
    pub fn stack_order(&self) -> i64 {
        self.styles
            .as_ref()
            .and_then(|s| s.get("zIndex"))
            .and_then(Value::as_i64)
            .unwrap_or(1)
    }

    /// Boolean prop flag, `false` when absent.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.props.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// String prop.
    #[must_use]
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }
}

/// A persisted project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProject {
    /// Project id.
    pub id: String,
    /// Project name.
    pub name: String,
    /// Elements in canvas order.
    pub elements: Vec<SavedElement>,
    /// Logical canvas size.
    pub canvas: CanvasSize,
    /// Schema version.
    pub version: u32,
    /// Save time in milliseconds.
    pub timestamp: u64,
}

/// The saved-elements slot.
#[derive(Debug, Clone)]
pub struct ElementStore {
    storage: SharedStorage,
}

impl ElementStore {
    /// Store over shared storage.
    #[must_use]
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Every saved element.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or parsed.
    pub fn load_all(&self) -> Result<Vec<SavedElement>, StorageError> {
        match self.storage.get(ELEMENTS_SLOT)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// One saved element.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or parsed.
    pub fn get(&self, id: &ElementId) -> Result<Option<SavedElement>, StorageError> {
        Ok(self.load_all()?.into_iter().find(|e| &e.id == id))
    }

    /// Upsert by id, stamping the timestamp. Returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read, parsed or written.
    pub fn save(&self, mut element: SavedElement) -> Result<SavedElement, StorageError> {
        element.timestamp = current_timestamp_ms();
        let mut all = self.load_all()?;
        match all.iter_mut().find(|e| e.id == element.id) {
            Some(existing) => *existing = element.clone(),
            None => all.push(element.clone()),
        }
        self.write(&all)?;
        tracing::debug!(id = %element.id, name = %element.name, "Element saved");
        Ok(element)
    }

    /// Delete by id. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read, parsed or written.
    pub fn remove(&self, id: &ElementId) -> Result<bool, StorageError> {
        let mut all = self.load_all()?;
        let before = all.len();
        all.retain(|e| &e.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.write(&all)?;
        Ok(true)
    }

    /// Replace the whole slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn replace_all(&self, elements: &[SavedElement]) -> Result<(), StorageError> {
        self.write(elements)
    }

    fn write(&self, elements: &[SavedElement]) -> Result<(), StorageError> {
        self.storage
            .set(ELEMENTS_SLOT, &serde_json::to_string(elements)?)
    }
}

/// The saved-projects slot.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    storage: SharedStorage,
}

impl ProjectStore {
    /// Store over shared storage.
    #[must_use]
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Every saved project.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or parsed.
    pub fn load_all(&self) -> Result<Vec<SavedProject>, StorageError> {
        match self.storage.get(PROJECTS_SLOT)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// One saved project.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or parsed.
    pub fn get(&self, id: &str) -> Result<Option<SavedProject>, StorageError> {
        Ok(self.load_all()?.into_iter().find(|p| p.id == id))
    }

    /// Upsert by id, stamping version and timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read, parsed or written.
    pub fn save(&self, mut project: SavedProject) -> Result<SavedProject, StorageError> {
        project.version = PROJECT_VERSION;
        project.timestamp = current_timestamp_ms();
        let mut all = self.load_all()?;
        match all.iter_mut().find(|p| p.id == project.id) {
            Some(existing) => *existing = project.clone(),
            None => all.push(project.clone()),
        }
        self.storage
            .set(PROJECTS_SLOT, &serde_json::to_string(&all)?)?;
        tracing::info!(id = %project.id, elements = project.elements.len(), "Project saved");
        Ok(project)
    }

    /// Delete by id. Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read, parsed or written.
    pub fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let mut all = self.load_all()?;
        let before = all.len();
        all.retain(|p| p.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.storage
            .set(PROJECTS_SLOT, &serde_json::to_string(&all)?)?;
        Ok(true)
    }
}

/// The most recent export, kept in a derived cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastExport {
    /// Downloaded file name.
    pub file_name: String,
    /// Export time in milliseconds.
    pub timestamp: u64,
    /// Whether the capture was best-effort.
    pub degraded: bool,
}

impl LastExport {
    /// Write the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be written.
    pub fn store(&self, storage: &SharedStorage) -> Result<(), StorageError> {
        storage.set(LAST_EXPORT_SLOT, &serde_json::to_string(self)?)
    }

    /// Read the record, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be read or parsed.
    pub fn load(storage: &SharedStorage) -> Result<Option<Self>, StorageError> {
        match storage.get(LAST_EXPORT_SLOT)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
