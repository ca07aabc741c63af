//! Dual-format persistence.
//!
//! - **Registry format**: a slot of [`SavedElement`]s and a slot of
//!   [`SavedProject`]s, upserted by id.
//! - **Legacy format**: one [`LegacySnapshot`] slot mirrored from the canvas on
//!   a debounce.
//!
//! The formats are written independently; loading prefers the registry
//! format (see [`load`]).

mod legacy;
mod loader;
mod records;
mod storage;
mod sync;

pub use legacy::{FontSize, LegacyElement, LegacySnapshot, LegacyStore};
pub use loader::{
    load, try_legacy_format, try_registry_format, LoadSource, LoadedCanvas, RestoredElement,
    BASIC_FLAG, DISPLAY_NAME_PROP, IMAGE_DATA_PROP, IMAGE_FLAG, LOCKED_PROP, VISIBLE_PROP,
};
pub use records::{
    ElementStore, LastExport, ProjectStore, SavedElement, SavedProject, PROJECT_VERSION,
};
pub use storage::{FileStorage, MemoryStorage, SharedStorage, Storage, StorageError};
pub use sync::{DebouncedSync, DEFAULT_DEBOUNCE};

/// Legacy flat snapshot slot.
pub const LEGACY_SLOT: &str = "studio_canvas_data";

/// Saved-elements slot.
pub const ELEMENTS_SLOT: &str = "studio_saved_elements";

/// Saved-projects slot.
pub const PROJECTS_SLOT: &str = "studio_saved_projects";

/// Derived cache: the last export record.
pub const LAST_EXPORT_SLOT: &str = "studio_last_export";

/// Every slot owned by the studio, cleared together.
pub const ALL_SLOTS: [&str; 4] = [LEGACY_SLOT, ELEMENTS_SLOT, PROJECTS_SLOT, LAST_EXPORT_SLOT];

/// Erase every studio slot.
///
/// All-or-nothing from the caller's point of view: if any removal fails,
/// slots already removed are written back before the error is returned.
///
/// # Errors
///
/// Returns the first storage error encountered.
pub fn clear_all_saved_data(storage: &dyn Storage) -> Result<(), StorageError> {
    let mut previous = Vec::with_capacity(ALL_SLOTS.len());
    for slot in ALL_SLOTS {
        previous.push((slot, storage.get(slot)?));
    }

    for (index, (slot, _)) in previous.iter().enumerate() {
        if let Err(e) = storage.remove(slot) {
            tracing::error!(slot = %slot, error = %e, "Clear failed, restoring removed slots");
            for (restored, value) in &previous[..index] {
                if let Some(value) = value {
                    if let Err(restore_err) = storage.set(restored, value) {
                        tracing::error!(slot = %restored, error = %restore_err, "Slot restore failed");
                    }
                }
            }
            return Err(e);
        }
    }
    tracing::info!("All saved studio data cleared");
    Ok(())
}
