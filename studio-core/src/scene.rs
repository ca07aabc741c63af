//! Canvas state model: placed elements, selection and stacking.
//!
//! The scene knows nothing about markup beyond each element's node handle;
//! the [`EditingSurface`](crate::surface::EditingSurface) keeps the document
//! in step with it.

use crate::element::{ElementId, PlacedElement};

/// Current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selection {
    /// Nothing selected.
    #[default]
    None,
    /// One element selected.
    Single(ElementId),
    /// Two or more elements selected, in selection order.
    Multi(Vec<ElementId>),
}

impl Selection {
    /// Build a selection from ids, normalizing by count.
    #[must_use]
    pub fn from_ids(mut ids: Vec<ElementId>) -> Self {
        ids.dedup();
        match ids.len() {
            0 => Self::None,
            1 => Self::Single(ids.remove(0)),
            _ => Self::Multi(ids),
        }
    }

    /// Selected ids in selection order.
    #[must_use]
    pub fn ids(&self) -> Vec<ElementId> {
        match self {
            Self::None => Vec::new(),
            Self::Single(id) => vec![id.clone()],
            Self::Multi(ids) => ids.clone(),
        }
    }

    /// Whether an id is selected.
    #[must_use]
    pub fn contains(&self, id: &ElementId) -> bool {
        match self {
            Self::None => false,
            Self::Single(s) => s == id,
            Self::Multi(ids) => ids.contains(id),
        }
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The primary (first) selected id.
    #[must_use]
    pub fn primary(&self) -> Option<&ElementId> {
        match self {
            Self::None => None,
            Self::Single(id) => Some(id),
            Self::Multi(ids) => ids.first(),
        }
    }
}

/// Rules applied to explicit and relative stack-order changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackPolicy {
    /// Lowest allowed order; `None` allows negatives.
    pub floor: Option<i64>,
}

impl StackPolicy {
    /// Clamp an order to the floor.
    #[must_use]
    pub fn apply(&self, order: i64) -> i64 {
        self.floor.map_or(order, |floor| order.max(floor))
    }
}

/// Entry in the layers list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    /// Element id.
    pub id: ElementId,
    /// Display name.
    pub name: String,
    /// Stacking order.
    pub stack_order: i64,
    /// Whether the element is selected.
    pub selected: bool,
    /// Whether the element is locked.
    pub locked: bool,
    /// Whether the element is visible.
    pub visible: bool,
}

/// The canvas state model.
#[derive(Debug, Clone)]
pub struct Scene {
    elements: Vec<PlacedElement>,
    selection: Selection,
    next_stack_order: i64,
    policy: StackPolicy,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(StackPolicy::default())
    }
}

impl Scene {
    /// Empty scene; the stack-order counter starts at 1.
    #[must_use]
    pub fn new(policy: StackPolicy) -> Self {
        Self {
            elements: Vec::new(),
            selection: Selection::None,
            next_stack_order: 1,
            policy,
        }
    }

    /// Take the next stack order and advance the counter.
    pub fn allocate_stack_order(&mut self) -> i64 {
        let order = self.next_stack_order;
        self.next_stack_order += 1;
        order
    }

    /// Value the next allocation will return.
    #[must_use]
    pub fn next_stack_order(&self) -> i64 {
        self.next_stack_order
    }

    /// Reset the counter, e.g. to `max + 1` after a load.
    pub fn set_next_stack_order(&mut self, next: i64) {
        self.next_stack_order = next;
    }

    /// Add an element.
    pub fn insert(&mut self, element: PlacedElement) {
        self.elements.push(element);
    }

    /// Remove an element, dropping it from the selection.
    pub fn remove(&mut self, id: &ElementId) -> Option<PlacedElement> {
        let index = self.elements.iter().position(|e| &e.id == id)?;
        let ids = self.selection.ids().into_iter().filter(|s| s != id).collect();
        self.selection = Selection::from_ids(ids);
        Some(self.elements.remove(index))
    }

    /// Remove everything and reset selection and counter.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.selection = Selection::None;
        self.next_stack_order = 1;
    }

    /// Element by id.
    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&PlacedElement> {
        self.elements.iter().find(|e| &e.id == id)
    }

    /// Mutable element by id.
    pub fn get_mut(&mut self, id: &ElementId) -> Option<&mut PlacedElement> {
        self.elements.iter_mut().find(|e| &e.id == id)
    }

    /// Elements in insertion order.
    #[must_use]
    pub fn elements(&self) -> &[PlacedElement] {
        &self.elements
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the scene is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Layers sorted by stack order, highest first; ties keep insertion order.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerEntry> {
        let mut sorted: Vec<&PlacedElement> = self.elements.iter().collect();
        sorted.sort_by(|a, b| b.stack_order.cmp(&a.stack_order));
        sorted
            .into_iter()
            .map(|e| LayerEntry {
                id: e.id.clone(),
                name: e.display_name.clone(),
                stack_order: e.stack_order,
                selected: self.selection.contains(&e.id),
                locked: e.locked,
                visible: e.visible,
            })
            .collect()
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Current selection.
    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Select exactly one element. Unknown and locked elements are refused.
    pub fn select(&mut self, id: &ElementId) -> bool {
        if !self.is_selectable(id) {
            return false;
        }
        self.selection = Selection::Single(id.clone());
        true
    }

    /// Add or remove an element from a multi-selection.
    pub fn toggle_in_selection(&mut self, id: &ElementId) -> bool {
        if !self.is_selectable(id) {
            return false;
        }
        let mut ids = self.selection.ids();
        if let Some(index) = ids.iter().position(|s| s == id) {
            ids.remove(index);
        } else {
            ids.push(id.clone());
        }
        self.selection = Selection::from_ids(ids);
        true
    }

    /// Replace the selection, keeping only selectable ids.
    pub fn set_selection(&mut self, selection: &Selection) {
        let ids = selection
            .ids()
            .into_iter()
            .filter(|id| self.is_selectable(id))
            .collect();
        self.selection = Selection::from_ids(ids);
    }

    /// Clear the selection.
    pub fn deselect_all(&mut self) {
        self.selection = Selection::None;
    }

    fn is_selectable(&self, id: &ElementId) -> bool {
        self.get(id).is_some_and(|e| !e.locked)
    }

    // ---------------------------------------------------------------------
    // Stacking
    // ---------------------------------------------------------------------

    /// Raise an element by one. Returns the new order.
    pub fn move_up(&mut self, id: &ElementId) -> Option<i64> {
        let current = self.get(id)?.stack_order;
        self.set_stack_order(id, current + 1)
    }

    /// Lower an element by one. Returns the new order.
    pub fn move_down(&mut self, id: &ElementId) -> Option<i64> {
        let current = self.get(id)?.stack_order;
        self.set_stack_order(id, current - 1)
    }

    /// Set an explicit order, subject to the policy. An order at or above
    /// the counter bumps the counter past it.
    pub fn set_stack_order(&mut self, id: &ElementId, order: i64) -> Option<i64> {
        let order = self.policy.apply(order);
        self.get_mut(id)?.stack_order = order;
        if order >= self.next_stack_order {
            self.next_stack_order = order + 1;
        }
        Some(order)
    }
}
