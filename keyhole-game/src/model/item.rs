//! Items and the id-keyed arena that owns them
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::document::ItemDoc;

/// Broad classification of a placeable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemCategory {
    Furniture,
    Container,
    Device,
    LockMechanism,
    Door,
    #[default]
    Decorative,
    Tool,
    Document,
    Media,
    Electrical,
    Security,
}

/// Opaque placement hint carried through for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Where an item currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemLocation {
    /// Directly in a room's item list
    Room(String),
    /// Inside another item
    Contained(String),
    /// Resting on top of another item
    Surface(String),
    /// Taken by the player
    Inventory,
}

impl ItemLocation {
    /// Id of the parent item, if this item sits in or on another item.
    #[must_use]
    pub fn parent_item(&self) -> Option<&str> {
        match self {
            Self::Contained(id) | Self::Surface(id) => Some(id),
            Self::Room(_) | Self::Inventory => None,
        }
    }
}

/// A placeable thing in a room. Children are referenced by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ItemCategory,
    pub kind: Option<String>,
    pub is_visible: bool,
    pub is_hidden: bool,
    pub is_interactive: bool,
    pub is_examinable: bool,
    pub is_portable: bool,
    pub is_locked: bool,
    pub position: Option<Position>,
    pub visual_asset: Option<String>,
    pub lock_trigger_id: Option<String>,
    pub examine_trigger: Option<String>,
    pub key_id: Option<String>,
    pub leads_to: Option<String>,
    /// Room the item was placed in by the document. Never changes.
    pub room_id: String,
    pub location: ItemLocation,
    pub contained: Vec<String>,
    pub surface: Vec<String>,
}

impl Item {
    fn from_doc(doc: &ItemDoc, room_id: &str, location: ItemLocation) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            description: doc.description.clone(),
            category: doc.category,
            kind: doc.kind.clone(),
            is_visible: doc.is_visible,
            is_hidden: doc.is_hidden,
            is_interactive: doc.is_interactive,
            is_examinable: doc.is_examinable,
            is_portable: doc.is_portable,
            is_locked: doc.is_locked,
            position: doc.position,
            visual_asset: doc.visual_asset.clone(),
            lock_trigger_id: doc.lock_trigger_id.clone(),
            examine_trigger: doc.examine_trigger.clone(),
            key_id: doc.key_id.clone(),
            leads_to: doc.leads_to.clone(),
            room_id: room_id.to_string(),
            location,
            contained: doc.contained_items.iter().map(|c| c.id.clone()).collect(),
            surface: doc.surface_items.iter().map(|c| c.id.clone()).collect(),
        }
    }

    /// Whether a player can currently see the item.
    #[must_use]
    pub const fn is_shown(&self) -> bool {
        self.is_visible && !self.is_hidden
    }

    #[must_use]
    pub fn is_taken(&self) -> bool {
        self.location == ItemLocation::Inventory
    }

    #[must_use]
    pub fn is_door(&self) -> bool {
        self.category == ItemCategory::Door
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
    }

    /// Actions the presentation layer may offer for this item.
    #[must_use]
    pub fn available_actions(&self) -> Vec<&'static str> {
        let mut actions = vec!["examine"];
        if !self.is_interactive {
            return actions;
        }
        if self.is_portable {
            actions.push("take");
        }
        if !self.contained.is_empty() && !self.is_locked {
            actions.push("open");
        }
        if self.lock_trigger_id.is_some() && self.is_locked {
            actions.push("unlock");
        }
        actions
    }
}

/// Raised when two items in one document share an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateItem(pub String);

/// Flat store of every item in an experience, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemStore {
    items: HashMap<String, Item>,
}

impl ItemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item and all of its nested children.
    ///
    /// # Errors
    ///
    /// Returns the first duplicate id encountered. Items inserted before the
    /// duplicate remain in the store.
    pub fn insert_tree(
        &mut self,
        doc: &ItemDoc,
        room_id: &str,
        location: ItemLocation,
    ) -> Result<(), DuplicateItem> {
        if self.items.contains_key(&doc.id) {
            return Err(DuplicateItem(doc.id.clone()));
        }
        self.items
            .insert(doc.id.clone(), Item::from_doc(doc, room_id, location));
        for child in &doc.contained_items {
            self.insert_tree(child, room_id, ItemLocation::Contained(doc.id.clone()))?;
        }
        for child in &doc.surface_items {
            self.insert_tree(child, room_id, ItemLocation::Surface(doc.id.clone()))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Item> {
        self.items.values_mut()
    }

    /// Item ids in sorted order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.items.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove `child` from the child lists of `parent`. Returns whether it was there.
    pub(crate) fn unlink_child(&mut self, parent: &str, child: &str) -> bool {
        let Some(parent) = self.items.get_mut(parent) else {
            return false;
        };
        let before = parent.contained.len() + parent.surface.len();
        parent.contained.retain(|id| id != child);
        parent.surface.retain(|id| id != child);
        before != parent.contained.len() + parent.surface.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> ItemDoc {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn insert_tree_flattens_nested_children() {
        let desk = doc(
            r#"{
                "id": "desk", "name": "Desk", "description": "Oak desk", "category": "FURNITURE",
                "containedItems": [
                    {"id": "drawer", "name": "Drawer", "description": "", "category": "CONTAINER",
                     "containedItems": [{"id": "pen", "name": "Pen", "description": "", "category": "TOOL", "isPortable": true}]}
                ],
                "surfaceItems": [{"id": "lamp", "name": "Lamp", "description": "", "category": "ELECTRICAL"}]
            }"#,
        );
        let mut store = ItemStore::new();
        store
            .insert_tree(&desk, "study", ItemLocation::Room("study".into()))
            .unwrap();

        assert_eq!(store.len(), 4);
        assert_eq!(
            store.get("pen").unwrap().location,
            ItemLocation::Contained("drawer".into())
        );
        assert_eq!(
            store.get("lamp").unwrap().location,
            ItemLocation::Surface("desk".into())
        );
        assert_eq!(store.get("pen").unwrap().room_id, "study");
        assert_eq!(store.get("desk").unwrap().contained, vec!["drawer"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let box_doc = doc(
            r#"{"id": "box", "name": "Box", "description": "", "category": "CONTAINER",
                "containedItems": [{"id": "box", "name": "Inner", "description": ""}]}"#,
        );
        let mut store = ItemStore::new();
        let err = store
            .insert_tree(&box_doc, "hall", ItemLocation::Room("hall".into()))
            .unwrap_err();
        assert_eq!(err, DuplicateItem("box".into()));
    }

    #[test]
    fn available_actions_follow_flags() {
        let mut store = ItemStore::new();
        store
            .insert_tree(
                &doc(
                    r#"{"id": "safe", "name": "Safe", "description": "", "category": "CONTAINER",
                        "isLocked": true, "lockTriggerId": "safe_lock",
                        "containedItems": [{"id": "gem", "name": "Gem", "description": "", "isPortable": true}]}"#,
                ),
                "vault",
                ItemLocation::Room("vault".into()),
            )
            .unwrap();
        assert_eq!(
            store.get("safe").unwrap().available_actions(),
            vec!["examine", "unlock"]
        );
        store.get_mut("safe").unwrap().unlock();
        assert_eq!(
            store.get("safe").unwrap().available_actions(),
            vec!["examine", "open"]
        );
        assert_eq!(
            store.get("gem").unwrap().available_actions(),
            vec!["examine", "take"]
        );
    }

    #[test]
    fn unlink_child_detaches_from_either_list() {
        let mut store = ItemStore::new();
        store
            .insert_tree(
                &doc(
                    r#"{"id": "table", "name": "Table", "description": "",
                        "surfaceItems": [{"id": "cup", "name": "Cup", "description": ""}]}"#,
                ),
                "kitchen",
                ItemLocation::Room("kitchen".into()),
            )
            .unwrap();
        assert!(store.unlink_child("table", "cup"));
        assert!(!store.unlink_child("table", "cup"));
        assert!(store.get("table").unwrap().surface.is_empty());
    }
}
