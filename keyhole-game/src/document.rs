//! Experience document shapes as authored on disk.
//!
//! These types mirror the JSON exactly and stay lenient: missing fields
//! default so that structural problems surface as validator findings rather
//! than parse failures.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{
    CompletionCriterion, Difficulty, ItemCategory, Key, Position, Progress, RoomConnection,
    Trigger,
};

const fn yes() -> bool {
    true
}

/// A placeable item with its nested children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDoc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: ItemCategory,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default = "yes")]
    pub is_visible: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default = "yes")]
    pub is_interactive: bool,
    #[serde(default = "yes")]
    pub is_examinable: bool,
    #[serde(default)]
    pub is_portable: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_trigger_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examine_trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leads_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contained_items: Vec<ItemDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surface_items: Vec<ItemDoc>,
}

impl ItemDoc {
    /// Depth-first walk over this item and every nested child.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ItemDoc, Option<&'a ItemDoc>)) {
        self.walk_from(None, visit);
    }

    fn walk_from<'a>(
        &'a self,
        parent: Option<&'a ItemDoc>,
        visit: &mut impl FnMut(&'a ItemDoc, Option<&'a ItemDoc>),
    ) {
        visit(self, parent);
        for child in self.contained_items.iter().chain(&self.surface_items) {
            child.walk_from(Some(self), visit);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDoc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_visited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_entered: Option<u32>,
    #[serde(default)]
    pub items: Vec<ItemDoc>,
    #[serde(default)]
    pub connected_rooms: Vec<RoomConnection>,
}

/// The top-level experience document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDoc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub estimated_duration: u32,
    #[serde(default)]
    pub story_intro: String,
    #[serde(default)]
    pub story_outro: String,
    #[serde(default)]
    pub starting_room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_room_id: Option<String>,
    #[serde(default)]
    pub rooms: Vec<RoomDoc>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub keys: Vec<Key>,
    #[serde(default)]
    pub completion_criteria: Vec<CompletionCriterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_state: Option<Progress>,
}

impl ExperienceDoc {
    /// Parse a document from JSON, unwrapping the `experience` envelope if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a `type` discriminator is unknown.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Accepts both `{ "experience": {...} }` and the bare document.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not describe an experience.
    pub fn from_value(mut value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("experience").is_some_and(serde_json::Value::is_object) {
            value = value["experience"].take();
        }
        serde_json::from_value(value)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Declared goal room, ignoring an empty id.
    #[must_use]
    pub fn final_room(&self) -> Option<&str> {
        self.final_room_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Hex SHA-256 over the canonical serialization of the parsed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_vec(self)?;
        let digest = Sha256::digest(&canonical);
        Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
    }

    /// Every item in every room, depth first, with its room id and parent item.
    #[must_use]
    pub fn all_items(&self) -> Vec<(&str, &ItemDoc, Option<&ItemDoc>)> {
        let mut out = Vec::new();
        for room in &self.rooms {
            for item in &room.items {
                item.walk(&mut |doc, parent| out.push((room.id.as_str(), doc, parent)));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "id": "mini", "name": "Mini", "startingRoomId": "hall",
        "rooms": [{"id": "hall", "name": "Hall",
                   "items": [{"id": "crate", "name": "Crate", "category": "CONTAINER",
                              "containedItems": [{"id": "note", "name": "Note"}]}]}]
    }"#;

    #[test]
    fn wrapped_and_bare_documents_parse_identically() {
        let bare = ExperienceDoc::from_json(MINIMAL).unwrap();
        let wrapped = ExperienceDoc::from_json(&format!(r#"{{"experience": {MINIMAL}}}"#)).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare.fingerprint().unwrap(), wrapped.fingerprint().unwrap());
        assert_eq!(bare.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn fingerprint_follows_document_content() {
        let original = ExperienceDoc::from_json(MINIMAL).unwrap();
        let renamed = ExperienceDoc::from_json(&MINIMAL.replace("\"Note\"", "\"Letter\"")).unwrap();
        assert_ne!(original.fingerprint().unwrap(), renamed.fingerprint().unwrap());
        assert_eq!(original.fingerprint().unwrap(), original.clone().fingerprint().unwrap());
    }

    #[test]
    fn lenient_defaults_apply() {
        let doc = ExperienceDoc::from_json(MINIMAL).unwrap();
        let crate_doc = &doc.rooms[0].items[0];
        assert!(crate_doc.is_visible);
        assert!(crate_doc.is_examinable);
        assert!(!crate_doc.is_portable);
        assert_eq!(doc.final_room(), None);
        assert!(doc.completion_criteria.is_empty());
    }

    #[test]
    fn all_items_walks_nested_children() {
        let doc = ExperienceDoc::from_json(MINIMAL).unwrap();
        let items: Vec<_> = doc
            .all_items()
            .into_iter()
            .map(|(room, item, parent)| (room, item.id.as_str(), parent.map(|p| p.id.as_str())))
            .collect();
        assert_eq!(
            items,
            vec![("hall", "crate", None), ("hall", "note", Some("crate"))]
        );
    }

    #[test]
    fn unknown_trigger_type_fails_to_parse() {
        let json = r#"{"id": "x", "triggers": [{"id": "t", "type": "MindReader"}]}"#;
        assert!(ExperienceDoc::from_json(json).is_err());
    }
}
