//! The aggregate root: rooms, items, triggers, keys and progress
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::item::{DuplicateItem, Item, ItemLocation, ItemStore};
use super::key::Key;
use super::progress::Progress;
use super::room::Room;
use super::trigger::Trigger;
use crate::document::{ExperienceDoc, ItemDoc, RoomDoc};
use crate::error::LoadError;
use crate::validator::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

/// Criterion type naming a trigger that must be activated.
pub const TRIGGER_ACTIVATED: &str = "trigger_activated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCriterion {
    /// Only `trigger_activated` is evaluated; other types never block completion.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl CompletionCriterion {
    /// Trigger this criterion waits on, if it is a trigger criterion.
    #[must_use]
    pub fn required_trigger(&self) -> Option<&str> {
        if self.kind == TRIGGER_ACTIVATED {
            self.trigger_id.as_deref().filter(|id| !id.is_empty())
        } else {
            None
        }
    }
}

/// Every mutable entity of one experience instance.
#[derive(Debug, Clone, PartialEq)]
struct EntityState {
    rooms: BTreeMap<String, Room>,
    triggers: BTreeMap<String, Trigger>,
    keys: BTreeMap<String, Key>,
    items: ItemStore,
    progress: Progress,
}

/// A live experience built from a document.
///
/// The document is kept alongside the state so that `reset`, snapshots and
/// mid-session validation can refer back to the authored structure.
#[derive(Debug, Clone)]
pub struct Experience {
    document: Arc<ExperienceDoc>,
    fingerprint: String,
    state: EntityState,
    initial: Arc<EntityState>,
}

impl Experience {
    /// Parse and instantiate an experience.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the document has
    /// integrity problems (missing or duplicate ids, unknown starting room).
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Self::from_document(ExperienceDoc::from_json(json)?)
    }

    /// Instantiate an experience from a parsed document.
    ///
    /// Only problems that make instantiation impossible are rejected; other
    /// structural findings are logged and left to the validator.
    ///
    /// # Errors
    ///
    /// Returns an error on missing or duplicate ids or an unknown starting room.
    pub fn from_document(doc: ExperienceDoc) -> Result<Self, LoadError> {
        Self::from_shared(Arc::new(doc))
    }

    /// # Errors
    ///
    /// See [`Experience::from_document`].
    pub fn from_shared(document: Arc<ExperienceDoc>) -> Result<Self, LoadError> {
        let state = build_state(&document)?;
        let findings = crate::validator::structure::check_structure(&document);
        for finding in findings.iter().filter(|f| f.severity != Severity::Info) {
            log::warn!(
                "experience '{}': {} ({})",
                document.id,
                finding.message,
                finding.category
            );
        }
        let fingerprint = document.fingerprint().map_err(LoadError::Fingerprint)?;
        log::debug!(
            "loaded experience '{}' ({} rooms, {} items, {} triggers, {} keys)",
            document.id,
            state.rooms.len(),
            state.items.len(),
            state.triggers.len(),
            state.keys.len()
        );
        Ok(Self {
            document,
            fingerprint,
            initial: Arc::new(state.clone()),
            state,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.document.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.document.name
    }

    /// The document this instance was built from.
    #[must_use]
    pub fn document(&self) -> &ExperienceDoc {
        &self.document
    }

    #[must_use]
    pub fn shared_document(&self) -> Arc<ExperienceDoc> {
        Arc::clone(&self.document)
    }

    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn starting_room_id(&self) -> &str {
        &self.document.starting_room_id
    }

    #[must_use]
    pub fn final_room_id(&self) -> Option<&str> {
        self.document.final_room()
    }

    #[must_use]
    pub fn completion_criteria(&self) -> &[CompletionCriterion] {
        &self.document.completion_criteria
    }

    #[must_use]
    pub const fn rooms(&self) -> &BTreeMap<String, Room> {
        &self.state.rooms
    }

    #[must_use]
    pub fn room(&self, id: &str) -> Option<&Room> {
        self.state.rooms.get(id)
    }

    pub(crate) fn room_mut(&mut self, id: &str) -> Option<&mut Room> {
        self.state.rooms.get_mut(id)
    }

    pub(crate) fn rooms_mut(&mut self) -> impl Iterator<Item = &mut Room> {
        self.state.rooms.values_mut()
    }

    #[must_use]
    pub fn current_room(&self) -> Option<&Room> {
        self.state.rooms.get(&self.state.progress.current_room_id)
    }

    #[must_use]
    pub const fn triggers(&self) -> &BTreeMap<String, Trigger> {
        &self.state.triggers
    }

    #[must_use]
    pub fn trigger(&self, id: &str) -> Option<&Trigger> {
        self.state.triggers.get(id)
    }

    pub(crate) fn trigger_mut(&mut self, id: &str) -> Option<&mut Trigger> {
        self.state.triggers.get_mut(id)
    }

    #[must_use]
    pub const fn keys(&self) -> &BTreeMap<String, Key> {
        &self.state.keys
    }

    #[must_use]
    pub fn key(&self, id: &str) -> Option<&Key> {
        self.state.keys.get(id)
    }

    pub(crate) fn key_mut(&mut self, id: &str) -> Option<&mut Key> {
        self.state.keys.get_mut(id)
    }

    /// Keys currently held by the player.
    pub fn held_keys(&self) -> impl Iterator<Item = &Key> {
        self.state.keys.values().filter(|key| key.is_held())
    }

    #[must_use]
    pub const fn items(&self) -> &ItemStore {
        &self.state.items
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&Item> {
        self.state.items.get(id)
    }

    pub(crate) fn item_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.state.items.get_mut(id)
    }

    pub(crate) fn items_mut(&mut self) -> &mut ItemStore {
        &mut self.state.items
    }

    #[must_use]
    pub const fn progress(&self) -> &Progress {
        &self.state.progress
    }

    pub(crate) fn progress_mut(&mut self) -> &mut Progress {
        &mut self.state.progress
    }

    /// Stamp the start time and enter the starting room at the current turn.
    pub fn start(&mut self, now: DateTime<Utc>) {
        let turn = self.state.progress.turn_count;
        let starting = self.document.starting_room_id.clone();
        self.state.progress.game_start_time = Some(now);
        if let Some(room) = self.state.rooms.get_mut(&starting) {
            room.enter(turn);
        }
        self.state.progress.current_room_id = starting;
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.state.progress.is_completed = true;
        self.state.progress.game_end_time = Some(now);
    }

    /// Restore every entity and the progress record to the loaded state.
    pub fn reset(&mut self) {
        self.state = (*self.initial).clone();
    }

    /// Whether every trigger criterion names an activated trigger. Pure.
    #[must_use]
    pub fn check_completion(&self) -> bool {
        self.document
            .completion_criteria
            .iter()
            .filter_map(CompletionCriterion::required_trigger)
            .all(|trigger_id| self.state.progress.is_activated(trigger_id))
    }

    /// Acquire a key once, recording the source and the current turn.
    pub fn acquire_key(&mut self, key_id: &str, source: &str) -> bool {
        let turn = self.state.progress.turn_count;
        let Some(key) = self.state.keys.get_mut(key_id) else {
            log::debug!("cannot acquire unknown key '{key_id}'");
            return false;
        };
        if key.is_acquired {
            return false;
        }
        key.acquire(source, turn);
        self.state.progress.record_acquired(key_id);
        log::debug!("acquired key '{key_id}' from '{source}' on turn {turn}");
        true
    }

    /// Move into a room unless it is unknown or locked.
    pub fn enter_room(&mut self, room_id: &str) -> bool {
        let turn = self.state.progress.turn_count;
        match self.state.rooms.get_mut(room_id) {
            Some(room) if !room.is_locked => {
                room.enter(turn);
                self.state.progress.current_room_id = room_id.to_string();
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn play_time(&self, now: DateTime<Utc>) -> i64 {
        self.state.progress.play_time(now)
    }

    /// Current state re-expressed as a document.
    ///
    /// The result is an independent copy, so the validator can analyse a
    /// session without aliasing it.
    #[must_use]
    pub fn to_document(&self) -> ExperienceDoc {
        let doc = &*self.document;
        ExperienceDoc {
            rooms: doc
                .rooms
                .iter()
                .map(|room_doc| self.room_document(room_doc))
                .collect(),
            triggers: doc
                .triggers
                .iter()
                .map(|t| self.state.triggers.get(&t.id).cloned().unwrap_or_else(|| t.clone()))
                .collect(),
            keys: doc
                .keys
                .iter()
                .map(|k| self.state.keys.get(&k.id).cloned().unwrap_or_else(|| k.clone()))
                .collect(),
            global_state: Some(self.state.progress.clone()),
            ..doc.clone()
        }
    }

    fn room_document(&self, room_doc: &RoomDoc) -> RoomDoc {
        let Some(room) = self.state.rooms.get(&room_doc.id) else {
            return room_doc.clone();
        };
        RoomDoc {
            is_locked: room.is_locked,
            is_hidden: room.is_hidden,
            is_visited: room.is_visited,
            turn_entered: room.turn_entered,
            connected_rooms: room.connections.clone(),
            items: room
                .items
                .iter()
                .filter_map(|id| self.item_document(id))
                .collect(),
            ..room_doc.clone()
        }
    }

    fn item_document(&self, id: &str) -> Option<ItemDoc> {
        let item = self.state.items.get(id)?;
        Some(ItemDoc {
            id: item.id.clone(),
            name: item.name.clone(),
            description: item.description.clone(),
            category: item.category,
            kind: item.kind.clone(),
            is_visible: item.is_visible,
            is_hidden: item.is_hidden,
            is_interactive: item.is_interactive,
            is_examinable: item.is_examinable,
            is_portable: item.is_portable,
            is_locked: item.is_locked,
            position: item.position,
            visual_asset: item.visual_asset.clone(),
            lock_trigger_id: item.lock_trigger_id.clone(),
            examine_trigger: item.examine_trigger.clone(),
            key_id: item.key_id.clone(),
            leads_to: item.leads_to.clone(),
            contained_items: item
                .contained
                .iter()
                .filter_map(|child| self.item_document(child))
                .collect(),
            surface_items: item
                .surface
                .iter()
                .filter_map(|child| self.item_document(child))
                .collect(),
        })
    }
}

fn build_state(doc: &ExperienceDoc) -> Result<EntityState, LoadError> {
    let mut rooms = BTreeMap::new();
    let mut items = ItemStore::new();
    for room_doc in &doc.rooms {
        if room_doc.id.is_empty() {
            return Err(LoadError::MissingId { kind: "room" });
        }
        if rooms.contains_key(&room_doc.id) {
            return Err(LoadError::DuplicateId {
                kind: "room",
                id: room_doc.id.clone(),
            });
        }
        for item_doc in &room_doc.items {
            let mut missing = false;
            item_doc.walk(&mut |child, _| missing |= child.id.is_empty());
            if missing {
                return Err(LoadError::MissingId { kind: "item" });
            }
            items
                .insert_tree(item_doc, &room_doc.id, ItemLocation::Room(room_doc.id.clone()))
                .map_err(|DuplicateItem(id)| LoadError::DuplicateId { kind: "item", id })?;
        }
        rooms.insert(room_doc.id.clone(), Room::from_doc(room_doc));
    }

    let triggers = index_by_id(&doc.triggers, "trigger", |t: &Trigger| &t.id)?;
    let keys = index_by_id(&doc.keys, "key", |k: &Key| &k.id)?;

    if !rooms.contains_key(&doc.starting_room_id) {
        return Err(LoadError::UnknownStartingRoom(doc.starting_room_id.clone()));
    }

    let mut progress = doc.global_state.clone().unwrap_or_default();
    if progress.current_room_id.is_empty() {
        progress.current_room_id.clone_from(&doc.starting_room_id);
    }

    Ok(EntityState {
        rooms,
        triggers,
        keys,
        items,
        progress,
    })
}

fn index_by_id<T: Clone>(
    entries: &[T],
    kind: &'static str,
    id_of: impl Fn(&T) -> &String,
) -> Result<BTreeMap<String, T>, LoadError> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let id = id_of(entry);
        if id.is_empty() {
            return Err(LoadError::MissingId { kind });
        }
        if map.insert(id.clone(), entry.clone()).is_some() {
            return Err(LoadError::DuplicateId {
                kind,
                id: id.clone(),
            });
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const DOC: &str = r#"{
        "id": "study_hall", "name": "Study Hall", "startingRoomId": "study",
        "rooms": [
            {"id": "study", "name": "Study",
             "items": [{"id": "drawer", "name": "Drawer", "category": "CONTAINER",
                        "containedItems": [{"id": "brass_key_item", "name": "Brass Key",
                                            "isPortable": true, "keyId": "brass_key"}]}]},
            {"id": "vault", "name": "Vault", "isLocked": true}
        ],
        "triggers": [{"id": "desk_lock", "type": "PadLock", "requiredKey": "brass_key"}],
        "keys": [{"id": "brass_key", "name": "Brass Key", "type": "PHYSICAL_KEY",
                  "associatedTriggerId": "desk_lock", "roomId": "study"}],
        "completionCriteria": [{"type": "trigger_activated", "triggerId": "desk_lock",
                                "description": "Open the desk"},
                               {"type": "room_reached", "roomId": "vault"}]
    }"#;

    #[test]
    fn loads_and_indexes_entities() {
        let exp = Experience::from_json(DOC).unwrap();
        assert_eq!(exp.id(), "study_hall");
        assert_eq!(exp.progress().current_room_id, "study");
        assert_eq!(exp.items().len(), 2);
        assert_eq!(
            exp.item("brass_key_item").unwrap().location,
            ItemLocation::Contained("drawer".into())
        );
        assert!(exp.trigger("desk_lock").is_some());
        assert_eq!(exp.completion_criteria()[0].required_trigger(), Some("desk_lock"));
        assert_eq!(exp.completion_criteria()[1].required_trigger(), None);
    }

    #[test]
    fn integrity_problems_are_rejected() {
        let dup = DOC.replace(r#""id": "vault""#, r#""id": "study""#);
        assert!(matches!(
            Experience::from_json(&dup),
            Err(LoadError::DuplicateId { kind: "room", .. })
        ));
        let bad_start = DOC.replace(r#""startingRoomId": "study""#, r#""startingRoomId": "attic""#);
        assert!(matches!(
            Experience::from_json(&bad_start),
            Err(LoadError::UnknownStartingRoom(room)) if room == "attic"
        ));
        assert!(matches!(
            Experience::from_json("{not json"),
            Err(LoadError::Parse(_))
        ));
    }

    #[test]
    fn completion_only_counts_trigger_criteria() {
        let mut exp = Experience::from_json(DOC).unwrap();
        assert!(!exp.check_completion());
        exp.progress_mut().record_activated("desk_lock");
        assert!(exp.check_completion());
        assert!(exp.check_completion());
    }

    #[test]
    fn locked_rooms_cannot_be_entered() {
        let mut exp = Experience::from_json(DOC).unwrap();
        assert!(!exp.enter_room("vault"));
        assert!(!exp.enter_room("attic"));
        exp.room_mut("vault").unwrap().unlock();
        assert!(exp.enter_room("vault"));
        assert_eq!(exp.current_room().unwrap().id, "vault");
    }

    #[test]
    fn start_complete_and_reset() {
        let mut exp = Experience::from_json(DOC).unwrap();
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        exp.start(t0);
        assert!(exp.room("study").unwrap().is_visited);
        assert!(exp.acquire_key("brass_key", "drawer"));
        assert!(!exp.acquire_key("brass_key", "drawer"));
        exp.complete(t0 + chrono::Duration::seconds(30));
        assert_eq!(exp.play_time(t0), 30);

        exp.reset();
        assert!(!exp.key("brass_key").unwrap().is_acquired);
        assert!(!exp.room("study").unwrap().is_visited);
        assert_eq!(exp.progress(), &Progress {
            current_room_id: "study".into(),
            ..Progress::default()
        });
    }

    #[test]
    fn to_document_reflects_current_state() {
        let mut exp = Experience::from_json(DOC).unwrap();
        exp.items_mut().unlink_child("drawer", "brass_key_item");
        exp.room_mut("vault").unwrap().unlock();
        let doc = exp.to_document();
        assert!(doc.rooms[0].items[0].contained_items.is_empty());
        assert!(!doc.rooms[1].is_locked);
        assert_eq!(doc.global_state.unwrap().current_room_id, "study");
        // the original document is untouched
        assert!(exp.document().rooms[1].is_locked);
    }
}
