//! Serializable save record of the mutable state of an experience.
//!
//! A snapshot never reconstructs entities on its own: it is replayed onto an
//! experience freshly built from the same document.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SnapshotError;
use crate::model::{Experience, Progress};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    pub is_visited: bool,
    pub is_locked: bool,
    pub is_hidden: bool,
    pub turn_entered: Option<u32>,
    /// Lock flag per connection, in document order.
    pub connections_locked: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemState {
    pub is_visible: bool,
    pub is_hidden: bool,
    pub is_locked: bool,
    pub is_taken: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerState {
    pub is_activated: bool,
    pub is_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyState {
    pub is_acquired: bool,
    pub is_hidden: bool,
    pub is_consumed: bool,
    pub acquired_from: Option<String>,
    pub acquired_turn: Option<u32>,
}

/// Progress plus per-entity overridable state, keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub experience_id: String,
    /// Fingerprint of the document the snapshot was captured from.
    pub fingerprint: String,
    pub saved_at: DateTime<Utc>,
    pub progress: Progress,
    pub rooms: BTreeMap<String, RoomState>,
    pub items: BTreeMap<String, ItemState>,
    pub triggers: BTreeMap<String, TriggerState>,
    pub keys: BTreeMap<String, KeyState>,
}

impl Snapshot {
    #[must_use]
    pub fn capture(exp: &Experience) -> Self {
        Self::capture_at(exp, Utc::now())
    }

    /// Capture with an explicit timestamp.
    #[must_use]
    pub fn capture_at(exp: &Experience, saved_at: DateTime<Utc>) -> Self {
        Self {
            experience_id: exp.id().to_string(),
            fingerprint: exp.fingerprint().to_string(),
            saved_at,
            progress: exp.progress().clone(),
            rooms: exp
                .rooms()
                .values()
                .map(|room| {
                    (
                        room.id.clone(),
                        RoomState {
                            is_visited: room.is_visited,
                            is_locked: room.is_locked,
                            is_hidden: room.is_hidden,
                            turn_entered: room.turn_entered,
                            connections_locked: room
                                .connections
                                .iter()
                                .map(|conn| conn.is_locked)
                                .collect(),
                        },
                    )
                })
                .collect(),
            items: exp
                .items()
                .iter()
                .map(|item| {
                    (
                        item.id.clone(),
                        ItemState {
                            is_visible: item.is_visible,
                            is_hidden: item.is_hidden,
                            is_locked: item.is_locked,
                            is_taken: item.is_taken(),
                        },
                    )
                })
                .collect(),
            triggers: exp
                .triggers()
                .values()
                .map(|trigger| {
                    (
                        trigger.id.clone(),
                        TriggerState {
                            is_activated: trigger.is_activated,
                            is_visible: trigger.is_visible,
                        },
                    )
                })
                .collect(),
            keys: exp
                .keys()
                .values()
                .map(|key| {
                    (
                        key.id.clone(),
                        KeyState {
                            is_acquired: key.is_acquired,
                            is_hidden: key.is_hidden,
                            is_consumed: key.is_consumed,
                            acquired_from: key.acquired_from.clone(),
                            acquired_turn: key.acquired_turn,
                        },
                    )
                })
                .collect(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns an error if the JSON is not a snapshot.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Replay this snapshot onto `exp`.
    ///
    /// The experience is reset to its document state first. Nothing is
    /// mutated unless every check passes.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot was captured from another experience
    /// or document revision, or names entities the experience does not have.
    pub fn restore(&self, exp: &mut Experience) -> Result<(), SnapshotError> {
        self.check_compatible(exp)?;
        exp.reset();

        for (id, state) in &self.rooms {
            if let Some(room) = exp.room_mut(id) {
                room.is_visited = state.is_visited;
                room.is_locked = state.is_locked;
                room.is_hidden = state.is_hidden;
                room.turn_entered = state.turn_entered;
                for (conn, locked) in room.connections.iter_mut().zip(&state.connections_locked) {
                    conn.is_locked = *locked;
                }
            }
        }
        for (id, state) in &self.items {
            if state.is_taken {
                detach_taken(exp, id);
            }
            if let Some(item) = exp.item_mut(id) {
                item.is_visible = state.is_visible;
                item.is_hidden = state.is_hidden;
                item.is_locked = state.is_locked;
            }
        }
        for (id, state) in &self.triggers {
            if let Some(trigger) = exp.trigger_mut(id) {
                trigger.is_activated = state.is_activated;
                trigger.is_visible = state.is_visible;
            }
        }
        for (id, state) in &self.keys {
            if let Some(key) = exp.key_mut(id) {
                key.is_acquired = state.is_acquired;
                key.is_hidden = state.is_hidden;
                key.is_consumed = state.is_consumed;
                key.acquired_from.clone_from(&state.acquired_from);
                key.acquired_turn = state.acquired_turn;
            }
        }
        *exp.progress_mut() = self.progress.clone();
        log::debug!(
            "restored snapshot of '{}' at turn {}",
            self.experience_id,
            self.progress.turn_count
        );
        Ok(())
    }

    fn check_compatible(&self, exp: &Experience) -> Result<(), SnapshotError> {
        if self.experience_id != exp.id() {
            return Err(SnapshotError::ExperienceMismatch {
                expected: exp.id().to_string(),
                found: self.experience_id.clone(),
            });
        }
        if self.fingerprint != exp.fingerprint() {
            return Err(SnapshotError::FingerprintMismatch(self.experience_id.clone()));
        }
        let unknown = |kind: &'static str, id: &String| SnapshotError::UnknownEntity {
            kind,
            id: id.clone(),
        };
        if let Some(id) = self.rooms.keys().find(|id| exp.room(id).is_none()) {
            return Err(unknown("room", id));
        }
        if let Some(id) = self.items.keys().find(|id| exp.item(id).is_none()) {
            return Err(unknown("item", id));
        }
        if let Some(id) = self.triggers.keys().find(|id| exp.trigger(id).is_none()) {
            return Err(unknown("trigger", id));
        }
        if let Some(id) = self.keys.keys().find(|id| exp.key(id).is_none()) {
            return Err(unknown("key", id));
        }
        Ok(())
    }
}

/// Remove a taken item from wherever the document placed it.
fn detach_taken(exp: &mut Experience, item_id: &str) {
    let Some(item) = exp.item(item_id) else {
        return;
    };
    let parent = item.location.parent_item().map(str::to_string);
    let room_id = item.room_id.clone();
    match parent {
        Some(parent) => {
            exp.items_mut().unlink_child(&parent, item_id);
        }
        None => {
            if let Some(room) = exp.room_mut(&room_id) {
                room.items.retain(|id| id != item_id);
            }
        }
    }
    if let Some(item) = exp.item_mut(item_id) {
        item.location = crate::model::ItemLocation::Inventory;
    }
}
