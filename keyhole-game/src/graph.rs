//! Dependency graph: an experience document flattened into id-indexed node
//! sets and typed edges. Pure transformation, no simulation.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::document::ExperienceDoc;
use crate::model::{Experience, ItemCategory, Reward, TriggerKind};

/// Variant data a trigger node needs for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TriggerCondition {
    Keypad { code: String },
    PadLock { required_key: String },
    Examination { object_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemNode {
    pub id: String,
    pub name: String,
    pub room_id: String,
    /// Item this one sits in or on.
    pub parent: Option<String>,
    pub category: ItemCategory,
    pub is_visible: bool,
    pub is_hidden: bool,
    pub is_locked: bool,
    pub is_portable: bool,
    pub lock_trigger_id: Option<String>,
    pub examine_trigger: Option<String>,
    pub key_id: Option<String>,
    pub leads_to: Option<String>,
    pub contained: Vec<String>,
    pub surface: Vec<String>,
}

impl ItemNode {
    /// Shown to the player at load.
    #[must_use]
    pub const fn is_shown(&self) -> bool {
        self.is_visible && !self.is_hidden
    }

    /// Room this item leads to. Any item with `leadsTo` acts as a door.
    #[must_use]
    pub fn door_target(&self) -> Option<&str> {
        self.leads_to.as_deref()
    }

    /// Contained then surface children.
    pub fn children(&self) -> impl Iterator<Item = &String> {
        self.contained.iter().chain(&self.surface)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerNode {
    pub id: String,
    pub condition: TriggerCondition,
    pub rewards: Vec<Reward>,
    /// Door id named by the first access reward.
    pub unlocks: Option<String>,
    pub is_activated: bool,
    pub required_items: Vec<String>,
    pub connected_triggers: Vec<String>,
}

impl TriggerNode {
    #[must_use]
    pub fn required_key(&self) -> Option<&str> {
        match &self.condition {
            TriggerCondition::PadLock { required_key } => Some(required_key),
            TriggerCondition::Keypad { .. } | TriggerCondition::Examination { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_keypad(&self) -> bool {
        matches!(self.condition, TriggerCondition::Keypad { .. })
    }

    /// Key ids granted by this trigger's rewards.
    pub fn granted_keys(&self) -> impl Iterator<Item = &str> {
        self.rewards.iter().filter_map(|reward| match reward {
            Reward::Key { key_id } => Some(key_id.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyNode {
    pub id: String,
    pub name: String,
    pub kind: &'static str,
    pub room_id: String,
    /// Trigger this key or clue is for.
    pub target_trigger: Option<String>,
    /// Trigger the key actually opens when used.
    pub activates: Option<String>,
    /// Item whose `keyId` names this key.
    pub carrier: Option<String>,
    /// Item the key physically lies in or on.
    pub location: Option<String>,
    pub is_acquired: bool,
    pub is_red_herring: bool,
}

impl KeyNode {
    /// Same answer as [`crate::model::Key::can_activate`].
    #[must_use]
    pub fn can_activate(&self, trigger_id: &str) -> bool {
        self.activates.as_deref() == Some(trigger_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionNode {
    pub id: String,
    pub target: String,
    pub is_locked: bool,
    pub is_hidden: bool,
    pub required_trigger: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomNode {
    pub id: String,
    pub name: String,
    /// Top-level item ids.
    pub items: Vec<String>,
    pub connections: Vec<ConnectionNode>,
    pub is_locked: bool,
    pub is_visited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// item -> contained item
    Contains,
    /// item -> surface item
    Supports,
    /// item -> guarding trigger
    LockedBy,
    /// trigger -> door it unlocks
    Unlocks,
    /// key -> trigger it activates
    Associated,
    /// trigger -> key it grants
    Grants,
    /// room -> room
    Connects,
    /// door item -> room
    LeadsTo,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub from: String,
    pub to: String,
}

/// Flattened, id-ordered view of an experience document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    pub experience_id: String,
    pub experience_name: String,
    pub starting_room_id: String,
    pub final_room_id: Option<String>,
    pub items: BTreeMap<String, ItemNode>,
    pub triggers: BTreeMap<String, TriggerNode>,
    pub keys: BTreeMap<String, KeyNode>,
    pub rooms: BTreeMap<String, RoomNode>,
    /// Trigger ids named by `trigger_activated` criteria.
    pub completion_triggers: Vec<String>,
    pub edges: Vec<Edge>,
}

impl DependencyGraph {
    /// Build from a document. Duplicate ids keep the first occurrence.
    #[must_use]
    pub fn build(doc: &ExperienceDoc) -> Self {
        let mut items = BTreeMap::new();
        for (room_id, item, parent) in doc.all_items() {
            items.entry(item.id.clone()).or_insert_with(|| ItemNode {
                id: item.id.clone(),
                name: item.name.clone(),
                room_id: room_id.to_string(),
                parent: parent.map(|p| p.id.clone()),
                category: item.category,
                is_visible: item.is_visible,
                is_hidden: item.is_hidden,
                is_locked: item.is_locked,
                is_portable: item.is_portable,
                lock_trigger_id: non_empty(item.lock_trigger_id.as_deref()),
                examine_trigger: non_empty(item.examine_trigger.as_deref()),
                key_id: non_empty(item.key_id.as_deref()),
                leads_to: non_empty(item.leads_to.as_deref()),
                contained: item.contained_items.iter().map(|c| c.id.clone()).collect(),
                surface: item.surface_items.iter().map(|c| c.id.clone()).collect(),
            });
        }

        let mut triggers = BTreeMap::new();
        for trigger in &doc.triggers {
            let condition = match &trigger.kind {
                TriggerKind::KeypadLock(lock) => TriggerCondition::Keypad {
                    code: lock.code.clone(),
                },
                TriggerKind::PadLock(lock) => TriggerCondition::PadLock {
                    required_key: lock.required_key.clone(),
                },
                TriggerKind::Examination(hook) => TriggerCondition::Examination {
                    object_id: hook.object_id.clone(),
                },
            };
            triggers
                .entry(trigger.id.clone())
                .or_insert_with(|| TriggerNode {
                    id: trigger.id.clone(),
                    condition,
                    rewards: trigger.rewards.clone(),
                    unlocks: trigger.unlock_target().map(str::to_string),
                    is_activated: trigger.is_activated,
                    required_items: trigger.required_items.clone(),
                    connected_triggers: trigger.connected_triggers.clone(),
                });
        }

        let mut keys = BTreeMap::new();
        for key in &doc.keys {
            let carrier = items
                .values()
                .find(|item: &&ItemNode| item.key_id.as_deref() == Some(key.id.as_str()))
                .map(|item| item.id.clone());
            let location = carrier
                .as_ref()
                .and_then(|id| items.get(id))
                .and_then(|item| item.parent.clone())
                .or_else(|| {
                    key.acquired_from
                        .clone()
                        .filter(|source| items.contains_key(source))
                });
            keys.entry(key.id.clone()).or_insert_with(|| KeyNode {
                id: key.id.clone(),
                name: key.name.clone(),
                kind: key.kind.label(),
                room_id: key.room_id.clone(),
                target_trigger: key.target_trigger().map(str::to_string),
                activates: key.activation_target().map(str::to_string),
                carrier,
                location,
                is_acquired: key.is_acquired,
                is_red_herring: key.is_red_herring,
            });
        }

        let mut rooms = BTreeMap::new();
        for room in &doc.rooms {
            rooms.entry(room.id.clone()).or_insert_with(|| RoomNode {
                id: room.id.clone(),
                name: room.name.clone(),
                items: room.items.iter().map(|item| item.id.clone()).collect(),
                connections: room
                    .connected_rooms
                    .iter()
                    .map(|conn| ConnectionNode {
                        id: conn.id.clone(),
                        target: conn.connected_room_id.clone(),
                        is_locked: conn.is_locked,
                        is_hidden: conn.is_hidden,
                        required_trigger: non_empty(conn.required_trigger.as_deref()),
                    })
                    .collect(),
                is_locked: room.is_locked,
                is_visited: room.is_visited,
            });
        }

        let completion_triggers = doc
            .completion_criteria
            .iter()
            .filter_map(|criterion| criterion.required_trigger().map(str::to_string))
            .collect();

        let mut graph = Self {
            experience_id: doc.id.clone(),
            experience_name: doc.name.clone(),
            starting_room_id: doc.starting_room_id.clone(),
            final_room_id: doc.final_room().map(str::to_string),
            items,
            triggers,
            keys,
            rooms,
            completion_triggers,
            edges: Vec::new(),
        };
        graph.edges = graph.derive_edges();
        log::trace!(
            "built graph for '{}' with {} edges",
            graph.experience_id,
            graph.edges.len()
        );
        graph
    }

    /// Build from the current state of a live experience. The graph is an
    /// independent copy and never aliases the session.
    #[must_use]
    pub fn from_experience(exp: &Experience) -> Self {
        Self::build(&exp.to_document())
    }

    /// Upper bound on facts a monotone analysis over this graph can add.
    #[must_use]
    pub fn fact_bound(&self) -> usize {
        let granted: usize = self
            .triggers
            .values()
            .map(|trigger| trigger.granted_keys().count())
            .sum();
        self.items.len() + self.keys.len() + self.rooms.len() + 2 * self.triggers.len() + granted + 1
    }

    /// Keys whose target is `trigger_id`.
    pub fn keys_for(&self, trigger_id: &str) -> impl Iterator<Item = &KeyNode> {
        self.keys
            .values()
            .filter(move |key| key.target_trigger.as_deref() == Some(trigger_id))
    }

    /// Edges of one kind.
    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.kind == kind)
    }

    fn derive_edges(&self) -> Vec<Edge> {
        let mut edges = Vec::new();
        let mut push = |kind, from: &str, to: &str| {
            edges.push(Edge {
                kind,
                from: from.to_string(),
                to: to.to_string(),
            });
        };
        for item in self.items.values() {
            for child in &item.contained {
                push(EdgeKind::Contains, &item.id, child);
            }
            for child in &item.surface {
                push(EdgeKind::Supports, &item.id, child);
            }
            if let Some(trigger) = &item.lock_trigger_id {
                push(EdgeKind::LockedBy, &item.id, trigger);
            }
            if let Some(room) = item.door_target() {
                push(EdgeKind::LeadsTo, &item.id, room);
            }
        }
        for trigger in self.triggers.values() {
            if let Some(door) = &trigger.unlocks {
                push(EdgeKind::Unlocks, &trigger.id, door);
            }
            for key in trigger.granted_keys() {
                push(EdgeKind::Grants, &trigger.id, key);
            }
        }
        for key in self.keys.values() {
            if let Some(trigger) = &key.target_trigger {
                push(EdgeKind::Associated, &key.id, trigger);
            }
        }
        for room in self.rooms.values() {
            for conn in &room.connections {
                push(EdgeKind::Connects, &room.id, &conn.target);
            }
        }
        edges.sort();
        edges
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}
