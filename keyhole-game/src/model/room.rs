//! Rooms and the connections between them
use serde::{Deserialize, Serialize};

use crate::document::RoomDoc;

/// A typed exit from one room to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomConnection {
    #[serde(default)]
    pub id: String,
    pub connected_room_id: String,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_trigger: Option<String>,
}

/// A room. Items are referenced by id into the experience's item store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub theme: String,
    pub short_description: String,
    pub long_description: String,
    /// Top-level item ids in document order.
    pub items: Vec<String>,
    pub connections: Vec<RoomConnection>,
    pub is_locked: bool,
    pub is_hidden: bool,
    pub is_visited: bool,
    pub turn_entered: Option<u32>,
}

impl Room {
    pub(crate) fn from_doc(doc: &RoomDoc) -> Self {
        Self {
            id: doc.id.clone(),
            name: doc.name.clone(),
            theme: doc.theme.clone(),
            short_description: doc.short_description.clone(),
            long_description: doc.long_description.clone(),
            items: doc.items.iter().map(|item| item.id.clone()).collect(),
            connections: doc.connected_rooms.clone(),
            is_locked: doc.is_locked,
            is_hidden: doc.is_hidden,
            is_visited: doc.is_visited,
            turn_entered: doc.turn_entered,
        }
    }

    /// Mark visited and stamp the entry turn.
    pub fn enter(&mut self, turn: u32) {
        self.is_visited = true;
        self.turn_entered = Some(turn);
    }

    pub fn unlock(&mut self) {
        self.is_locked = false;
    }

    pub fn reveal(&mut self) {
        self.is_hidden = false;
    }

    /// Exits a player can see.
    pub fn available_exits(&self) -> impl Iterator<Item = &RoomConnection> {
        self.connections.iter().filter(|conn| !conn.is_hidden)
    }

    pub fn locked_exits(&self) -> impl Iterator<Item = &RoomConnection> {
        self.connections.iter().filter(|conn| conn.is_locked)
    }

    pub fn connection_mut(&mut self, id: &str) -> Option<&mut RoomConnection> {
        self.connections.iter_mut().find(|conn| conn.id == id)
    }
}
