//! Global per-experience progress record
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Turn counter, id lists and timestamps owned by one experience instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Progress {
    pub turn_count: u32,
    pub hints_used: u32,
    pub items_examined: Vec<String>,
    pub triggers_activated: Vec<String>,
    pub keys_acquired: Vec<String>,
    pub current_room_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub game_start_time: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub game_end_time: Option<DateTime<Utc>>,
    pub is_completed: bool,
}

impl Progress {
    /// Record an examined item once. Returns whether it was new.
    pub fn record_examined(&mut self, item_id: &str) -> bool {
        push_unique(&mut self.items_examined, item_id)
    }

    pub fn record_activated(&mut self, trigger_id: &str) -> bool {
        push_unique(&mut self.triggers_activated, trigger_id)
    }

    pub fn record_acquired(&mut self, key_id: &str) -> bool {
        push_unique(&mut self.keys_acquired, key_id)
    }

    #[must_use]
    pub fn is_activated(&self, trigger_id: &str) -> bool {
        self.triggers_activated.iter().any(|id| id == trigger_id)
    }

    /// Seconds between start and end (or `now` while still running).
    #[must_use]
    pub fn play_time(&self, now: DateTime<Utc>) -> i64 {
        self.game_start_time.map_or(0, |start| {
            let end = self.game_end_time.unwrap_or(now);
            (end - start).num_seconds().max(0)
        })
    }
}

fn push_unique(list: &mut Vec<String>, id: &str) -> bool {
    if list.iter().any(|existing| existing == id) {
        return false;
    }
    list.push(id.to_string());
    true
}
