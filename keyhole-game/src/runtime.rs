//! Turn-sequenced player session over a live experience.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::constants::{
    DEFAULT_HISTORY_LIMIT, MSG_ALREADY_TAKEN, MSG_CONTAINER_LOCKED, MSG_ITEM_NOT_FOUND,
    MSG_ITEM_NOT_VISIBLE, MSG_KEY_NOT_FOUND, MSG_KEY_NOT_HELD, MSG_NOT_A_CONTAINER,
    MSG_NOT_EXAMINABLE, MSG_NOT_IN_CONTAINER, MSG_NOT_PORTABLE, MSG_ROOM_LOCKED,
    MSG_ROOM_NOT_FOUND, MSG_TRIGGER_NOT_FOUND,
};
use crate::engine::{self, Activation};
use crate::model::{Experience, Item, ItemLocation, Key, Reward, Room, Trigger, TriggerInput};

/// Session tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Maximum retained state-change notifications.
    #[serde(default = "SessionConfig::default_history_limit")]
    pub history_limit: usize,
    /// Mark the experience complete as soon as its criteria are met.
    #[serde(default = "SessionConfig::default_auto_complete")]
    pub auto_complete: bool,
}

impl SessionConfig {
    const fn default_history_limit() -> usize {
        DEFAULT_HISTORY_LIMIT
    }

    const fn default_auto_complete() -> bool {
        true
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: Self::default_history_limit(),
            auto_complete: Self::default_auto_complete(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    ExamineItem,
    OpenContainer,
    TakeItem,
    UseKey,
    EnterCode,
    ChangeRoom,
    UseHint,
}

/// Notification emitted once per successful mutating action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub id: u64,
    pub turn: u32,
    pub action: ActionKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

/// Variant-specific data returned alongside an action result.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    #[default]
    None,
    Items { item_ids: Vec<String> },
    Activation {
        trigger_id: String,
        rewards: Vec<Reward>,
        messages: Vec<String>,
    },
    Key { key_id: String },
    Room { room_id: String },
}

/// Structured result of a player action. Failures are ordinary values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub payload: ActionPayload,
}

impl ActionOutcome {
    fn ok(message: impl Into<String>, payload: ActionPayload) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payload: ActionPayload::None,
        }
    }
}

/// Aggregate counters for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub turn_count: u32,
    pub hints_used: u32,
    pub items_examined: usize,
    pub triggers_activated: usize,
    pub keys_acquired: usize,
    pub play_time_secs: i64,
    pub completion_percentage: u8,
}

/// Handle returned by [`ExperienceSession::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Subscriber = Box<dyn FnMut(&StateChange)>;

/// High-level session wrapper binding notifications and history to an experience.
pub struct ExperienceSession {
    experience: Experience,
    config: SessionConfig,
    history: VecDeque<StateChange>,
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_change: u64,
    next_subscriber: u64,
}

impl fmt::Debug for ExperienceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperienceSession")
            .field("experience", &self.experience.id())
            .field("config", &self.config)
            .field("history", &self.history.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl ExperienceSession {
    #[must_use]
    pub fn new(experience: Experience) -> Self {
        Self::with_config(experience, SessionConfig::default())
    }

    #[must_use]
    pub fn with_config(experience: Experience, config: SessionConfig) -> Self {
        Self {
            experience,
            config,
            history: VecDeque::new(),
            subscribers: Vec::new(),
            next_change: 0,
            next_subscriber: 0,
        }
    }

    /// Stamp the start time and enter the starting room.
    pub fn start(&mut self) {
        self.experience.start(Utc::now());
    }

    /// Restore the experience to its loaded state and clear the history.
    pub fn reset(&mut self) {
        self.experience.reset();
        self.history.clear();
    }

    #[must_use]
    pub const fn experience(&self) -> &Experience {
        &self.experience
    }

    pub const fn experience_mut(&mut self) -> &mut Experience {
        &mut self.experience
    }

    #[must_use]
    pub fn into_experience(self) -> Experience {
        self.experience
    }

    #[must_use]
    pub const fn config(&self) -> SessionConfig {
        self.config
    }

    #[must_use]
    pub fn current_room(&self) -> Option<&Room> {
        self.experience.current_room()
    }

    #[must_use]
    pub fn trigger(&self, id: &str) -> Option<&Trigger> {
        self.experience.trigger(id)
    }

    #[must_use]
    pub fn key(&self, id: &str) -> Option<&Key> {
        self.experience.key(id)
    }

    /// Pure completion check.
    #[must_use]
    pub fn check_completion(&self) -> bool {
        self.experience.check_completion()
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&StateChange) + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        before != self.subscribers.len()
    }

    pub fn history(&self) -> impl Iterator<Item = &StateChange> {
        self.history.iter()
    }

    /// The last `count` changes, oldest first.
    #[must_use]
    pub fn recent_changes(&self, count: usize) -> Vec<&StateChange> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).collect()
    }

    /// Record that the player asked for a hint.
    pub fn record_hint(&mut self) {
        self.experience.progress_mut().hints_used += 1;
        self.emit(ActionKind::UseHint, "Used a hint".to_string());
    }

    #[must_use]
    pub fn statistics(&self) -> SessionStats {
        let progress = self.experience.progress();
        let total = self.experience.triggers().len();
        let completion_percentage = if total == 0 {
            0
        } else {
            let pct = (progress.triggers_activated.len() * 100 + total / 2) / total;
            u8::try_from(pct.min(100)).unwrap_or(100)
        };
        SessionStats {
            turn_count: progress.turn_count,
            hints_used: progress.hints_used,
            items_examined: progress.items_examined.len(),
            triggers_activated: progress.triggers_activated.len(),
            keys_acquired: progress.keys_acquired.len(),
            play_time_secs: self.experience.play_time(Utc::now()),
            completion_percentage,
        }
    }

    /// Examine an item in the current room or inventory.
    pub fn examine_item(&mut self, item_id: &str) -> ActionOutcome {
        let item = match self.item_in_scope(item_id) {
            Ok(item) => item,
            Err(outcome) => return outcome,
        };
        if !item.is_examinable {
            return ActionOutcome::fail(MSG_NOT_EXAMINABLE);
        }
        let name = item.name.clone();
        let mut message = item.description.clone();
        let examine_trigger = item.examine_trigger.clone();

        self.experience.progress_mut().record_examined(item_id);
        let mut payload = ActionPayload::None;
        if let Some(trigger_id) = examine_trigger {
            let activation =
                engine::activate(&mut self.experience, &trigger_id, TriggerInput::Object(item_id));
            if activation.activated {
                for line in &activation.messages {
                    message.push('\n');
                    message.push_str(line);
                }
                payload = activation_payload(&trigger_id, activation);
            }
        }
        self.commit(ActionKind::ExamineItem, format!("Examined {name}"));
        ActionOutcome::ok(message, payload)
    }

    /// List the contents of an unlocked container. Nothing is removed.
    pub fn open_container(&mut self, container_id: &str) -> ActionOutcome {
        let container = match self.item_in_scope(container_id) {
            Ok(item) => item,
            Err(outcome) => return outcome,
        };
        if container.is_locked {
            return ActionOutcome::fail(MSG_CONTAINER_LOCKED);
        }
        if container.contained.is_empty() && !is_container(container) {
            return ActionOutcome::fail(MSG_NOT_A_CONTAINER);
        }
        let name = container.name.clone();
        let item_ids: Vec<String> = container
            .contained
            .iter()
            .filter(|id| self.experience.item(id).is_some_and(Item::is_shown))
            .cloned()
            .collect();
        let message = if item_ids.is_empty() {
            format!("The {name} is empty.")
        } else {
            format!("You open the {name}.")
        };
        self.commit(ActionKind::OpenContainer, format!("Opened {name}"));
        ActionOutcome::ok(message, ActionPayload::Items { item_ids })
    }

    /// Move an item into the inventory, acquiring its key if it carries one.
    ///
    /// Every check runs before anything is mutated.
    pub fn take_item(&mut self, item_id: &str, container_id: Option<&str>) -> ActionOutcome {
        let item = match self.item_in_scope(item_id) {
            Ok(item) => item,
            Err(outcome) => return outcome,
        };
        if item.is_taken() {
            return ActionOutcome::fail(MSG_ALREADY_TAKEN);
        }
        if !item.is_portable {
            return ActionOutcome::fail(MSG_NOT_PORTABLE);
        }
        let parent = item.location.parent_item().map(str::to_string);
        if let Some(container_id) = container_id {
            if parent.as_deref() != Some(container_id) {
                return ActionOutcome::fail(MSG_NOT_IN_CONTAINER);
            }
        }
        if let ItemLocation::Contained(holder) = &item.location {
            if self.experience.item(holder).is_some_and(|c| c.is_locked) {
                return ActionOutcome::fail(MSG_CONTAINER_LOCKED);
            }
        }
        let name = item.name.clone();
        let key_id = item.key_id.clone();
        let room_id = item.room_id.clone();

        match &parent {
            Some(parent) => {
                self.experience.items_mut().unlink_child(parent, item_id);
            }
            None => {
                if let Some(room) = self.experience.room_mut(&room_id) {
                    room.items.retain(|id| id != item_id);
                }
            }
        }
        if let Some(item) = self.experience.item_mut(item_id) {
            item.location = ItemLocation::Inventory;
        }
        let mut payload = ActionPayload::None;
        if let Some(key_id) = key_id {
            let source = parent.unwrap_or(room_id);
            if self.experience.acquire_key(&key_id, &source) {
                payload = ActionPayload::Key { key_id };
            }
        }
        self.commit(ActionKind::TakeItem, format!("Took {name}"));
        ActionOutcome::ok(format!("You take the {name}."), payload)
    }

    /// Use a held key on a trigger.
    pub fn use_key(&mut self, key_id: &str, trigger_id: &str) -> ActionOutcome {
        let Some(key) = self.experience.key(key_id) else {
            return ActionOutcome::fail(MSG_KEY_NOT_FOUND);
        };
        if !key.is_held() {
            return ActionOutcome::fail(MSG_KEY_NOT_HELD);
        }
        if self.experience.trigger(trigger_id).is_none() {
            return ActionOutcome::fail(MSG_TRIGGER_NOT_FOUND);
        }
        let key = key.clone();
        let activation =
            engine::activate(&mut self.experience, trigger_id, TriggerInput::Key(&key));
        if !activation.activated {
            return ActionOutcome::fail(activation.message);
        }
        if key.is_consumable() {
            if let Some(held) = self.experience.key_mut(key_id) {
                held.consume();
            }
        }
        let message = activation.message.clone();
        self.commit(
            ActionKind::UseKey,
            format!("Used {} on {trigger_id}", key.display_name()),
        );
        ActionOutcome::ok(message, activation_payload(trigger_id, activation))
    }

    /// Enter a code on a keypad. Failed attempts still count against the keypad.
    pub fn enter_code(&mut self, trigger_id: &str, code: &str) -> ActionOutcome {
        let activation = engine::activate(&mut self.experience, trigger_id, TriggerInput::Code(code));
        if !activation.activated {
            return ActionOutcome::fail(activation.message);
        }
        let message = activation.message.clone();
        self.commit(ActionKind::EnterCode, format!("Entered the code for {trigger_id}"));
        ActionOutcome::ok(message, activation_payload(trigger_id, activation))
    }

    /// Move to another room.
    pub fn change_room(&mut self, room_id: &str) -> ActionOutcome {
        let Some(room) = self.experience.room(room_id) else {
            return ActionOutcome::fail(MSG_ROOM_NOT_FOUND);
        };
        if room.is_locked {
            return ActionOutcome::fail(MSG_ROOM_LOCKED);
        }
        let name = room.name.clone();
        let message = if room.long_description.is_empty() {
            room.short_description.clone()
        } else {
            room.long_description.clone()
        };
        if !self.experience.enter_room(room_id) {
            return ActionOutcome::fail(MSG_ROOM_LOCKED);
        }
        self.commit(ActionKind::ChangeRoom, format!("Entered {name}"));
        ActionOutcome::ok(
            message,
            ActionPayload::Room {
                room_id: room_id.to_string(),
            },
        )
    }

    fn item_in_scope(&self, item_id: &str) -> Result<&Item, ActionOutcome> {
        let item = self
            .experience
            .item(item_id)
            .filter(|item| {
                item.is_taken() || item.room_id == self.experience.progress().current_room_id
            })
            .ok_or_else(|| ActionOutcome::fail(MSG_ITEM_NOT_FOUND))?;
        if !item.is_shown() {
            return Err(ActionOutcome::fail(MSG_ITEM_NOT_VISIBLE));
        }
        Ok(item)
    }

    /// Finish a successful action: notify, advance the turn, then check completion.
    fn commit(&mut self, action: ActionKind, description: String) {
        self.emit(action, description);
        self.experience.progress_mut().turn_count += 1;
        if self.config.auto_complete
            && !self.experience.progress().is_completed
            && !self.experience.completion_criteria().is_empty()
            && self.experience.check_completion()
        {
            log::debug!("experience '{}' completed", self.experience.id());
            self.experience.complete(Utc::now());
        }
    }

    fn emit(&mut self, action: ActionKind, description: String) {
        let change = StateChange {
            id: self.next_change,
            turn: self.experience.progress().turn_count,
            action,
            description,
            timestamp: Utc::now(),
        };
        self.next_change += 1;
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&change);
        }
        self.history.push_back(change);
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
    }
}

fn is_container(item: &Item) -> bool {
    item.category == crate::model::ItemCategory::Container
}

fn activation_payload(trigger_id: &str, activation: Activation) -> ActionPayload {
    ActionPayload::Activation {
        trigger_id: trigger_id.to_string(),
        rewards: activation.rewards,
        messages: activation.messages.into_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const DOC: &str = r#"{
        "id": "basement", "name": "Basement", "startingRoomId": "cellar",
        "rooms": [
            {"id": "cellar", "name": "Cellar", "longDescription": "Damp and dark.",
             "items": [
                {"id": "crate", "name": "Crate", "category": "CONTAINER", "description": "A crate.",
                 "containedItems": [{"id": "brass_key_item", "name": "Brass Key", "isPortable": true,
                                     "keyId": "brass_key"}]},
                {"id": "chest", "name": "Chest", "category": "CONTAINER", "isLocked": true,
                 "lockTriggerId": "chest_lock",
                 "containedItems": [{"id": "map", "name": "Map", "isPortable": true, "keyId": "map_clue"}]},
                {"id": "boiler", "name": "Boiler", "category": "DEVICE", "isExaminable": false},
                {"id": "shelf", "name": "Shelf", "category": "FURNITURE"}
             ],
             "connectedRooms": [{"id": "stairs", "connectedRoomId": "hall", "isLocked": true,
                                 "requiredTrigger": "chest_lock"}]},
            {"id": "hall", "name": "Hall", "isLocked": true}
        ],
        "triggers": [{"id": "chest_lock", "type": "PadLock", "requiredKey": "brass_key"},
                     {"id": "cipher", "type": "PadLock", "requiredKey": "map_clue"}],
        "keys": [
            {"id": "brass_key", "name": "Brass Key", "type": "PHYSICAL_KEY", "associatedTriggerId": "chest_lock"},
            {"id": "map_clue", "name": "Map", "type": "CLUE", "relatedPuzzle": "cipher",
             "isConsumable": true}
        ],
        "completionCriteria": [{"type": "trigger_activated", "triggerId": "chest_lock"}]
    }"#;

    fn session() -> ExperienceSession {
        let mut session = ExperienceSession::new(Experience::from_json(DOC).unwrap());
        session.start();
        session
    }

    #[test]
    fn examine_checks_flags_and_scope() {
        let mut s = session();
        assert_eq!(s.examine_item("boiler").message, MSG_NOT_EXAMINABLE);
        assert_eq!(s.examine_item("nowhere").message, MSG_ITEM_NOT_FOUND);
        let outcome = s.examine_item("crate");
        assert!(outcome.success);
        assert_eq!(outcome.message, "A crate.");
        assert_eq!(s.experience().progress().turn_count, 1);
    }

    #[test]
    fn open_refuses_locked_and_non_containers() {
        let mut s = session();
        assert_eq!(s.open_container("chest").message, MSG_CONTAINER_LOCKED);
        assert_eq!(s.open_container("shelf").message, MSG_NOT_A_CONTAINER);
        let outcome = s.open_container("crate");
        assert_eq!(
            outcome.payload,
            ActionPayload::Items {
                item_ids: vec!["brass_key_item".into()]
            }
        );
        assert_eq!(s.experience().item("crate").unwrap().contained.len(), 1);
    }

    #[test]
    fn take_then_use_key_completes() {
        let mut s = session();
        assert!(!s.take_item("map", Some("chest")).success);
        let took = s.take_item("brass_key_item", Some("crate"));
        assert!(took.success);
        assert_eq!(
            took.payload,
            ActionPayload::Key {
                key_id: "brass_key".into()
            }
        );
        assert_eq!(
            s.key("brass_key").unwrap().acquired_from.as_deref(),
            Some("crate")
        );
        assert_eq!(s.take_item("brass_key_item", None).message, MSG_ALREADY_TAKEN);

        let used = s.use_key("brass_key", "chest_lock");
        assert!(used.success);
        assert!(!s.experience().item("chest").unwrap().is_locked);
        assert!(s.key("brass_key").unwrap().is_held());
        assert!(s.experience().progress().is_completed);
        assert!(s.change_room("hall").success);
        assert_eq!(s.experience().room("hall").unwrap().turn_entered, Some(2));
    }

    #[test]
    fn use_key_requires_acquisition() {
        let mut s = session();
        assert_eq!(s.use_key("brass_key", "chest_lock").message, MSG_KEY_NOT_HELD);
        assert_eq!(s.use_key("ghost", "chest_lock").message, MSG_KEY_NOT_FOUND);
        assert_eq!(s.experience().progress().turn_count, 0);
    }

    #[test]
    fn consumable_clue_is_spent_only_on_success() {
        let mut s = session();
        s.experience_mut().acquire_key("map_clue", "test");
        assert!(!s.use_key("map_clue", "chest_lock").success);
        assert!(s.key("map_clue").unwrap().is_held());

        assert!(s.use_key("map_clue", "cipher").success);
        let clue = s.key("map_clue").unwrap();
        assert!(clue.is_consumed);
        assert!(!clue.is_held());
        assert_eq!(s.use_key("map_clue", "cipher").message, MSG_KEY_NOT_HELD);
    }

    #[test]
    fn subscribers_and_history_follow_successes() {
        let mut s = ExperienceSession::with_config(
            Experience::from_json(DOC).unwrap(),
            SessionConfig {
                history_limit: 2,
                auto_complete: false,
            },
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = s.subscribe(move |change| sink.borrow_mut().push(change.turn));

        s.examine_item("crate");
        s.examine_item("boiler");
        s.examine_item("shelf");
        s.open_container("crate");
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(s.history().count(), 2);
        let recent = s.recent_changes(1);
        assert_eq!(recent[0].action, ActionKind::OpenContainer);

        assert!(s.unsubscribe(id));
        s.examine_item("crate");
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn statistics_round_completion() {
        let mut s = session();
        s.record_hint();
        let stats = s.statistics();
        assert_eq!(stats.hints_used, 1);
        assert_eq!(stats.completion_percentage, 0);
        assert_eq!(stats.turn_count, 0);

        s.experience_mut().acquire_key("map_clue", "test");
        s.use_key("map_clue", "cipher");
        assert_eq!(s.statistics().completion_percentage, 50);
    }
}
