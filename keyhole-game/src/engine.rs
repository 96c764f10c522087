//! Trigger activation and reward application.
//!
//! The same [`apply_rewards`] dispatch drives the live experience and the
//! validator's simulated state through the [`RewardSink`] seam.
use smallvec::SmallVec;

use crate::constants::MSG_TRIGGER_NOT_FOUND;
use crate::model::{Experience, Reward, TriggerInput};

/// Messages produced while applying rewards. Most triggers yield one or two.
pub type RewardMessages = SmallVec<[String; 4]>;

/// Receiver of reward effects.
pub trait RewardSink {
    fn unlock_door(&mut self, door_id: &str);
    fn reveal_room(&mut self, room_id: &str);
    fn show_trigger(&mut self, trigger_id: &str);
    /// Grant a key, recording the trigger that produced it.
    fn grant_key(&mut self, key_id: &str, source: &str);
    fn reveal_item(&mut self, item_id: &str);
    fn hide_item(&mut self, item_id: &str);
}

/// Apply rewards strictly in declaration order.
pub fn apply_rewards<S: RewardSink + ?Sized>(sink: &mut S, source: &str, rewards: &[Reward]) {
    for reward in rewards {
        log::trace!("applying reward from '{source}': {reward:?}");
        match reward {
            Reward::Access {
                unlocks_door,
                reveals_room,
                activates_triggers,
            } => {
                if let Some(door) = unlocks_door {
                    sink.unlock_door(door);
                }
                if let Some(room) = reveals_room {
                    sink.reveal_room(room);
                }
                for trigger in activates_triggers {
                    sink.show_trigger(trigger);
                }
            }
            Reward::Key { key_id } => sink.grant_key(key_id, source),
            Reward::Item {
                item_id,
                hide_item_id,
            } => {
                if let Some(item) = item_id {
                    sink.reveal_item(item);
                }
                if let Some(item) = hide_item_id {
                    sink.hide_item(item);
                }
            }
            Reward::Information { .. } => {}
        }
    }
}

/// Result of one activation attempt.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Activation {
    pub activated: bool,
    pub message: String,
    /// Rewards applied, in declaration order. Empty unless activated.
    pub rewards: Vec<Reward>,
    pub messages: RewardMessages,
}

impl Activation {
    fn refused(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Try to activate a trigger.
///
/// Unknown or already-active triggers are refused without touching state.
/// On success the trigger is marked activated, recorded in progress, items
/// and connections it guards are unlocked, and its rewards are applied.
pub fn activate(exp: &mut Experience, trigger_id: &str, input: TriggerInput<'_>) -> Activation {
    let Some(trigger) = exp.trigger_mut(trigger_id) else {
        return Activation::refused(MSG_TRIGGER_NOT_FOUND);
    };
    if trigger.is_activated {
        return Activation::refused("Already activated");
    }
    if !trigger.check_condition(input) {
        log::debug!("trigger '{trigger_id}' condition not met");
        return Activation::refused(trigger.failure_text());
    }

    let rewards = trigger.activate();
    let message = trigger.success_text().to_string();
    exp.progress_mut().record_activated(trigger_id);
    log::debug!(
        "trigger '{trigger_id}' activated with {} reward(s)",
        rewards.len()
    );

    release_guarded(exp, trigger_id);
    apply_rewards(exp, trigger_id, &rewards);
    let messages = reward_messages(exp, &rewards);
    Activation {
        activated: true,
        message,
        rewards,
        messages,
    }
}

/// Unlock items whose lock names this trigger and connections it gates.
fn release_guarded(exp: &mut Experience, trigger_id: &str) {
    for item in exp.items_mut().iter_mut() {
        if item.is_locked && item.lock_trigger_id.as_deref() == Some(trigger_id) {
            item.unlock();
        }
    }
    let mut opened = Vec::new();
    for room in exp.rooms_mut() {
        for conn in &mut room.connections {
            if conn.required_trigger.as_deref() == Some(trigger_id) {
                conn.is_locked = false;
                opened.push(conn.connected_room_id.clone());
            }
        }
    }
    for room_id in opened {
        if let Some(room) = exp.room_mut(&room_id) {
            room.unlock();
        }
    }
}

fn reward_messages(exp: &Experience, rewards: &[Reward]) -> RewardMessages {
    rewards
        .iter()
        .filter_map(|reward| match reward {
            Reward::Key { key_id } => exp
                .key(key_id)
                .map(|key| format!("You found: {}", key.display_name())),
            Reward::Information { title, content } => match (title, content) {
                (Some(title), _) => Some(title.clone()),
                (None, Some(serde_json::Value::String(text))) => Some(text.clone()),
                _ => None,
            },
            Reward::Access { .. } | Reward::Item { .. } => None,
        })
        .collect()
}

impl RewardSink for Experience {
    /// Doors are only unlocked when they are in the current room.
    fn unlock_door(&mut self, door_id: &str) {
        let current = self.progress().current_room_id.clone();
        let mut leads_to = None;
        if let Some(door) = self.item_mut(door_id) {
            if door.room_id == current {
                door.unlock();
                leads_to = door.leads_to.clone();
            } else {
                log::debug!("door '{door_id}' is not in current room '{current}'");
            }
        }
        if let Some(conn) = self
            .room_mut(&current)
            .and_then(|room| room.connection_mut(door_id))
        {
            conn.is_locked = false;
            leads_to.get_or_insert_with(|| conn.connected_room_id.clone());
        }
        if let Some(room) = leads_to.and_then(|target| self.room_mut(&target)) {
            room.unlock();
        }
    }

    fn reveal_room(&mut self, room_id: &str) {
        if let Some(room) = self.room_mut(room_id) {
            room.reveal();
        }
    }

    fn show_trigger(&mut self, trigger_id: &str) {
        if let Some(trigger) = self.trigger_mut(trigger_id) {
            trigger.is_visible = true;
        }
    }

    fn grant_key(&mut self, key_id: &str, source: &str) {
        self.acquire_key(key_id, source);
    }

    fn reveal_item(&mut self, item_id: &str) {
        if let Some(item) = self.item_mut(item_id) {
            item.is_visible = true;
            item.is_hidden = false;
        }
    }

    fn hide_item(&mut self, item_id: &str) {
        if let Some(item) = self.item_mut(item_id) {
            item.is_visible = false;
        }
    }
}
