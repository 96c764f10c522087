//! Triggers (locks, keypads, examination hooks) and their rewards
use serde::{Deserialize, Serialize};

use super::key::Key;
use crate::constants::{DEFAULT_ALLOWED_ATTEMPTS, DEFAULT_FAILURE_MESSAGE, DEFAULT_SUCCESS_MESSAGE};

/// Effect applied when a trigger succeeds. Applied in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Reward {
    #[serde(rename = "AccessReward", rename_all = "camelCase")]
    Access {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        unlocks_door: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reveals_room: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        activates_triggers: Vec<String>,
    },
    #[serde(rename = "KeyReward", rename_all = "camelCase")]
    Key { key_id: String },
    #[serde(rename = "ItemReward", rename_all = "camelCase")]
    Item {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hide_item_id: Option<String>,
    },
    /// Opaque payload for the presentation layer.
    #[serde(rename = "InformationReward", rename_all = "camelCase")]
    Information {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<serde_json::Value>,
    },
}

/// Character class accepted by a keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeypadInput {
    #[default]
    Numbers,
    Letters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeypadLock {
    pub code: String,
    #[serde(default)]
    pub code_length: Option<usize>,
    #[serde(default = "KeypadLock::default_allowed_attempts")]
    pub allowed_attempts: u32,
    #[serde(default)]
    pub hints_on_failure: bool,
    #[serde(default)]
    pub input_type: KeypadInput,
    /// Session-scoped; not part of the document or of snapshots.
    #[serde(skip)]
    pub attempt_count: u32,
}

impl KeypadLock {
    const fn default_allowed_attempts() -> u32 {
        DEFAULT_ALLOWED_ATTEMPTS
    }

    #[must_use]
    pub fn code_length(&self) -> usize {
        self.code_length.unwrap_or(self.code.chars().count())
    }

    #[must_use]
    pub const fn remaining_attempts(&self) -> u32 {
        self.allowed_attempts.saturating_sub(self.attempt_count)
    }

    /// Count the attempt, then compare. Attempts past the allowance never match.
    fn attempt(&mut self, input: &str) -> bool {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count <= self.allowed_attempts && input == self.code
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PadLock {
    pub required_key: String,
    #[serde(default = "PadLock::default_key_type")]
    pub key_type: String,
}

impl PadLock {
    fn default_key_type() -> String {
        "standard".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExaminationHook {
    pub object_id: String,
    #[serde(default)]
    pub required_perception: u32,
    #[serde(default)]
    pub reveals_information: bool,
    #[serde(default = "ExaminationHook::default_once_only")]
    pub once_only: bool,
}

impl ExaminationHook {
    const fn default_once_only() -> bool {
        true
    }
}

/// Variant data discriminated by the document's `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TriggerKind {
    KeypadLock(KeypadLock),
    PadLock(PadLock),
    #[serde(rename = "ExaminationTrigger")]
    Examination(ExaminationHook),
}

impl TriggerKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::KeypadLock(_) => "KeypadLock",
            Self::PadLock(_) => "PadLock",
            Self::Examination(_) => "ExaminationTrigger",
        }
    }
}

/// Input handed to a trigger's condition.
#[derive(Debug, Clone, Copy)]
pub enum TriggerInput<'a> {
    None,
    Code(&'a str),
    Key(&'a Key),
    Object(&'a str),
}

const fn default_visible() -> bool {
    true
}

/// A named condition/reward pair guarding progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_activated: bool,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub required_items: Vec<String>,
    #[serde(default)]
    pub connected_triggers: Vec<String>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub success_message: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
    #[serde(flatten)]
    pub kind: TriggerKind,
}

impl Trigger {
    /// Evaluate the variant condition against `input`. Keypads count every
    /// code attempt, matching or not.
    pub fn check_condition(&mut self, input: TriggerInput<'_>) -> bool {
        let Self {
            id,
            kind,
            is_activated,
            ..
        } = self;
        match (kind, input) {
            (TriggerKind::KeypadLock(lock), TriggerInput::Code(code)) => lock.attempt(code),
            (TriggerKind::PadLock(lock), TriggerInput::Key(key)) => {
                key.id == lock.required_key && key.can_activate(id)
            }
            (TriggerKind::Examination(hook), TriggerInput::Object(object_id)) => {
                !(hook.once_only && *is_activated) && object_id == hook.object_id
            }
            _ => false,
        }
    }

    /// Mark activated and hand back the rewards. Empty when already active.
    pub fn activate(&mut self) -> Vec<Reward> {
        if self.is_activated {
            return Vec::new();
        }
        self.is_activated = true;
        self.rewards.clone()
    }

    pub fn reset(&mut self) {
        self.is_activated = false;
        if let TriggerKind::KeypadLock(lock) = &mut self.kind {
            lock.attempt_count = 0;
        }
    }

    #[must_use]
    pub fn success_text(&self) -> &str {
        self.success_message
            .as_deref()
            .unwrap_or(DEFAULT_SUCCESS_MESSAGE)
    }

    #[must_use]
    pub fn failure_text(&self) -> &str {
        self.failure_message
            .as_deref()
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
    }

    #[must_use]
    pub fn interaction_prompt(&self) -> String {
        match &self.kind {
            TriggerKind::KeypadLock(lock) => match lock.input_type {
                KeypadInput::Numbers => format!("Enter a {}-digit code:", lock.code_length()),
                KeypadInput::Letters => format!("Enter a {}-letter word:", lock.code_length()),
            },
            TriggerKind::PadLock(lock) => format!("This lock requires a {} key.", lock.key_type),
            TriggerKind::Examination(_) => "Examine this item closely.".to_string(),
        }
    }

    /// Door id unlocked by the first access reward, if any.
    #[must_use]
    pub fn unlock_target(&self) -> Option<&str> {
        self.rewards.iter().find_map(|reward| match reward {
            Reward::Access { unlocks_door, .. } => unlocks_door.as_deref(),
            _ => None,
        })
    }

    #[must_use]
    pub fn keypad(&self) -> Option<&KeypadLock> {
        match &self.kind {
            TriggerKind::KeypadLock(lock) => Some(lock),
            _ => None,
        }
    }

    #[must_use]
    pub fn pad_lock(&self) -> Option<&PadLock> {
        match &self.kind {
            TriggerKind::PadLock(lock) => Some(lock),
            _ => None,
        }
    }
}
