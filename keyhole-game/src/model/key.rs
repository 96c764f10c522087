//! Keys, codes and clues
use serde::{Deserialize, Serialize};

use crate::constants::NO_TRIGGER;

/// Broad grouping of key variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyCategory {
    Physical,
    Digital,
    Information,
}

/// Variant data discriminated by the document's `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KeyKind {
    #[serde(rename = "PHYSICAL_KEY", rename_all = "camelCase")]
    Physical {
        #[serde(default = "KeyKind::default_material")]
        key_material: String,
        #[serde(default = "KeyKind::default_shape")]
        key_shape: String,
        #[serde(default = "KeyKind::default_size")]
        key_size: String,
        #[serde(default)]
        has_tag: bool,
        #[serde(default)]
        tag_text: Option<String>,
    },
    #[serde(rename = "NUMERIC_CODE", rename_all = "camelCase")]
    NumericCode {
        code: String,
        #[serde(default)]
        code_length: Option<usize>,
        #[serde(default)]
        code_hint: Option<String>,
        #[serde(default)]
        is_partial: bool,
    },
    #[serde(rename = "CLUE", rename_all = "camelCase")]
    Clue {
        #[serde(default)]
        clue_text: String,
        #[serde(default)]
        clue_type: String,
        #[serde(default)]
        related_puzzle: Option<String>,
        #[serde(default = "KeyKind::default_clarity")]
        clarity_level: u8,
    },
}

impl KeyKind {
    fn default_material() -> String {
        "brass".to_string()
    }

    fn default_shape() -> String {
        "standard".to_string()
    }

    fn default_size() -> String {
        "small".to_string()
    }

    const fn default_clarity() -> u8 {
        3
    }

    #[must_use]
    pub const fn category(&self) -> KeyCategory {
        match self {
            Self::Physical { .. } => KeyCategory::Physical,
            Self::NumericCode { .. } => KeyCategory::Digital,
            Self::Clue { .. } => KeyCategory::Information,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Physical { .. } => "PHYSICAL_KEY",
            Self::NumericCode { .. } => "NUMERIC_CODE",
            Self::Clue { .. } => "CLUE",
        }
    }
}

/// An acquirable unlocking token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub associated_trigger_id: Option<String>,
    #[serde(default)]
    pub is_acquired: bool,
    #[serde(default)]
    pub is_red_herring: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_consumed: bool,
    #[serde(default)]
    pub is_consumable: bool,
    #[serde(default)]
    pub acquired_from: Option<String>,
    #[serde(default)]
    pub acquired_turn: Option<u32>,
    #[serde(default)]
    pub visual_asset: Option<String>,
    #[serde(default)]
    pub name_override: Option<String>,
    #[serde(default)]
    pub description_override: Option<String>,
    #[serde(flatten)]
    pub kind: KeyKind,
}

impl Key {
    /// Associated trigger id, treating the `"none"` placeholder as absent.
    #[must_use]
    pub fn associated_trigger(&self) -> Option<&str> {
        self.associated_trigger_id
            .as_deref()
            .filter(|id| !id.is_empty() && *id != NO_TRIGGER)
    }

    /// Trigger this key is a clue or token for: the associated trigger, or a
    /// clue's related puzzle when no association is declared.
    #[must_use]
    pub fn target_trigger(&self) -> Option<&str> {
        self.associated_trigger().or(match &self.kind {
            KeyKind::Clue { related_puzzle, .. } => {
                related_puzzle.as_deref().filter(|id| !id.is_empty())
            }
            KeyKind::Physical { .. } | KeyKind::NumericCode { .. } => None,
        })
    }

    /// Trigger this key answers to when used: the associated trigger for
    /// physical keys and codes, the related puzzle for clues.
    #[must_use]
    pub fn activation_target(&self) -> Option<&str> {
        match &self.kind {
            KeyKind::Physical { .. } | KeyKind::NumericCode { .. } => self.associated_trigger(),
            KeyKind::Clue { related_puzzle, .. } => {
                related_puzzle.as_deref().filter(|id| !id.is_empty())
            }
        }
    }

    /// Whether this key can drive the given trigger.
    #[must_use]
    pub fn can_activate(&self, trigger_id: &str) -> bool {
        self.activation_target() == Some(trigger_id)
    }

    /// Physical keys and codes are reusable regardless of the document flag.
    #[must_use]
    pub fn is_consumable(&self) -> bool {
        match self.kind {
            KeyKind::Clue { .. } => self.is_consumable,
            KeyKind::Physical { .. } | KeyKind::NumericCode { .. } => false,
        }
    }

    /// Whether the player currently holds this key.
    #[must_use]
    pub const fn is_held(&self) -> bool {
        self.is_acquired && !self.is_consumed
    }

    pub fn acquire(&mut self, source: &str, turn: u32) {
        self.is_acquired = true;
        self.acquired_from = Some(source.to_string());
        self.acquired_turn = Some(turn);
        self.is_hidden = false;
    }

    /// Spend a consumable key. Reusable keys are left untouched.
    pub fn consume(&mut self) {
        if self.is_consumable() {
            self.is_consumed = true;
            self.is_acquired = false;
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name_override.as_deref().unwrap_or(&self.name)
    }

    #[must_use]
    pub fn display_description(&self) -> &str {
        self.description_override
            .as_deref()
            .unwrap_or(&self.description)
    }

    #[must_use]
    pub fn usage_hint(&self) -> String {
        match &self.kind {
            KeyKind::Physical { key_material, .. } => {
                format!("Try using this {key_material} key on a lock.")
            }
            KeyKind::NumericCode {
                code,
                code_hint,
                is_partial,
                ..
            } => {
                if *is_partial {
                    format!(
                        "This is part of a code: {}",
                        code_hint.as_deref().unwrap_or(code)
                    )
                } else {
                    format!("Try entering the code: {code}")
                }
            }
            KeyKind::Clue { clue_text, .. } => clue_text.clone(),
        }
    }
}
