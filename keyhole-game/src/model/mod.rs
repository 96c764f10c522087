//! Entity model: items, keys, triggers, rooms and the experience that owns them.

pub mod experience;
pub mod item;
pub mod key;
pub mod progress;
pub mod room;
pub mod trigger;

pub use experience::{CompletionCriterion, Difficulty, Experience, TRIGGER_ACTIVATED};
pub use item::{DuplicateItem, Item, ItemCategory, ItemLocation, ItemStore, Position};
pub use key::{Key, KeyCategory, KeyKind};
pub use progress::Progress;
pub use room::{Room, RoomConnection};
pub use trigger::{
    ExaminationHook, KeypadInput, KeypadLock, PadLock, Reward, Trigger, TriggerInput, TriggerKind,
};
