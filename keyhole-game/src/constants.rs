//! Centralized defaults for Keyhole game logic.
//!
//! Document-level defaults live here so the loader, the runtime and the
//! validator agree on them.

// Document defaults --------------------------------------------------------
pub(crate) const DEFAULT_ALLOWED_ATTEMPTS: u32 = 999;
pub(crate) const DEFAULT_SUCCESS_MESSAGE: &str = "Success!";
pub(crate) const DEFAULT_FAILURE_MESSAGE: &str = "That didn't work.";
/// Placeholder some documents use for "no associated trigger".
pub(crate) const NO_TRIGGER: &str = "none";

// Session tuning -----------------------------------------------------------
pub(crate) const DEFAULT_HISTORY_LIMIT: usize = 100;

// Runtime messages ---------------------------------------------------------
pub(crate) const MSG_ITEM_NOT_FOUND: &str = "Item not found";
pub(crate) const MSG_ITEM_NOT_VISIBLE: &str = "Item is not visible";
pub(crate) const MSG_NOT_EXAMINABLE: &str = "Item cannot be examined";
pub(crate) const MSG_NOT_A_CONTAINER: &str = "Item is not a container";
pub(crate) const MSG_CONTAINER_LOCKED: &str = "Container is locked";
pub(crate) const MSG_NOT_PORTABLE: &str = "Item cannot be taken";
pub(crate) const MSG_ALREADY_TAKEN: &str = "Item is already in your inventory";
pub(crate) const MSG_NOT_IN_CONTAINER: &str = "Item is not in that container";
pub(crate) const MSG_KEY_NOT_FOUND: &str = "Key not found";
pub(crate) const MSG_KEY_NOT_HELD: &str = "Key not acquired";
pub(crate) const MSG_TRIGGER_NOT_FOUND: &str = "Trigger not found";
pub(crate) const MSG_ROOM_NOT_FOUND: &str = "Room not found";
pub(crate) const MSG_ROOM_LOCKED: &str = "Room is locked";

// Validator report categories ----------------------------------------------
pub const CAT_STRUCTURE: &str = "structure";
pub const CAT_REFERENCES: &str = "references";
pub const CAT_CONFIGURATION: &str = "configuration";
pub const CAT_COMPLETION: &str = "completion";
pub const CAT_REACHABILITY: &str = "reachability";
pub const CAT_CIRCULAR: &str = "circular_dependency";
pub const CAT_PUZZLE_CLUES: &str = "puzzle_clues";
pub const CAT_CONVERGENCE: &str = "convergence";
