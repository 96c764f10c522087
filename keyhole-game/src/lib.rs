//! Keyhole Game Engine
//!
//! Platform-agnostic core for Keyhole puzzle experiences: the entity model,
//! trigger and reward engine, player session runtime, snapshot persistence
//! and the offline solvability validator. No I/O happens here; documents and
//! snapshots arrive through the [`ExperienceSource`] and [`SnapshotStore`]
//! traits.

pub mod constants;
pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod model;
pub mod runtime;
pub mod snapshot;
pub mod validator;

// Re-export commonly used types
pub use document::{ExperienceDoc, ItemDoc, RoomDoc};
pub use engine::{Activation, RewardSink, activate, apply_rewards};
pub use error::{LoadError, SnapshotError};
pub use graph::{DependencyGraph, Edge, EdgeKind};
pub use model::{
    CompletionCriterion, Difficulty, Experience, Item, ItemCategory, ItemLocation, Key, KeyKind,
    Progress, Reward, Room, RoomConnection, Trigger, TriggerInput, TriggerKind,
};
pub use runtime::{
    ActionKind, ActionOutcome, ActionPayload, ExperienceSession, SessionConfig, SessionStats,
    StateChange,
};
pub use snapshot::Snapshot;
pub use validator::{
    Finding, Reachability, Severity, ValidationReport, ValidatorConfig, validate_document,
    validate_experience,
};

/// Source of experience documents.
/// Platform-specific implementations should provide this
pub trait ExperienceSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the document for an experience id
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be found or parsed.
    fn load_document(&self, experience_id: &str) -> Result<ExperienceDoc, Self::Error>;
}

/// Trait for abstracting snapshot save/load operations
/// Platform-specific implementations should provide this
pub trait SnapshotStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a snapshot under a slot name
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    fn save_snapshot(&self, slot: &str, snapshot: &Snapshot) -> Result<(), Self::Error>;

    /// Load the snapshot in a slot
    ///
    /// # Errors
    ///
    /// Returns an error if the slot exists but cannot be read.
    fn load_snapshot(&self, slot: &str) -> Result<Option<Snapshot>, Self::Error>;

    /// Delete a slot
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be deleted.
    fn delete_snapshot(&self, slot: &str) -> Result<(), Self::Error>;
}

/// Main engine tying documents, sessions and saves together
pub struct KeyholeEngine<L, S>
where
    L: ExperienceSource,
    S: SnapshotStore,
{
    source: L,
    store: S,
}

impl<L, S> KeyholeEngine<L, S>
where
    L: ExperienceSource,
    S: SnapshotStore,
{
    /// Create a new engine with the provided document source and save store
    pub const fn new(source: L, store: S) -> Self {
        Self { source, store }
    }

    /// Load an experience and start a fresh session on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded or instantiated.
    pub fn create_session(
        &self,
        experience_id: &str,
        config: SessionConfig,
    ) -> Result<ExperienceSession, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
    {
        let doc = self
            .source
            .load_document(experience_id)
            .map_err(Into::into)?;
        let mut session = ExperienceSession::with_config(Experience::from_document(doc)?, config);
        session.start();
        Ok(session)
    }

    /// Validate an experience document without starting a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be loaded.
    pub fn validate(
        &self,
        experience_id: &str,
        config: &ValidatorConfig,
    ) -> Result<ValidationReport, L::Error> {
        let doc = self.source.load_document(experience_id)?;
        Ok(validate_document(&doc, config))
    }

    /// Save a session's state
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    pub fn save_session(&self, slot: &str, session: &ExperienceSession) -> Result<(), S::Error> {
        self.store
            .save_snapshot(slot, &Snapshot::capture(session.experience()))
    }

    /// Load a session from a slot
    ///
    /// The experience is rebuilt from its document and the snapshot is
    /// replayed onto it.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot or document cannot be loaded, or the
    /// snapshot does not match the current document.
    pub fn load_session(
        &self,
        slot: &str,
        config: SessionConfig,
    ) -> Result<Option<ExperienceSession>, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let Some(snapshot) = self.store.load_snapshot(slot).map_err(Into::into)? else {
            return Ok(None);
        };
        let doc = self
            .source
            .load_document(&snapshot.experience_id)
            .map_err(Into::into)?;
        let mut experience = Experience::from_document(doc)?;
        snapshot.restore(&mut experience)?;
        Ok(Some(ExperienceSession::with_config(experience, config)))
    }

    /// Delete a saved slot
    ///
    /// # Errors
    ///
    /// Returns an error if the slot cannot be deleted.
    pub fn delete_session(&self, slot: &str) -> Result<(), S::Error> {
        self.store.delete_snapshot(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    const PANTRY: &str = r#"{
        "id": "pantry", "name": "Pantry", "startingRoomId": "pantry",
        "rooms": [{"id": "pantry", "name": "Pantry", "items": [
            {"id": "jar", "name": "Jar", "category": "CONTAINER", "containedItems": [
                {"id": "tin_key_item", "name": "Tin Key", "isPortable": true, "keyId": "tin_key"}]},
            {"id": "larder", "name": "Larder", "isLocked": true, "lockTriggerId": "larder_lock"}]}],
        "triggers": [{"id": "larder_lock", "type": "PadLock", "requiredKey": "tin_key"}],
        "keys": [{"id": "tin_key", "name": "Tin Key", "type": "PHYSICAL_KEY",
                  "associatedTriggerId": "larder_lock"}],
        "completionCriteria": [{"type": "trigger_activated", "triggerId": "larder_lock"}]
    }"#;

    #[derive(Debug, thiserror::Error)]
    #[error("no experience named '{0}'")]
    struct Missing(String);

    #[derive(Clone, Copy, Default)]
    struct FixtureLoader;

    impl ExperienceSource for FixtureLoader {
        type Error = Missing;

        fn load_document(&self, experience_id: &str) -> Result<ExperienceDoc, Self::Error> {
            if experience_id == "pantry" {
                ExperienceDoc::from_json(PANTRY).map_err(|_| Missing(experience_id.to_string()))
            } else {
                Err(Missing(experience_id.to_string()))
            }
        }
    }

    #[derive(Clone, Default)]
    struct MemoryStorage {
        saves: Rc<RefCell<HashMap<String, Snapshot>>>,
    }

    impl SnapshotStore for MemoryStorage {
        type Error = Infallible;

        fn save_snapshot(&self, slot: &str, snapshot: &Snapshot) -> Result<(), Self::Error> {
            self.saves
                .borrow_mut()
                .insert(slot.to_string(), snapshot.clone());
            Ok(())
        }

        fn load_snapshot(&self, slot: &str) -> Result<Option<Snapshot>, Self::Error> {
            Ok(self.saves.borrow().get(slot).cloned())
        }

        fn delete_snapshot(&self, slot: &str) -> Result<(), Self::Error> {
            self.saves.borrow_mut().remove(slot);
            Ok(())
        }
    }

    #[test]
    fn engine_saves_and_restores_sessions() {
        let engine = KeyholeEngine::new(FixtureLoader, MemoryStorage::default());
        let mut session = engine
            .create_session("pantry", SessionConfig::default())
            .unwrap();
        assert!(session.take_item("tin_key_item", Some("jar")).success);
        assert!(session.use_key("tin_key", "larder_lock").success);
        assert!(session.experience().progress().is_completed);
        engine.save_session("slot-one", &session).unwrap();

        let loaded = engine
            .load_session("slot-one", SessionConfig::default())
            .unwrap()
            .expect("save exists");
        let exp = loaded.experience();
        assert!(exp.key("tin_key").unwrap().is_acquired);
        assert!(!exp.item("larder").unwrap().is_locked);
        assert!(exp.item("jar").unwrap().contained.is_empty());
        assert_eq!(exp.progress().turn_count, 2);
        assert!(loaded.check_completion());

        assert!(
            engine
                .load_session("missing-slot", SessionConfig::default())
                .unwrap()
                .is_none()
        );
        engine.delete_session("slot-one").unwrap();
        assert!(
            engine
                .load_session("slot-one", SessionConfig::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn unknown_experiences_are_errors() {
        let engine = KeyholeEngine::new(FixtureLoader, MemoryStorage::default());
        let err = engine
            .create_session("attic", SessionConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("attic"));
        assert!(engine.validate("attic", &ValidatorConfig::default()).is_err());
    }

    #[test]
    fn engine_validates_by_id() {
        let engine = KeyholeEngine::new(FixtureLoader, MemoryStorage::default());
        let report = engine
            .validate("pantry", &ValidatorConfig::default())
            .unwrap();
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.reachable_items.contains("larder"));
    }
}
